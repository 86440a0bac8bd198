//! Runtime null checks for `@NotNull` contracts in JVM class files
//!
//! Parameters and methods annotated with `@org.jetbrains.annotations.NotNull` get guards inserted
//! into their bytecode: a `null` argument throws `IllegalArgumentException` on entry, and
//! returning `null` throws `IllegalStateException`. See [`instrument::instrument_class`].

pub mod instrument;
pub mod jvm;
mod util;
