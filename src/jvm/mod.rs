//! JVM class files: decoding, rewriting method bodies, and encoding back
//!
//! The layers build on each other:
//!
//!   - [`class_file`] is the binary format itself
//!   - [`code`] turns the `Code` attribute into a sequence of labelled instructions
//!   - [`verifier`] reconstructs and re-encodes stack map frames around inserted code
//!   - [`events`] presents the annotations of a method as a flat stream

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
pub mod events;
pub mod verifier;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
