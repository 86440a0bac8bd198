//! Binary representation of class files
//!
//! Everything here maps more or less directly onto a structure from [chapter 4 of the JVM
//! specification][0]. Parts of the class file that rewriting never needs to look inside of (most
//! attributes, fields) are kept as opaque byte blobs so that they round-trip exactly.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html

mod annotations;
mod attribute;
mod class;
mod constants;
mod field;
mod method;
mod serialize;
mod version;

pub use annotations::*;
pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;
