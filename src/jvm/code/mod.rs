//! Bytecode representation and rewriting
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is arguably the most important part of the class file - it contains the actual
//! executable instructions. We split up the [list of bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may transfer control elsewhere
//!
//! ### Rewriting
//!
//! Inserting instructions shifts every offset after the insertion point, and offsets are
//! everywhere: jumps, exception ranges, debug tables, stack map frames. [`MethodBody`] replaces
//! all of them with [`Label`]s when a `Code` attribute is decoded, so that instructions can be
//! spliced in freely. Offsets only come back when the body is encoded again (see
//! [`jump_encoding`]).
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-6.html#jvms-6.5

mod code;
mod instructions;
pub mod jump_encoding;
mod label;

pub use code::*;
pub use instructions::*;
pub use label::*;
