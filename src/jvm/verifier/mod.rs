//! Bytecode verification utilities
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is referred to as the _stack
//! map frame_ (represented using [`Frame`]) and the set of stack map frames for all possible jump
//! targets in a method is the _stack map table_.
//!
//! Class files from version 50 onwards must carry a [`crate::jvm::class_file::StackMapTable`]
//! for every method with branches. When code gets inserted into a method, every new jump target
//! needs a frame too. Since the frames of the original method are already known at its own jump
//! targets, frames elsewhere are recovered by stepping forward from the nearest known frame one
//! instruction at a time (see [`Frame::simulate_instruction`]), rather than by running the full
//! fix-point inference that the JVM describes for [verification by type-checking][0].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod frame;
pub mod stack_depth;
mod types;

pub use frame::*;
pub use types::*;
