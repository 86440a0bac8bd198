use super::class_file::{ConstantIndex, ConstantPoolOverflow};
use super::code::Label;
use std::fmt;

/// Failure while decoding, rewriting, or encoding a class file
#[derive(Debug)]
pub enum Error {
    /// Underlying I/O failure (including truncated input)
    IoError(std::io::Error),

    /// Class file doesn't start with `0xCAFEBABE`
    BadMagic(u32),

    UnknownConstantTag {
        index: u16,
        tag: u8,
    },

    /// Index is zero, out of bounds, or points into the second half of a `long`/`double`
    BadConstantIndex(ConstantIndex),

    /// Index points at a constant of the wrong kind
    MistypedConstant {
        index: ConstantIndex,
        expected: &'static str,
    },

    /// Bytes of a `CONSTANT_Utf8` cannot be represented as a Rust string
    InvalidModifiedUtf8(ConstantIndex),

    BadDescriptor {
        descriptor: String,
        message: String,
    },

    /// Attribute body is shorter or longer than its fields
    MalformedAttribute(&'static str),

    ConstantPoolOverflow(ConstantPoolOverflow),

    UnknownOpcode {
        opcode: u8,
        offset: usize,
    },

    /// Some offset (jump target, exception range, debug table entry) does not land on an
    /// instruction boundary
    InvalidCodeOffset {
        offset: isize,
        referenced_from: &'static str,
    },

    BadStackMapFrameTag(u8),
    BadVerificationTypeTag(u8),

    /// Method body exceeds the 65535 byte limit
    MethodCodeOverflow(usize),

    /// A conditional branch needs a displacement that doesn't fit in 16 bits
    BranchOutOfRange {
        from: usize,
        to: usize,
    },

    /// Label is used but never placed in the code
    UnknownLabel(Label),

    /// A stack map frame is required at this label but none can be derived
    MissingFrame(Label),

    /// Instruction could not be applied to the frame preceding it
    VerifierError {
        instruction: String,
        kind: VerifierErrorKind,
    },

    /// Two control flow paths reach a label with different stack depths
    InconsistentStackDepth {
        label: Label,
        expected: usize,
        found: usize,
    },

    /// An instruction pops more values than are on the operand stack
    StackUnderflow {
        instruction: String,
        depth: usize,
    },

    /// Execution can run past the last instruction
    FallsOffEnd,
}

#[derive(Debug)]
pub enum VerifierErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    InvalidIndex,
    InvalidType,
    NotLoadableConstant(ConstantIndex),
    BadDescriptor(String),
    Unsupported,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(overflow)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "{}", err),
            Error::BadMagic(magic) => write!(f, "bad magic number {:#010x}", magic),
            Error::UnknownConstantTag { index, tag } => {
                write!(f, "unknown constant tag {} at index {}", tag, index)
            }
            Error::BadConstantIndex(ConstantIndex(idx)) => {
                write!(f, "invalid constant pool index {}", idx)
            }
            Error::MistypedConstant {
                index: ConstantIndex(idx),
                expected,
            } => write!(f, "constant pool index {} is not a {}", idx, expected),
            Error::InvalidModifiedUtf8(ConstantIndex(idx)) => {
                write!(f, "constant pool index {} is not valid modified UTF-8", idx)
            }
            Error::BadDescriptor {
                descriptor,
                message,
            } => write!(f, "bad descriptor '{}': {}", descriptor, message),
            Error::MalformedAttribute(name) => write!(f, "malformed {} attribute", name),
            Error::ConstantPoolOverflow(overflow) => write!(
                f,
                "constant pool overflow while adding {:?} at {}",
                overflow.constant, overflow.offset
            ),
            Error::UnknownOpcode { opcode, offset } => {
                write!(f, "unknown opcode {:#04x} at offset {}", opcode, offset)
            }
            Error::InvalidCodeOffset {
                offset,
                referenced_from,
            } => write!(
                f,
                "{} refers to offset {} which is not an instruction boundary",
                referenced_from, offset
            ),
            Error::BadStackMapFrameTag(tag) => write!(f, "bad stack map frame type {}", tag),
            Error::BadVerificationTypeTag(tag) => write!(f, "bad verification type tag {}", tag),
            Error::MethodCodeOverflow(len) => {
                write!(f, "method code is {} bytes long (max is 65535)", len)
            }
            Error::BranchOutOfRange { from, to } => write!(
                f,
                "conditional branch from {} to {} does not fit in 16 bits",
                from, to
            ),
            Error::UnknownLabel(label) => write!(f, "label {:?} is never placed", label),
            Error::MissingFrame(label) => write!(f, "no stack map frame known at {:?}", label),
            Error::VerifierError { instruction, kind } => {
                write!(f, "cannot apply {} to frame: {:?}", instruction, kind)
            }
            Error::InconsistentStackDepth {
                label,
                expected,
                found,
            } => write!(
                f,
                "stack depth at {:?} is both {} and {}",
                label, expected, found
            ),
            Error::StackUnderflow { instruction, depth } => {
                write!(f, "{} underflows a stack of depth {}", instruction, depth)
            }
            Error::FallsOffEnd => write!(f, "execution falls off the end of the code"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}
