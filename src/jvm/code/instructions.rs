use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, Deserialize, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex, Serialize,
};
use crate::jvm::{BaseType, Error};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::convert::TryFrom;
use std::io::Cursor;
use std::ops::Not;

/// Non-branching JVM bytecode instruction
///
/// The representation is slightly different from the usual presentation:
///
///   - the `wide` prefix doesn't show up at all, but instead gets merged into the instructions it
///     is allowed to modify
///
///   - the short forms (`iload_0`, `ldc` vs. `ldc_w`, ...) are merged into one instruction and the
///     shortest form is picked when encoding
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantIndex), // covers both `ldc` and `ldc_w`
    Ldc2(ConstantIndex),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(FieldRefConstantIndex),
    PutStatic(FieldRefConstantIndex),
    GetField(FieldRefConstantIndex),
    PutField(FieldRefConstantIndex),
    Invoke(InvokeType, MethodRefConstantIndex),
    InvokeDynamic(InvokeDynamicConstantIndex),
    New(ClassConstantIndex),
    NewArray(BaseType),
    ANewArray(ClassConstantIndex),
    ArrayLength,
    CheckCast(ClassConstantIndex),
    InstanceOf(ClassConstantIndex),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(ClassConstantIndex, u8),
}

impl Instruction {
    /// Local variable slots read or written by the instruction
    ///
    /// Returns the first slot and the number of slots.
    pub fn local_slots(&self) -> Option<(u16, usize)> {
        match self {
            Instruction::ILoad(idx)
            | Instruction::FLoad(idx)
            | Instruction::ALoad(idx)
            | Instruction::IStore(idx)
            | Instruction::FStore(idx)
            | Instruction::AStore(idx)
            | Instruction::IInc(idx, _) => Some((*idx, 1)),
            Instruction::LLoad(idx)
            | Instruction::DLoad(idx)
            | Instruction::LStore(idx)
            | Instruction::DStore(idx) => Some((*idx, 2)),
            _ => None,
        }
    }
}

impl Width for Instruction {
    fn width(&self) -> usize {
        match self {
          Instruction::Nop
          | Instruction::AConstNull
          | Instruction::IConstM1
          | Instruction::IConst0
          | Instruction::IConst1
          | Instruction::IConst2
          | Instruction::IConst3
          | Instruction::IConst4
          | Instruction::IConst5
          | Instruction::LConst0
          | Instruction::LConst1
          | Instruction::FConst0
          | Instruction::FConst1
          | Instruction::FConst2
          | Instruction::DConst0
          | Instruction::DConst1
          | Instruction::ILoad(0..=3)
          | Instruction::LLoad(0..=3)
          | Instruction::FLoad(0..=3)
          | Instruction::DLoad(0..=3)
          | Instruction::ALoad(0..=3)
          | Instruction::IALoad
          | Instruction::LALoad
          | Instruction::FALoad
          | Instruction::DALoad
          | Instruction::AALoad
          | Instruction::BALoad
          | Instruction::CALoad
          | Instruction::SALoad
          | Instruction::IStore(0..=3)
          | Instruction::LStore(0..=3)
          | Instruction::FStore(0..=3)
          | Instruction::DStore(0..=3)
          | Instruction::AStore(0..=3)
          | Instruction::IAStore
          | Instruction::LAStore
          | Instruction::FAStore
          | Instruction::DAStore
          | Instruction::AAStore
          | Instruction::BAStore
          | Instruction::CAStore
          | Instruction::SAStore
          | Instruction::Pop
          | Instruction::Pop2
          | Instruction::Dup
          | Instruction::DupX1
          | Instruction::DupX2
          | Instruction::Dup2
          | Instruction::Dup2X1
          | Instruction::Dup2X2
          | Instruction::Swap
          | Instruction::IAdd
          | Instruction::LAdd
          | Instruction::FAdd
          | Instruction::DAdd
          | Instruction::ISub
          | Instruction::LSub
          | Instruction::FSub
          | Instruction::DSub
          | Instruction::IMul
          | Instruction::LMul
          | Instruction::FMul
          | Instruction::DMul
          | Instruction::IDiv
          | Instruction::LDiv
          | Instruction::FDiv
          | Instruction::DDiv
          | Instruction::IRem
          | Instruction::LRem
          | Instruction::FRem
          | Instruction::DRem
          | Instruction::INeg
          | Instruction::LNeg
          | Instruction::FNeg
          | Instruction::DNeg
          | Instruction::ISh(_)
          | Instruction::LSh(_)
          | Instruction::IAnd
          | Instruction::LAnd
          | Instruction::IOr
          | Instruction::LOr
          | Instruction::IXor
          | Instruction::LXor
          | Instruction::I2L
          | Instruction::I2F
          | Instruction::I2D
          | Instruction::L2I
          | Instruction::L2F
          | Instruction::L2D
          | Instruction::F2I
          | Instruction::F2L
          | Instruction::F2D
          | Instruction::D2I
          | Instruction::D2L
          | Instruction::D2F
          | Instruction::I2B
          | Instruction::I2C
          | Instruction::I2S
          | Instruction::LCmp
          | Instruction::FCmp(_)
          | Instruction::DCmp(_)
          | Instruction::ArrayLength
          | Instruction::MonitorEnter
          | Instruction::MonitorExit
          => 1,

          Instruction::BiPush(_)
          | Instruction::ILoad(4..=255)
          | Instruction::LLoad(4..=255)
          | Instruction::FLoad(4..=255)
          | Instruction::DLoad(4..=255)
          | Instruction::ALoad(4..=255)
          | Instruction::IStore(4..=255)
          | Instruction::LStore(4..=255)
          | Instruction::FStore(4..=255)
          | Instruction::DStore(4..=255)
          | Instruction::AStore(4..=255)
          | Instruction::Ldc(ConstantIndex(0..=255))
          | Instruction::NewArray(_)
          => 2,

          Instruction::SiPush(_)
          | Instruction::Ldc(_)
          | Instruction::Ldc2(_) // always wide, unlike `ldc` vs. `ldc_w`
          | Instruction::IInc(0..=255, -128..=127)
          | Instruction::GetStatic(_)
          | Instruction::PutStatic(_)
          | Instruction::GetField(_)
          | Instruction::PutField(_)
          | Instruction::Invoke(InvokeType::Special, _)
          | Instruction::Invoke(InvokeType::Static, _)
          | Instruction::Invoke(InvokeType::Virtual, _)
          | Instruction::New(_)
          | Instruction::ANewArray(_)
          | Instruction::CheckCast(_)
          | Instruction::InstanceOf(_)
          => 3,

          Instruction::ILoad(_)
          | Instruction::LLoad(_)
          | Instruction::FLoad(_)
          | Instruction::DLoad(_)
          | Instruction::ALoad(_)
          | Instruction::IStore(_)
          | Instruction::LStore(_)
          | Instruction::FStore(_)
          | Instruction::DStore(_)
          | Instruction::AStore(_)
          | Instruction::MultiANewArray(_, _)
          => 4,

          Instruction::Invoke(InvokeType::Interface(_), _)
          | Instruction::InvokeDynamic(_)
          => 5,

          Instruction::IInc(_, _)
          => 6,
        }
    }
}

/* The load/store instructions follow the same pattern:
 *
 *   - short form (0-3) have special bytes
 *   - normal form (0-255) use `iload` plus a byte operand
 *   - wide form (255-65535) use `wide iload` plus two byte operands
 */
fn serialize_load_or_store<W: WriteBytesExt>(
    idx: u16,
    short_form_start: Option<u8>,
    normal_form: u8,
    writer: &mut W,
) -> std::io::Result<()> {
    match (u8::try_from(idx), short_form_start) {
        (Ok(n @ 0..=3), Some(short_form_start)) => (short_form_start + n).serialize(writer),
        (Ok(n), _) => {
            normal_form.serialize(writer)?;
            n.serialize(writer)
        }
        (Err(_), _) => {
            0xC4u8.serialize(writer)?;
            normal_form.serialize(writer)?;
            idx.serialize(writer)
        }
    }
}

impl Serialize for Instruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Instruction::Nop => 0x00u8.serialize(writer)?,
            Instruction::AConstNull => 0x01u8.serialize(writer)?,
            Instruction::IConstM1 => 0x02u8.serialize(writer)?,
            Instruction::IConst0 => 0x03u8.serialize(writer)?,
            Instruction::IConst1 => 0x04u8.serialize(writer)?,
            Instruction::IConst2 => 0x05u8.serialize(writer)?,
            Instruction::IConst3 => 0x06u8.serialize(writer)?,
            Instruction::IConst4 => 0x07u8.serialize(writer)?,
            Instruction::IConst5 => 0x08u8.serialize(writer)?,
            Instruction::LConst0 => 0x09u8.serialize(writer)?,
            Instruction::LConst1 => 0x0au8.serialize(writer)?,
            Instruction::FConst0 => 0x0bu8.serialize(writer)?,
            Instruction::FConst1 => 0x0cu8.serialize(writer)?,
            Instruction::FConst2 => 0x0du8.serialize(writer)?,
            Instruction::DConst0 => 0x0eu8.serialize(writer)?,
            Instruction::DConst1 => 0x0fu8.serialize(writer)?,
            Instruction::BiPush(b) => {
                0x10u8.serialize(writer)?;
                b.serialize(writer)?;
            }
            Instruction::SiPush(s) => {
                0x11u8.serialize(writer)?;
                s.serialize(writer)?;
            }
            Instruction::Ldc(ConstantIndex(idx)) => match u8::try_from(*idx) {
                Ok(b) => {
                    0x12u8.serialize(writer)?;
                    b.serialize(writer)?;
                }
                Err(_) => {
                    0x13u8.serialize(writer)?;
                    idx.serialize(writer)?;
                }
            },
            Instruction::Ldc2(ConstantIndex(idx)) => {
                0x14u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::ILoad(idx) => serialize_load_or_store(*idx, Some(0x1A), 0x15, writer)?,
            Instruction::LLoad(idx) => serialize_load_or_store(*idx, Some(0x1E), 0x16, writer)?,
            Instruction::FLoad(idx) => serialize_load_or_store(*idx, Some(0x22), 0x17, writer)?,
            Instruction::DLoad(idx) => serialize_load_or_store(*idx, Some(0x26), 0x18, writer)?,
            Instruction::ALoad(idx) => serialize_load_or_store(*idx, Some(0x2A), 0x19, writer)?,
            Instruction::IALoad => 0x2eu8.serialize(writer)?,
            Instruction::LALoad => 0x2fu8.serialize(writer)?,
            Instruction::FALoad => 0x30u8.serialize(writer)?,
            Instruction::DALoad => 0x31u8.serialize(writer)?,
            Instruction::AALoad => 0x32u8.serialize(writer)?,
            Instruction::BALoad => 0x33u8.serialize(writer)?,
            Instruction::CALoad => 0x34u8.serialize(writer)?,
            Instruction::SALoad => 0x35u8.serialize(writer)?,
            Instruction::IStore(idx) => serialize_load_or_store(*idx, Some(0x3B), 0x36, writer)?,
            Instruction::LStore(idx) => serialize_load_or_store(*idx, Some(0x3F), 0x37, writer)?,
            Instruction::FStore(idx) => serialize_load_or_store(*idx, Some(0x43), 0x38, writer)?,
            Instruction::DStore(idx) => serialize_load_or_store(*idx, Some(0x47), 0x39, writer)?,
            Instruction::AStore(idx) => serialize_load_or_store(*idx, Some(0x4B), 0x3A, writer)?,
            Instruction::IAStore => 0x4fu8.serialize(writer)?,
            Instruction::LAStore => 0x50u8.serialize(writer)?,
            Instruction::FAStore => 0x51u8.serialize(writer)?,
            Instruction::DAStore => 0x52u8.serialize(writer)?,
            Instruction::AAStore => 0x53u8.serialize(writer)?,
            Instruction::BAStore => 0x54u8.serialize(writer)?,
            Instruction::CAStore => 0x55u8.serialize(writer)?,
            Instruction::SAStore => 0x56u8.serialize(writer)?,
            Instruction::Pop => 0x57u8.serialize(writer)?,
            Instruction::Pop2 => 0x58u8.serialize(writer)?,
            Instruction::Dup => 0x59u8.serialize(writer)?,
            Instruction::DupX1 => 0x5au8.serialize(writer)?,
            Instruction::DupX2 => 0x5bu8.serialize(writer)?,
            Instruction::Dup2 => 0x5cu8.serialize(writer)?,
            Instruction::Dup2X1 => 0x5du8.serialize(writer)?,
            Instruction::Dup2X2 => 0x5eu8.serialize(writer)?,
            Instruction::Swap => 0x5fu8.serialize(writer)?,
            Instruction::IAdd => 0x60u8.serialize(writer)?,
            Instruction::LAdd => 0x61u8.serialize(writer)?,
            Instruction::FAdd => 0x62u8.serialize(writer)?,
            Instruction::DAdd => 0x63u8.serialize(writer)?,
            Instruction::ISub => 0x64u8.serialize(writer)?,
            Instruction::LSub => 0x65u8.serialize(writer)?,
            Instruction::FSub => 0x66u8.serialize(writer)?,
            Instruction::DSub => 0x67u8.serialize(writer)?,
            Instruction::IMul => 0x68u8.serialize(writer)?,
            Instruction::LMul => 0x69u8.serialize(writer)?,
            Instruction::FMul => 0x6au8.serialize(writer)?,
            Instruction::DMul => 0x6bu8.serialize(writer)?,
            Instruction::IDiv => 0x6cu8.serialize(writer)?,
            Instruction::LDiv => 0x6du8.serialize(writer)?,
            Instruction::FDiv => 0x6eu8.serialize(writer)?,
            Instruction::DDiv => 0x6fu8.serialize(writer)?,
            Instruction::IRem => 0x70u8.serialize(writer)?,
            Instruction::LRem => 0x71u8.serialize(writer)?,
            Instruction::FRem => 0x72u8.serialize(writer)?,
            Instruction::DRem => 0x73u8.serialize(writer)?,
            Instruction::INeg => 0x74u8.serialize(writer)?,
            Instruction::LNeg => 0x75u8.serialize(writer)?,
            Instruction::FNeg => 0x76u8.serialize(writer)?,
            Instruction::DNeg => 0x77u8.serialize(writer)?,
            Instruction::ISh(ShiftType::Left) => 0x78u8.serialize(writer)?,
            Instruction::LSh(ShiftType::Left) => 0x79u8.serialize(writer)?,
            Instruction::ISh(ShiftType::ArithmeticRight) => 0x7au8.serialize(writer)?,
            Instruction::LSh(ShiftType::ArithmeticRight) => 0x7bu8.serialize(writer)?,
            Instruction::ISh(ShiftType::LogicalRight) => 0x7cu8.serialize(writer)?,
            Instruction::LSh(ShiftType::LogicalRight) => 0x7du8.serialize(writer)?,
            Instruction::IAnd => 0x7eu8.serialize(writer)?,
            Instruction::LAnd => 0x7fu8.serialize(writer)?,
            Instruction::IOr => 0x80u8.serialize(writer)?,
            Instruction::LOr => 0x81u8.serialize(writer)?,
            Instruction::IXor => 0x82u8.serialize(writer)?,
            Instruction::LXor => 0x83u8.serialize(writer)?,
            Instruction::IInc(idx, diff) => match (u8::try_from(*idx), i8::try_from(*diff)) {
                (Ok(b), Ok(d)) => {
                    0x84u8.serialize(writer)?;
                    b.serialize(writer)?;
                    d.serialize(writer)?;
                }
                _ => {
                    0xc4u8.serialize(writer)?;
                    0x84u8.serialize(writer)?;
                    idx.serialize(writer)?;
                    diff.serialize(writer)?;
                }
            },
            Instruction::I2L => 0x85u8.serialize(writer)?,
            Instruction::I2F => 0x86u8.serialize(writer)?,
            Instruction::I2D => 0x87u8.serialize(writer)?,
            Instruction::L2I => 0x88u8.serialize(writer)?,
            Instruction::L2F => 0x89u8.serialize(writer)?,
            Instruction::L2D => 0x8au8.serialize(writer)?,
            Instruction::F2I => 0x8bu8.serialize(writer)?,
            Instruction::F2L => 0x8cu8.serialize(writer)?,
            Instruction::F2D => 0x8du8.serialize(writer)?,
            Instruction::D2I => 0x8eu8.serialize(writer)?,
            Instruction::D2L => 0x8fu8.serialize(writer)?,
            Instruction::D2F => 0x90u8.serialize(writer)?,
            Instruction::I2B => 0x91u8.serialize(writer)?,
            Instruction::I2C => 0x92u8.serialize(writer)?,
            Instruction::I2S => 0x93u8.serialize(writer)?,
            Instruction::LCmp => 0x94u8.serialize(writer)?,
            Instruction::FCmp(CompareMode::L) => 0x95u8.serialize(writer)?,
            Instruction::FCmp(CompareMode::G) => 0x96u8.serialize(writer)?,
            Instruction::DCmp(CompareMode::L) => 0x97u8.serialize(writer)?,
            Instruction::DCmp(CompareMode::G) => 0x98u8.serialize(writer)?,
            Instruction::GetStatic(idx) => {
                0xb2u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::PutStatic(idx) => {
                0xb3u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::GetField(idx) => {
                0xb4u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::PutField(idx) => {
                0xb5u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Virtual, idx) => {
                0xb6u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Special, idx) => {
                0xb7u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Static, idx) => {
                0xb8u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Interface(cnt), idx) => {
                0xb9u8.serialize(writer)?;
                idx.serialize(writer)?;
                cnt.serialize(writer)?;
                0u8.serialize(writer)?;
            }
            Instruction::InvokeDynamic(idx) => {
                0xbau8.serialize(writer)?;
                idx.serialize(writer)?;
                0u16.serialize(writer)?;
            }
            Instruction::New(idx) => {
                0xbbu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::NewArray(basetype) => {
                let atype: u8 = match basetype {
                    BaseType::Boolean => 4,
                    BaseType::Char => 5,
                    BaseType::Float => 6,
                    BaseType::Double => 7,
                    BaseType::Byte => 8,
                    BaseType::Short => 9,
                    BaseType::Int => 10,
                    BaseType::Long => 11,
                };
                0xbcu8.serialize(writer)?;
                atype.serialize(writer)?;
            }
            Instruction::ANewArray(idx) => {
                0xbdu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::ArrayLength => 0xbeu8.serialize(writer)?,
            Instruction::CheckCast(idx) => {
                0xc0u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::InstanceOf(idx) => {
                0xc1u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::MonitorEnter => 0xc2u8.serialize(writer)?,
            Instruction::MonitorExit => 0xc3u8.serialize(writer)?,
            Instruction::MultiANewArray(idx, dimensions) => {
                0xc5u8.serialize(writer)?;
                idx.serialize(writer)?;
                dimensions.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Branching JVM bytecode instruction
///
/// These are the instructions that can transfer control somewhere other than the next
/// instruction. The type parameter abstracts over the representation of jump targets: labels
/// while the method body is being rewritten, and relative offsets right before encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction<Lbl> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl),  // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl),  // covers `ifnull`, `ifnonnull`

    /// Unconditional jump, encoded as `goto_w` if the target ends up too far away
    Goto(Lbl),

    /// Unconditional jump which always uses the wide encoding
    GotoW(Lbl),

    /// Subroutine call, encoded as `jsr_w` if the target ends up too far away
    Jsr(Lbl),
    JsrW(Lbl),

    /// Return from subroutine (covers `ret` and `wide ret`)
    Ret(u16),

    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: Lbl,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Lbl,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Lbl)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl<Lbl> BranchInstruction<Lbl> {
    /// Can execution continue to the next instruction?
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(_, _)
                | BranchInstruction::IfICmp(_, _)
                | BranchInstruction::IfACmp(_, _)
                | BranchInstruction::IfNull(_, _)
                | BranchInstruction::Jsr(_)
                | BranchInstruction::JsrW(_)
        )
    }

    /// Is this a conditional jump with a signed 16-bit offset (and no wide form)?
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(_, _)
                | BranchInstruction::IfICmp(_, _)
                | BranchInstruction::IfACmp(_, _)
                | BranchInstruction::IfNull(_, _)
        )
    }

    /// All jump targets (not including fallthrough)
    pub fn jump_targets(&self) -> Vec<&Lbl> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::GotoW(lbl)
            | BranchInstruction::Jsr(lbl)
            | BranchInstruction::JsrW(lbl) => vec![lbl],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![default];
                ts.extend(targets.iter());
                ts
            }
            BranchInstruction::LookupSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![default];
                ts.extend(targets.iter().map(|(_, target)| target));
                ts
            }
            BranchInstruction::Ret(_)
            | BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => vec![],
        }
    }

    pub fn map_labels<Lbl2, E>(
        &self,
        mut map_label: impl FnMut(&Lbl) -> Result<Lbl2, E>,
    ) -> Result<BranchInstruction<Lbl2>, E> {
        use BranchInstruction::*;

        Ok(match self {
            If(op, lbl) => If(*op, map_label(lbl)?),
            IfICmp(op, lbl) => IfICmp(*op, map_label(lbl)?),
            IfACmp(op, lbl) => IfACmp(*op, map_label(lbl)?),
            IfNull(op, lbl) => IfNull(*op, map_label(lbl)?),
            Goto(lbl) => Goto(map_label(lbl)?),
            GotoW(lbl) => GotoW(map_label(lbl)?),
            Jsr(lbl) => Jsr(map_label(lbl)?),
            JsrW(lbl) => JsrW(map_label(lbl)?),
            Ret(idx) => Ret(*idx),
            TableSwitch {
                default,
                low,
                targets,
            } => TableSwitch {
                default: map_label(default)?,
                low: *low,
                targets: targets.iter().map(&mut map_label).collect::<Result<_, _>>()?,
            },
            LookupSwitch { default, targets } => LookupSwitch {
                default: map_label(default)?,
                targets: targets
                    .iter()
                    .map(|(key, lbl)| Ok((*key, map_label(lbl)?)))
                    .collect::<Result<_, _>>()?,
            },
            IReturn => IReturn,
            LReturn => LReturn,
            FReturn => FReturn,
            DReturn => DReturn,
            AReturn => AReturn,
            Return => Return,
            AThrow => AThrow,
        })
    }

    /// Width of the encoded instruction
    ///
    /// The width of switches depends on the alignment padding, hence the `offset` of the
    /// instruction in the code array. When `widened` is set, `goto` and `jsr` are counted as their
    /// wide forms.
    pub fn width_at(&self, offset: usize, widened: bool) -> usize {
        match self {
            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => 1,

            BranchInstruction::Ret(0..=255) => 2,
            BranchInstruction::Ret(_) => 4,

            BranchInstruction::Goto(_) | BranchInstruction::Jsr(_) if widened => 5,

            BranchInstruction::Goto(_)
            | BranchInstruction::Jsr(_)
            | BranchInstruction::If(_, _)
            | BranchInstruction::IfICmp(_, _)
            | BranchInstruction::IfACmp(_, _)
            | BranchInstruction::IfNull(_, _) => 3,

            BranchInstruction::GotoW(_) | BranchInstruction::JsrW(_) => 5,

            BranchInstruction::TableSwitch { targets, .. } => {
                1 + switch_padding(offset) + 4 * (3 + targets.len())
            }

            BranchInstruction::LookupSwitch { targets, .. } => {
                1 + switch_padding(offset) + 8 * (1 + targets.len())
            }
        }
    }
}

/// `default` of a switch must be at a multiple of four bytes from the start of the method, so
/// there must be a 0-3 inclusive byte padding after the opcode
pub fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

impl BranchInstruction<isize> {
    /// Encode the instruction, given its offset in the code array
    ///
    /// Jump targets are relative to the start of the instruction.
    pub fn serialize_at<W: WriteBytesExt>(
        &self,
        offset: usize,
        widened: bool,
        writer: &mut W,
    ) -> Result<(), Error> {
        let short = |delta: &isize| -> Result<i16, Error> {
            i16::try_from(*delta).map_err(|_| Error::BranchOutOfRange {
                from: offset,
                to: (offset as isize + *delta) as usize,
            })
        };
        let wide = |delta: &isize| -> Result<i32, Error> {
            i32::try_from(*delta).map_err(|_| Error::BranchOutOfRange {
                from: offset,
                to: (offset as isize + *delta) as usize,
            })
        };

        match self {
            BranchInstruction::If(comp, lbl) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x99,
                    OrdComparison::NE => 0x9a,
                    OrdComparison::LT => 0x9b,
                    OrdComparison::GE => 0x9c,
                    OrdComparison::GT => 0x9d,
                    OrdComparison::LE => 0x9e,
                };
                opcode.serialize(writer)?;
                short(lbl)?.serialize(writer)?;
            }
            BranchInstruction::IfICmp(comp, lbl) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x9f,
                    OrdComparison::NE => 0xa0,
                    OrdComparison::LT => 0xa1,
                    OrdComparison::GE => 0xa2,
                    OrdComparison::GT => 0xa3,
                    OrdComparison::LE => 0xa4,
                };
                opcode.serialize(writer)?;
                short(lbl)?.serialize(writer)?;
            }
            BranchInstruction::IfACmp(comp, lbl) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xa5,
                    EqComparison::NE => 0xa6,
                };
                opcode.serialize(writer)?;
                short(lbl)?.serialize(writer)?;
            }
            BranchInstruction::IfNull(comp, lbl) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                opcode.serialize(writer)?;
                short(lbl)?.serialize(writer)?;
            }
            BranchInstruction::Goto(lbl) if !widened => {
                0xa7u8.serialize(writer)?;
                short(lbl)?.serialize(writer)?;
            }
            BranchInstruction::Goto(lbl) | BranchInstruction::GotoW(lbl) => {
                0xc8u8.serialize(writer)?;
                wide(lbl)?.serialize(writer)?;
            }
            BranchInstruction::Jsr(lbl) if !widened => {
                0xa8u8.serialize(writer)?;
                short(lbl)?.serialize(writer)?;
            }
            BranchInstruction::Jsr(lbl) | BranchInstruction::JsrW(lbl) => {
                0xc9u8.serialize(writer)?;
                wide(lbl)?.serialize(writer)?;
            }
            BranchInstruction::Ret(idx) => serialize_load_or_store(*idx, None, 0xa9, writer)?,
            BranchInstruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                0xaau8.serialize(writer)?;
                for _ in 0..switch_padding(offset) {
                    0x00u8.serialize(writer)?;
                }
                wide(default)?.serialize(writer)?;
                low.serialize(writer)?;
                (low + targets.len() as i32 - 1).serialize(writer)?;
                for target in targets {
                    wide(target)?.serialize(writer)?;
                }
            }
            BranchInstruction::LookupSwitch { default, targets } => {
                0xabu8.serialize(writer)?;
                for _ in 0..switch_padding(offset) {
                    0x00u8.serialize(writer)?;
                }
                wide(default)?.serialize(writer)?;
                (targets.len() as i32).serialize(writer)?;
                for (key, target) in targets {
                    key.serialize(writer)?;
                    wide(target)?.serialize(writer)?;
                }
            }
            BranchInstruction::IReturn => 0xacu8.serialize(writer)?,
            BranchInstruction::LReturn => 0xadu8.serialize(writer)?,
            BranchInstruction::FReturn => 0xaeu8.serialize(writer)?,
            BranchInstruction::DReturn => 0xafu8.serialize(writer)?,
            BranchInstruction::AReturn => 0xb0u8.serialize(writer)?,
            BranchInstruction::Return => 0xb1u8.serialize(writer)?,
            BranchInstruction::AThrow => 0xbfu8.serialize(writer)?,
        }
        Ok(())
    }
}

/// Instruction read out of a code array, with jump targets as absolute offsets
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedInstruction {
    Instruction(Instruction),
    Branch(BranchInstruction<usize>),
}

/// Decode all of the instructions in a code array, along with their offsets
pub fn decode_instructions(code: &[u8]) -> Result<Vec<(usize, DecodedInstruction)>, Error> {
    let mut cursor = Cursor::new(code);
    let mut decoded = vec![];
    while (cursor.position() as usize) < code.len() {
        let offset = cursor.position() as usize;
        let instruction = decode_instruction(&mut cursor, offset)?;
        decoded.push((offset, instruction));
    }
    Ok(decoded)
}

fn decode_instruction(
    cursor: &mut Cursor<&[u8]>,
    offset: usize,
) -> Result<DecodedInstruction, Error> {
    use DecodedInstruction::Branch as B;
    use DecodedInstruction::Instruction as I;

    let target = |delta: i64| -> Result<usize, Error> {
        let absolute = offset as i64 + delta;
        usize::try_from(absolute).map_err(|_| Error::InvalidCodeOffset {
            offset: absolute as isize,
            referenced_from: "branch",
        })
    };
    let short_target = |cursor: &mut Cursor<&[u8]>| -> Result<usize, Error> {
        target(i16::deserialize(cursor)? as i64)
    };
    let local = |cursor: &mut Cursor<&[u8]>| -> Result<u16, Error> {
        Ok(u8::deserialize(cursor)? as u16)
    };
    let class =
        |cursor: &mut Cursor<&[u8]>| -> Result<ClassConstantIndex, Error> {
            ClassConstantIndex::deserialize(cursor)
        };
    let field =
        |cursor: &mut Cursor<&[u8]>| -> Result<FieldRefConstantIndex, Error> {
            FieldRefConstantIndex::deserialize(cursor)
        };
    let method =
        |cursor: &mut Cursor<&[u8]>| -> Result<MethodRefConstantIndex, Error> {
            MethodRefConstantIndex::deserialize(cursor)
        };

    let opcode = u8::deserialize(cursor)?;
    let decoded = match opcode {
        0x00 => I(Instruction::Nop),
        0x01 => I(Instruction::AConstNull),
        0x02 => I(Instruction::IConstM1),
        0x03 => I(Instruction::IConst0),
        0x04 => I(Instruction::IConst1),
        0x05 => I(Instruction::IConst2),
        0x06 => I(Instruction::IConst3),
        0x07 => I(Instruction::IConst4),
        0x08 => I(Instruction::IConst5),
        0x09 => I(Instruction::LConst0),
        0x0a => I(Instruction::LConst1),
        0x0b => I(Instruction::FConst0),
        0x0c => I(Instruction::FConst1),
        0x0d => I(Instruction::FConst2),
        0x0e => I(Instruction::DConst0),
        0x0f => I(Instruction::DConst1),
        0x10 => I(Instruction::BiPush(i8::deserialize(cursor)?)),
        0x11 => I(Instruction::SiPush(i16::deserialize(cursor)?)),
        0x12 => I(Instruction::Ldc(ConstantIndex(u8::deserialize(cursor)? as u16))),
        0x13 => I(Instruction::Ldc(ConstantIndex::deserialize(cursor)?)),
        0x14 => I(Instruction::Ldc2(ConstantIndex::deserialize(cursor)?)),
        0x15 => I(Instruction::ILoad(local(cursor)?)),
        0x16 => I(Instruction::LLoad(local(cursor)?)),
        0x17 => I(Instruction::FLoad(local(cursor)?)),
        0x18 => I(Instruction::DLoad(local(cursor)?)),
        0x19 => I(Instruction::ALoad(local(cursor)?)),
        0x1a..=0x1d => I(Instruction::ILoad((opcode - 0x1a) as u16)),
        0x1e..=0x21 => I(Instruction::LLoad((opcode - 0x1e) as u16)),
        0x22..=0x25 => I(Instruction::FLoad((opcode - 0x22) as u16)),
        0x26..=0x29 => I(Instruction::DLoad((opcode - 0x26) as u16)),
        0x2a..=0x2d => I(Instruction::ALoad((opcode - 0x2a) as u16)),
        0x2e => I(Instruction::IALoad),
        0x2f => I(Instruction::LALoad),
        0x30 => I(Instruction::FALoad),
        0x31 => I(Instruction::DALoad),
        0x32 => I(Instruction::AALoad),
        0x33 => I(Instruction::BALoad),
        0x34 => I(Instruction::CALoad),
        0x35 => I(Instruction::SALoad),
        0x36 => I(Instruction::IStore(local(cursor)?)),
        0x37 => I(Instruction::LStore(local(cursor)?)),
        0x38 => I(Instruction::FStore(local(cursor)?)),
        0x39 => I(Instruction::DStore(local(cursor)?)),
        0x3a => I(Instruction::AStore(local(cursor)?)),
        0x3b..=0x3e => I(Instruction::IStore((opcode - 0x3b) as u16)),
        0x3f..=0x42 => I(Instruction::LStore((opcode - 0x3f) as u16)),
        0x43..=0x46 => I(Instruction::FStore((opcode - 0x43) as u16)),
        0x47..=0x4a => I(Instruction::DStore((opcode - 0x47) as u16)),
        0x4b..=0x4e => I(Instruction::AStore((opcode - 0x4b) as u16)),
        0x4f => I(Instruction::IAStore),
        0x50 => I(Instruction::LAStore),
        0x51 => I(Instruction::FAStore),
        0x52 => I(Instruction::DAStore),
        0x53 => I(Instruction::AAStore),
        0x54 => I(Instruction::BAStore),
        0x55 => I(Instruction::CAStore),
        0x56 => I(Instruction::SAStore),
        0x57 => I(Instruction::Pop),
        0x58 => I(Instruction::Pop2),
        0x59 => I(Instruction::Dup),
        0x5a => I(Instruction::DupX1),
        0x5b => I(Instruction::DupX2),
        0x5c => I(Instruction::Dup2),
        0x5d => I(Instruction::Dup2X1),
        0x5e => I(Instruction::Dup2X2),
        0x5f => I(Instruction::Swap),
        0x60 => I(Instruction::IAdd),
        0x61 => I(Instruction::LAdd),
        0x62 => I(Instruction::FAdd),
        0x63 => I(Instruction::DAdd),
        0x64 => I(Instruction::ISub),
        0x65 => I(Instruction::LSub),
        0x66 => I(Instruction::FSub),
        0x67 => I(Instruction::DSub),
        0x68 => I(Instruction::IMul),
        0x69 => I(Instruction::LMul),
        0x6a => I(Instruction::FMul),
        0x6b => I(Instruction::DMul),
        0x6c => I(Instruction::IDiv),
        0x6d => I(Instruction::LDiv),
        0x6e => I(Instruction::FDiv),
        0x6f => I(Instruction::DDiv),
        0x70 => I(Instruction::IRem),
        0x71 => I(Instruction::LRem),
        0x72 => I(Instruction::FRem),
        0x73 => I(Instruction::DRem),
        0x74 => I(Instruction::INeg),
        0x75 => I(Instruction::LNeg),
        0x76 => I(Instruction::FNeg),
        0x77 => I(Instruction::DNeg),
        0x78 => I(Instruction::ISh(ShiftType::Left)),
        0x79 => I(Instruction::LSh(ShiftType::Left)),
        0x7a => I(Instruction::ISh(ShiftType::ArithmeticRight)),
        0x7b => I(Instruction::LSh(ShiftType::ArithmeticRight)),
        0x7c => I(Instruction::ISh(ShiftType::LogicalRight)),
        0x7d => I(Instruction::LSh(ShiftType::LogicalRight)),
        0x7e => I(Instruction::IAnd),
        0x7f => I(Instruction::LAnd),
        0x80 => I(Instruction::IOr),
        0x81 => I(Instruction::LOr),
        0x82 => I(Instruction::IXor),
        0x83 => I(Instruction::LXor),
        0x84 => I(Instruction::IInc(
            local(cursor)?,
            i8::deserialize(cursor)? as i16,
        )),
        0x85 => I(Instruction::I2L),
        0x86 => I(Instruction::I2F),
        0x87 => I(Instruction::I2D),
        0x88 => I(Instruction::L2I),
        0x89 => I(Instruction::L2F),
        0x8a => I(Instruction::L2D),
        0x8b => I(Instruction::F2I),
        0x8c => I(Instruction::F2L),
        0x8d => I(Instruction::F2D),
        0x8e => I(Instruction::D2I),
        0x8f => I(Instruction::D2L),
        0x90 => I(Instruction::D2F),
        0x91 => I(Instruction::I2B),
        0x92 => I(Instruction::I2C),
        0x93 => I(Instruction::I2S),
        0x94 => I(Instruction::LCmp),
        0x95 => I(Instruction::FCmp(CompareMode::L)),
        0x96 => I(Instruction::FCmp(CompareMode::G)),
        0x97 => I(Instruction::DCmp(CompareMode::L)),
        0x98 => I(Instruction::DCmp(CompareMode::G)),
        0x99..=0x9e => B(BranchInstruction::If(
            OrdComparison::from_opcode_offset(opcode - 0x99),
            short_target(cursor)?,
        )),
        0x9f..=0xa4 => B(BranchInstruction::IfICmp(
            OrdComparison::from_opcode_offset(opcode - 0x9f),
            short_target(cursor)?,
        )),
        0xa5 => B(BranchInstruction::IfACmp(EqComparison::EQ, short_target(cursor)?)),
        0xa6 => B(BranchInstruction::IfACmp(EqComparison::NE, short_target(cursor)?)),
        0xa7 => B(BranchInstruction::Goto(short_target(cursor)?)),
        0xa8 => B(BranchInstruction::Jsr(short_target(cursor)?)),
        0xa9 => B(BranchInstruction::Ret(local(cursor)?)),
        0xaa | 0xab => {
            let padding = switch_padding(offset);
            for _ in 0..padding {
                u8::deserialize(cursor)?;
            }
            let default = target(i32::deserialize(cursor)? as i64)?;
            if opcode == 0xaa {
                let low = i32::deserialize(cursor)?;
                let high = i32::deserialize(cursor)?;
                if high < low {
                    return Err(Error::MalformedAttribute("Code"));
                }
                let targets = (low..=high)
                    .map(|_| target(i32::deserialize(cursor)? as i64))
                    .collect::<Result<_, _>>()?;
                B(BranchInstruction::TableSwitch {
                    default,
                    low,
                    targets,
                })
            } else {
                let npairs = i32::deserialize(cursor)?;
                if npairs < 0 {
                    return Err(Error::MalformedAttribute("Code"));
                }
                let targets = (0..npairs)
                    .map(|_| {
                        let key = i32::deserialize(cursor)?;
                        Ok((key, target(i32::deserialize(cursor)? as i64)?))
                    })
                    .collect::<Result<_, Error>>()?;
                B(BranchInstruction::LookupSwitch { default, targets })
            }
        }
        0xac => B(BranchInstruction::IReturn),
        0xad => B(BranchInstruction::LReturn),
        0xae => B(BranchInstruction::FReturn),
        0xaf => B(BranchInstruction::DReturn),
        0xb0 => B(BranchInstruction::AReturn),
        0xb1 => B(BranchInstruction::Return),
        0xb2 => I(Instruction::GetStatic(field(cursor)?)),
        0xb3 => I(Instruction::PutStatic(field(cursor)?)),
        0xb4 => I(Instruction::GetField(field(cursor)?)),
        0xb5 => I(Instruction::PutField(field(cursor)?)),
        0xb6 => I(Instruction::Invoke(InvokeType::Virtual, method(cursor)?)),
        0xb7 => I(Instruction::Invoke(InvokeType::Special, method(cursor)?)),
        0xb8 => I(Instruction::Invoke(InvokeType::Static, method(cursor)?)),
        0xb9 => {
            let method = method(cursor)?;
            let count = u8::deserialize(cursor)?;
            let _zero = u8::deserialize(cursor)?;
            I(Instruction::Invoke(InvokeType::Interface(count), method))
        }
        0xba => {
            let call_site = InvokeDynamicConstantIndex::deserialize(cursor)?;
            let _zero = u16::deserialize(cursor)?;
            I(Instruction::InvokeDynamic(call_site))
        }
        0xbb => I(Instruction::New(class(cursor)?)),
        0xbc => {
            let base_type = match u8::deserialize(cursor)? {
                4 => BaseType::Boolean,
                5 => BaseType::Char,
                6 => BaseType::Float,
                7 => BaseType::Double,
                8 => BaseType::Byte,
                9 => BaseType::Short,
                10 => BaseType::Int,
                11 => BaseType::Long,
                _ => return Err(Error::MalformedAttribute("Code")),
            };
            I(Instruction::NewArray(base_type))
        }
        0xbd => I(Instruction::ANewArray(class(cursor)?)),
        0xbe => I(Instruction::ArrayLength),
        0xbf => B(BranchInstruction::AThrow),
        0xc0 => I(Instruction::CheckCast(class(cursor)?)),
        0xc1 => I(Instruction::InstanceOf(class(cursor)?)),
        0xc2 => I(Instruction::MonitorEnter),
        0xc3 => I(Instruction::MonitorExit),
        0xc4 => {
            let modified = u8::deserialize(cursor)?;
            let idx = u16::deserialize(cursor)?;
            match modified {
                0x15 => I(Instruction::ILoad(idx)),
                0x16 => I(Instruction::LLoad(idx)),
                0x17 => I(Instruction::FLoad(idx)),
                0x18 => I(Instruction::DLoad(idx)),
                0x19 => I(Instruction::ALoad(idx)),
                0x36 => I(Instruction::IStore(idx)),
                0x37 => I(Instruction::LStore(idx)),
                0x38 => I(Instruction::FStore(idx)),
                0x39 => I(Instruction::DStore(idx)),
                0x3a => I(Instruction::AStore(idx)),
                0x84 => I(Instruction::IInc(idx, i16::deserialize(cursor)?)),
                0xa9 => B(BranchInstruction::Ret(idx)),
                _ => {
                    return Err(Error::UnknownOpcode {
                        opcode: modified,
                        offset: offset + 1,
                    })
                }
            }
        }
        0xc5 => {
            let class = class(cursor)?;
            I(Instruction::MultiANewArray(class, u8::deserialize(cursor)?))
        }
        0xc6 => B(BranchInstruction::IfNull(EqComparison::EQ, short_target(cursor)?)),
        0xc7 => B(BranchInstruction::IfNull(EqComparison::NE, short_target(cursor)?)),
        0xc8 => B(BranchInstruction::GotoW(target(i32::deserialize(cursor)? as i64)?)),
        0xc9 => B(BranchInstruction::JsrW(target(i32::deserialize(cursor)? as i64)?)),
        _ => return Err(Error::UnknownOpcode { opcode, offset }),
    };
    Ok(decoded)
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl OrdComparison {
    /// Opcodes for these comparisons are always laid out in the order `eq, ne, lt, ge, gt, le`
    fn from_opcode_offset(offset: u8) -> OrdComparison {
        match offset {
            0 => OrdComparison::EQ,
            1 => OrdComparison::NE,
            2 => OrdComparison::LT,
            3 => OrdComparison::GE,
            4 => OrdComparison::GT,
            _ => OrdComparison::LE,
        }
    }
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Constant::MethodRef`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}
