use super::*;
use crate::jvm::class_file::{
    ClassConstantIndex, Constant, ConstantIndex, ConstantsPool, SerializableVerificationType,
    StackMapFrame,
};
use crate::jvm::code::{BranchInstruction, Instruction, InvokeType, Label};
use crate::jvm::descriptors::parse_descriptor;
use crate::jvm::{Error, FieldType, MethodDescriptor, RefType, VerifierErrorKind};
use crate::util::{Offset, OffsetVec, Width};
use std::collections::HashMap;

/// Snapshot of the stack and local variables at a point in the bytecode
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

impl<Cls, U> Default for Frame<Cls, U> {
    fn default() -> Self {
        Frame {
            locals: OffsetVec::new(),
            stack: OffsetVec::new(),
        }
    }
}

/// Stack map frame stored while a method body is being rewritten
pub type VerifierFrame = Frame<RefType<String>, Label>;

/// Stack map frame ready to be written out
pub type SerializableFrame = Frame<ClassConstantIndex, u16>;

type VType = VerificationType<RefType<String>, Label>;

/// Everything outside of the frame itself that simulating an instruction depends on
pub struct FrameContext<'a> {
    pub constants: &'a ConstantsPool,

    /// Class declaring the method (`UninitializedThis` becomes this after `super(..)`/`this(..)`)
    pub this_class: &'a str,

    /// Class created by each `new` instruction, keyed by the label just before it
    pub allocations: &'a HashMap<Label, RefType<String>>,
}

impl VerifierFrame {
    /// Implicit frame at the very start of a method
    ///
    /// This is the frame that the first explicit entry of a `StackMapTable` is relative to.
    pub fn entry(
        class_name: &str,
        method_name: &str,
        descriptor: &MethodDescriptor<String>,
        is_static: bool,
    ) -> VerifierFrame {
        let mut locals = OffsetVec::new();
        if !is_static {
            if method_name == "<init>" && class_name != "java/lang/Object" {
                locals.push(VType::UninitializedThis);
            } else {
                locals.push(VType::Object(RefType::Object(class_name.to_owned())));
            }
        }
        for parameter in &descriptor.parameters {
            locals.push(VType::from(parameter.clone()));
        }
        Frame {
            locals,
            stack: OffsetVec::new(),
        }
    }

    /// Apply one entry of a `StackMapTable` to the previous frame
    pub fn following(
        &self,
        frame: &StackMapFrame,
        constants: &ConstantsPool,
        offset_labels: &HashMap<usize, Label>,
    ) -> Result<VerifierFrame, Error> {
        let resolve = |vtype: &SerializableVerificationType| vtype.resolve(constants, offset_labels);

        Ok(match frame {
            StackMapFrame::SameLocalsNoStack { .. } => Frame {
                locals: self.locals.clone(),
                stack: OffsetVec::new(),
            },
            StackMapFrame::SameLocalsOneStack { stack, .. } => Frame {
                locals: self.locals.clone(),
                stack: std::iter::once(resolve(stack)?).collect(),
            },
            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => {
                let chopped_k = *chopped_k as usize;
                if chopped_k > self.locals.len() {
                    return Err(Error::MalformedAttribute("StackMapTable"));
                }
                let mut locals = self.locals.clone();
                locals.truncate(self.locals.len() - chopped_k);
                Frame {
                    locals,
                    stack: OffsetVec::new(),
                }
            }
            StackMapFrame::AppendLocalsNoStack { locals, .. } => {
                let mut extended = self.locals.clone();
                for local in locals {
                    extended.push(resolve(local)?);
                }
                Frame {
                    locals: extended,
                    stack: OffsetVec::new(),
                }
            }
            StackMapFrame::Full { locals, stack, .. } => Frame {
                locals: locals.iter().map(resolve).collect::<Result<_, _>>()?,
                stack: stack.iter().map(resolve).collect::<Result<_, _>>()?,
            },
        })
    }

    /// Resolve the frame into its serializable form
    ///
    /// Trailing `Top` locals carry no information, so they are dropped.
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
        label_offsets: &HashMap<Label, usize>,
    ) -> Result<SerializableFrame, Error> {
        let mut locals: Vec<&VType> = self.locals.iter().map(|(_, _, t)| t).collect();
        while let Some(VerificationType::Top) = locals.last() {
            locals.pop();
        }

        Ok(Frame {
            locals: locals
                .into_iter()
                .map(|t| t.into_serializable(constants, label_offsets))
                .collect::<Result<_, _>>()?,
            stack: self
                .stack
                .iter()
                .map(|(_, _, t)| t.into_serializable(constants, label_offsets))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Update the frame to reflect the effects of the given (non-branching) instruction
    ///
    /// This tracks types only as precisely as is needed to reproduce frames at the points where
    /// new code gets inserted: values are not checked against what instructions expect, but
    /// widths are (`pop2`/`dup2` and friends have forms that depend on them).
    ///
    /// `new_label` is the label placed right before the instruction, if any. A `new` instruction
    /// must have one, since uninitialized types are identified by the position of their `new`.
    pub fn simulate_instruction(
        &mut self,
        insn: &Instruction,
        new_label: Option<Label>,
        context: &FrameContext,
    ) -> Result<(), Error> {
        simulate_instruction(self, insn, new_label, context).map_err(|err| match err {
            StepError::Kind(kind) => Error::VerifierError {
                instruction: format!("{:?}", insn),
                kind,
            },
            StepError::Class(err) => err,
        })
    }

    /// Update the frame to reflect the effects of the given branching instruction
    ///
    /// Subroutines (`jsr`/`ret`) are not supported.
    pub fn simulate_branch<Lbl: std::fmt::Debug>(
        &mut self,
        insn: &BranchInstruction<Lbl>,
    ) -> Result<(), Error> {
        simulate_branch(self, insn).map_err(|kind| Error::VerifierError {
            instruction: format!("{:?}", insn),
            kind,
        })
    }
}

impl SerializableFrame {
    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// This will fall back to the `Full` option using [`Self::full_stack_map_frame`] only if none
    /// of the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame {
        let this_locals: Vec<&SerializableVerificationType> =
            self.locals.iter().map(|(_, _, t)| t).collect();
        let prev_locals: Vec<&SerializableVerificationType> =
            previous_frame.locals.iter().map(|(_, _, t)| t).collect();

        match self.stack.len() {
            0 => {
                if this_locals.len() <= prev_locals.len() {
                    let len_difference = prev_locals.len() - this_locals.len();
                    if len_difference < 4 && prev_locals.starts_with(&this_locals) {
                        if len_difference == 0 {
                            return StackMapFrame::SameLocalsNoStack { offset_delta };
                        } else {
                            return StackMapFrame::ChopLocalsNoStack {
                                offset_delta,
                                chopped_k: len_difference as u8,
                            };
                        }
                    }
                } else if this_locals.len() - prev_locals.len() < 4
                    && this_locals.starts_with(&prev_locals)
                {
                    return StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: this_locals[prev_locals.len()..]
                            .iter()
                            .map(|t| **t)
                            .collect(),
                    };
                }
            }
            1 if this_locals == prev_locals => {
                if let Some((_, _, stack)) = self.stack.iter().next() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: *stack,
                    };
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.iter().map(|(_, _, t)| *t).collect(),
            locals: self.locals.iter().map(|(_, _, t)| *t).collect(),
        }
    }
}

enum StepError {
    Kind(VerifierErrorKind),
    Class(Error),
}

impl From<VerifierErrorKind> for StepError {
    fn from(kind: VerifierErrorKind) -> StepError {
        StepError::Kind(kind)
    }
}

impl From<Error> for StepError {
    fn from(err: Error) -> StepError {
        StepError::Class(err)
    }
}

fn simulate_instruction(
    frame: &mut VerifierFrame,
    insn: &Instruction,
    new_label: Option<Label>,
    context: &FrameContext,
) -> Result<(), StepError> {
    use Instruction::*;
    use VerificationType::*;

    let Frame {
        ref mut stack,
        ref mut locals,
    } = frame;

    match insn {
        Nop | IInc(_, _) => (),
        AConstNull => {
            stack.push(Null);
        }
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | BiPush(_)
        | SiPush(_) => {
            stack.push(Integer);
        }
        LConst0 | LConst1 => {
            stack.push(Long);
        }
        FConst0 | FConst1 | FConst2 => {
            stack.push(Float);
        }
        DConst0 | DConst1 => {
            stack.push(Double);
        }
        Ldc(index) => {
            let loaded = constant_type(context.constants, *index)?;
            if loaded.width() != 1 {
                return Err(VerifierErrorKind::InvalidWidth(loaded.width()).into());
            }
            stack.push(loaded);
        }
        Ldc2(index) => {
            let loaded = constant_type(context.constants, *index)?;
            if loaded.width() != 2 {
                return Err(VerifierErrorKind::InvalidWidth(loaded.width()).into());
            }
            stack.push(loaded);
        }

        ILoad(_) => {
            stack.push(Integer);
        }
        LLoad(_) => {
            stack.push(Long);
        }
        FLoad(_) => {
            stack.push(Float);
        }
        DLoad(_) => {
            stack.push(Double);
        }
        ALoad(idx) => {
            let typ = locals
                .get_offset(Offset(*idx as usize))
                .ok()
                .cloned()
                .ok_or(VerifierErrorKind::InvalidIndex)?;
            stack.push(typ);
        }

        IALoad | BALoad | CALoad | SALoad => {
            pop_n(stack, 2)?;
            stack.push(Integer);
        }
        LALoad => {
            pop_n(stack, 2)?;
            stack.push(Long);
        }
        FALoad => {
            pop_n(stack, 2)?;
            stack.push(Float);
        }
        DALoad => {
            pop_n(stack, 2)?;
            stack.push(Double);
        }
        AALoad => {
            pop(stack)?;
            let element = match pop(stack)? {
                Null => Null,
                Object(array) => match array.component_type() {
                    Some(FieldType::Ref(component)) => Object(component),
                    _ => return Err(VerifierErrorKind::InvalidType.into()),
                },
                _ => return Err(VerifierErrorKind::InvalidType.into()),
            };
            stack.push(element);
        }

        IStore(idx) | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) => {
            let stored = pop(stack)?;
            set_local(locals, *idx as usize, stored);
        }

        IAStore | FAStore | AAStore | BAStore | CAStore | SAStore | LAStore | DAStore => {
            pop_n(stack, 3)?;
        }

        Pop => {
            pop_expecting_width(stack, 1)?;
        }
        Pop2 => {
            if pop(stack)?.width() == 1 {
                pop_expecting_width(stack, 1)?;
            }
        }
        Dup => {
            let arg1 = pop_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg1);
        }
        DupX1 => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg2);
            stack.push(arg1);
        }
        DupX2 => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop(stack)?;
            match arg2.width() {
                // Form 1
                1 => {
                    let arg3 = pop_expecting_width(stack, 1)?;
                    stack.push(arg1.clone());
                    stack.push(arg3);
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                _ => {
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }
            }
        }
        Dup2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                _ => {
                    stack.push(arg1.clone());
                    stack.push(arg1);
                }
            }
        }
        Dup2X1 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    let arg3 = pop_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg3);
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                _ => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }
            }
        }
        Dup2X2 => {
            let arg1 = pop(stack)?;
            match arg1.width() {
                1 => {
                    let arg2 = pop_expecting_width(stack, 1)?;
                    let arg3 = pop(stack)?;
                    match arg3.width() {
                        // Form 1
                        1 => {
                            let arg4 = pop_expecting_width(stack, 1)?;
                            stack.push(arg2.clone());
                            stack.push(arg1.clone());
                            stack.push(arg4);
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        // Form 3
                        _ => {
                            stack.push(arg2.clone());
                            stack.push(arg1.clone());
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }
                    }
                }

                _ => {
                    let arg2 = pop(stack)?;
                    match arg2.width() {
                        // Form 2
                        1 => {
                            let arg3 = pop_expecting_width(stack, 1)?;
                            stack.push(arg1.clone());
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        // Form 4
                        _ => {
                            stack.push(arg1.clone());
                            stack.push(arg2);
                            stack.push(arg1);
                        }
                    }
                }
            }
        }
        Swap => {
            let arg1 = pop_expecting_width(stack, 1)?;
            let arg2 = pop_expecting_width(stack, 1)?;
            stack.push(arg1);
            stack.push(arg2);
        }

        IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor | ISh(_) => {
            pop_n(stack, 2)?;
            stack.push(Integer);
        }
        LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor | LSh(_) => {
            pop_n(stack, 2)?;
            stack.push(Long);
        }
        FAdd | FSub | FMul | FDiv | FRem => {
            pop_n(stack, 2)?;
            stack.push(Float);
        }
        DAdd | DSub | DMul | DDiv | DRem => {
            pop_n(stack, 2)?;
            stack.push(Double);
        }
        INeg | L2I | F2I | D2I | I2B | I2C | I2S => {
            pop(stack)?;
            stack.push(Integer);
        }
        LNeg | I2L | F2L | D2L => {
            pop(stack)?;
            stack.push(Long);
        }
        FNeg | I2F | L2F | D2F => {
            pop(stack)?;
            stack.push(Float);
        }
        DNeg | I2D | L2D | F2D => {
            pop(stack)?;
            stack.push(Double);
        }
        LCmp | FCmp(_) | DCmp(_) => {
            pop_n(stack, 2)?;
            stack.push(Integer);
        }

        GetStatic(field) | GetField(field) => {
            if matches!(insn, GetField(_)) {
                pop(stack)?;
            }
            let member = context.constants.get_member_ref(field.0)?;
            let field_type: FieldType<String> = parse_descriptor(&member.descriptor)?;
            stack.push(VType::from(field_type));
        }
        PutStatic(_) => {
            pop(stack)?;
        }
        PutField(_) => {
            pop_n(stack, 2)?;
        }

        Invoke(invoke_type, method) => {
            let member = context.constants.get_member_ref(method.0)?;
            let descriptor: MethodDescriptor<String> = parse_descriptor(&member.descriptor)?;
            pop_n(stack, descriptor.parameters.len())?;

            if *invoke_type != InvokeType::Static {
                let receiver = pop(stack)?;
                if member.name == "<init>" {
                    let initialized = match &receiver {
                        UninitializedThis => RefType::Object(context.this_class.to_owned()),
                        Uninitialized(label) => context
                            .allocations
                            .get(label)
                            .cloned()
                            .ok_or(VerifierErrorKind::InvalidType)?,
                        _ => return Err(VerifierErrorKind::InvalidType.into()),
                    };
                    replace_all(stack, &receiver, &Object(initialized.clone()));
                    replace_all(locals, &receiver, &Object(initialized));
                }
            }

            if let Some(return_type) = descriptor.return_type {
                stack.push(VType::from(return_type));
            }
        }
        InvokeDynamic(call_site) => {
            let name_and_type = match context.constants.get(call_site.0)? {
                Constant::InvokeDynamic { name_and_type, .. } => *name_and_type,
                _ => {
                    return Err(Error::MistypedConstant {
                        index: call_site.0,
                        expected: "CONSTANT_InvokeDynamic",
                    }
                    .into())
                }
            };
            let (_, descriptor) = context.constants.get_name_and_type_strs(name_and_type)?;
            let descriptor: MethodDescriptor<String> = parse_descriptor(&descriptor)?;
            pop_n(stack, descriptor.parameters.len())?;
            if let Some(return_type) = descriptor.return_type {
                stack.push(VType::from(return_type));
            }
        }

        New(_) => {
            let label = new_label.ok_or(VerifierErrorKind::Unsupported)?;
            stack.push(Uninitialized(label));
        }
        NewArray(base_type) => {
            pop(stack)?;
            stack.push(Object(RefType::array(FieldType::Base(*base_type))));
        }
        ANewArray(class) => {
            pop(stack)?;
            let element = class_type(context.constants, *class)?;
            stack.push(Object(RefType::array(FieldType::Ref(element))));
        }
        MultiANewArray(class, dimensions) => {
            pop_n(stack, *dimensions as usize)?;
            stack.push(Object(class_type(context.constants, *class)?));
        }
        ArrayLength | InstanceOf(_) => {
            pop(stack)?;
            stack.push(Integer);
        }
        CheckCast(class) => {
            pop(stack)?;
            stack.push(Object(class_type(context.constants, *class)?));
        }
        MonitorEnter | MonitorExit => {
            pop(stack)?;
        }
    }

    Ok(())
}

fn simulate_branch<Lbl>(
    frame: &mut VerifierFrame,
    insn: &BranchInstruction<Lbl>,
) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;

    let stack = &mut frame.stack;
    match insn {
        If(_, _) | IfNull(_, _) | TableSwitch { .. } | LookupSwitch { .. } => {
            pop(stack)?;
        }
        IfICmp(_, _) | IfACmp(_, _) => {
            pop_n(stack, 2)?;
        }
        Goto(_) | GotoW(_) | Return => (),
        IReturn | LReturn | FReturn | DReturn | AReturn => {
            pop(stack)?;
        }
        AThrow => {
            let exception = pop(stack)?;
            *stack = OffsetVec::new();
            stack.push(exception);
        }
        Jsr(_) | JsrW(_) | Ret(_) => return Err(VerifierErrorKind::Unsupported),
    }

    Ok(())
}

/// Type of the value pushed by `ldc`/`ldc_w`/`ldc2_w`
fn constant_type(constants: &ConstantsPool, index: ConstantIndex) -> Result<VType, Error> {
    let object = |name: &str| VType::Object(RefType::Object(name.to_owned()));
    Ok(match constants.get(index)? {
        Constant::Integer(_) => VType::Integer,
        Constant::Float(_) => VType::Float,
        Constant::Long(_) => VType::Long,
        Constant::Double(_) => VType::Double,
        Constant::String(_) => object("java/lang/String"),
        Constant::Class(_) => object("java/lang/Class"),
        Constant::MethodHandle { .. } => object("java/lang/invoke/MethodHandle"),
        Constant::MethodType { .. } => object("java/lang/invoke/MethodType"),
        Constant::Dynamic { name_and_type, .. } => {
            let (_, descriptor) = constants.get_name_and_type_strs(*name_and_type)?;
            let field_type: FieldType<String> = parse_descriptor(&descriptor)?;
            VType::from(field_type)
        }
        _ => {
            return Err(Error::VerifierError {
                instruction: format!("ldc #{}", index.0),
                kind: VerifierErrorKind::NotLoadableConstant(index),
            })
        }
    })
}

fn class_type(constants: &ConstantsPool, class: ClassConstantIndex) -> Result<RefType<String>, Error> {
    RefType::from_class_constant_name(&constants.get_class_name(class)?)
}

/// Slot-by-slot view of the locals
enum Slot {
    Start(VType),

    /// Second half of the `long`/`double` in the preceding slot
    Continuation,
}

/// Write a type into a local variable slot
///
/// Overwriting either half of a `long`/`double` invalidates the other half, and writing past the
/// end of the locals pads the gap with `Top`.
fn set_local(locals: &mut OffsetVec<VType>, slot: usize, new_type: VType) {
    let mut slots: Vec<Slot> = vec![];
    for (_, _, typ) in locals.iter() {
        let is_wide = typ.width() == 2;
        slots.push(Slot::Start(typ.clone()));
        if is_wide {
            slots.push(Slot::Continuation);
        }
    }

    let width = new_type.width();
    while slots.len() < slot + width {
        slots.push(Slot::Start(VType::Top));
    }

    // Invalidate wide values that the write cuts through
    if let Slot::Continuation = slots[slot] {
        slots[slot - 1] = Slot::Start(VType::Top);
    }
    let last = slot + width - 1;
    if let Slot::Start(ref typ) = slots[last] {
        if typ.width() == 2 && last + 1 < slots.len() {
            slots[last + 1] = Slot::Start(VType::Top);
        }
    }
    slots[slot] = Slot::Start(new_type);
    if width == 2 {
        slots[slot + 1] = Slot::Continuation;
    }

    *locals = slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Start(typ) => Some(typ),
            Slot::Continuation => None,
        })
        .collect();
}

fn replace_all(offset_vec: &mut OffsetVec<VType>, original: &VType, updated: &VType) {
    let replaced: OffsetVec<VType> = offset_vec
        .iter()
        .map(|(_, _, typ)| {
            if typ == original {
                updated.clone()
            } else {
                typ.clone()
            }
        })
        .collect();
    *offset_vec = replaced;
}

fn pop(stack: &mut OffsetVec<VType>) -> Result<VType, VerifierErrorKind> {
    stack
        .pop()
        .map(|(_, _, typ)| typ)
        .ok_or(VerifierErrorKind::EmptyStack)
}

fn pop_n(stack: &mut OffsetVec<VType>, n: usize) -> Result<(), VerifierErrorKind> {
    for _ in 0..n {
        pop(stack)?;
    }
    Ok(())
}

fn pop_expecting_width(
    stack: &mut OffsetVec<VType>,
    expected_width: usize,
) -> Result<VType, VerifierErrorKind> {
    let typ = pop(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidWidth(found_width))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::LabelGenerator;
    use crate::jvm::descriptors::parse_descriptor;
    use VerificationType::*;

    fn object(name: &str) -> VType {
        Object(RefType::Object(name.to_owned()))
    }

    fn frame<const N: usize, const M: usize>(locals: [VType; N], stack: [VType; M]) -> VerifierFrame {
        Frame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    #[test]
    fn entry_frames() {
        let descriptor: MethodDescriptor<String> =
            parse_descriptor("(JLjava/lang/String;[I)V").unwrap();

        let instance = VerifierFrame::entry("p/C", "m", &descriptor, false);
        assert_eq!(
            instance,
            frame(
                [
                    object("p/C"),
                    Long,
                    object("java/lang/String"),
                    Object(RefType::from_class_constant_name("[I").unwrap()),
                ],
                []
            )
        );
        assert_eq!(instance.locals.offset_len(), Offset(5));

        let constructor = VerifierFrame::entry("p/C", "<init>", &descriptor, false);
        assert_eq!(constructor.locals.get_index(0), Some((Offset(0), &UninitializedThis)));

        let object_constructor = VerifierFrame::entry("java/lang/Object", "<init>", &descriptor, false);
        assert_eq!(
            object_constructor.locals.get_index(0),
            Some((Offset(0), &object("java/lang/Object")))
        );

        let static_method = VerifierFrame::entry("p/C", "m", &descriptor, true);
        assert_eq!(static_method.locals.len(), 3);
    }

    #[test]
    fn stores_invalidate_wide_locals() {
        let mut locals: OffsetVec<VType> = [Integer, Long, Float].into_iter().collect();

        // Overwrite the second half of the `long`
        set_local(&mut locals, 2, object("A"));
        let expected: OffsetVec<VType> = [Integer, Top, object("A"), Float].into_iter().collect();
        assert_eq!(locals, expected);

        // Write a `double` over an `int` and the first half of a `long`
        let mut locals: OffsetVec<VType> = [Integer, Long].into_iter().collect();
        set_local(&mut locals, 0, Double);
        let expected: OffsetVec<VType> = [Double, Top].into_iter().collect();
        assert_eq!(locals, expected);

        // Write past the end
        let mut locals: OffsetVec<VType> = [Integer].into_iter().collect();
        set_local(&mut locals, 3, Long);
        let expected: OffsetVec<VType> = [Integer, Top, Top, Long].into_iter().collect();
        assert_eq!(locals, expected);
        assert_eq!(locals.offset_len(), Offset(5));
    }

    #[test]
    fn stack_shuffling_respects_widths() {
        let constants = ConstantsPool::new();
        let allocations = HashMap::new();
        let context = FrameContext {
            constants: &constants,
            this_class: "p/C",
            allocations: &allocations,
        };

        let mut wide = frame([], [Integer, Long]);
        wide.simulate_instruction(&Instruction::Dup2X1, None, &context)
            .unwrap();
        assert_eq!(wide, frame([], [Long, Integer, Long]));

        let mut narrow = frame([], [Integer, Float, Null]);
        narrow.simulate_instruction(&Instruction::Dup2X1, None, &context)
            .unwrap();
        assert_eq!(narrow, frame([], [Float, Null, Integer, Float, Null]));

        let mut pop2 = frame([], [Integer, Float, Double]);
        pop2.simulate_instruction(&Instruction::Pop2, None, &context).unwrap();
        assert_eq!(pop2, frame([], [Integer, Float]));
        pop2.simulate_instruction(&Instruction::Pop2, None, &context).unwrap();
        assert_eq!(pop2, frame([], []));

        let mut bad_pop = frame([], [Long]);
        assert!(matches!(
            bad_pop.simulate_instruction(&Instruction::Pop, None, &context),
            Err(Error::VerifierError {
                kind: VerifierErrorKind::InvalidWidth(2),
                ..
            })
        ));

        let mut empty = frame([], []);
        assert!(matches!(
            empty.simulate_instruction(&Instruction::Dup, None, &context),
            Err(Error::VerifierError {
                kind: VerifierErrorKind::EmptyStack,
                ..
            })
        ));
    }

    #[test]
    fn constructor_calls_initialize_every_copy() {
        let mut constants = ConstantsPool::new();
        let class = constants.get_class("p/Thing").unwrap();
        let init = constants
            .get_method_ref("p/Thing", "<init>", "(I)V", false)
            .unwrap();
        let super_init = constants
            .get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();

        let mut labels = LabelGenerator::new();
        let new_label = labels.fresh_label();
        let allocations = HashMap::from([(new_label, RefType::Object("p/Thing".to_owned()))]);
        let context = FrameContext {
            constants: &constants,
            this_class: "p/C",
            allocations: &allocations,
        };

        let mut state = frame([UninitializedThis], []);
        for (insn, label) in [
            (Instruction::New(class), Some(new_label)),
            (Instruction::Dup, None),
            (Instruction::IConst1, None),
            (Instruction::Invoke(InvokeType::Special, init), None),
            (Instruction::ALoad(0), None),
            (Instruction::Invoke(InvokeType::Special, super_init), None),
        ] {
            state.simulate_instruction(&insn, label, &context).unwrap();
        }
        assert_eq!(state, frame([object("p/C")], [object("p/Thing")]));
    }

    #[test]
    fn compressed_frames() {
        let int_frame: SerializableFrame = Frame {
            locals: [VerificationType::Integer].into_iter().collect(),
            stack: OffsetVec::new(),
        };
        let wider: SerializableFrame = Frame {
            locals: [VerificationType::Integer, VerificationType::Long]
                .into_iter()
                .collect(),
            stack: OffsetVec::new(),
        };
        let with_stack: SerializableFrame = Frame {
            locals: [VerificationType::Integer].into_iter().collect(),
            stack: [VerificationType::Null].into_iter().collect(),
        };

        assert_eq!(
            int_frame.stack_map_frame(3, &int_frame),
            StackMapFrame::SameLocalsNoStack { offset_delta: 3 }
        );
        assert_eq!(
            wider.stack_map_frame(4, &int_frame),
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 4,
                locals: vec![VerificationType::Long],
            }
        );
        assert_eq!(
            int_frame.stack_map_frame(5, &wider),
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 5,
                chopped_k: 1,
            }
        );
        assert_eq!(
            with_stack.stack_map_frame(6, &int_frame),
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 6,
                stack: VerificationType::Null,
            }
        );
        assert_eq!(
            with_stack.stack_map_frame(7, &wider),
            with_stack.full_stack_map_frame(7)
        );
    }

    #[test]
    fn trailing_top_locals_are_trimmed() {
        let mut constants = ConstantsPool::new();
        let state = frame([Integer, Top, Float, Top, Top], []);
        let serializable = state
            .into_serializable(&mut constants, &HashMap::new())
            .unwrap();
        let expected: OffsetVec<SerializableVerificationType> = [
            VerificationType::Integer,
            VerificationType::Top,
            VerificationType::Float,
        ]
        .into_iter()
        .collect();
        assert_eq!(serializable.locals, expected);
    }
}
