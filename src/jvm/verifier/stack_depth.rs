//! Maximum operand stack depth and local variable count of a method body
//!
//! Unlike full frames, depths are cheap to infer: every instruction has a fixed effect on the
//! number of stack slots, so a simple worklist over the control flow graph is enough. The only
//! requirement is that every path reaching a label does so with the same depth.

use crate::jvm::class_file::{Constant, ConstantsPool};
use crate::jvm::code::{BranchInstruction, CodeItem, Instruction, InvokeType, Label};
use crate::jvm::descriptors::parse_descriptor;
use crate::jvm::{Error, FieldType, MethodDescriptor};
use crate::util::Width;
use std::collections::HashMap;

/// Number of stack slots popped and pushed by a straight-line instruction
pub fn stack_effect(insn: &Instruction, constants: &ConstantsPool) -> Result<(usize, usize), Error> {
    use Instruction::*;

    Ok(match insn {
        Nop | IInc(_, _) => (0, 0),
        AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
        | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) | Ldc(_) => (0, 1),
        LConst0 | LConst1 | DConst0 | DConst1 | Ldc2(_) => (0, 2),
        ILoad(_) | FLoad(_) | ALoad(_) => (0, 1),
        LLoad(_) | DLoad(_) => (0, 2),
        IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => (2, 1),
        LALoad | DALoad => (2, 2),
        IStore(_) | FStore(_) | AStore(_) => (1, 0),
        LStore(_) | DStore(_) => (2, 0),
        IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => (3, 0),
        LAStore | DAStore => (4, 0),
        Pop => (1, 0),
        Pop2 => (2, 0),
        Dup => (1, 2),
        DupX1 => (2, 3),
        DupX2 => (3, 4),
        Dup2 => (2, 4),
        Dup2X1 => (3, 5),
        Dup2X2 => (4, 6),
        Swap => (2, 2),
        IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor | ISh(_) | FAdd | FSub | FMul
        | FDiv | FRem | FCmp(_) => (2, 1),
        LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor | DAdd | DSub | DMul | DDiv
        | DRem => (4, 2),
        LSh(_) => (3, 2),
        LCmp | DCmp(_) => (4, 1),
        INeg | FNeg | I2F | F2I | I2B | I2C | I2S => (1, 1),
        LNeg | DNeg | L2D | D2L => (2, 2),
        I2L | I2D | F2L | F2D => (1, 2),
        L2I | L2F | D2I | D2F => (2, 1),
        GetStatic(field) | GetField(field) | PutStatic(field) | PutField(field) => {
            let member = constants.get_member_ref(field.0)?;
            let field_type: FieldType<String> = parse_descriptor(&member.descriptor)?;
            let width = field_type.width();
            match insn {
                GetStatic(_) => (0, width),
                GetField(_) => (1, width),
                PutStatic(_) => (width, 0),
                _ => (1 + width, 0),
            }
        }
        Invoke(invoke_type, method) => {
            let member = constants.get_member_ref(method.0)?;
            let descriptor: MethodDescriptor<String> = parse_descriptor(&member.descriptor)?;
            let has_this = *invoke_type != InvokeType::Static;
            let returned = descriptor.return_type.as_ref().map_or(0, Width::width);
            (descriptor.parameter_length(has_this), returned)
        }
        InvokeDynamic(call_site) => {
            let name_and_type = match constants.get(call_site.0)? {
                Constant::InvokeDynamic { name_and_type, .. } => *name_and_type,
                _ => {
                    return Err(Error::MistypedConstant {
                        index: call_site.0,
                        expected: "CONSTANT_InvokeDynamic",
                    })
                }
            };
            let (_, descriptor) = constants.get_name_and_type_strs(name_and_type)?;
            let descriptor: MethodDescriptor<String> = parse_descriptor(&descriptor)?;
            let returned = descriptor.return_type.as_ref().map_or(0, Width::width);
            (descriptor.parameter_length(false), returned)
        }
        New(_) => (0, 1),
        NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => (1, 1),
        MultiANewArray(_, dimensions) => (*dimensions as usize, 1),
        MonitorEnter | MonitorExit => (1, 0),
    })
}

/// Number of stack slots popped by a branching instruction
fn branch_pops<Lbl>(branch: &BranchInstruction<Lbl>) -> usize {
    use BranchInstruction::*;

    match branch {
        Goto(_) | GotoW(_) | Jsr(_) | JsrW(_) | Ret(_) | Return => 0,
        If(_, _)
        | IfNull(_, _)
        | TableSwitch { .. }
        | LookupSwitch { .. }
        | IReturn
        | FReturn
        | AReturn
        | AThrow => 1,
        IfICmp(_, _) | IfACmp(_, _) | LReturn | DReturn => 2,
    }
}

/// Compute the largest operand stack depth reached anywhere in the items
///
/// Execution starts with an empty stack at the first item and with just the exception at each of
/// the `handlers`.
pub fn max_stack(
    items: &[CodeItem],
    handlers: &[Label],
    constants: &ConstantsPool,
) -> Result<usize, Error> {
    let label_indices: HashMap<Label, usize> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match item {
            CodeItem::Label(label) => Some((*label, idx)),
            _ => None,
        })
        .collect();
    let index_of = |label: &Label| -> Result<usize, Error> {
        label_indices
            .get(label)
            .copied()
            .ok_or(Error::UnknownLabel(*label))
    };

    let mut worklist: Vec<(usize, usize)> = vec![(0, 0)];
    for handler in handlers {
        worklist.push((index_of(handler)?, 1));
    }

    let mut label_depths: HashMap<Label, usize> = HashMap::new();
    let mut max_depth = 0;

    'paths: while let Some((mut idx, mut depth)) = worklist.pop() {
        max_depth = max_depth.max(depth);
        loop {
            let item = items.get(idx).ok_or(Error::FallsOffEnd)?;
            match item {
                CodeItem::Label(label) => {
                    if let Some(expected) = label_depths.get(label) {
                        if *expected != depth {
                            return Err(Error::InconsistentStackDepth {
                                label: *label,
                                expected: *expected,
                                found: depth,
                            });
                        }
                        continue 'paths;
                    }
                    label_depths.insert(*label, depth);
                }
                CodeItem::Instruction(insn) => {
                    let (pops, pushes) = stack_effect(insn, constants)?;
                    if depth < pops {
                        return Err(Error::StackUnderflow {
                            instruction: format!("{:?}", insn),
                            depth,
                        });
                    }
                    depth = depth - pops + pushes;
                    max_depth = max_depth.max(depth);
                }
                CodeItem::Branch(branch) => {
                    let pops = branch_pops(branch);
                    if depth < pops {
                        return Err(Error::StackUnderflow {
                            instruction: format!("{:?}", branch),
                            depth,
                        });
                    }
                    depth -= pops;

                    let is_subroutine_call =
                        matches!(branch, BranchInstruction::Jsr(_) | BranchInstruction::JsrW(_));
                    for target in branch.jump_targets() {
                        if is_subroutine_call {
                            // The return address is pushed onto the stack
                            max_depth = max_depth.max(depth + 1);
                            worklist.push((index_of(target)?, depth + 1));
                        } else {
                            worklist.push((index_of(target)?, depth));
                        }
                    }

                    if !branch.falls_through() {
                        continue 'paths;
                    }
                }
            }
            idx += 1;
        }
    }

    Ok(max_depth)
}

/// Compute the number of local variable slots used by the items
///
/// Parameters (including `this`) always occupy the first `parameter_length` slots.
pub fn max_locals(items: &[CodeItem], parameter_length: usize) -> usize {
    items
        .iter()
        .filter_map(|item| match item {
            CodeItem::Instruction(insn) => insn
                .local_slots()
                .map(|(slot, width)| slot as usize + width),
            CodeItem::Branch(BranchInstruction::Ret(slot)) => Some(*slot as usize + 1),
            _ => None,
        })
        .fold(parameter_length, usize::max)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{EqComparison, LabelGenerator, OrdComparison};

    #[test]
    fn straight_line_depth() {
        let mut constants = ConstantsPool::new();
        let method = constants
            .get_method_ref("p/C", "f", "(JI)D", false)
            .unwrap();
        let items = vec![
            CodeItem::Instruction(Instruction::ALoad(0)),
            CodeItem::Instruction(Instruction::LConst1),
            CodeItem::Instruction(Instruction::IConst0),
            CodeItem::Instruction(Instruction::Invoke(InvokeType::Virtual, method)),
            CodeItem::Branch(BranchInstruction::DReturn),
        ];
        assert_eq!(max_stack(&items, &[], &constants).unwrap(), 4);
        assert_eq!(max_locals(&items, 1), 1);
    }

    #[test]
    fn branches_and_handlers() {
        let constants = ConstantsPool::new();
        let mut labels = LabelGenerator::new();
        let skip = labels.fresh_label();
        let handler = labels.fresh_label();

        let items = vec![
            CodeItem::Instruction(Instruction::ALoad(3)),
            CodeItem::Instruction(Instruction::Dup),
            CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, skip)),
            CodeItem::Instruction(Instruction::Pop),
            CodeItem::Instruction(Instruction::AConstNull),
            CodeItem::Label(skip),
            CodeItem::Branch(BranchInstruction::AReturn),
            CodeItem::Label(handler),
            CodeItem::Instruction(Instruction::AStore(5)),
            CodeItem::Instruction(Instruction::AConstNull),
            CodeItem::Branch(BranchInstruction::AThrow),
        ];
        assert_eq!(max_stack(&items, &[handler], &constants).unwrap(), 2);
        assert_eq!(max_locals(&items, 2), 6);
    }

    #[test]
    fn inconsistent_depths() {
        let constants = ConstantsPool::new();
        let mut labels = LabelGenerator::new();
        let join = labels.fresh_label();

        let items = vec![
            CodeItem::Instruction(Instruction::IConst0),
            CodeItem::Branch(BranchInstruction::If(OrdComparison::EQ, join)),
            CodeItem::Instruction(Instruction::IConst1),
            CodeItem::Label(join),
            CodeItem::Branch(BranchInstruction::Return),
        ];
        assert!(matches!(
            max_stack(&items, &[], &constants),
            Err(Error::InconsistentStackDepth { .. })
        ));
    }

    #[test]
    fn malformed_paths() {
        let constants = ConstantsPool::new();

        let underflow = vec![
            CodeItem::Instruction(Instruction::Pop),
            CodeItem::Branch(BranchInstruction::Return),
        ];
        assert!(matches!(
            max_stack(&underflow, &[], &constants),
            Err(Error::StackUnderflow { depth: 0, .. })
        ));

        let falls_off = vec![CodeItem::Instruction(Instruction::Nop)];
        assert!(matches!(
            max_stack(&falls_off, &[], &constants),
            Err(Error::FallsOffEnd)
        ));
    }
}
