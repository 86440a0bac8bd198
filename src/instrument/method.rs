use super::contracts::GuardSet;
use super::guards::{self, GUARD_LENGTH};
use super::{ClassUnit, Error, Settings};
use crate::jvm::class_file::{Attribute, Code, ConstantsPool, Method};
use crate::jvm::code::jump_encoding::{self, SIGNED_16BIT_JUMP_RANGE};
use crate::jvm::code::{BranchInstruction, CodeAttribute, CodeItem, Instruction, Label, MethodBody};
use crate::jvm::events::method_events;
use crate::jvm::verifier::{stack_depth, FrameContext, VerifierFrame};
use crate::jvm::{self, parse_descriptor, MethodDescriptor, RefType};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Facts about the method being rewritten
struct MethodContext<'a> {
    class_name: &'a str,
    method_name: &'a str,
    descriptor: &'a MethodDescriptor<String>,
    is_static: bool,
    uses_stack_map_frames: bool,
}

/// Insert the guards required by the contracts of one method
///
/// Methods without contracts, or without code (`abstract`/`native`), are left alone.
pub fn instrument_method(
    settings: &Settings,
    unit: &mut ClassUnit,
    constants: &mut ConstantsPool,
    method: &mut Method,
) -> Result<(), Error> {
    let method_name = constants.get_utf8_str(method.name_index)?;
    let descriptor: MethodDescriptor<String> =
        parse_descriptor(&constants.get_utf8_str(method.descriptor_index)?)?;

    let events = method_events(method, constants, descriptor.parameters.len())?;
    let guards = GuardSet::scan(
        &events,
        &descriptor,
        &settings.not_null_descriptor,
        &method_name,
    );
    if guards.is_empty() {
        return Ok(());
    }

    let mut code_index = None;
    for (idx, attribute) in method.attributes.iter().enumerate() {
        if constants.attribute_name(attribute)? == b"Code" {
            code_index = Some(idx);
            break;
        }
    }
    let code_index = match code_index {
        Some(code_index) => code_index,
        None => return Ok(()),
    };

    let context = MethodContext {
        class_name: &unit.class_name,
        method_name: &method_name,
        descriptor: &descriptor,
        is_static: method.is_static(),
        uses_stack_map_frames: unit.uses_stack_map_frames,
    };
    let rewritten = rewrite_code_attribute(
        &context,
        &guards,
        &method.attributes[code_index],
        constants,
    )
    .map_err(|cause| Error::Maximums {
        class_name: unit.class_name.clone(),
        method_name: method_name.clone(),
        cause,
    })?;

    if let Some(code) = rewritten {
        method.attributes[code_index] = code;
        unit.modified = true;
    }
    Ok(())
}

fn rewrite_code_attribute(
    context: &MethodContext,
    guards: &GuardSet,
    attribute: &Attribute,
    constants: &mut ConstantsPool,
) -> Result<Option<Attribute>, jvm::Error> {
    let code: Code = attribute.decode()?;
    match rewrite_code(context, guards, &code, constants)? {
        Some(code) => constants.get_attribute(&code).map(Some),
        None => Ok(None),
    }
}

/// Insert guards into the code of a method
///
/// Returns `None` if every contract is already guarded.
fn rewrite_code(
    context: &MethodContext,
    guards: &GuardSet,
    code: &Code,
    constants: &mut ConstantsPool,
) -> Result<Option<Code>, jvm::Error> {
    let MethodContext {
        class_name,
        method_name,
        descriptor,
        is_static,
        uses_stack_map_frames,
    } = *context;

    let entry_frame = VerifierFrame::entry(class_name, method_name, descriptor, is_static);
    let mut body = MethodBody::decode(code, constants, &entry_frame)?;

    // Find what isn't guarded yet
    let instructions: Vec<(usize, &CodeItem)> = body
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| !matches!(item, CodeItem::Label(_)))
        .collect();
    let instruction_items: Vec<&CodeItem> = instructions.iter().map(|(_, item)| *item).collect();

    let mut parameter_messages: HashMap<u16, String> = HashMap::new();
    for parameter in &guards.parameters {
        let slot = descriptor.parameter_slot(!is_static, *parameter) as u16;
        let message =
            guards::null_argument_message(guards.ordinal(*parameter), class_name, method_name);
        parameter_messages.insert(slot, message);
    }
    let guarded_slots: HashSet<u16> =
        guards::existing_parameter_guards(&instruction_items, constants, &parameter_messages)
            .into_iter()
            .collect();
    let parameters: Vec<(usize, u16)> = guards
        .parameters
        .iter()
        .map(|parameter| {
            let slot = descriptor.parameter_slot(!is_static, *parameter) as u16;
            (*parameter, slot)
        })
        .filter(|(_, slot)| !guarded_slots.contains(slot))
        .collect();

    let result_message = guards::null_result_message(class_name, method_name);
    let mut returns: Vec<usize> = vec![];
    if guards.guard_return {
        for (position, (idx, item)) in instructions.iter().enumerate() {
            if let CodeItem::Branch(BranchInstruction::AReturn) = item {
                let already_guarded = position >= GUARD_LENGTH
                    && guards::is_return_guard(
                        &instruction_items[position - GUARD_LENGTH..position],
                        constants,
                        &result_message,
                    );
                if !already_guarded {
                    returns.push(*idx);
                }
            }
        }
    }

    if parameters.is_empty() && returns.is_empty() {
        log::debug!("{}.{} is already guarded", class_name, method_name);
        return Ok(None);
    }

    let mut return_labels: HashMap<usize, Label> = HashMap::new();
    for idx in &returns {
        return_labels.insert(*idx, body.fresh_label());
    }
    let mut return_frames = HashMap::new();
    if uses_stack_map_frames && !returns.is_empty() {
        let positions: HashSet<usize> = return_labels.keys().copied().collect();
        let before = frames_before(&body, &entry_frame, &positions, class_name, constants)?;
        for (idx, ok) in &return_labels {
            let frame = before.get(idx).ok_or(jvm::Error::MissingFrame(*ok))?;
            return_frames.insert(*ok, frame.clone());
        }
    }

    let resume = body
        .start_label()
        .ok_or(jvm::Error::MalformedAttribute("Code"))?;
    let original_items = std::mem::take(&mut body.items);
    let mut items = Vec::with_capacity(
        original_items.len() + (GUARD_LENGTH + 1) * (parameters.len() + returns.len()) + 1,
    );

    // Preamble, which falls through into the original code
    let mut method_start = None;
    if !parameters.is_empty() {
        let start = body.fresh_label();
        items.push(CodeItem::Label(start));
        for (idx, (parameter, slot)) in parameters.iter().enumerate() {
            let is_last = idx + 1 == parameters.len();
            let ok = if is_last { resume } else { body.fresh_label() };

            log::trace!(
                "guarding parameter {} of {}.{} in slot {}",
                parameter,
                class_name,
                method_name,
                slot
            );
            let message = &parameter_messages[slot];
            items.extend(guards::parameter_guard(constants, *slot, message, ok)?);
            if !is_last {
                items.push(CodeItem::Label(ok));
            }
            if uses_stack_map_frames {
                body.frames
                    .entry(ok)
                    .or_insert_with(|| entry_frame.clone());
            }
        }
        method_start = Some(start);
    }

    for (idx, item) in original_items.into_iter().enumerate() {
        if let Some(ok) = return_labels.get(&idx) {
            log::trace!("guarding return value of {}.{}", class_name, method_name);
            items.extend(guards::return_guard(constants, &result_message, *ok)?);
            items.push(CodeItem::Label(*ok));
            if let Some(frame) = return_frames.get(ok) {
                body.frames.insert(*ok, frame.clone());
            }
        }
        items.push(item);
    }
    body.items = items;

    if let Some(method_start) = method_start {
        let parameter_slots = guards.source_parameter_slots(descriptor, is_static);
        anchor_local_variables(&mut body, &parameter_slots, method_start, resume);
    }

    widen_far_branches(&mut body, &entry_frame, class_name, uses_stack_map_frames, constants)?;

    let handlers: Vec<Label> = body
        .exception_table
        .iter()
        .map(|range| range.handler)
        .collect();
    let max_stack = stack_depth::max_stack(&body.items, &handlers, constants)?;
    let frame_locals = body
        .frames
        .values()
        .map(|frame| frame.locals.offset_len().0)
        .max()
        .unwrap_or(0);
    let max_locals = stack_depth::max_locals(&body.items, descriptor.parameter_length(!is_static))
        .max(frame_locals);
    body.max_stack = body.max_stack.max(saturate(max_stack));
    body.max_locals = body.max_locals.max(saturate(max_locals));

    log::debug!(
        "instrumented {}.{} with {} parameter guard(s) and {} return guard(s)",
        class_name,
        method_name,
        parameters.len(),
        returns.len()
    );
    body.encode(constants, &entry_frame).map(Some)
}

/// Rewrite the conditional branches that the inserted code pushed out of range
///
/// Each rewrite adds a jump target right after the branch. Its frame is the one in effect after
/// the branch pops its operands, unless an original frame already sits at that offset.
fn widen_far_branches(
    body: &mut MethodBody,
    entry_frame: &VerifierFrame,
    class_name: &str,
    uses_stack_map_frames: bool,
    constants: &ConstantsPool,
) -> Result<(), jvm::Error> {
    loop {
        let far = jump_encoding::far_conditional_branches(&body.items, &SIGNED_16BIT_JUMP_RANGE)?;
        if far.is_empty() {
            return Ok(());
        }
        log::debug!(
            "widening {} conditional branch(es) in {}",
            far.len(),
            class_name
        );

        let frames = if uses_stack_map_frames {
            let positions: HashSet<usize> = far.iter().copied().collect();
            frames_before(body, entry_frame, &positions, class_name, constants)?
        } else {
            HashMap::new()
        };

        // Back to front, so the remaining indices stay valid
        for idx in far.into_iter().rev() {
            let original_frame = body.items[idx + 1..]
                .iter()
                .map_while(|item| match item {
                    CodeItem::Label(label) => Some(label),
                    _ => None,
                })
                .find_map(|label| body.frames.get(label))
                .cloned();

            let fallthrough = body.fresh_label();
            let branch = jump_encoding::widen_conditional_branch(&mut body.items, idx, fallthrough)?;
            if !uses_stack_map_frames {
                continue;
            }
            let frame = match original_frame {
                Some(frame) => frame,
                None => {
                    let mut frame = frames
                        .get(&idx)
                        .cloned()
                        .ok_or(jvm::Error::MissingFrame(fallthrough))?;
                    frame.simulate_branch(&branch)?;
                    frame
                }
            };
            body.frames.insert(fallthrough, frame);
        }
    }
}

/// Frame in effect right before each of the given items
///
/// Types are simulated forward from the closest preceding frame, which is either the entry frame
/// or a frame from the `StackMapTable`. Items in unreachable code without a frame are left out.
fn frames_before(
    body: &MethodBody,
    entry_frame: &VerifierFrame,
    positions: &HashSet<usize>,
    class_name: &str,
    constants: &ConstantsPool,
) -> Result<HashMap<usize, VerifierFrame>, jvm::Error> {
    let allocations = allocations(&body.items, constants)?;
    let context = FrameContext {
        constants,
        this_class: class_name,
        allocations: &allocations,
    };

    let mut frames = HashMap::new();
    let mut state = Some(entry_frame.clone());
    let mut previous_label = None;
    for (idx, item) in body.items.iter().enumerate() {
        if let Some(state) = state.as_ref().filter(|_| positions.contains(&idx)) {
            frames.insert(idx, state.clone());
        }
        match item {
            CodeItem::Label(label) => {
                if let Some(frame) = body.frames.get(label) {
                    state = Some(frame.clone());
                }
                previous_label = Some(*label);
                continue;
            }
            CodeItem::Instruction(insn) => {
                if let Some(state) = &mut state {
                    state.simulate_instruction(insn, previous_label, &context)?;
                }
            }
            CodeItem::Branch(branch) => {
                if !branch.falls_through() {
                    state = None;
                } else if let Some(state) = &mut state {
                    state.simulate_branch(branch)?;
                }
            }
        }
        previous_label = None;
    }

    Ok(frames)
}

/// Class allocated by each `new` instruction, keyed by the label right before it
fn allocations(
    items: &[CodeItem],
    constants: &ConstantsPool,
) -> Result<HashMap<Label, RefType<String>>, jvm::Error> {
    let mut allocations = HashMap::new();
    for pair in items.windows(2) {
        if let [CodeItem::Label(label), CodeItem::Instruction(Instruction::New(class))] = pair {
            let class_name = constants.get_class_name(*class)?;
            allocations.insert(*label, RefType::from_class_constant_name(&class_name)?);
        }
    }
    Ok(allocations)
}

/// Move local variable ranges starting at the first original instruction
///
/// Source parameters stay in scope only from the end of the preamble, everything else (`this`,
/// synthetic parameters) from the real start of the method.
fn anchor_local_variables(
    body: &mut MethodBody,
    parameter_slots: &Range<usize>,
    method_start: Label,
    resume: Label,
) {
    for attribute in &mut body.attributes {
        let ranges = match attribute {
            CodeAttribute::LocalVariables(ranges) | CodeAttribute::LocalVariableTypes(ranges) => {
                ranges
            }
            _ => continue,
        };
        for range in ranges {
            if range.start == resume && !parameter_slots.contains(&(range.index as usize)) {
                range.start = method_start;
            }
        }
    }
}

fn saturate(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
