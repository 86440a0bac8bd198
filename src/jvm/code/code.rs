use super::jump_encoding::{layout, SIGNED_16BIT_JUMP_RANGE};
use super::*;
use crate::jvm::class_file::{
    Attribute, BytecodeArray, BytecodeIndex, ClassConstantIndex, Code, ConstantsPool,
    ExceptionHandler, LineNumber, LineNumberTable, LocalVariable, LocalVariableTable,
    LocalVariableTypeTable, Serialize, StackMapTable, Utf8ConstantIndex,
};
use crate::jvm::verifier::VerifierFrame;
use crate::jvm::Error;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Element of a method body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodeItem {
    /// Zero-width position marker
    Label(Label),
    Instruction(Instruction),
    Branch(BranchInstruction<Label>),
}

/// Entry of the exception table, with labels instead of offsets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionRange {
    /// Start of the protected range (inclusive)
    pub start: Label,

    /// End of the protected range (exclusive)
    pub end: Label,

    pub handler: Label,
    pub catch_type: Option<ClassConstantIndex>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start: Label,
    pub line_number: u16,
}

/// Entry of a `LocalVariableTable` or `LocalVariableTypeTable`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariableRange {
    pub start: Label,
    pub end: Label,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,

    /// Local variable slot
    pub index: u16,
}

/// Attribute nested in a `Code` attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodeAttribute {
    LineNumbers(Vec<LineNumberEntry>),
    LocalVariables(Vec<LocalVariableRange>),
    LocalVariableTypes(Vec<LocalVariableRange>),

    /// Position of the `StackMapTable` (the frames themselves live in [`MethodBody::frames`])
    StackMapTable,

    /// Anything else, carried over verbatim
    Other(Attribute),
}

/// Decoded `Code` attribute in which every offset has been replaced by a label
#[derive(Clone, Debug)]
pub struct MethodBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub items: Vec<CodeItem>,
    pub exception_table: Vec<ExceptionRange>,
    pub attributes: Vec<CodeAttribute>,

    /// Stack map frames, keyed by the label of the code they describe
    pub frames: HashMap<Label, VerifierFrame>,

    /// Source of labels that don't clash with the existing ones
    pub labels: LabelGenerator,
}

/// Attribute of the `Code` attribute that still refers to offsets
enum RawCodeAttribute {
    LineNumbers(LineNumberTable),
    LocalVariables(LocalVariableTable),
    LocalVariableTypes(LocalVariableTypeTable),
    StackMapTable(StackMapTable),
    Other(Attribute),
}

impl MethodBody {
    /// Decode a `Code` attribute
    ///
    /// The `entry_frame` is the implicit frame of the method, which the first frame in the
    /// `StackMapTable` (if there is one) is relative to.
    pub fn decode(
        code: &Code,
        constants: &ConstantsPool,
        entry_frame: &VerifierFrame,
    ) -> Result<MethodBody, Error> {
        let code_length = code.code_array.0.len();
        let instructions = decode_instructions(&code.code_array.0)?;

        let mut raw_attributes = vec![];
        for attribute in &code.attributes {
            let raw = match constants.attribute_name(attribute)? {
                b"LineNumberTable" => RawCodeAttribute::LineNumbers(attribute.decode()?),
                b"LocalVariableTable" => RawCodeAttribute::LocalVariables(attribute.decode()?),
                b"LocalVariableTypeTable" => {
                    RawCodeAttribute::LocalVariableTypes(attribute.decode()?)
                }
                b"StackMapTable" => RawCodeAttribute::StackMapTable(attribute.decode()?),
                name @ (b"RuntimeVisibleTypeAnnotations" | b"RuntimeInvisibleTypeAnnotations") => {
                    log::warn!(
                        "dropping {} from rewritten code",
                        String::from_utf8_lossy(name)
                    );
                    continue;
                }
                _ => RawCodeAttribute::Other(attribute.clone()),
            };
            raw_attributes.push(raw);
        }

        // Every offset that something refers to gets a label
        let boundaries: HashSet<usize> = instructions
            .iter()
            .map(|(offset, _)| *offset)
            .chain(std::iter::once(code_length))
            .collect();
        let mut referenced: BTreeSet<usize> = BTreeSet::new();
        let mut reference = |offset: usize, referenced_from: &'static str| -> Result<(), Error> {
            if boundaries.contains(&offset) {
                referenced.insert(offset);
                Ok(())
            } else {
                Err(Error::InvalidCodeOffset {
                    offset: offset as isize,
                    referenced_from,
                })
            }
        };

        reference(0, "method entry")?;
        for (offset, insn) in &instructions {
            match insn {
                DecodedInstruction::Branch(branch) => {
                    for target in branch.jump_targets() {
                        reference(*target, "branch")?;
                    }
                }
                DecodedInstruction::Instruction(Instruction::New(_)) => {
                    reference(*offset, "new")?;
                }
                DecodedInstruction::Instruction(_) => (),
            }
        }
        for handler in &code.exception_table {
            reference(handler.start_pc.0 as usize, "exception table")?;
            reference(handler.end_pc.0 as usize, "exception table")?;
            reference(handler.handler_pc.0 as usize, "exception table")?;
        }
        let mut frame_offsets = vec![];
        for attribute in &raw_attributes {
            match attribute {
                RawCodeAttribute::LineNumbers(LineNumberTable(entries)) => {
                    for entry in entries {
                        reference(entry.start_pc.0 as usize, "LineNumberTable")?;
                    }
                }
                RawCodeAttribute::LocalVariables(LocalVariableTable(entries))
                | RawCodeAttribute::LocalVariableTypes(LocalVariableTypeTable(entries)) => {
                    for entry in entries {
                        let start = entry.start_pc.0 as usize;
                        reference(start, "LocalVariableTable")?;
                        reference(start + entry.length as usize, "LocalVariableTable")?;
                    }
                }
                RawCodeAttribute::StackMapTable(StackMapTable(frames)) => {
                    let mut previous: Option<usize> = None;
                    for frame in frames {
                        let delta = frame.offset_delta() as usize;
                        let offset = previous.map_or(delta, |previous| previous + delta + 1);
                        reference(offset, "StackMapTable")?;
                        frame_offsets.push(offset);
                        previous = Some(offset);
                    }
                }
                RawCodeAttribute::Other(_) => (),
            }
        }

        let mut labels = LabelGenerator::new();
        let offset_labels: HashMap<usize, Label> = referenced
            .iter()
            .map(|offset| (*offset, labels.fresh_label()))
            .collect();
        let label_at = |offset: usize| -> Result<Label, Error> {
            offset_labels
                .get(&offset)
                .copied()
                .ok_or(Error::InvalidCodeOffset {
                    offset: offset as isize,
                    referenced_from: "label",
                })
        };

        let mut items = Vec::with_capacity(instructions.len() + offset_labels.len());
        for (offset, insn) in instructions {
            if let Some(label) = offset_labels.get(&offset) {
                items.push(CodeItem::Label(*label));
            }
            items.push(match insn {
                DecodedInstruction::Instruction(insn) => CodeItem::Instruction(insn),
                DecodedInstruction::Branch(branch) => {
                    CodeItem::Branch(branch.map_labels(|target| label_at(*target))?)
                }
            });
        }
        if let Some(label) = offset_labels.get(&code_length) {
            items.push(CodeItem::Label(*label));
        }

        let exception_table = code
            .exception_table
            .iter()
            .map(|handler| {
                Ok(ExceptionRange {
                    start: label_at(handler.start_pc.0 as usize)?,
                    end: label_at(handler.end_pc.0 as usize)?,
                    handler: label_at(handler.handler_pc.0 as usize)?,
                    catch_type: handler.catch_type,
                })
            })
            .collect::<Result<_, Error>>()?;

        let local_ranges = |entries: Vec<LocalVariable>| -> Result<Vec<LocalVariableRange>, Error> {
            entries
                .into_iter()
                .map(|entry| {
                    let start = entry.start_pc.0 as usize;
                    Ok(LocalVariableRange {
                        start: label_at(start)?,
                        end: label_at(start + entry.length as usize)?,
                        name_index: entry.name_index,
                        descriptor_index: entry.descriptor_index,
                        index: entry.index,
                    })
                })
                .collect()
        };

        let mut frames = HashMap::new();
        let mut attributes = vec![];
        for attribute in raw_attributes {
            attributes.push(match attribute {
                RawCodeAttribute::LineNumbers(LineNumberTable(entries)) => {
                    CodeAttribute::LineNumbers(
                        entries
                            .into_iter()
                            .map(|entry| {
                                Ok(LineNumberEntry {
                                    start: label_at(entry.start_pc.0 as usize)?,
                                    line_number: entry.line_number,
                                })
                            })
                            .collect::<Result<_, Error>>()?,
                    )
                }
                RawCodeAttribute::LocalVariables(LocalVariableTable(entries)) => {
                    CodeAttribute::LocalVariables(local_ranges(entries)?)
                }
                RawCodeAttribute::LocalVariableTypes(LocalVariableTypeTable(entries)) => {
                    CodeAttribute::LocalVariableTypes(local_ranges(entries)?)
                }
                RawCodeAttribute::StackMapTable(StackMapTable(stack_map_frames)) => {
                    let mut current = entry_frame.clone();
                    for (frame, offset) in stack_map_frames.iter().zip(&frame_offsets) {
                        current = current.following(frame, constants, &offset_labels)?;
                        frames.insert(label_at(*offset)?, current.clone());
                    }
                    CodeAttribute::StackMapTable
                }
                RawCodeAttribute::Other(attribute) => CodeAttribute::Other(attribute),
            });
        }

        Ok(MethodBody {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            items,
            exception_table,
            attributes,
            frames,
            labels,
        })
    }

    /// Label at the very start of the code
    pub fn start_label(&self) -> Option<Label> {
        match self.items.first() {
            Some(CodeItem::Label(label)) => Some(*label),
            _ => None,
        }
    }

    pub fn fresh_label(&mut self) -> Label {
        self.labels.fresh_label()
    }

    /// Encode the method body back into a `Code` attribute
    ///
    /// New constants (attribute names, classes referenced from frames) are added to the pool.
    pub fn encode(
        &self,
        constants: &mut ConstantsPool,
        entry_frame: &VerifierFrame,
    ) -> Result<Code, Error> {
        let layout = layout(&self.items, &SIGNED_16BIT_JUMP_RANGE)?;

        let mut code_array: Vec<u8> = Vec::with_capacity(layout.code_length);
        for (idx, item) in self.items.iter().enumerate() {
            match item {
                CodeItem::Label(_) => (),
                CodeItem::Instruction(insn) => insn.serialize(&mut code_array)?,
                CodeItem::Branch(branch) => {
                    let offset = layout.offsets[idx];
                    let relative = branch.map_labels(|target| {
                        layout
                            .label_offset(target)
                            .map(|target| target as isize - offset as isize)
                    })?;
                    relative.serialize_at(offset, layout.widened.contains(&idx), &mut code_array)?;
                }
            }
        }

        let bytecode_index = |label: &Label| -> Result<BytecodeIndex, Error> {
            Ok(BytecodeIndex(layout.label_offset(label)? as u16))
        };

        let exception_table = self
            .exception_table
            .iter()
            .map(|range| {
                Ok(ExceptionHandler {
                    start_pc: bytecode_index(&range.start)?,
                    end_pc: bytecode_index(&range.end)?,
                    handler_pc: bytecode_index(&range.handler)?,
                    catch_type: range.catch_type,
                })
            })
            .collect::<Result<_, Error>>()?;

        // Frames in offset order (when several labels share an offset, the first one wins)
        let mut ordered_frames: BTreeMap<usize, &VerifierFrame> = BTreeMap::new();
        for item in &self.items {
            if let CodeItem::Label(label) = item {
                if let Some(frame) = self.frames.get(label) {
                    ordered_frames
                        .entry(layout.label_offset(label)?)
                        .or_insert(frame);
                }
            }
        }
        let mut stack_map_frames = vec![];
        let mut previous_frame = entry_frame.into_serializable(constants, &layout.labels)?;
        let mut previous_offset: Option<usize> = None;
        for (offset, frame) in ordered_frames {
            let frame = frame.into_serializable(constants, &layout.labels)?;
            let offset_delta = match previous_offset {
                None => offset,
                Some(previous_offset) => offset - previous_offset - 1,
            };
            stack_map_frames.push(frame.stack_map_frame(offset_delta as u16, &previous_frame));
            previous_frame = frame;
            previous_offset = Some(offset);
        }

        let local_variables = |ranges: &[LocalVariableRange]| -> Result<Vec<LocalVariable>, Error> {
            ranges
                .iter()
                .map(|range| {
                    let start = layout.label_offset(&range.start)?;
                    let end = layout.label_offset(&range.end)?;
                    Ok(LocalVariable {
                        start_pc: BytecodeIndex(start as u16),
                        length: end.saturating_sub(start) as u16,
                        name_index: range.name_index,
                        descriptor_index: range.descriptor_index,
                        index: range.index,
                    })
                })
                .collect()
        };

        let mut attributes = vec![];
        let mut wrote_frames = false;
        for attribute in &self.attributes {
            match attribute {
                CodeAttribute::LineNumbers(entries) => {
                    let entries = entries
                        .iter()
                        .map(|entry| {
                            Ok(LineNumber {
                                start_pc: bytecode_index(&entry.start)?,
                                line_number: entry.line_number,
                            })
                        })
                        .collect::<Result<_, Error>>()?;
                    attributes.push(constants.get_attribute(&LineNumberTable(entries))?);
                }
                CodeAttribute::LocalVariables(ranges) => {
                    let table = LocalVariableTable(local_variables(ranges)?);
                    attributes.push(constants.get_attribute(&table)?);
                }
                CodeAttribute::LocalVariableTypes(ranges) => {
                    let table = LocalVariableTypeTable(local_variables(ranges)?);
                    attributes.push(constants.get_attribute(&table)?);
                }
                CodeAttribute::StackMapTable => {
                    if !stack_map_frames.is_empty() && !wrote_frames {
                        let table = StackMapTable(stack_map_frames.clone());
                        attributes.push(constants.get_attribute(&table)?);
                        wrote_frames = true;
                    }
                }
                CodeAttribute::Other(attribute) => attributes.push(attribute.clone()),
            }
        }
        if !stack_map_frames.is_empty() && !wrote_frames {
            attributes.push(constants.get_attribute(&StackMapTable(stack_map_frames))?);
        }

        Ok(Code {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code_array: BytecodeArray(code_array),
            exception_table,
            attributes,
        })
    }
}
