//! Assign offsets to labels, widening jumps that don't fit
//!
//! Most jump instructions use a signed 16-bit relative offset. Inserting code into a method can
//! push a jump target out of that range, so offsets are computed as a fix-point: lay out all of
//! the code, find the `goto`/`jsr` instructions whose targets are too far away, switch those to
//! `goto_w`/`jsr_w`, and lay everything out again.
//!
//! ### Termination
//!
//! Widening only ever makes code longer and a widened jump is never narrowed again, so the set of
//! widened jumps grows monotonically and is bounded by the number of jumps.
//!
//! ### Conditional branches
//!
//! `if*` instructions have no wide form. A conditional branch that ends up out of range gets
//! rewritten by [`widen_conditional_branch`] into a negated branch over a `goto_w`:
//!
//! ```text
//!     if* L2          =>      ifnot* L1
//!                             goto_w L2
//! L1: ...                 L1: ...
//! ```
//!
//! `L1` is now a jump target, so the caller must supply a frame for it when the method uses stack
//! map frames. The new branch always jumps exactly 8 bytes, so it never needs widening itself.
//! [`layout`] still reports a conditional branch that is out of range as
//! [`Error::BranchOutOfRange`].

use crate::jvm::code::{BranchInstruction, CodeItem, Label};
use crate::jvm::Error;
use crate::util::Width;
use std::collections::{HashMap, HashSet};
use std::ops::{RangeBounds, RangeInclusive};

/// Range of relative jump offsets supported by `goto` and `if*` branch instructions
pub const SIGNED_16BIT_JUMP_RANGE: RangeInclusive<isize> =
    RangeInclusive::new(i16::MIN as isize, i16::MAX as isize);

/// Largest number of bytes in the code array of a method
pub const MAX_CODE_LENGTH: usize = 65535;

/// Final placement of every item in a method body
#[derive(Debug)]
pub struct Layout {
    /// Offset of each item (by index)
    pub offsets: Vec<usize>,

    /// Offset of each label
    pub labels: HashMap<Label, usize>,

    /// Indices of `goto`/`jsr` items that must use their wide encoding
    pub widened: HashSet<usize>,

    /// Total length of the code array
    pub code_length: usize,
}

impl Layout {
    pub fn label_offset(&self, label: &Label) -> Result<usize, Error> {
        self.labels
            .get(label)
            .copied()
            .ok_or(Error::UnknownLabel(*label))
    }
}

/// Lay out the items and detect which jumps need widening
///
/// The `small_jump_range` parameter should always be `SIGNED_16BIT_JUMP_RANGE` - it is a
/// parameter only for unit testing purposes.
pub fn layout(
    items: &[CodeItem],
    small_jump_range: &impl RangeBounds<isize>,
) -> Result<Layout, Error> {
    let layout = widen_unconditional_jumps(items, small_jump_range)?;

    if let Some((idx, to)) = layout
        .far_conditional_branches(items, small_jump_range)?
        .first()
    {
        return Err(Error::BranchOutOfRange {
            from: layout.offsets[*idx],
            to: *to,
        });
    }

    if layout.code_length > MAX_CODE_LENGTH {
        return Err(Error::MethodCodeOverflow(layout.code_length));
    }
    Ok(layout)
}

/// Indices of the conditional branches whose targets are out of range
///
/// Unconditional jumps are assumed to be widened as needed.
pub fn far_conditional_branches(
    items: &[CodeItem],
    small_jump_range: &impl RangeBounds<isize>,
) -> Result<Vec<usize>, Error> {
    let far = widen_unconditional_jumps(items, small_jump_range)?
        .far_conditional_branches(items, small_jump_range)?;
    Ok(far.into_iter().map(|(idx, _)| idx).collect())
}

/// Rewrite the conditional branch at `idx` so that it reaches its target through a `goto_w`
///
/// `fallthrough` must be a fresh label: it gets placed right after the `goto_w`. Returns the
/// branch that was replaced.
pub fn widen_conditional_branch(
    items: &mut Vec<CodeItem>,
    idx: usize,
    fallthrough: Label,
) -> Result<BranchInstruction<Label>, Error> {
    let branch = match items.get(idx) {
        Some(CodeItem::Branch(branch)) => branch.clone(),
        _ => return Err(Error::MalformedAttribute("Code")),
    };
    let (negated, target) = match &branch {
        BranchInstruction::If(comparison, target) => {
            (BranchInstruction::If(!*comparison, fallthrough), *target)
        }
        BranchInstruction::IfICmp(comparison, target) => {
            (BranchInstruction::IfICmp(!*comparison, fallthrough), *target)
        }
        BranchInstruction::IfACmp(comparison, target) => {
            (BranchInstruction::IfACmp(!*comparison, fallthrough), *target)
        }
        BranchInstruction::IfNull(comparison, target) => {
            (BranchInstruction::IfNull(!*comparison, fallthrough), *target)
        }
        _ => return Err(Error::MalformedAttribute("Code")),
    };

    items[idx] = CodeItem::Branch(negated);
    items.insert(idx + 1, CodeItem::Branch(BranchInstruction::GotoW(target)));
    items.insert(idx + 2, CodeItem::Label(fallthrough));
    Ok(branch)
}

/// Fix-point over the `goto`/`jsr` instructions
fn widen_unconditional_jumps(
    items: &[CodeItem],
    small_jump_range: &impl RangeBounds<isize>,
) -> Result<Layout, Error> {
    let mut widened: HashSet<usize> = HashSet::new();

    loop {
        let mut offsets = Vec::with_capacity(items.len());
        let mut labels = HashMap::new();
        let mut offset = 0;
        for (idx, item) in items.iter().enumerate() {
            offsets.push(offset);
            match item {
                CodeItem::Label(label) => {
                    labels.insert(*label, offset);
                }
                CodeItem::Instruction(insn) => offset += insn.width(),
                CodeItem::Branch(branch) => {
                    offset += branch.width_at(offset, widened.contains(&idx))
                }
            }
        }

        let mut newly_widened = vec![];
        for (idx, item) in items.iter().enumerate() {
            let target = match item {
                CodeItem::Branch(BranchInstruction::Goto(target))
                | CodeItem::Branch(BranchInstruction::Jsr(target))
                    if !widened.contains(&idx) =>
                {
                    target
                }
                _ => continue,
            };
            let target_offset = labels.get(target).ok_or(Error::UnknownLabel(*target))?;
            let distance = *target_offset as isize - offsets[idx] as isize;
            if !small_jump_range.contains(&distance) {
                newly_widened.push(idx);
            }
        }

        if newly_widened.is_empty() {
            return Ok(Layout {
                offsets,
                labels,
                widened,
                code_length: offset,
            });
        }

        log::trace!("widening {} jump(s)", newly_widened.len());
        widened.extend(newly_widened);
    }
}

impl Layout {
    /// Conditional branches out of range, with the offsets of their targets
    fn far_conditional_branches(
        &self,
        items: &[CodeItem],
        small_jump_range: &impl RangeBounds<isize>,
    ) -> Result<Vec<(usize, usize)>, Error> {
        let mut far = vec![];
        for (idx, item) in items.iter().enumerate() {
            let branch = match item {
                CodeItem::Branch(branch) if branch.is_conditional() => branch,
                _ => continue,
            };
            for target in branch.jump_targets() {
                let target_offset = self.label_offset(target)?;
                let distance = target_offset as isize - self.offsets[idx] as isize;
                if !small_jump_range.contains(&distance) {
                    far.push((idx, target_offset));
                }
            }
        }
        Ok(far)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{EqComparison, Instruction, LabelGenerator};

    fn nops(n: usize) -> Vec<CodeItem> {
        (0..n).map(|_| CodeItem::Instruction(Instruction::Nop)).collect()
    }

    #[test]
    fn short_jumps_stay_short() {
        let mut labels = LabelGenerator::new();
        let target = labels.fresh_label();

        let mut items = vec![CodeItem::Branch(BranchInstruction::Goto(target))];
        items.extend(nops(10));
        items.push(CodeItem::Label(target));
        items.push(CodeItem::Branch(BranchInstruction::Return));

        let layout = layout(&items, &SIGNED_16BIT_JUMP_RANGE).unwrap();
        assert!(layout.widened.is_empty());
        assert_eq!(layout.labels[&target], 13);
        assert_eq!(layout.code_length, 14);
    }

    #[test]
    fn widening_cascades() {
        let mut labels = LabelGenerator::new();
        let top = labels.fresh_label();
        let far = labels.fresh_label();

        // With a range of 20 bytes, the forward `goto` is out of range and widening it pushes the
        // backward `goto` out of range too
        let mut items = vec![
            CodeItem::Label(top),
            CodeItem::Branch(BranchInstruction::Goto(far)),
        ];
        items.extend(nops(16));
        items.push(CodeItem::Branch(BranchInstruction::Goto(top)));
        items.push(CodeItem::Label(far));
        items.push(CodeItem::Branch(BranchInstruction::Return));

        let narrow = layout(&items, &RangeInclusive::new(-20, 20)).unwrap();
        assert_eq!(narrow.widened, HashSet::from([1, 18]));
        assert_eq!(narrow.labels[&far], 5 + 16 + 5);
        assert_eq!(narrow.code_length, 27);

        let normal = layout(&items, &SIGNED_16BIT_JUMP_RANGE).unwrap();
        assert!(normal.widened.is_empty());
        assert_eq!(normal.labels[&far], 3 + 16 + 3);
    }

    #[test]
    fn far_conditional_branches_are_rewritten() {
        let mut labels = LabelGenerator::new();
        let target = labels.fresh_label();

        let mut items = vec![
            CodeItem::Instruction(Instruction::AConstNull),
            CodeItem::Branch(BranchInstruction::IfNull(EqComparison::EQ, target)),
        ];
        items.extend(nops(30));
        items.push(CodeItem::Label(target));
        items.push(CodeItem::Branch(BranchInstruction::Return));

        let narrow = RangeInclusive::new(-20, 20);
        assert!(matches!(
            layout(&items, &narrow),
            Err(Error::BranchOutOfRange { from: 1, to: 34 })
        ));
        assert_eq!(far_conditional_branches(&items, &narrow).unwrap(), vec![1]);
        assert!(far_conditional_branches(&items, &SIGNED_16BIT_JUMP_RANGE)
            .unwrap()
            .is_empty());

        let fallthrough = labels.fresh_label();
        let replaced = widen_conditional_branch(&mut items, 1, fallthrough).unwrap();
        assert_eq!(replaced, BranchInstruction::IfNull(EqComparison::EQ, target));
        assert_eq!(
            &items[1..4],
            &[
                CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, fallthrough)),
                CodeItem::Branch(BranchInstruction::GotoW(target)),
                CodeItem::Label(fallthrough),
            ]
        );

        let widened = layout(&items, &narrow).unwrap();
        assert_eq!(widened.labels[&fallthrough], 1 + 3 + 5);
        assert_eq!(widened.labels[&target], 1 + 3 + 5 + 30);
        assert_eq!(widened.code_length, 40);
        assert!(far_conditional_branches(&items, &narrow).unwrap().is_empty());
    }

    #[test]
    fn only_conditional_branches_are_rewritten() {
        let mut labels = LabelGenerator::new();
        let target = labels.fresh_label();
        let fallthrough = labels.fresh_label();

        let mut items = vec![
            CodeItem::Branch(BranchInstruction::Goto(target)),
            CodeItem::Label(target),
            CodeItem::Branch(BranchInstruction::Return),
        ];
        assert!(widen_conditional_branch(&mut items, 0, fallthrough).is_err());
        assert!(widen_conditional_branch(&mut items, 7, fallthrough).is_err());
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn unplaced_label() {
        let mut labels = LabelGenerator::new();
        let missing = labels.fresh_label();
        let items = vec![CodeItem::Branch(BranchInstruction::Goto(missing))];
        assert!(matches!(
            layout(&items, &SIGNED_16BIT_JUMP_RANGE),
            Err(Error::UnknownLabel(_))
        ));
    }

    #[test]
    fn oversized_method() {
        let mut items = nops(MAX_CODE_LENGTH);
        assert!(layout(&items, &SIGNED_16BIT_JUMP_RANGE).is_ok());
        items.push(CodeItem::Branch(BranchInstruction::Return));
        assert!(matches!(
            layout(&items, &SIGNED_16BIT_JUMP_RANGE),
            Err(Error::MethodCodeOverflow(65536))
        ));
    }
}
