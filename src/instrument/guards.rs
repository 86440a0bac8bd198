//! Bytecode sequences that enforce the contracts
//!
//! A parameter guard checks one argument at the start of the method:
//!
//! ```text
//!     aload <slot>
//!     ifnonnull ok
//!     new java/lang/IllegalArgumentException
//!     dup
//!     ldc "Argument <k> for @NotNull parameter of <Class>.<method> must not be null"
//!     invokespecial java/lang/IllegalArgumentException.<init>(Ljava/lang/String;)V
//!     athrow
//! ok:
//! ```
//!
//! A return guard goes right before an `areturn` and checks the value about to be returned:
//!
//! ```text
//!     dup
//!     ifnonnull ok
//!     new java/lang/IllegalStateException
//!     dup
//!     ldc "@NotNull method <Class>.<method> must not return null"
//!     invokespecial java/lang/IllegalStateException.<init>(Ljava/lang/String;)V
//!     athrow
//! ok:
//!     areturn
//! ```
//!
//! The same sequences are recognized again in code that has already been instrumented, so that
//! guards never get inserted twice. Recognition requires the exact message that would be
//! generated, so a hand-written check of the same shape doesn't count as a guard.

use crate::jvm::class_file::{Constant, ConstantsPool};
use crate::jvm::code::{BranchInstruction, CodeItem, EqComparison, Instruction, InvokeType, Label};
use crate::jvm::Error;
use std::collections::HashMap;

pub const ILLEGAL_ARGUMENT: &str = "java/lang/IllegalArgumentException";
pub const ILLEGAL_STATE: &str = "java/lang/IllegalStateException";

/// Descriptor of the exception constructors that are called
const MESSAGE_CONSTRUCTOR: &str = "(Ljava/lang/String;)V";

/// Number of non-label items in either guard (not counting the `areturn`)
pub const GUARD_LENGTH: usize = 7;

pub fn null_argument_message(ordinal: i64, class_name: &str, method_name: &str) -> String {
    format!(
        "Argument {} for @NotNull parameter of {}.{} must not be null",
        ordinal, class_name, method_name
    )
}

pub fn null_result_message(class_name: &str, method_name: &str) -> String {
    format!(
        "@NotNull method {}.{} must not return null",
        class_name, method_name
    )
}

/// Check the argument in `slot`, jumping to `ok` if it isn't `null`
pub fn parameter_guard(
    constants: &mut ConstantsPool,
    slot: u16,
    message: &str,
    ok: Label,
) -> Result<Vec<CodeItem>, Error> {
    let mut items = vec![
        CodeItem::Instruction(Instruction::ALoad(slot)),
        CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, ok)),
    ];
    items.extend(throw_new(constants, ILLEGAL_ARGUMENT, message)?);
    Ok(items)
}

/// Check the value on top of the stack, jumping to `ok` if it isn't `null`
pub fn return_guard(
    constants: &mut ConstantsPool,
    message: &str,
    ok: Label,
) -> Result<Vec<CodeItem>, Error> {
    let mut items = vec![
        CodeItem::Instruction(Instruction::Dup),
        CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, ok)),
    ];
    items.extend(throw_new(constants, ILLEGAL_STATE, message)?);
    Ok(items)
}

fn throw_new(
    constants: &mut ConstantsPool,
    exception: &str,
    message: &str,
) -> Result<Vec<CodeItem>, Error> {
    let class = constants.get_class(exception)?;
    let message = constants.get_string(message)?;
    let constructor = constants.get_method_ref(exception, "<init>", MESSAGE_CONSTRUCTOR, false)?;
    Ok(vec![
        CodeItem::Instruction(Instruction::New(class)),
        CodeItem::Instruction(Instruction::Dup),
        CodeItem::Instruction(Instruction::Ldc(message.0)),
        CodeItem::Instruction(Instruction::Invoke(InvokeType::Special, constructor)),
        CodeItem::Branch(BranchInstruction::AThrow),
    ])
}

/// Slots already checked by parameter guards at the start of the code
///
/// `items` should not contain any labels. `messages` maps each slot that has a contract to the
/// message its guard would throw.
pub fn existing_parameter_guards(
    items: &[&CodeItem],
    constants: &ConstantsPool,
    messages: &HashMap<u16, String>,
) -> Vec<u16> {
    let mut slots = vec![];
    let mut rest = items;
    while rest.len() >= GUARD_LENGTH {
        let slot = match &rest[..2] {
            [CodeItem::Instruction(Instruction::ALoad(slot)), CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, _))] => {
                *slot
            }
            _ => break,
        };
        let message = match messages.get(&slot) {
            Some(message) => message,
            None => break,
        };
        if !is_throw_new(&rest[2..GUARD_LENGTH], constants, ILLEGAL_ARGUMENT, message) {
            break;
        }
        slots.push(slot);
        rest = &rest[GUARD_LENGTH..];
    }
    slots
}

/// Is this the sequence that goes before a guarded `areturn`?
///
/// `items` should be the [`GUARD_LENGTH`] items (without labels) preceding the `areturn`.
pub fn is_return_guard(items: &[&CodeItem], constants: &ConstantsPool, message: &str) -> bool {
    match items {
        [CodeItem::Instruction(Instruction::Dup), CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, _)), throw @ ..] => {
            is_throw_new(throw, constants, ILLEGAL_STATE, message)
        }
        _ => false,
    }
}

fn is_throw_new(
    items: &[&CodeItem],
    constants: &ConstantsPool,
    exception: &str,
    message: &str,
) -> bool {
    let (class, loaded, constructor) = match items {
        [CodeItem::Instruction(Instruction::New(class)), CodeItem::Instruction(Instruction::Dup), CodeItem::Instruction(Instruction::Ldc(loaded)), CodeItem::Instruction(Instruction::Invoke(InvokeType::Special, constructor)), CodeItem::Branch(BranchInstruction::AThrow)] => {
            (*class, *loaded, *constructor)
        }
        _ => return false,
    };

    let allocates_exception = constants
        .get_class_name(class)
        .map_or(false, |name| name == exception);
    let calls_constructor = constants
        .get_member_ref(constructor.0)
        .and_then(|member| {
            let owner = constants.get_class_name(member.class)?;
            Ok(owner == exception && member.name == "<init>")
        })
        .unwrap_or(false);
    let loads_message = match constants.get(loaded) {
        Ok(Constant::String(utf8)) => constants
            .get_utf8_str(*utf8)
            .map_or(false, |loaded| loaded == message),
        _ => false,
    };
    allocates_exception && loads_message && calls_constructor
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::LabelGenerator;

    fn without_labels(items: &[CodeItem]) -> Vec<&CodeItem> {
        items
            .iter()
            .filter(|item| !matches!(item, CodeItem::Label(_)))
            .collect()
    }

    #[test]
    fn messages() {
        assert_eq!(
            null_argument_message(1, "p/Strings", "of"),
            "Argument 1 for @NotNull parameter of p/Strings.of must not be null"
        );
        assert_eq!(
            null_result_message("p/C", "f"),
            "@NotNull method p/C.f must not return null"
        );
    }

    #[test]
    fn generated_guards_are_recognized() {
        let mut constants = ConstantsPool::new();
        let mut labels = LabelGenerator::new();
        let first = labels.fresh_label();
        let second = labels.fresh_label();

        let mut items = parameter_guard(&mut constants, 1, "a", first).unwrap();
        items.push(CodeItem::Label(first));
        items.extend(parameter_guard(&mut constants, 3, "b", second).unwrap());
        items.push(CodeItem::Label(second));
        items.push(CodeItem::Instruction(Instruction::ALoad(1)));
        let returned = labels.fresh_label();
        items.extend(return_guard(&mut constants, "c", returned).unwrap());
        items.push(CodeItem::Label(returned));
        items.push(CodeItem::Branch(BranchInstruction::AReturn));

        let messages = HashMap::from([(1, "a".to_owned()), (3, "b".to_owned())]);
        let view = without_labels(&items);
        assert_eq!(
            existing_parameter_guards(&view, &constants, &messages),
            vec![1, 3]
        );
        let areturn = view.len() - 1;
        assert!(is_return_guard(
            &view[areturn - GUARD_LENGTH..areturn],
            &constants,
            "c"
        ));
        assert!(!is_return_guard(&view[..GUARD_LENGTH], &constants, "c"));
    }

    #[test]
    fn checks_with_other_messages_are_not_guards() {
        let mut constants = ConstantsPool::new();
        let mut labels = LabelGenerator::new();
        let first = labels.fresh_label();
        let second = labels.fresh_label();

        let mut items = parameter_guard(&mut constants, 1, "a", first).unwrap();
        items.push(CodeItem::Label(first));
        items.extend(parameter_guard(&mut constants, 2, "custom message", second).unwrap());
        items.push(CodeItem::Label(second));
        items.push(CodeItem::Instruction(Instruction::ALoad(2)));
        let returned = labels.fresh_label();
        items.extend(return_guard(&mut constants, "custom message", returned).unwrap());
        items.push(CodeItem::Label(returned));
        items.push(CodeItem::Branch(BranchInstruction::AReturn));

        let view = without_labels(&items);

        // Recognition stops at the first check that isn't ours
        let messages = HashMap::from([(1, "a".to_owned()), (2, "b".to_owned())]);
        assert_eq!(existing_parameter_guards(&view, &constants, &messages), vec![1]);

        // A slot without a contract is never guarded
        let messages = HashMap::from([(2, "custom message".to_owned())]);
        assert!(existing_parameter_guards(&view, &constants, &messages).is_empty());

        let areturn = view.len() - 1;
        let before_return = &view[areturn - GUARD_LENGTH..areturn];
        assert!(!is_return_guard(before_return, &constants, "c"));
        assert!(is_return_guard(before_return, &constants, "custom message"));
    }

    #[test]
    fn similar_code_is_not_a_guard() {
        let mut constants = ConstantsPool::new();
        let mut labels = LabelGenerator::new();
        let ok = labels.fresh_label();

        // Same shape, but throwing a different exception
        let mut items = vec![
            CodeItem::Instruction(Instruction::ALoad(0)),
            CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, ok)),
        ];
        items.extend(throw_new(&mut constants, "java/lang/NullPointerException", "x").unwrap());
        items.push(CodeItem::Label(ok));
        items.push(CodeItem::Branch(BranchInstruction::Return));

        let messages = HashMap::from([(0, "x".to_owned())]);
        assert!(existing_parameter_guards(&without_labels(&items), &constants, &messages).is_empty());
        assert!(existing_parameter_guards(&[], &constants, &messages).is_empty());
    }
}
