use crate::jvm::events::{MethodEvent, SYNTHETIC_PARAMETER};
use crate::jvm::MethodDescriptor;
use crate::util::Width;
use std::collections::BTreeSet;
use std::ops::Range;

/// Contracts of one method that need runtime checks
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardSet {
    /// Positions of the `@NotNull` parameters in the descriptor (ascending)
    pub parameters: BTreeSet<usize>,

    /// Number of leading parameters which don't exist in source code
    pub synthetic_count: usize,

    /// Is the return value `@NotNull`?
    pub guard_return: bool,
}

impl GuardSet {
    /// Collect the contracts from the annotation events of a method
    ///
    /// Annotations on primitive parameters or on a primitive/`void` return are ignored, since
    /// those values can't be `null` anyway.
    pub fn scan(
        events: &[MethodEvent],
        descriptor: &MethodDescriptor<String>,
        not_null: &str,
        method_name: &str,
    ) -> GuardSet {
        let mut guards = GuardSet::default();

        for event in events {
            match event {
                MethodEvent::ParameterAnnotation {
                    parameter,
                    descriptor: annotation,
                    ..
                } => {
                    let is_reference = descriptor
                        .parameters
                        .get(*parameter)
                        .map_or(false, |typ| typ.is_reference());
                    if is_reference && annotation == not_null {
                        guards.parameters.insert(*parameter);
                    } else if annotation == SYNTHETIC_PARAMETER {
                        guards.synthetic_count += 1;
                    } else if annotation == not_null {
                        log::warn!(
                            "ignoring {} on parameter {} of {}: it is not a reference",
                            not_null,
                            parameter,
                            method_name
                        );
                    }
                }
                MethodEvent::Annotation {
                    descriptor: annotation,
                    ..
                } => {
                    if annotation != not_null {
                        continue;
                    }
                    if descriptor.returns_reference() {
                        guards.guard_return = true;
                    } else {
                        log::warn!(
                            "ignoring {} on {}: it does not return a reference",
                            not_null,
                            method_name
                        );
                    }
                }
            }
        }

        guards
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && !self.guard_return
    }

    /// Parameter number as it would appear in source code (1-based, without synthetic parameters)
    pub fn ordinal(&self, parameter: usize) -> i64 {
        parameter as i64 - self.synthetic_count as i64 + 1
    }

    /// Local variable slots holding the parameters that exist in source code
    pub fn source_parameter_slots(
        &self,
        descriptor: &MethodDescriptor<String>,
        is_static: bool,
    ) -> Range<usize> {
        let first = if is_static { 0 } else { 1 };
        let synthetic = self.synthetic_count.min(descriptor.parameters.len());
        let synthetic_width: usize = descriptor.parameters[..synthetic]
            .iter()
            .map(Width::width)
            .sum();
        let start = first + synthetic_width;
        let end = descriptor.parameter_length(!is_static);
        start..end
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::parse_descriptor;

    const NOT_NULL: &str = "Lorg/jetbrains/annotations/NotNull;";

    fn parameter(parameter: usize, descriptor: &str) -> MethodEvent {
        MethodEvent::ParameterAnnotation {
            parameter,
            descriptor: descriptor.to_owned(),
            visible: false,
        }
    }

    fn method(descriptor: &str) -> MethodEvent {
        MethodEvent::Annotation {
            descriptor: descriptor.to_owned(),
            visible: false,
        }
    }

    #[test]
    fn primitive_parameters_are_never_guarded() {
        let descriptor = parse_descriptor("(Ljava/lang/String;I[J)V").unwrap();
        let events = vec![
            parameter(2, NOT_NULL),
            parameter(1, NOT_NULL),
            parameter(0, NOT_NULL),
            parameter(0, "Ljava/lang/Deprecated;"),
        ];
        let guards = GuardSet::scan(&events, &descriptor, NOT_NULL, "m");
        assert_eq!(guards.parameters.into_iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!guards.guard_return);
        assert_eq!(guards.synthetic_count, 0);
    }

    #[test]
    fn return_contracts() {
        let reference = parse_descriptor("()[Ljava/lang/Object;").unwrap();
        let guards = GuardSet::scan(&[method(NOT_NULL)], &reference, NOT_NULL, "m");
        assert!(guards.guard_return);
        assert!(!guards.is_empty());

        let primitive = parse_descriptor("()Z").unwrap();
        let guards = GuardSet::scan(&[method(NOT_NULL)], &primitive, NOT_NULL, "m");
        assert!(guards.is_empty());

        let other = GuardSet::scan(&[method("Ljavax/annotation/Nonnull;")], &reference, NOT_NULL, "m");
        assert!(other.is_empty());
    }

    #[test]
    fn duplicate_annotations_are_guarded_once() {
        let descriptor = parse_descriptor("(Ljava/lang/String;)V").unwrap();
        let events = vec![
            MethodEvent::ParameterAnnotation {
                parameter: 0,
                descriptor: NOT_NULL.to_owned(),
                visible: true,
            },
            parameter(0, NOT_NULL),
        ];
        let guards = GuardSet::scan(&events, &descriptor, NOT_NULL, "m");
        assert_eq!(guards.parameters.len(), 1);
    }

    #[test]
    fn synthetic_parameters_shift_ordinals_and_slots() {
        // Enum constructor `E(String name, int ordinal, @NotNull String s)`
        let descriptor = parse_descriptor("(Ljava/lang/String;ILjava/lang/String;)V").unwrap();
        let events = vec![
            parameter(0, SYNTHETIC_PARAMETER),
            parameter(1, SYNTHETIC_PARAMETER),
            parameter(2, NOT_NULL),
        ];
        let guards = GuardSet::scan(&events, &descriptor, NOT_NULL, "<init>");
        assert_eq!(guards.synthetic_count, 2);
        assert_eq!(guards.ordinal(2), 1);
        assert_eq!(guards.source_parameter_slots(&descriptor, false), 3..4);

        let no_synthetic = GuardSet::default();
        assert_eq!(no_synthetic.ordinal(0), 1);
        assert_eq!(no_synthetic.source_parameter_slots(&descriptor, true), 0..3);
    }
}
