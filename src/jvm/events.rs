//! Annotations of a method, as a flat stream of events
//!
//! Annotations are spread over four different attributes (visible or not, on the method or on its
//! parameters). Consumers that only care about which annotation types are present where can
//! instead walk through [`MethodEvent`]s, which always come in the same order:
//!
//!   1. method annotations from `RuntimeVisibleAnnotations`
//!   2. method annotations from `RuntimeInvisibleAnnotations`
//!   3. parameter annotations from `RuntimeVisibleParameterAnnotations`
//!   4. parameter annotations from `RuntimeInvisibleParameterAnnotations`
//!
//! ### Missing parameters
//!
//! Some compilers leave out implicit leading parameters (the outer instance of an inner class
//! constructor, the name and ordinal of an enum constructor) from the parameter annotation
//! tables, so a table can be shorter than the method descriptor. Positions in the events always
//! refer to the descriptor: the entries of a short table are shifted to the trailing parameters,
//! and each of the leading parameters gets one [`SYNTHETIC_PARAMETER`] annotation instead.

use crate::jvm::class_file::{
    Annotation, ConstantsPool, Method, RuntimeInvisibleAnnotations,
    RuntimeInvisibleParameterAnnotations, RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations,
};
use crate::jvm::Error;

/// Annotation type reported for parameters missing from a parameter annotation table
pub const SYNTHETIC_PARAMETER: &str = "Ljava/lang/Synthetic;";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodEvent {
    /// Annotation on the method itself
    Annotation {
        /// Field descriptor of the annotation type
        descriptor: String,
        visible: bool,
    },

    /// Annotation on a parameter
    ParameterAnnotation {
        /// Position of the parameter in the method descriptor
        parameter: usize,

        /// Field descriptor of the annotation type
        descriptor: String,
        visible: bool,
    },
}

/// Collect the annotation events of a method
///
/// `parameter_count` is the number of parameters in the method descriptor (not counting `this`).
pub fn method_events(
    method: &Method,
    constants: &ConstantsPool,
    parameter_count: usize,
) -> Result<Vec<MethodEvent>, Error> {
    let mut events = vec![];

    let method_annotations = [
        (
            method
                .attribute::<RuntimeVisibleAnnotations>(constants)?
                .map(|annotations| annotations.0),
            true,
        ),
        (
            method
                .attribute::<RuntimeInvisibleAnnotations>(constants)?
                .map(|annotations| annotations.0),
            false,
        ),
    ];
    for (annotations, visible) in method_annotations {
        for annotation in annotations.unwrap_or_default() {
            events.push(MethodEvent::Annotation {
                descriptor: constants.get_utf8_str(annotation.type_index)?,
                visible,
            });
        }
    }

    let parameter_annotations = [
        (
            method
                .attribute::<RuntimeVisibleParameterAnnotations>(constants)?
                .map(|annotations| annotations.0),
            true,
        ),
        (
            method
                .attribute::<RuntimeInvisibleParameterAnnotations>(constants)?
                .map(|annotations| annotations.0),
            false,
        ),
    ];
    for (table, visible) in parameter_annotations {
        if let Some(table) = table {
            parameter_events(&mut events, constants, &table, parameter_count, visible)?;
        }
    }

    Ok(events)
}

fn parameter_events(
    events: &mut Vec<MethodEvent>,
    constants: &ConstantsPool,
    table: &[Vec<Annotation>],
    parameter_count: usize,
    visible: bool,
) -> Result<(), Error> {
    let missing = parameter_count.saturating_sub(table.len());
    for parameter in 0..missing {
        events.push(MethodEvent::ParameterAnnotation {
            parameter,
            descriptor: SYNTHETIC_PARAMETER.to_owned(),
            visible: false,
        });
    }

    for (idx, annotations) in table.iter().enumerate() {
        for annotation in annotations {
            events.push(MethodEvent::ParameterAnnotation {
                parameter: missing + idx,
                descriptor: constants.get_utf8_str(annotation.type_index)?,
                visible,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Attribute;
    use crate::jvm::MethodAccessFlags;

    fn annotation(constants: &mut ConstantsPool, descriptor: &str) -> Annotation {
        Annotation {
            type_index: constants.get_utf8(descriptor).unwrap(),
            element_value_pairs: vec![],
        }
    }

    fn method(constants: &mut ConstantsPool, attributes: Vec<Attribute>) -> Method {
        Method {
            access_flags: MethodAccessFlags::PUBLIC,
            name_index: constants.get_utf8("m").unwrap(),
            descriptor_index: constants.get_utf8("(Ljava/lang/String;I)V").unwrap(),
            attributes,
        }
    }

    #[test]
    fn events_come_in_a_fixed_order() {
        let mut constants = ConstantsPool::new();
        let not_null = annotation(&mut constants, "Lorg/jetbrains/annotations/NotNull;");
        let deprecated = annotation(&mut constants, "Ljava/lang/Deprecated;");

        let parameters = RuntimeInvisibleParameterAnnotations(vec![vec![not_null.clone()], vec![]]);
        let invisible = RuntimeInvisibleAnnotations(vec![not_null]);
        let visible = RuntimeVisibleAnnotations(vec![deprecated]);
        let attributes = vec![
            constants.get_attribute(&parameters).unwrap(),
            constants.get_attribute(&invisible).unwrap(),
            constants.get_attribute(&visible).unwrap(),
        ];
        let method = method(&mut constants, attributes);

        assert_eq!(
            method_events(&method, &constants, 2).unwrap(),
            vec![
                MethodEvent::Annotation {
                    descriptor: "Ljava/lang/Deprecated;".to_owned(),
                    visible: true,
                },
                MethodEvent::Annotation {
                    descriptor: "Lorg/jetbrains/annotations/NotNull;".to_owned(),
                    visible: false,
                },
                MethodEvent::ParameterAnnotation {
                    parameter: 0,
                    descriptor: "Lorg/jetbrains/annotations/NotNull;".to_owned(),
                    visible: false,
                },
            ]
        );
    }

    #[test]
    fn short_tables_mark_leading_parameters_synthetic() {
        let mut constants = ConstantsPool::new();
        let not_null = annotation(&mut constants, "Lorg/jetbrains/annotations/NotNull;");

        // Inner class constructor `Inner(Outer this$0, @NotNull String s)`
        let parameters = RuntimeVisibleParameterAnnotations(vec![vec![not_null]]);
        let attributes = vec![constants.get_attribute(&parameters).unwrap()];
        let method = method(&mut constants, attributes);

        assert_eq!(
            method_events(&method, &constants, 2).unwrap(),
            vec![
                MethodEvent::ParameterAnnotation {
                    parameter: 0,
                    descriptor: SYNTHETIC_PARAMETER.to_owned(),
                    visible: false,
                },
                MethodEvent::ParameterAnnotation {
                    parameter: 1,
                    descriptor: "Lorg/jetbrains/annotations/NotNull;".to_owned(),
                    visible: true,
                },
            ]
        );
    }

    #[test]
    fn methods_without_annotations() {
        let mut constants = ConstantsPool::new();
        let method = method(&mut constants, vec![]);
        assert!(method_events(&method, &constants, 2).unwrap().is_empty());
    }
}
