mod common;

use common::*;
use notnull_instrumenter::instrument::{self, Error, Settings};
use notnull_instrumenter::jvm::class_file::{
    ClassFile, LocalVariableTable, StackMapFrame, Version,
};
use notnull_instrumenter::jvm::code::{
    BranchInstruction, CodeItem, EqComparison, Instruction, InvokeType, OrdComparison,
};
use notnull_instrumenter::jvm::verifier::VerificationType;
use notnull_instrumenter::jvm::{self, MethodAccessFlags};

const STATIC: MethodAccessFlags = MethodAccessFlags::STATIC;

/// `static String of(@NotNull String a, @NotNull int b) { return a; }`
fn strings_class(version: Version) -> Vec<u8> {
    let mut class = ClassBuilder::new("p/Strings", version);
    class.add_method(
        MethodSpec::new(STATIC, "of", "(Ljava/lang/String;I)Ljava/lang/String;")
            .parameter_annotations(vec![vec![NOT_NULL], vec![NOT_NULL]])
            .code(CodeSpec {
                max_stack: 1,
                max_locals: 2,
                bytecode: vec![0x2a, 0xb0],
                ..CodeSpec::default()
            }),
    );
    class.build()
}

/// `@NotNull static String g(int i) { return i == 0 ? null : null; }` with two `areturn`s
fn returns_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("p/C", Version::JAVA8);
    class.add_method(
        MethodSpec::new(STATIC, "g", "(I)Ljava/lang/String;")
            .annotated(NOT_NULL)
            .code(CodeSpec {
                max_stack: 1,
                max_locals: 1,
                bytecode: vec![0x1a, 0x99, 0x00, 0x05, 0x01, 0xb0, 0x01, 0xb0],
                frames: vec![StackMapFrame::SameLocalsNoStack { offset_delta: 6 }],
                ..CodeSpec::default()
            }),
    );
    class.build()
}

fn instrument(bytes: &[u8]) -> instrument::Instrumented {
    instrument::instrument_class(&Settings::new(), bytes).unwrap()
}

#[test]
fn classes_without_contracts_are_unchanged() {
    let mut class = ClassBuilder::new("p/Plain", Version::JAVA8);
    class.add_method(
        MethodSpec::new(STATIC, "id", "(Ljava/lang/Object;)Ljava/lang/Object;")
            .annotated("Ljavax/annotation/Nonnull;")
            .parameter_annotations(vec![vec!["Ljavax/annotation/Nonnull;"]])
            .code(CodeSpec {
                max_stack: 1,
                max_locals: 1,
                bytecode: vec![0x2a, 0xb0],
                ..CodeSpec::default()
            }),
    );
    let bytes = class.build();

    let result = instrument(&bytes);
    assert_eq!(result.class_name, "p/Plain");
    assert!(!result.modified);
    assert_eq!(result.bytes, bytes);
}

#[test]
fn null_arguments_are_rejected_on_entry() {
    let result = instrument(&strings_class(Version::JAVA8));
    assert!(result.modified);
    assert_eq!(result.class_name, "p/Strings");

    let class = ClassFile::parse(&result.bytes).unwrap();
    let body = body(&class, "of");
    let items = instructions(&body);
    assert_eq!(items.len(), 9, "only the reference parameter is checked");

    assert_eq!(items[0], CodeItem::Instruction(Instruction::ALoad(0)));
    assert!(matches!(
        items[1],
        CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, _))
    ));
    match &items[2..7] {
        [CodeItem::Instruction(Instruction::New(exception)), CodeItem::Instruction(Instruction::Dup), CodeItem::Instruction(Instruction::Ldc(message)), CodeItem::Instruction(Instruction::Invoke(InvokeType::Special, constructor)), CodeItem::Branch(BranchInstruction::AThrow)] =>
        {
            assert_eq!(
                class.constants.get_class_name(*exception).unwrap(),
                instrument::ILLEGAL_ARGUMENT
            );
            assert_eq!(
                string_constant(&class.constants, *message),
                "Argument 1 for @NotNull parameter of p/Strings.of must not be null"
            );
            let constructor = class.constants.get_member_ref(constructor.0).unwrap();
            assert_eq!(constructor.name, "<init>");
            assert_eq!(constructor.descriptor, "(Ljava/lang/String;)V");
        }
        other => panic!("unexpected guard {:?}", other),
    }
    assert_eq!(
        &items[7..],
        &[
            CodeItem::Instruction(Instruction::ALoad(0)),
            CodeItem::Branch(BranchInstruction::AReturn),
        ]
    );

    // The check jumps over the `throw` into the original code
    let target = match &items[1] {
        CodeItem::Branch(BranchInstruction::IfNull(_, target)) => *target,
        _ => unreachable!(),
    };
    let athrow = body
        .items
        .iter()
        .position(|item| *item == CodeItem::Branch(BranchInstruction::AThrow))
        .unwrap();
    assert_eq!(body.items[athrow + 1], CodeItem::Label(target));

    let code = code(&class, "of");
    assert_eq!(code.max_stack, 4);
    assert_eq!(code.max_locals, 2);
    assert_eq!(
        stack_map_frames(&class, "of"),
        Some(vec![StackMapFrame::SameLocalsNoStack { offset_delta: 14 }])
    );
}

#[test]
fn every_areturn_is_checked() {
    let result = instrument(&returns_class());
    assert!(result.modified);

    let class = ClassFile::parse(&result.bytes).unwrap();
    let items = instructions(&body(&class, "g"));
    assert_eq!(items.len(), 20);

    let returns: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| **item == CodeItem::Branch(BranchInstruction::AReturn))
        .map(|(idx, _)| idx)
        .collect();
    assert_eq!(returns, vec![10, 19]);
    for areturn in returns {
        assert_eq!(items[areturn - 8], CodeItem::Instruction(Instruction::AConstNull));
        assert_eq!(items[areturn - 7], CodeItem::Instruction(Instruction::Dup));
        assert!(matches!(
            items[areturn - 6],
            CodeItem::Branch(BranchInstruction::IfNull(EqComparison::NE, _))
        ));
        match (&items[areturn - 5], &items[areturn - 3]) {
            (
                CodeItem::Instruction(Instruction::New(exception)),
                CodeItem::Instruction(Instruction::Ldc(message)),
            ) => {
                assert_eq!(
                    class.constants.get_class_name(*exception).unwrap(),
                    instrument::ILLEGAL_STATE
                );
                assert_eq!(
                    string_constant(&class.constants, *message),
                    "@NotNull method p/C.g must not return null"
                );
            }
            other => panic!("unexpected guard {:?}", other),
        }
    }

    // Each check targets the `areturn` with the value still on the stack
    assert_eq!(
        stack_map_frames(&class, "g"),
        Some(vec![
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 19,
                stack: VerificationType::Null,
            },
            StackMapFrame::SameLocalsNoStack { offset_delta: 0 },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 14,
                stack: VerificationType::Null,
            },
        ])
    );
    assert_eq!(code(&class, "g").max_stack, 4);
}

#[test]
fn instrumenting_twice_changes_nothing() {
    for bytes in [strings_class(Version::JAVA8), returns_class()] {
        let first = instrument(&bytes);
        assert!(first.modified);

        let second = instrument(&first.bytes);
        assert!(!second.modified);
        assert_eq!(second.bytes, first.bytes);
    }
}

/// `@NotNull static String of(@NotNull String a)` which already checks `a` and its result by hand,
/// with the same instruction sequences as a guard but a message of its own
fn hand_checked_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("p/Checked", Version::JAVA8);
    let constants = &mut class.constants;
    let mut throw_new = |exception: &str| -> Vec<u8> {
        let [class_hi, class_lo] = ((constants.get_class(exception).unwrap().0).0).to_be_bytes();
        let message = (constants.get_string("custom message").unwrap().0).0;
        let constructor = constants
            .get_method_ref(exception, "<init>", "(Ljava/lang/String;)V", false)
            .unwrap();
        let [init_hi, init_lo] = (constructor.0).0.to_be_bytes();
        vec![
            0xbb, class_hi, class_lo, 0x59, 0x12, message as u8, 0xb7, init_hi, init_lo, 0xbf,
        ]
    };

    // aload_0; ifnonnull +13; <throw>; aload_0; dup; ifnonnull +13; <throw>; areturn
    let mut bytecode = vec![0x2a, 0xc7, 0x00, 0x0d];
    bytecode.extend(throw_new(instrument::ILLEGAL_ARGUMENT));
    bytecode.extend([0x2a, 0x59, 0xc7, 0x00, 0x0d]);
    bytecode.extend(throw_new(instrument::ILLEGAL_STATE));
    bytecode.push(0xb0);

    let string = class.constants.get_class("java/lang/String").unwrap();
    class.add_method(
        MethodSpec::new(STATIC, "of", "(Ljava/lang/String;)Ljava/lang/String;")
            .annotated(NOT_NULL)
            .parameter_annotations(vec![vec![NOT_NULL]])
            .code(CodeSpec {
                max_stack: 4,
                max_locals: 1,
                bytecode,
                frames: vec![
                    StackMapFrame::SameLocalsNoStack { offset_delta: 14 },
                    StackMapFrame::SameLocalsOneStack {
                        offset_delta: 14,
                        stack: VerificationType::Object(string),
                    },
                ],
                ..CodeSpec::default()
            }),
    );
    class.build()
}

#[test]
fn hand_written_checks_still_get_guards() {
    let result = instrument(&hand_checked_class());
    assert!(result.modified);

    let class = ClassFile::parse(&result.bytes).unwrap();
    let items = instructions(&body(&class, "of"));
    assert_eq!(items.len(), 7 + 16 + 7);

    let messages: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            CodeItem::Instruction(Instruction::Ldc(message)) => {
                Some(string_constant(&class.constants, *message))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        messages,
        vec![
            "Argument 1 for @NotNull parameter of p/Checked.of must not be null",
            "custom message",
            "custom message",
            "@NotNull method p/Checked.of must not return null",
        ]
    );
    assert_eq!(items[0], CodeItem::Instruction(Instruction::ALoad(0)));
    assert_eq!(items[7], CodeItem::Instruction(Instruction::ALoad(0)));
    assert_eq!(items.last(), Some(&CodeItem::Branch(BranchInstruction::AReturn)));

    // Our own guards are recognized on the next pass
    let second = instrument(&result.bytes);
    assert!(!second.modified);
    assert_eq!(second.bytes, result.bytes);
}

/// `@NotNull static String far(String s, int i)` where `ifeq` jumps as far as it can, over an
/// `areturn` that is about to get a guard
fn far_branch_class(version: Version) -> Vec<u8> {
    let mut bytecode = vec![0x1b, 0x99, 0x7f, 0xff, 0x2a, 0xb0];
    bytecode.resize(32768, 0x00);
    bytecode.extend([0x2a, 0xb0]);

    let frames = if version.uses_stack_map_frames() {
        vec![StackMapFrame::SameLocalsNoStack {
            offset_delta: 32768,
        }]
    } else {
        vec![]
    };

    let mut class = ClassBuilder::new("p/Far", version);
    class.add_method(
        MethodSpec::new(STATIC, "far", "(Ljava/lang/String;I)Ljava/lang/String;")
            .annotated(NOT_NULL)
            .code(CodeSpec {
                max_stack: 1,
                max_locals: 2,
                bytecode,
                frames,
                ..CodeSpec::default()
            }),
    );
    class.build()
}

#[test]
fn branches_pushed_out_of_range_are_widened() {
    for version in [Version::JAVA8, Version::JAVA5] {
        let result = instrument(&far_branch_class(version));
        assert!(result.modified);

        let class = ClassFile::parse(&result.bytes).unwrap();
        let body = body(&class, "far");
        let items = instructions(&body);

        // `ifeq far` became `ifne next; goto_w far; next:`
        assert_eq!(items[0], CodeItem::Instruction(Instruction::ILoad(1)));
        let (next, far) = match (&items[1], &items[2]) {
            (
                CodeItem::Branch(BranchInstruction::If(OrdComparison::NE, next)),
                CodeItem::Branch(BranchInstruction::GotoW(far)),
            ) => (*next, *far),
            other => panic!("unexpected branch {:?}", other),
        };
        assert_eq!(items[3], CodeItem::Instruction(Instruction::ALoad(0)));
        assert_eq!(items[4], CodeItem::Instruction(Instruction::Dup));

        let goto_w = body
            .items
            .iter()
            .position(|item| matches!(item, CodeItem::Branch(BranchInstruction::GotoW(_))))
            .unwrap();
        assert_eq!(body.items[goto_w + 1], CodeItem::Label(next));
        let far_position = body
            .items
            .iter()
            .position(|item| *item == CodeItem::Label(far))
            .unwrap();
        assert_eq!(
            body.items[far_position + 1],
            CodeItem::Instruction(Instruction::ALoad(0))
        );

        let frames = stack_map_frames(&class, "far");
        if version.uses_stack_map_frames() {
            let frames = frames.unwrap();
            assert_eq!(frames.len(), 4);
            assert_eq!(frames[0], StackMapFrame::SameLocalsNoStack { offset_delta: 9 });
            assert!(matches!(
                frames[1],
                StackMapFrame::SameLocalsOneStack {
                    offset_delta: 14,
                    ..
                }
            ));
            assert_eq!(
                frames[2],
                StackMapFrame::SameLocalsNoStack {
                    offset_delta: 32762
                }
            );
        } else {
            assert_eq!(frames, None);
        }

        let second = instrument(&result.bytes);
        assert!(!second.modified);
    }
}

#[test]
fn parameter_scopes_start_after_the_checks() {
    let mut class = ClassBuilder::new("p/C", Version::JAVA8);
    class.add_method(
        MethodSpec::new(MethodAccessFlags::PUBLIC, "m", "(Ljava/lang/String;)V")
            .parameter_annotations(vec![vec![NOT_NULL]])
            .code(CodeSpec {
                max_stack: 0,
                max_locals: 2,
                bytecode: vec![0xb1],
                line_numbers: vec![(0, 7)],
                local_variables: vec![
                    (0, 1, "this", "Lp/C;", 0),
                    (0, 1, "s", "Ljava/lang/String;", 1),
                ],
                ..CodeSpec::default()
            }),
    );
    let result = instrument(&class.build());
    assert!(result.modified);

    let class = ClassFile::parse(&result.bytes).unwrap();
    let code = code(&class, "m");
    let attribute = code
        .attributes
        .iter()
        .find(|attribute| {
            class.constants.attribute_name(attribute).unwrap() == b"LocalVariableTable"
        })
        .unwrap();
    let variables = attribute.decode::<LocalVariableTable>().unwrap().0;

    let scopes: Vec<(String, u16, u16)> = variables
        .iter()
        .map(|variable| {
            (
                class.constants.get_utf8_str(variable.name_index).unwrap(),
                variable.start_pc.0,
                variable.length,
            )
        })
        .collect();
    assert_eq!(
        scopes,
        vec![("this".to_owned(), 0, 15), ("s".to_owned(), 14, 1)]
    );

    let body = body(&class, "m");
    assert_eq!(
        instructions(&body)[0],
        CodeItem::Instruction(Instruction::ALoad(1))
    );
    assert_eq!(code.max_stack, 4);
    assert_eq!(code.max_locals, 2);
    assert_eq!(
        stack_map_frames(&class, "m"),
        Some(vec![StackMapFrame::SameLocalsNoStack { offset_delta: 14 }])
    );
}

#[test]
fn synthetic_parameters_are_not_numbered() {
    // `private Color(String name, int ordinal, @NotNull String s) { super(name, ordinal); }`
    let mut class = ClassBuilder::new("p/Color", Version::JAVA8);
    let super_constructor = class
        .constants
        .get_method_ref("java/lang/Enum", "<init>", "(Ljava/lang/String;I)V", false)
        .unwrap();
    let [hi, lo] = (super_constructor.0).0.to_be_bytes();
    class.add_method(
        MethodSpec::new(
            MethodAccessFlags::PRIVATE,
            "<init>",
            "(Ljava/lang/String;ILjava/lang/String;)V",
        )
        .parameter_annotations(vec![vec![NOT_NULL]])
        .code(CodeSpec {
            max_stack: 3,
            max_locals: 4,
            bytecode: vec![0x2a, 0x2b, 0x1c, 0xb7, hi, lo, 0xb1],
            ..CodeSpec::default()
        }),
    );
    let result = instrument(&class.build());
    assert!(result.modified);

    let class = ClassFile::parse(&result.bytes).unwrap();
    let items = instructions(&body(&class, "<init>"));
    assert_eq!(items[0], CodeItem::Instruction(Instruction::ALoad(3)));
    match &items[4] {
        CodeItem::Instruction(Instruction::Ldc(message)) => assert_eq!(
            string_constant(&class.constants, *message),
            "Argument 1 for @NotNull parameter of p/Color.<init> must not be null"
        ),
        other => panic!("expected the message, got {:?}", other),
    }
    assert_eq!(
        stack_map_frames(&class, "<init>"),
        Some(vec![StackMapFrame::SameLocalsNoStack { offset_delta: 14 }])
    );
}

#[test]
fn old_class_files_get_no_frames() {
    let result = instrument(&strings_class(Version::JAVA5));
    assert!(result.modified);

    let class = ClassFile::parse(&result.bytes).unwrap();
    assert_eq!(stack_map_frames(&class, "of"), None);
    assert_eq!(
        instructions(&body(&class, "of"))[0],
        CodeItem::Instruction(Instruction::ALoad(0))
    );
}

#[test]
fn primitive_contracts_leave_the_class_alone() {
    let mut class = ClassBuilder::new("p/C", Version::JAVA8);
    class.add_method(
        MethodSpec::new(STATIC, "h", "(I)Z")
            .annotated(NOT_NULL)
            .parameter_annotations(vec![vec![NOT_NULL]])
            .code(CodeSpec {
                max_stack: 1,
                max_locals: 1,
                bytecode: vec![0x03, 0xac],
                ..CodeSpec::default()
            }),
    );
    let bytes = class.build();

    let result = instrument(&bytes);
    assert!(!result.modified);
    assert_eq!(result.bytes, bytes);
}

#[test]
fn methods_without_code_are_skipped() {
    let mut class = ClassBuilder::new("p/C", Version::JAVA8);
    class.add_method(
        MethodSpec::new(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            "run",
            "(Ljava/lang/Object;)Ljava/lang/Object;",
        )
        .annotated(NOT_NULL)
        .parameter_annotations(vec![vec![NOT_NULL]]),
    );
    let bytes = class.build();

    let result = instrument(&bytes);
    assert!(!result.modified);
    assert_eq!(result.bytes, bytes);
}

#[test]
fn contract_annotation_is_configurable() {
    let bytes = strings_class(Version::JAVA8);
    let settings = Settings::with_not_null_annotation("Lfoo/NonNull;");
    let result = instrument::instrument_class(&settings, &bytes).unwrap();
    assert!(!result.modified);

    let mut class = ClassBuilder::new("p/C", Version::JAVA8);
    class.add_method(
        MethodSpec::new(STATIC, "id", "(Ljava/lang/Object;)V")
            .parameter_annotations(vec![vec!["Lfoo/NonNull;"]])
            .code(CodeSpec {
                max_stack: 0,
                max_locals: 1,
                bytecode: vec![0xb1],
                ..CodeSpec::default()
            }),
    );
    let result = instrument::instrument_class(&settings, &class.build()).unwrap();
    assert!(result.modified);
}

#[test]
fn unreachable_returns_without_frames_fail() {
    let mut class = ClassBuilder::new("p/C", Version::JAVA8);
    class.add_method(
        MethodSpec::new(STATIC, "f", "()Ljava/lang/Object;")
            .annotated(NOT_NULL)
            .code(CodeSpec {
                max_stack: 1,
                max_locals: 0,
                bytecode: vec![0x01, 0xb0, 0x01, 0xb0],
                ..CodeSpec::default()
            }),
    );

    let err = instrument::instrument_class(&Settings::new(), &class.build()).unwrap_err();
    match &err {
        Error::Maximums {
            class_name,
            method_name,
            cause: jvm::Error::MissingFrame(_),
        } => {
            assert_eq!(class_name, "p/C");
            assert_eq!(method_name, "f");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err
        .to_string()
        .starts_with("Maximums processing failed for p/C.f: "));
}

#[test]
fn malformed_classes_are_errors() {
    let settings = Settings::new();
    assert!(matches!(
        instrument::instrument_class(&settings, &[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]),
        Err(Error::Class(jvm::Error::BadMagic(0xCAFEBABF)))
    ));

    let bytes = strings_class(Version::JAVA8);
    assert!(matches!(
        instrument::instrument_class(&settings, &bytes[..bytes.len() - 3]),
        Err(Error::Class(_))
    ));
}

#[test]
fn one_failure_does_not_stop_the_others() {
    let settings = Settings::new();
    let inputs = vec![strings_class(Version::JAVA8), vec![0, 1, 2], returns_class()];
    let results: Vec<Result<instrument::Instrumented, Error>> =
        instrument::instrument_classes(&settings, &inputs).collect();

    assert_eq!(results.len(), 3);
    assert!(matches!(&results[0], Ok(result) if result.class_name == "p/Strings"));
    assert!(results[1].is_err());
    assert!(matches!(&results[2], Ok(result) if result.class_name == "p/C" && result.modified));
}
