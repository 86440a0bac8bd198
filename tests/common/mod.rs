//! Assembling small class files in memory and taking apart the instrumented output

#![allow(dead_code)]

use notnull_instrumenter::jvm::class_file::{
    Annotation, BytecodeArray, BytecodeIndex, ClassFile, Code, Constant, ConstantIndex,
    ConstantsPool, LineNumber, LineNumberTable, LocalVariable, LocalVariableTable, Method,
    RuntimeInvisibleAnnotations, RuntimeInvisibleParameterAnnotations, StackMapFrame,
    StackMapTable, Version,
};
use notnull_instrumenter::jvm::code::{CodeItem, MethodBody};
use notnull_instrumenter::jvm::verifier::VerifierFrame;
use notnull_instrumenter::jvm::{parse_descriptor, ClassAccessFlags, MethodAccessFlags};

pub const NOT_NULL: &str = "Lorg/jetbrains/annotations/NotNull;";

/// Body of a method, with offsets into the bytecode for the debug tables
#[derive(Default)]
pub struct CodeSpec {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub frames: Vec<StackMapFrame>,

    /// `(start_pc, line_number)`
    pub line_numbers: Vec<(u16, u16)>,

    /// `(start_pc, length, name, descriptor, slot)`
    pub local_variables: Vec<(u16, u16, &'static str, &'static str, u16)>,
}

pub struct MethodSpec {
    pub access_flags: MethodAccessFlags,
    pub name: &'static str,
    pub descriptor: &'static str,

    /// Invisible annotations on the method
    pub annotations: Vec<&'static str>,

    /// Invisible parameter annotations (`None` for no table at all)
    pub parameter_annotations: Option<Vec<Vec<&'static str>>>,

    /// `None` for `abstract` methods
    pub code: Option<CodeSpec>,
}

impl MethodSpec {
    pub fn new(access_flags: MethodAccessFlags, name: &'static str, descriptor: &'static str) -> Self {
        MethodSpec {
            access_flags,
            name,
            descriptor,
            annotations: vec![],
            parameter_annotations: None,
            code: None,
        }
    }

    pub fn annotated(mut self, annotation: &'static str) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn parameter_annotations(mut self, annotations: Vec<Vec<&'static str>>) -> Self {
        self.parameter_annotations = Some(annotations);
        self
    }

    pub fn code(mut self, code: CodeSpec) -> Self {
        self.code = Some(code);
        self
    }
}

pub struct ClassBuilder {
    pub class_name: &'static str,
    pub version: Version,
    pub constants: ConstantsPool,
    pub methods: Vec<Method>,
}

impl ClassBuilder {
    pub fn new(class_name: &'static str, version: Version) -> ClassBuilder {
        ClassBuilder {
            class_name,
            version,
            constants: ConstantsPool::new(),
            methods: vec![],
        }
    }

    pub fn add_method(&mut self, spec: MethodSpec) {
        let constants = &mut self.constants;
        let mut attributes = vec![];

        if let Some(code) = spec.code {
            let mut code_attributes = vec![];
            if !code.line_numbers.is_empty() {
                let table = LineNumberTable(
                    code.line_numbers
                        .iter()
                        .map(|(start_pc, line_number)| LineNumber {
                            start_pc: BytecodeIndex(*start_pc),
                            line_number: *line_number,
                        })
                        .collect(),
                );
                code_attributes.push(constants.get_attribute(&table).unwrap());
            }
            if !code.local_variables.is_empty() {
                let mut variables = vec![];
                for (start_pc, length, name, descriptor, index) in &code.local_variables {
                    variables.push(LocalVariable {
                        start_pc: BytecodeIndex(*start_pc),
                        length: *length,
                        name_index: constants.get_utf8(name).unwrap(),
                        descriptor_index: constants.get_utf8(descriptor).unwrap(),
                        index: *index,
                    });
                }
                let table = LocalVariableTable(variables);
                code_attributes.push(constants.get_attribute(&table).unwrap());
            }
            if !code.frames.is_empty() {
                let table = StackMapTable(code.frames);
                code_attributes.push(constants.get_attribute(&table).unwrap());
            }

            let code = Code {
                max_stack: code.max_stack,
                max_locals: code.max_locals,
                code_array: BytecodeArray(code.bytecode),
                exception_table: vec![],
                attributes: code_attributes,
            };
            attributes.push(constants.get_attribute(&code).unwrap());
        }

        if !spec.annotations.is_empty() {
            let annotations = spec
                .annotations
                .iter()
                .map(|descriptor| annotation(constants, descriptor))
                .collect();
            let attribute = RuntimeInvisibleAnnotations(annotations);
            attributes.push(constants.get_attribute(&attribute).unwrap());
        }

        if let Some(parameters) = spec.parameter_annotations {
            let parameters = parameters
                .iter()
                .map(|annotations| {
                    annotations
                        .iter()
                        .map(|descriptor| annotation(constants, descriptor))
                        .collect()
                })
                .collect();
            let attribute = RuntimeInvisibleParameterAnnotations(parameters);
            attributes.push(constants.get_attribute(&attribute).unwrap());
        }

        self.methods.push(Method {
            access_flags: spec.access_flags,
            name_index: constants.get_utf8(spec.name).unwrap(),
            descriptor_index: constants.get_utf8(spec.descriptor).unwrap(),
            attributes,
        });
    }

    pub fn build(mut self) -> Vec<u8> {
        let this_class = self.constants.get_class(self.class_name).unwrap();
        let super_class = self.constants.get_class("java/lang/Object").unwrap();
        let class = ClassFile {
            version: self.version,
            constants: self.constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class: Some(super_class),
            interfaces: vec![],
            fields: vec![],
            methods: self.methods,
            attributes: vec![],
        };
        class.to_bytes().unwrap()
    }
}

fn annotation(constants: &mut ConstantsPool, descriptor: &str) -> Annotation {
    Annotation {
        type_index: constants.get_utf8(descriptor).unwrap(),
        element_value_pairs: vec![],
    }
}

/// Find a method of a parsed class by name
pub fn method<'a>(class: &'a ClassFile, name: &str) -> &'a Method {
    class
        .methods
        .iter()
        .find(|method| class.constants.get_utf8_str(method.name_index).unwrap() == name)
        .unwrap_or_else(|| panic!("no method {}", name))
}

pub fn code(class: &ClassFile, name: &str) -> Code {
    method(class, name)
        .attribute::<Code>(&class.constants)
        .unwrap()
        .expect("method has no code")
}

/// Decoded body of a method
pub fn body(class: &ClassFile, name: &str) -> MethodBody {
    let method = method(class, name);
    let descriptor = parse_descriptor(
        &class
            .constants
            .get_utf8_str(method.descriptor_index)
            .unwrap(),
    )
    .unwrap();
    let entry = VerifierFrame::entry(
        &class.this_class_name().unwrap(),
        name,
        &descriptor,
        method.is_static(),
    );
    MethodBody::decode(&code(class, name), &class.constants, &entry).unwrap()
}

/// Instructions of a method body, without the labels
pub fn instructions(body: &MethodBody) -> Vec<CodeItem> {
    body.items
        .iter()
        .filter(|item| !matches!(item, CodeItem::Label(_)))
        .cloned()
        .collect()
}

pub fn stack_map_frames(class: &ClassFile, name: &str) -> Option<Vec<StackMapFrame>> {
    code(class, name)
        .attributes
        .iter()
        .find(|attribute| class.constants.attribute_name(attribute).unwrap() == b"StackMapTable")
        .map(|attribute| attribute.decode::<StackMapTable>().unwrap().0)
}

/// Contents of a `CONSTANT_String`
pub fn string_constant(constants: &ConstantsPool, index: ConstantIndex) -> String {
    match constants.get(index).unwrap() {
        Constant::String(utf8) => constants.get_utf8_str(*utf8).unwrap(),
        other => panic!("expected a string constant, got {:?}", other),
    }
}
