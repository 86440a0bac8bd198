use crate::jvm::class_file::{
    AttributeLike, ConstantIndex, Deserialize, Serialize, Utf8ConstantIndex,
};
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Annotation along with its element values
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface (eg. `Lorg/jetbrains/annotations/NotNull;`)
    pub type_index: Utf8ConstantIndex,
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementValuePair {
    pub element_name_index: Utf8ConstantIndex,
    pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant (`tag` is one of `BCDFIJSZs`)
    Const { tag: u8, value: ConstantIndex },

    Enum {
        type_name_index: Utf8ConstantIndex,
        const_name_index: Utf8ConstantIndex,
    },

    /// Return descriptor of a class literal
    Class(Utf8ConstantIndex),

    Annotation(Box<Annotation>),

    Array(Vec<ElementValue>),
}

impl Serialize for Annotation {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.type_index.serialize(writer)?;
        self.element_value_pairs.serialize(writer)
    }
}

impl Deserialize for Annotation {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Annotation {
            type_index: Utf8ConstantIndex::deserialize(reader)?,
            element_value_pairs: Vec::deserialize(reader)?,
        })
    }
}

impl Serialize for ElementValuePair {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.element_name_index.serialize(writer)?;
        self.value.serialize(writer)
    }
}

impl Deserialize for ElementValuePair {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ElementValuePair {
            element_name_index: Utf8ConstantIndex::deserialize(reader)?,
            value: ElementValue::deserialize(reader)?,
        })
    }
}

impl Serialize for ElementValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            ElementValue::Const { tag, value } => {
                tag.serialize(writer)?;
                value.serialize(writer)?;
            }
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => {
                b'e'.serialize(writer)?;
                type_name_index.serialize(writer)?;
                const_name_index.serialize(writer)?;
            }
            ElementValue::Class(class_info_index) => {
                b'c'.serialize(writer)?;
                class_info_index.serialize(writer)?;
            }
            ElementValue::Annotation(annotation) => {
                b'@'.serialize(writer)?;
                annotation.serialize(writer)?;
            }
            ElementValue::Array(values) => {
                b'['.serialize(writer)?;
                values.serialize(writer)?;
            }
        }
        Ok(())
    }
}

impl Deserialize for ElementValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let tag = u8::deserialize(reader)?;
        let value = match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
                tag,
                value: ConstantIndex::deserialize(reader)?,
            },
            b'e' => ElementValue::Enum {
                type_name_index: Utf8ConstantIndex::deserialize(reader)?,
                const_name_index: Utf8ConstantIndex::deserialize(reader)?,
            },
            b'c' => ElementValue::Class(Utf8ConstantIndex::deserialize(reader)?),
            b'@' => ElementValue::Annotation(Box::new(Annotation::deserialize(reader)?)),
            b'[' => ElementValue::Array(Vec::deserialize(reader)?),
            _ => return Err(Error::MalformedAttribute("element_value")),
        };
        Ok(value)
    }
}

/// Annotations on a class, field, or method which are visible through reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVisibleAnnotations(pub Vec<Annotation>);

/// Annotations on a class, field, or method which are only in the class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvisibleAnnotations(pub Vec<Annotation>);

/// Per-parameter annotations visible through reflection
///
/// There may be fewer entries than there are parameters in the method descriptor (some compilers
/// only list the parameters that exist in source code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVisibleParameterAnnotations(pub Vec<Vec<Annotation>>);

/// Per-parameter annotations which are only in the class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvisibleParameterAnnotations(pub Vec<Vec<Annotation>>);

macro_rules! annotations_attribute {
    ($attribute:ident, $name:literal) => {
        impl AttributeLike for $attribute {
            const NAME: &'static str = $name;
        }

        impl Serialize for $attribute {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $attribute {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                Ok($attribute(Vec::deserialize(reader)?))
            }
        }
    };
}

/// Parameter annotation tables are prefixed with a `u8` count (not the usual `u16`)
macro_rules! parameter_annotations_attribute {
    ($attribute:ident, $name:literal) => {
        impl AttributeLike for $attribute {
            const NAME: &'static str = $name;
        }

        impl Serialize for $attribute {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                (self.0.len() as u8).serialize(writer)?;
                for parameter in &self.0 {
                    parameter.serialize(writer)?;
                }
                Ok(())
            }
        }

        impl Deserialize for $attribute {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                let num_parameters = u8::deserialize(reader)?;
                let parameters = (0..num_parameters)
                    .map(|_| Vec::deserialize(reader))
                    .collect::<Result<_, _>>()?;
                Ok($attribute(parameters))
            }
        }
    };
}

annotations_attribute!(RuntimeVisibleAnnotations, "RuntimeVisibleAnnotations");
annotations_attribute!(RuntimeInvisibleAnnotations, "RuntimeInvisibleAnnotations");
parameter_annotations_attribute!(
    RuntimeVisibleParameterAnnotations,
    "RuntimeVisibleParameterAnnotations"
);
parameter_annotations_attribute!(
    RuntimeInvisibleParameterAnnotations,
    "RuntimeInvisibleParameterAnnotations"
);
