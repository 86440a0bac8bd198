use crate::jvm::class_file::{
    Attribute, AttributeLike, ConstantsPool, Deserialize, Serialize, Utf8ConstantIndex,
};
use crate::jvm::{Error, MethodAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.6
#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Find and decode the first attribute of a given type
    pub fn attribute<A: AttributeLike>(
        &self,
        constants: &ConstantsPool,
    ) -> Result<Option<A>, Error> {
        find_attribute(&self.attributes, constants)
    }
}

/// Find and decode the first attribute with the name `A::NAME`
pub fn find_attribute<A: AttributeLike>(
    attributes: &[Attribute],
    constants: &ConstantsPool,
) -> Result<Option<A>, Error> {
    for attribute in attributes {
        if constants.attribute_name(attribute)? == A::NAME.as_bytes() {
            return attribute.decode().map(Some);
        }
    }
    Ok(None)
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Method {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}
