//! Inserting runtime checks for `@NotNull` contracts
//!
//! Every method of a class is scanned for the contract annotation (see [`Settings`]). Methods that
//! carry contracts get their `Code` rewritten:
//!
//!   - a preamble at the very start checks each `@NotNull` parameter
//!   - every `areturn` in a `@NotNull` method first checks the value being returned
//!
//! Stack map frames, debug tables, and the `max_stack`/`max_locals` of the rewritten methods are
//! adjusted to match. Classes without contracts come back byte-for-byte unchanged.

mod contracts;
mod errors;
mod guards;
mod method;
mod settings;

pub use contracts::GuardSet;
pub use errors::*;
pub use guards::{null_argument_message, null_result_message, ILLEGAL_ARGUMENT, ILLEGAL_STATE};
pub use settings::*;

use crate::jvm::class_file::ClassFile;

/// State of the class whose methods are being instrumented
pub struct ClassUnit {
    /// Internal name (eg. `java/lang/String`)
    pub class_name: String,

    /// Does the class version require `StackMapTable` frames?
    pub uses_stack_map_frames: bool,

    /// Has any method been rewritten yet?
    pub modified: bool,
}

/// Outcome of instrumenting one class
#[derive(Debug)]
pub struct Instrumented {
    /// Internal name of the class (eg. `java/lang/String`)
    pub class_name: String,

    /// Were any guards inserted?
    pub modified: bool,

    /// Bytes of the output class (equal to the input when nothing was modified)
    pub bytes: Vec<u8>,
}

/// Insert guards into one class, given the bytes of its class file
pub fn instrument_class(settings: &Settings, bytes: &[u8]) -> Result<Instrumented, Error> {
    let mut class = ClassFile::parse(bytes)?;
    let mut unit = ClassUnit {
        class_name: class.this_class_name()?,
        uses_stack_map_frames: class.version.uses_stack_map_frames(),
        modified: false,
    };
    log::debug!("scanning {} for contracts", unit.class_name);

    let ClassFile {
        constants, methods, ..
    } = &mut class;
    for method in methods.iter_mut() {
        method::instrument_method(settings, &mut unit, constants, method)?;
    }

    let bytes = if unit.modified {
        class.to_bytes()?
    } else {
        bytes.to_vec()
    };
    Ok(Instrumented {
        class_name: unit.class_name,
        modified: unit.modified,
        bytes,
    })
}

/// Instrument classes one after another
///
/// A failure in one class doesn't stop the others from being processed.
pub fn instrument_classes<'a, I>(
    settings: &'a Settings,
    classes: I,
) -> impl Iterator<Item = Result<Instrumented, Error>> + 'a
where
    I: IntoIterator,
    I::IntoIter: 'a,
    I::Item: AsRef<[u8]>,
{
    classes
        .into_iter()
        .map(move |bytes| instrument_class(settings, bytes.as_ref()))
}
