/// Configuration of the instrumentation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Field descriptor of the contract annotation (eg. `Lorg/jetbrains/annotations/NotNull;`)
    ///
    /// It is matched exactly against the type of every method and parameter annotation, visible
    /// or not.
    pub not_null_descriptor: String,
}

impl Settings {
    pub const DEFAULT_NOT_NULL_DESCRIPTOR: &'static str = "Lorg/jetbrains/annotations/NotNull;";

    pub fn new() -> Settings {
        Settings {
            not_null_descriptor: Settings::DEFAULT_NOT_NULL_DESCRIPTOR.to_owned(),
        }
    }

    /// Use a different contract annotation, given its field descriptor
    pub fn with_not_null_annotation(descriptor: impl Into<String>) -> Settings {
        Settings {
            not_null_descriptor: descriptor.into(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new()
    }
}
