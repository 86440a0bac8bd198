use crate::jvm;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The class itself could not be read or written
    Class(jvm::Error),

    /// Rewriting one method failed, either while inserting guards or while recomputing the
    /// maximum stack and locals afterwards
    Maximums {
        class_name: String,
        method_name: String,
        cause: jvm::Error,
    },
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Class(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Class(err) => write!(f, "{}", err),
            Error::Maximums {
                class_name,
                method_name,
                cause,
            } => write!(
                f,
                "Maximums processing failed for {}.{}: {}",
                class_name, method_name, cause
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Class(err) => Some(err),
            Error::Maximums { cause, .. } => Some(cause),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_failures_name_the_method() {
        let err = Error::Maximums {
            class_name: "p/C".to_owned(),
            method_name: "run".to_owned(),
            cause: jvm::Error::FallsOffEnd,
        };
        assert_eq!(
            err.to_string(),
            "Maximums processing failed for p/C.run: execution falls off the end of the code"
        );
    }
}
