//! Error types and result alias for the crate.
//!
//! Generation entry points are infallible by design: degenerate inputs
//! produce empty meshes and out-of-range parameters are clamped. The
//! [`enum@Error`] type exists for host-facing configuration checks via the
//! `validate` methods on parameter structs.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown preset '{name}'")]
    UnknownPreset { name: String },

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_allocates_owned_message() {
        let err: Error = "issue".into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "issue"));
    }

    #[test]
    fn invalid_config_displays_message() {
        let err = Error::InvalidConfig("resolution must be > 0".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: resolution must be > 0"
        );
    }
}
