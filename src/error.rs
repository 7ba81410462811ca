use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors of a document build.
///
/// Recoverable metadata problems (malformed override blocks, missing
/// operation ids, missing DTOs) never reach this type: they are logged and
/// embedded in the generated document instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Misconfigured settings or documentation out of sync with a handler
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A document was requested for a configuration name that is not declared
    #[error("{0} swagger settings not defined")]
    UnknownConfiguration(String),

    /// A handler shape that cannot be introspected
    #[error("cannot introspect handler {handler}: {message}")]
    Reflection { handler: String, message: String },

    /// An override referenced a DTO or view mocker that is not registered
    #[error("could not find {reference}, looked in {module}")]
    DynamicReference { reference: String, module: String },

    /// The caller is not allowed to read the requested document
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A manifest file could not be understood
    #[error("invalid manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the error comes from the permission gate rather than the build
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::PermissionDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_configuration_message() {
        let err = Error::UnknownConfiguration("admin".to_string());
        assert_eq!(err.to_string(), "admin swagger settings not defined");
    }

    #[test]
    fn test_dynamic_reference_message() {
        let err = Error::DynamicReference {
            reference: "serializers.Missing".to_string(),
            module: "products.views".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not find serializers.Missing, looked in products.views"
        );
    }

    #[test]
    fn test_permission_denied_detection() {
        assert!(Error::PermissionDenied("superuser required".to_string()).is_permission_denied());
        assert!(!Error::Configuration("x".to_string()).is_permission_denied());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
