/// Core error type for the backoffice
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Deletion refused because other records still reference the target
    #[error("Protected: {0}")]
    Protected(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protected("stuff #3 references user #1".to_string());
        assert_eq!(err.to_string(), "Protected: stuff #3 references user #1");

        let err = Error::NotFound("user 42".to_string());
        assert_eq!(err.to_string(), "Not found: user 42");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = config::ConfigError::Message("bad value".to_string()).into();
        assert!(matches!(err, Error::Config(msg) if msg.contains("bad value")));
    }
}
