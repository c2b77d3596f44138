use thiserror::Error;

use crate::registry::Engine;

/// Error type for sqli-lab operations
#[derive(Debug, Error)]
pub enum LabError {
    #[error("Missing {0} parameter")]
    MissingParameter(String),

    #[error("cannot connect to {engine}")]
    ConnectionFailed { engine: Engine, reason: String },

    #[error("no value bound for placeholder {{{placeholder}}}")]
    Format { placeholder: String },

    /// Driver rejected the query. The message is the driver's own text.
    #[error("{0}")]
    QueryFailed(String),

    #[error("{engine} does not support {operation}")]
    Unsupported {
        engine: Engine,
        operation: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl LabError {
    /// HTTP status code a route answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LabError::MissingParameter(_) => 400,
            _ => 500,
        }
    }
}

/// Result type alias for sqli-lab operations
pub type Result<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_message_and_status() {
        let err = LabError::MissingParameter("col".to_string());
        assert_eq!(err.to_string(), "Missing col parameter");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_connection_failed_names_engine_only() {
        let err = LabError::ConnectionFailed {
            engine: Engine::Postgres,
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "cannot connect to PostgreSQL");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_query_failed_is_verbatim() {
        let err = LabError::QueryFailed("You have an error in your SQL syntax".to_string());
        assert_eq!(err.to_string(), "You have an error in your SQL syntax");
    }

    #[test]
    fn test_format_error_names_placeholder() {
        let err = LabError::Format {
            placeholder: "uid".to_string(),
        };
        assert_eq!(err.to_string(), "no value bound for placeholder {uid}");
    }
}
