use std::time::Duration;

/// Result type alias for questdeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for questdeck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authentication with the upstream service failed or a session expired
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The proxied gamification service returned a failure
    #[error("remote service '{service}' error: {message}")]
    RemoteService {
        service: String,
        message: String,
        status: Option<u16>,
    },

    /// Network-level errors reaching an endpoint
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// Request or payload validation errors
    #[error("{}", format_validation_error(.field, .message))]
    Validation {
        field: Option<String>,
        message: String,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// A circuit breaker rejected the call without invoking the operation
    #[error("circuit '{name}' is open - request rejected")]
    CircuitOpen { name: String },

    /// Anything that could not be mapped to a known failure mode
    #[error("unexpected error: {message}")]
    Unknown { message: String },
}

fn format_validation_error(field: &Option<String>, message: &str) -> String {
    match field {
        Some(field) => format!("validation failed for '{field}': {message}"),
        None => format!("validation failed: {message}"),
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create an authentication error
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Create a remote service error
    #[must_use]
    pub fn remote_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RemoteService {
            service: service.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a remote service error carrying the upstream HTTP status
    #[must_use]
    pub fn remote_service_with_status(
        service: impl Into<String>,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Error::RemoteService {
            service: service.into(),
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Create a validation error for a specific field
    #[must_use]
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a circuit-open rejection
    #[must_use]
    pub fn circuit_open(name: impl Into<String>) -> Self {
        Error::CircuitOpen { name: name.into() }
    }

    /// Create an unknown error
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown {
            message: message.into(),
        }
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_includes_field_when_present() {
        let err = Error::validation_field("score", "must be non-negative");
        assert_eq!(
            err.to_string(),
            "validation failed for 'score': must be non-negative"
        );

        let err = Error::validation("empty body");
        assert_eq!(err.to_string(), "validation failed: empty body");
    }

    #[test]
    fn context_wraps_into_configuration() {
        let parse: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not json");
        let err = parse.context("loading settings").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("loading settings"));
    }
}
