use thiserror::Error;

/// Boxed error of a remote call, as produced by an API client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The application or policy does not exist remotely. Expected during
    /// deletion and never worth an error-level log.
    #[error("{name} not found in zone {zone}")]
    NotFound { zone: String, name: String },

    /// A call to the remote service failed. Only the operation it belonged to
    /// is abandoned.
    #[error("{operation} failed: {source}")]
    RemoteCall {
        operation: String,
        #[source]
        source: BoxError,
    },

    /// A source object carries annotations we cannot turn into an application.
    #[error("malformed input in {object}: {reason}")]
    MalformedInput { object: String, reason: String },

    /// Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn remote_call(operation: impl Into<String>, source: impl Into<BoxError>) -> Error {
        Error::RemoteCall {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let e = Error::NotFound {
            zone: "example.com".to_string(),
            name: "policy-0".to_string(),
        };
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "policy-0 not found in zone example.com");
    }
}
