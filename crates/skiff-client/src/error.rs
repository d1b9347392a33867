//! Client error types

use skiff_xml::{ErrorEnvelope, XmlError};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Client-side parameter or size violation, raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The configured endpoint is not a usable host.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The bucket name violates the naming rules.
    #[error("invalid bucket name '{bucket}': {reason}")]
    InvalidBucketName {
        /// The rejected name.
        bucket: String,
        /// Which rule it broke.
        reason: String,
    },

    /// The object key violates the naming rules.
    #[error("invalid object name: {0}")]
    InvalidObjectName(String),

    /// A structured error returned by the storage server.
    #[error("server error ({code}): {message}")]
    Server {
        /// Machine-readable error code, e.g. `NoSuchBucket`.
        code: String,
        /// Human-readable message.
        message: String,
        /// Corrected region embedded in `AuthorizationHeaderMalformed` errors.
        region: Option<String>,
        /// Request id assigned by the server, if any.
        request_id: Option<String>,
        /// HTTP status the error arrived with.
        status: u16,
    },

    /// The response violated the wire protocol in a way that cannot be
    /// attributed to a server error code.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The credential provider failed to produce credentials.
    #[error("credential refresh failed: {0}")]
    CredentialRefresh(String),

    /// Network or connectivity failure, passed through unmodified.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// XML codec failure.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// IO error from a local source stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Server`] from a parsed error envelope.
    pub(crate) fn from_envelope(envelope: ErrorEnvelope, status: u16) -> Self {
        Error::Server {
            code: envelope.code,
            message: envelope.message,
            region: envelope.region,
            request_id: envelope.request_id,
            status,
        }
    }

    /// Server error with no parsable body, keyed by HTTP status alone.
    pub(crate) fn from_status(status: u16) -> Self {
        Error::Server {
            code: format!("HTTP{status}"),
            message: format!("request failed with status {status}"),
            region: None,
            request_id: None,
            status,
        }
    }

    /// Whether this error means the bucket or object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Server { code, status, .. }
                if code == "NoSuchKey" || code == "NoSuchBucket" || *status == 404
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_fields_carry_through() {
        let envelope = ErrorEnvelope {
            code: "AuthorizationHeaderMalformed".to_string(),
            message: "wrong region".to_string(),
            request_id: Some("req-1".to_string()),
            resource: None,
            region: Some("eu-west-1".to_string()),
        };

        match Error::from_envelope(envelope, 400) {
            Error::Server {
                code,
                region,
                request_id,
                status,
                ..
            } => {
                assert_eq!(code, "AuthorizationHeaderMalformed");
                assert_eq!(region.as_deref(), Some("eu-west-1"));
                assert_eq!(request_id.as_deref(), Some("req-1"));
                assert_eq!(status, 400);
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn not_found_detection() {
        assert!(Error::from_status(404).is_not_found());
        assert!(!Error::from_status(403).is_not_found());

        let envelope = ErrorEnvelope {
            code: "NoSuchBucket".to_string(),
            message: String::new(),
            request_id: None,
            resource: None,
            region: None,
        };
        assert!(Error::from_envelope(envelope, 409).is_not_found());
    }
}
