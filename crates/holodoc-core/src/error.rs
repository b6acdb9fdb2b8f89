//! Error types for HoloDoc.

use thiserror::Error;

use crate::models::{DocumentId, EntityId};

/// Result type alias using HoloDoc's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for HoloDoc operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request could not be sent or the response could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with an empty body
    #[error("Empty response from server")]
    EmptyResponse,

    /// Response parsed but is unusable (missing identity, embedded error)
    #[error("Sync error: {0}")]
    Sync(String),

    /// No record for this entity
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No record carries this document identity
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Record already bound to another server identity
    #[error("Entity {entity} already has identity {existing}, refusing {incoming}")]
    IdentityConflict {
        entity: EntityId,
        existing: DocumentId,
        incoming: DocumentId,
    },

    /// Operation needs a server-assigned identity the record does not have yet
    #[error("Entity {0} has no server identity yet")]
    Unassigned(EntityId),

    /// `end_link` without a preceding `start_link`
    #[error("No link gesture in progress")]
    NoPendingLink,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image encoding/decoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_transport() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_error_display_empty_response() {
        assert_eq!(
            Error::EmptyResponse.to_string(),
            "Empty response from server"
        );
    }

    #[test]
    fn test_reqwest_error_is_transport() {
        let err = reqwest::Client::new().post("not a url").build().unwrap_err();
        assert!(matches!(Error::from(err), Error::Transport(_)));
    }

    #[test]
    fn test_error_display_sync() {
        let err = Error::Sync("missing id".to_string());
        assert_eq!(err.to_string(), "Sync error: missing id");
    }

    #[test]
    fn test_error_display_document_not_found() {
        let id = DocumentId::new("doc-42").unwrap();
        let err = Error::DocumentNotFound(id);
        assert_eq!(err.to_string(), "Document not found: doc-42");
    }

    #[test]
    fn test_error_display_identity_conflict() {
        let entity = EntityId::new();
        let err = Error::IdentityConflict {
            entity,
            existing: DocumentId::new("a").unwrap(),
            incoming: DocumentId::new("b").unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains(&entity.to_string()));
        assert!(msg.contains("already has identity a"));
        assert!(msg.contains("refusing b"));
    }

    #[test]
    fn test_error_display_no_pending_link() {
        assert_eq!(
            Error::NoPendingLink.to_string(),
            "No link gesture in progress"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
