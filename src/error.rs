use thiserror::Error;

use crate::models::EntityKind;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("storage is closed")]
    Closed,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StorageError::Validation(msg.into())
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Client errors are caused by the request and are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::Validation(_) | StorageError::NotFound { .. }
        )
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_client_and_server_errors() {
        assert!(StorageError::validation("Missing name").is_client_error());
        assert!(StorageError::not_found(EntityKind::City, "c1").is_client_error());
        assert!(!StorageError::Closed.is_client_error());
        assert!(!StorageError::Unavailable("disk gone".into()).is_client_error());
    }

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = StorageError::not_found(EntityKind::Amenity, "a-1");
        assert_eq!(err.to_string(), "Amenity not found: a-1");
    }

    #[test]
    fn io_errors_become_unavailable() {
        let err: StorageError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, StorageError::Unavailable(msg) if msg.contains("denied")));
    }
}
