use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("Invalid card data: {0}")]
    Validation(String),

    #[error("Card not found: {0}")]
    NotFound(Uuid),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] confique::Error),
}

impl CardError {
    /// True for failures of the backing store itself, as opposed to a bad
    /// request. Callers decide whether these are worth retrying.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            CardError::StorageUnavailable(_)
                | CardError::Database(_)
                | CardError::Io(_)
                | CardError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_told_apart_from_bad_requests() {
        assert!(CardError::StorageUnavailable("locked".into()).is_storage());
        assert!(CardError::Io(std::io::Error::other("disk")).is_storage());
        assert!(CardError::Database(rusqlite::Error::InvalidQuery).is_storage());

        assert!(!CardError::Validation("bad grade".into()).is_storage());
        assert!(!CardError::NotFound(Uuid::nil()).is_storage());
        assert!(!CardError::Forbidden("admin only".into()).is_storage());
    }
}
