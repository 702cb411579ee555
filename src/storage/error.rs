use crate::types::SwapId;

/// Errors returned by [`SwapStorage`](super::SwapStorage).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A swap with this id already exists.
    #[error("swap {0} already exists")]
    SwapAlreadyExists(SwapId),

    /// Database error.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be decoded.
    #[error("corrupt row: {0}")]
    Decode(String),
}
