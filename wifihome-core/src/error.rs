//! Error types raised by collaborators and caught at the controller boundary.

/// Storage read or write failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Tracker query or command failure.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker io: {0}")]
    Io(#[from] std::io::Error),
    #[error("no wifi interface available")]
    NoInterface,
    #[error("tracker unavailable: {0}")]
    Unavailable(String),
}

/// Anything an entry point of the controller can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("discovery: {0}")]
    Discovery(String),
}
