use std::path::PathBuf;

use crate::control::ControlCommand;
use crate::traits::Tag;

/// Errors that can occur in message queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Failed to derive an IPC key from a pathname.
    #[error("failed to derive key from {path}: {source}")]
    KeyDerivation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open or create the queue for a key.
    #[error("failed to open queue for key {key:#x}: {source}")]
    Open { key: i32, source: std::io::Error },

    /// The queue has no room and the caller asked not to wait.
    #[error("queue is full")]
    Full,

    /// No message with the requested tag is available and the caller asked not to wait.
    #[error("no message available for tag {tag}")]
    Empty { tag: Tag },

    /// The next matching message is larger than the receive buffer.
    ///
    /// The message stays in the queue.
    #[error("message larger than receive buffer ({max} bytes)")]
    TooBig { max: usize },

    /// Message tags must be strictly positive on enqueue.
    #[error("invalid message tag {0} (must be positive)")]
    InvalidTag(Tag),

    /// A blocking call was interrupted by a signal.
    #[error("queue operation interrupted by signal")]
    Interrupted,

    /// The queue was removed while the caller was using it.
    #[error("queue removed")]
    Removed,

    /// The control command is recognized but not supported.
    #[error("control command {0} is not implemented")]
    NotImplemented(ControlCommand),

    /// The raw control command code is not recognized.
    #[error("invalid control command {0}")]
    InvalidCommand(i32),

    /// Any other I/O error reported by the kernel.
    #[error("queue I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
