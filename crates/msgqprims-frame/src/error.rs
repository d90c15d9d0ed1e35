use msgqprims_queue::QueueError;

use crate::payload::CodecError;

/// Errors that can occur while sending or receiving a framed value.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The codec could not encode the value. Nothing was enqueued.
    #[error("{codec} encoding failed: {source}")]
    Encoding {
        codec: &'static str,
        source: CodecError,
    },

    /// The codec could not decode a complete payload.
    #[error("{codec} decoding failed: {source}")]
    Decoding {
        codec: &'static str,
        source: CodecError,
    },

    /// The payload exceeds the configured or representable maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The queue was full in non-blocking mode. Nothing was enqueued.
    #[error("queue full")]
    QueueFull,

    /// No envelope was available in non-blocking mode. Nothing was consumed.
    #[error("queue empty")]
    QueueEmpty,

    /// Any other queue failure before the transfer started.
    #[error("queue error: {0}")]
    Queue(QueueError),

    /// The envelope was enqueued but its body was not.
    ///
    /// The queue now holds an unmatched envelope and must be drained or
    /// compensated before the next transfer can be trusted.
    #[error("partial send: envelope for {declared} bytes enqueued, body failed after {sent} bytes: {source}")]
    PartialSend {
        declared: usize,
        sent: usize,
        source: QueueError,
    },

    /// The envelope was consumed but its body was not.
    #[error("partial receive: envelope for {declared} bytes consumed, body failed after {received} bytes: {source}")]
    PartialReceive {
        declared: usize,
        received: usize,
        source: QueueError,
    },

    /// A received envelope announced more than the configured maximum.
    ///
    /// The envelope was consumed and its body left in the queue.
    #[error("oversized envelope: announced {declared} bytes, max {max}; body left in queue")]
    OversizedEnvelope { declared: usize, max: usize },

    /// The body does not have the length its envelope announced.
    #[error("framing mismatch: envelope declared {declared} bytes, body {}", describe_actual(.actual))]
    FramingMismatch {
        declared: usize,
        /// Length of the body actually read, `None` when it was larger than
        /// the receive buffer and left in the queue.
        actual: Option<usize>,
    },

    /// The envelope text could not be parsed.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },
}

impl FrameError {
    /// True if the queue is left with unmatched protocol messages.
    pub fn is_desynchronized(&self) -> bool {
        matches!(
            self,
            Self::PartialSend { .. }
                | Self::PartialReceive { .. }
                | Self::OversizedEnvelope { .. }
                | Self::FramingMismatch { .. }
                | Self::MalformedEnvelope { .. }
        )
    }

    /// Map a queue failure that happened before anything was sent or consumed.
    pub(crate) fn from_queue(err: QueueError) -> Self {
        match err {
            QueueError::Full => Self::QueueFull,
            QueueError::Empty { .. } => Self::QueueEmpty,
            other => Self::Queue(other),
        }
    }
}

fn describe_actual(actual: &Option<usize>) -> String {
    match actual {
        Some(len) => format!("carried {len} bytes"),
        None => "was larger".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
