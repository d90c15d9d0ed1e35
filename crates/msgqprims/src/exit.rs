use std::fmt;
use std::io;

use msgqprims_frame::FrameError;
use msgqprims_queue::QueueError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const DESYNCHRONIZED: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::AlreadyExists => FAILURE,
        // EINVAL from msgsnd/msgrcv/msgctl: the queue id does not exist.
        io::ErrorKind::InvalidInput => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn queue_error(context: &str, err: QueueError) -> CliError {
    match err {
        QueueError::KeyDerivation { source, .. }
        | QueueError::Open { source, .. }
        | QueueError::Io(source) => io_error(context, source),
        QueueError::Full | QueueError::Empty { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        QueueError::TooBig { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        QueueError::InvalidTag(_)
        | QueueError::InvalidCommand(_)
        | QueueError::NotImplemented(_) => CliError::new(USAGE, format!("{context}: {err}")),
        QueueError::Removed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        QueueError::Interrupted => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    if err.is_desynchronized() {
        return CliError::new(
            DESYNCHRONIZED,
            format!("{context}: {err} (run `msgqprims drain` or `msgqprims compensate`)"),
        );
    }
    match err {
        FrameError::Queue(source) => queue_error(context, source),
        FrameError::QueueFull | FrameError::QueueEmpty => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        FrameError::Encoding { .. }
        | FrameError::Decoding { .. }
        | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
