//! Flag and command constants for System V message queues.
//!
//! Values are the Linux ABI values. They are exposed as plain integers so
//! they can be passed across process and language boundaries unchanged.

/// Create the queue if it does not exist (`IPC_CREAT`).
pub const CREATE: i32 = 0o1000;

/// Fail if the queue already exists; only meaningful with [`CREATE`] (`IPC_EXCL`).
pub const EXCLUSIVE: i32 = 0o2000;

/// Return immediately instead of blocking (`IPC_NOWAIT`).
pub const NO_WAIT: i32 = 0o4000;

/// Remove the queue (`IPC_RMID`).
pub const REMOVE: i32 = 0;

/// Set queue attributes (`IPC_SET`). Not supported.
pub const SET: i32 = 1;

/// Get queue attributes (`IPC_STAT`).
pub const STAT: i32 = 2;

/// Get system-wide queue limits (`IPC_INFO`).
pub const INFO: i32 = 3;

/// Key requesting a new private queue (`IPC_PRIVATE`).
pub const PRIVATE_KEY: i32 = 0;

/// Default permission bits for created queues.
pub const DEFAULT_MODE: u32 = 0o600;

/// Blocking behavior of a single enqueue or dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wait {
    /// Suspend until the operation can complete.
    #[default]
    Block,
    /// Fail with `Full` / `Empty` instead of suspending.
    NoWait,
}

impl Wait {
    /// Interpret a raw flag word; only the [`NO_WAIT`] bit is considered.
    pub fn from_flags(flags: i32) -> Self {
        if flags & NO_WAIT != 0 {
            Self::NoWait
        } else {
            Self::Block
        }
    }

    /// The raw flag word for this mode.
    pub fn to_flags(self) -> i32 {
        match self {
            Self::Block => 0,
            Self::NoWait => NO_WAIT,
        }
    }
}

/// Options for opening or creating a queue, in the manner of `std::fs::OpenOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Create the queue if it does not exist.
    pub create: bool,
    /// Fail if the queue already exists (requires `create`).
    pub exclusive: bool,
    /// Permission bits applied when the queue is created.
    pub mode: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create: false,
            exclusive: false,
            mode: DEFAULT_MODE,
        }
    }
}

impl OpenOptions {
    /// Attach to an existing queue only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: create the queue if absent.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Builder: fail if the queue exists.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Builder: permission bits.
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// The raw `msgget` flag word.
    pub fn to_flags(&self) -> i32 {
        let mut flags = (self.mode & 0o777) as i32;
        if self.create {
            flags |= CREATE;
            if self.exclusive {
                flags |= EXCLUSIVE;
            }
        }
        flags
    }
}
