use std::fmt;

use crate::error::QueueError;
use crate::flags;

/// Queue control commands (`msgctl`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Remove the queue, waking all blocked callers.
    Remove,
    /// Set queue attributes. Always rejected with [`QueueError::NotImplemented`].
    Set,
    /// Read queue attributes and counters.
    Stat,
    /// Read system-wide queue limits.
    Info,
}

impl ControlCommand {
    /// The raw command code.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Remove => flags::REMOVE,
            Self::Set => flags::SET,
            Self::Stat => flags::STAT,
            Self::Info => flags::INFO,
        }
    }

    /// Human-readable command name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Remove => "remove-queue",
            Self::Set => "set-attributes",
            Self::Stat => "get-attributes",
            Self::Info => "get-system-info",
        }
    }
}

impl TryFrom<i32> for ControlCommand {
    type Error = QueueError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            flags::REMOVE => Ok(Self::Remove),
            flags::SET => Ok(Self::Set),
            flags::STAT => Ok(Self::Stat),
            flags::INFO => Ok(Self::Info),
            other => Err(QueueError::InvalidCommand(other)),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a successful control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    /// The queue was removed.
    Removed,
    /// Queue attributes and counters.
    Stat(QueueStats),
    /// System-wide limits.
    Info(SystemInfo),
}

/// Queue attributes and counters (`struct msqid_ds`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub uid: u32,
    pub gid: u32,
    pub creator_uid: u32,
    pub creator_gid: u32,
    /// Permission bits.
    pub mode: u32,
    /// Messages currently queued.
    pub message_count: u64,
    /// Maximum bytes the queue may hold.
    pub max_bytes: u64,
    /// Bytes currently queued, when the backend reports it.
    pub current_bytes: Option<u64>,
    pub last_send_pid: i32,
    pub last_recv_pid: i32,
    /// Unix seconds; zero if no message was ever sent.
    pub last_send_time: i64,
    /// Unix seconds; zero if no message was ever received.
    pub last_recv_time: i64,
    pub last_change_time: i64,
}

/// System-wide queue limits (`struct msginfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    /// Maximum bytes in a single message text (`msgmax`).
    pub max_message_size: u64,
    /// Default maximum bytes per queue (`msgmnb`).
    pub max_queue_bytes: u64,
    /// Maximum number of queues (`msgmni`).
    pub max_queues: u64,
    pub pool_size: u64,
    pub map_entries: u64,
    pub segment_size: u64,
    pub max_headers: u64,
    pub max_segments: u64,
}
