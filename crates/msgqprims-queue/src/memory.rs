use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::debug;

use crate::control::{ControlCommand, ControlReply, QueueStats, SystemInfo};
use crate::error::{QueueError, Result};
use crate::flags::{Wait, DEFAULT_MODE};
use crate::traits::{tag_matches, MessageQueue, Tag};

/// Capacity limits of a [`MemoryQueue`].
///
/// Defaults match the stock Linux kernel limits (`MSGMAX`, `MSGMNB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Maximum text bytes in a single message.
    pub max_message_size: usize,
    /// Maximum text bytes held by the queue at once.
    pub max_queue_bytes: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_message_size: 8192,
            max_queue_bytes: 16384,
        }
    }
}

#[derive(Debug)]
struct Message {
    tag: Tag,
    text: Bytes,
}

#[derive(Debug, Default)]
struct State {
    messages: VecDeque<Message>,
    bytes: usize,
    removed: bool,
    last_send_pid: i32,
    last_recv_pid: i32,
    last_send_time: i64,
    last_recv_time: i64,
    last_change_time: i64,
}

impl State {
    /// Index of the message `selector` picks, per `msgrcv(2)`.
    fn select(&self, selector: Tag) -> Option<usize> {
        if selector >= 0 {
            return self
                .messages
                .iter()
                .position(|m| tag_matches(selector, m.tag));
        }
        // Negative selector: lowest tag wins, FIFO among equal tags.
        let mut best: Option<(usize, Tag)> = None;
        for (idx, msg) in self.messages.iter().enumerate() {
            if !tag_matches(selector, msg.tag) {
                continue;
            }
            if best.is_none_or(|(_, tag)| msg.tag < tag) {
                best = Some((idx, msg.tag));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

/// In-process message queue with kernel-equivalent delivery semantics.
///
/// Bounded by [`QueueLimits`], FIFO per tag, blocking callers park on a
/// condition variable. Useful for tests and for threads of one process
/// exchanging framed values without a kernel round trip.
#[derive(Debug)]
pub struct MemoryQueue {
    state: Mutex<State>,
    changed: Condvar,
    limits: QueueLimits,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    /// Create a queue with default limits.
    pub fn new() -> Self {
        Self::with_limits(QueueLimits::default())
    }

    /// Create a queue with explicit limits.
    pub fn with_limits(limits: QueueLimits) -> Self {
        let state = State {
            last_change_time: now_unix_seconds(),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
            limits,
        }
    }

    /// Configured limits.
    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    /// True if no messages are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of queued messages carrying exactly `tag`.
    pub fn pending(&self, tag: Tag) -> usize {
        self.lock().messages.iter().filter(|m| m.tag == tag).count()
    }

    /// Text bytes currently queued.
    pub fn queued_bytes(&self) -> usize {
        self.lock().bytes
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageQueue for MemoryQueue {
    fn enqueue(&self, tag: Tag, text: &[u8], wait: Wait) -> Result<usize> {
        if tag <= 0 {
            return Err(QueueError::InvalidTag(tag));
        }
        if text.len() > self.limits.max_message_size || text.len() > self.limits.max_queue_bytes {
            return Err(QueueError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "message of {} bytes exceeds limit of {} bytes",
                    text.len(),
                    self.limits.max_message_size.min(self.limits.max_queue_bytes)
                ),
            )));
        }

        let mut state = self.lock();
        loop {
            if state.removed {
                return Err(QueueError::Removed);
            }
            if state.bytes + text.len() <= self.limits.max_queue_bytes {
                state.messages.push_back(Message {
                    tag,
                    text: Bytes::copy_from_slice(text),
                });
                state.bytes += text.len();
                state.last_send_pid = std::process::id() as i32;
                state.last_send_time = now_unix_seconds();
                self.changed.notify_all();
                return Ok(text.len());
            }
            if wait == Wait::NoWait {
                return Err(QueueError::Full);
            }
            state = self.wait(state);
        }
    }

    fn dequeue(&self, tag: Tag, max_len: usize, wait: Wait) -> Result<Bytes> {
        let mut state = self.lock();
        loop {
            if state.removed {
                return Err(QueueError::Removed);
            }
            if let Some(idx) = state.select(tag) {
                if state.messages[idx].text.len() > max_len {
                    return Err(QueueError::TooBig { max: max_len });
                }
                let Some(msg) = state.messages.remove(idx) else {
                    // select() returned an in-bounds index under the same lock
                    continue;
                };
                state.bytes -= msg.text.len();
                state.last_recv_pid = std::process::id() as i32;
                state.last_recv_time = now_unix_seconds();
                self.changed.notify_all();
                return Ok(msg.text);
            }
            if wait == Wait::NoWait {
                return Err(QueueError::Empty { tag });
            }
            state = self.wait(state);
        }
    }

    fn control(&self, command: ControlCommand) -> Result<ControlReply> {
        match command {
            ControlCommand::Remove => {
                let mut state = self.lock();
                state.removed = true;
                state.messages.clear();
                state.bytes = 0;
                state.last_change_time = now_unix_seconds();
                self.changed.notify_all();
                debug!("memory queue removed");
                Ok(ControlReply::Removed)
            }
            ControlCommand::Set => Err(QueueError::NotImplemented(command)),
            ControlCommand::Stat => {
                let state = self.lock();
                if state.removed {
                    return Err(QueueError::Removed);
                }
                Ok(ControlReply::Stat(QueueStats {
                    mode: DEFAULT_MODE,
                    message_count: state.messages.len() as u64,
                    max_bytes: self.limits.max_queue_bytes as u64,
                    current_bytes: Some(state.bytes as u64),
                    last_send_pid: state.last_send_pid,
                    last_recv_pid: state.last_recv_pid,
                    last_send_time: state.last_send_time,
                    last_recv_time: state.last_recv_time,
                    last_change_time: state.last_change_time,
                    ..QueueStats::default()
                }))
            }
            ControlCommand::Info => Ok(ControlReply::Info(SystemInfo {
                max_message_size: self.limits.max_message_size as u64,
                max_queue_bytes: self.limits.max_queue_bytes as u64,
                max_queues: 1,
                ..SystemInfo::default()
            })),
        }
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
