use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use msgqprims_queue::{
    ControlCommand, ControlReply, MemoryQueue, MessageQueue, QueueError, Tag, Wait,
};

/// Memory queue whose enqueues on one tag start failing after a set count.
pub(crate) struct FaultyQueue {
    pub(crate) inner: MemoryQueue,
    tag: Tag,
    fail_after: usize,
    seen: AtomicUsize,
}

impl FaultyQueue {
    pub(crate) fn failing_after(tag: Tag, fail_after: usize) -> Self {
        Self {
            inner: MemoryQueue::new(),
            tag,
            fail_after,
            seen: AtomicUsize::new(0),
        }
    }
}

impl MessageQueue for FaultyQueue {
    fn enqueue(&self, tag: Tag, text: &[u8], wait: Wait) -> Result<usize, QueueError> {
        if tag == self.tag && self.seen.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            return Err(QueueError::Io(std::io::Error::other("injected enqueue failure")));
        }
        self.inner.enqueue(tag, text, wait)
    }

    fn dequeue(&self, tag: Tag, max_len: usize, wait: Wait) -> Result<Bytes, QueueError> {
        self.inner.dequeue(tag, max_len, wait)
    }

    fn control(&self, command: ControlCommand) -> Result<ControlReply, QueueError> {
        self.inner.control(command)
    }
}
