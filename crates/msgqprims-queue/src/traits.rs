use std::sync::Arc;

use bytes::Bytes;

use crate::control::{ControlCommand, ControlReply};
use crate::error::Result;
use crate::flags::Wait;

/// Message type discriminator, native `long` width to match the kernel layout.
pub type Tag = std::ffi::c_long;

/// A bounded queue of tagged messages with FIFO order per tag.
///
/// Dequeue tag selection follows `msgrcv(2)`:
/// - `tag > 0`: first message with exactly that tag
/// - `tag == 0`: first message of any tag
/// - `tag < 0`: first message with the lowest tag not above `|tag|`
///
/// Implementations are shared between senders and receivers, so every
/// operation takes `&self`.
pub trait MessageQueue {
    /// Enqueue one message. Returns the number of text bytes enqueued.
    fn enqueue(&self, tag: Tag, text: &[u8], wait: Wait) -> Result<usize>;

    /// Dequeue one message of at most `max_len` text bytes.
    ///
    /// A larger matching message is left in place and reported as
    /// [`QueueError::TooBig`](crate::QueueError::TooBig).
    fn dequeue(&self, tag: Tag, max_len: usize, wait: Wait) -> Result<Bytes>;

    /// Run a control command against the queue.
    fn control(&self, command: ControlCommand) -> Result<ControlReply>;

    /// Largest text a single message may carry (`msgmax`), if known.
    fn max_message_size(&self) -> Option<usize> {
        match self.control(ControlCommand::Info) {
            Ok(ControlReply::Info(info)) => usize::try_from(info.max_message_size)
                .ok()
                .filter(|n| *n > 0),
            _ => None,
        }
    }
}

impl<Q: MessageQueue + ?Sized> MessageQueue for &Q {
    fn enqueue(&self, tag: Tag, text: &[u8], wait: Wait) -> Result<usize> {
        (**self).enqueue(tag, text, wait)
    }

    fn dequeue(&self, tag: Tag, max_len: usize, wait: Wait) -> Result<Bytes> {
        (**self).dequeue(tag, max_len, wait)
    }

    fn control(&self, command: ControlCommand) -> Result<ControlReply> {
        (**self).control(command)
    }

    fn max_message_size(&self) -> Option<usize> {
        (**self).max_message_size()
    }
}

impl<Q: MessageQueue + ?Sized> MessageQueue for Arc<Q> {
    fn enqueue(&self, tag: Tag, text: &[u8], wait: Wait) -> Result<usize> {
        (**self).enqueue(tag, text, wait)
    }

    fn dequeue(&self, tag: Tag, max_len: usize, wait: Wait) -> Result<Bytes> {
        (**self).dequeue(tag, max_len, wait)
    }

    fn control(&self, command: ControlCommand) -> Result<ControlReply> {
        (**self).control(command)
    }

    fn max_message_size(&self) -> Option<usize> {
        (**self).max_message_size()
    }
}

/// Returns true if `candidate` is selected by `selector` under `msgrcv(2)` rules,
/// ignoring the "lowest tag" tie-break for negative selectors.
pub(crate) fn tag_matches(selector: Tag, candidate: Tag) -> bool {
    match selector {
        0 => true,
        s if s > 0 => candidate == s,
        s => candidate <= s.saturating_neg(),
    }
}
