//! Tools for bringing a desynchronized queue back to a known state.
//!
//! Nothing here runs automatically. After a [`FrameError`] for which
//! [`FrameError::is_desynchronized`] is true, the operator either drains the
//! protocol messages or pairs the orphaned envelope with a filler body.

use msgqprims_queue::{ControlCommand, ControlReply, MessageQueue, QueueError, Tag, Wait};
use tracing::{info, warn};

use crate::envelope::BodyLayout;
use crate::error::{FrameError, Result};
use crate::tag::{DATA_TAG, SIZE_TAG};

const FALLBACK_BUFFER: usize = 64 * 1024;

/// Filler byte for compensating bodies. Never valid as the first byte of a
/// MessagePack value (reserved marker) nor anywhere in UTF-8 JSON text.
pub const COMPENSATION_FILLER: u8 = 0xC1;

/// Counts of messages removed by [`drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub envelopes: usize,
    pub bodies: usize,
    /// Total text bytes removed.
    pub bytes: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.envelopes == 0 && self.bodies == 0
    }
}

/// Remove every pending envelope and body without blocking.
///
/// Messages under other tags are left alone.
pub fn drain<Q>(queue: &Q) -> Result<DrainReport>
where
    Q: MessageQueue + ?Sized,
{
    let max_len = match queue.control(ControlCommand::Info) {
        Ok(ControlReply::Info(info)) => usize::try_from(info.max_message_size)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(FALLBACK_BUFFER),
        _ => FALLBACK_BUFFER,
    };

    let mut report = DrainReport::default();
    let (envelopes, bytes) = drain_tag(queue, SIZE_TAG, max_len)?;
    report.envelopes = envelopes;
    report.bytes += bytes;
    let (bodies, bytes) = drain_tag(queue, DATA_TAG, max_len)?;
    report.bodies = bodies;
    report.bytes += bytes;

    if report.is_empty() {
        info!("drain found no protocol messages");
    } else {
        warn!(
            envelopes = report.envelopes,
            bodies = report.bodies,
            bytes = report.bytes,
            "drained protocol messages"
        );
    }
    Ok(report)
}

fn drain_tag<Q>(queue: &Q, tag: Tag, max_len: usize) -> Result<(usize, usize)>
where
    Q: MessageQueue + ?Sized,
{
    let (mut count, mut bytes) = (0, 0);
    loop {
        match queue.dequeue(tag, max_len, Wait::NoWait) {
            Ok(text) => {
                count += 1;
                bytes += text.len();
            }
            Err(QueueError::Empty { .. }) => return Ok((count, bytes)),
            Err(err) => return Err(FrameError::Queue(err)),
        }
    }
}

/// Enqueue a filler body of `declared` bytes for an orphaned envelope.
///
/// The receiver then fails to decode one transfer instead of pairing the
/// envelope with the next sender's body. Returns the body bytes enqueued.
pub fn send_compensating_body<Q>(
    queue: &Q,
    declared: usize,
    layout: BodyLayout,
    wait: Wait,
) -> Result<usize>
where
    Q: MessageQueue + ?Sized,
{
    let filler = vec![COMPENSATION_FILLER; declared];
    let mut sent = 0;
    for chunk in layout.split(&filler) {
        sent += queue
            .enqueue(DATA_TAG, chunk, wait)
            .map_err(|source| FrameError::PartialSend {
                declared,
                sent,
                source,
            })?;
    }
    warn!(declared, "enqueued compensating body");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use msgqprims_queue::MemoryQueue;

    use super::*;
    use crate::deframer::Deframer;
    use crate::envelope::ENVELOPE_TEXT_LEN;
    use crate::framer::Framer;
    use crate::payload::{JsonCodec, PayloadCodec};
    use crate::testing::FaultyQueue;

    #[test]
    fn drain_after_partial_send() {
        let q = FaultyQueue::failing_after(DATA_TAG, 1);
        let framer = Framer::new(JsonCodec);
        framer.send(&q, Wait::Block, "first").unwrap();
        assert!(framer.send(&q, Wait::Block, "second").is_err());
        q.inner.enqueue(9, b"user", Wait::Block).unwrap();

        let report = drain(&q).unwrap();
        assert_eq!(report.envelopes, 2);
        assert_eq!(report.bodies, 1);
        assert_eq!(report.bytes, 2 * ENVELOPE_TEXT_LEN + 7);
        assert_eq!(q.inner.len(), 1);
        assert_eq!(q.inner.pending(9), 1);
    }

    #[test]
    fn drain_empty_queue() {
        let q = MemoryQueue::new();
        let report = drain(&q).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn drain_removed_queue_fails() {
        let q = MemoryQueue::new();
        q.control(ControlCommand::Remove).unwrap();
        let err = drain(&q).unwrap_err();
        assert!(matches!(err, FrameError::Queue(QueueError::Removed)));
    }

    #[test]
    fn compensation_resynchronizes() {
        let q = FaultyQueue::failing_after(DATA_TAG, 0);
        let framer = Framer::new(JsonCodec);
        let err = framer.send(&q, Wait::Block, "lost").unwrap_err();
        let FrameError::PartialSend { declared, .. } = err else {
            panic!("expected partial send, got {err:?}");
        };

        assert_eq!(
            send_compensating_body(&q.inner, declared, BodyLayout::Single, Wait::Block).unwrap(),
            declared
        );
        framer.send(&q.inner, Wait::Block, "next").unwrap();

        let deframer = Deframer::new(JsonCodec);
        let err = deframer.receive::<_, String>(&q.inner, Wait::Block).unwrap_err();
        assert!(matches!(err, FrameError::Decoding { .. }));
        let next: String = deframer.receive(&q.inner, Wait::Block).unwrap();
        assert_eq!(next, "next");
    }

    #[cfg(feature = "msgpack")]
    #[test]
    fn msgpack_compensation_does_not_decode() {
        use serde_json::{json, Value};

        use crate::payload::MsgPackCodec;

        let q = FaultyQueue::failing_after(DATA_TAG, 0);
        let framer = Framer::new(MsgPackCodec);
        let err = framer.send(&q, Wait::Block, &json!({"id": 7})).unwrap_err();
        let FrameError::PartialSend { declared, .. } = err else {
            panic!("expected partial send, got {err:?}");
        };

        send_compensating_body(&q.inner, declared, BodyLayout::Single, Wait::Block).unwrap();
        framer.send(&q.inner, Wait::Block, &json!({"id": 8})).unwrap();

        let deframer = Deframer::new(MsgPackCodec);
        let err = deframer.receive::<_, Value>(&q.inner, Wait::Block).unwrap_err();
        assert!(matches!(err, FrameError::Decoding { codec: "msgpack", .. }));
        let next: Value = deframer.receive(&q.inner, Wait::Block).unwrap();
        assert_eq!(next, json!({"id": 8}));
    }

    #[test]
    fn filler_is_never_valid_json() {
        for len in [0, 1, 2, 8, 64] {
            let filler = vec![COMPENSATION_FILLER; len];
            assert!(JsonCodec.decode::<serde_json::Value>(&filler).is_err());
        }
    }

    #[test]
    fn drain_after_oversized_envelope_restores_transfers() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);
        framer.send(&q, Wait::Block, &"x".repeat(100)).unwrap();
        let deframer = Deframer::with_config(
            JsonCodec,
            crate::envelope::FrameConfig::default().with_max_payload_size(16),
        );
        let err = deframer.receive_bytes(&q, Wait::NoWait).unwrap_err();
        assert!(err.is_desynchronized());

        let report = drain(&q).unwrap();
        assert_eq!((report.envelopes, report.bodies), (0, 1));

        framer.send(&q, Wait::Block, "ok").unwrap();
        let next: String = deframer.receive(&q, Wait::NoWait).unwrap();
        assert_eq!(next, "ok");
    }

    #[test]
    fn chunked_compensation() {
        let q = MemoryQueue::new();
        let sent = send_compensating_body(&q, 10, BodyLayout::chunked(4), Wait::Block).unwrap();
        assert_eq!(sent, 10);
        assert_eq!(q.pending(DATA_TAG), 3);
    }
}
