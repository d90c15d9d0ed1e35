use bytes::BytesMut;
use msgqprims_queue::{MessageQueue, Wait};
use serde::Serialize;
use tracing::{debug, warn};

use crate::envelope::{encode_envelope, Envelope, FrameConfig, ENVELOPE_TEXT_LEN};
use crate::error::{FrameError, Result};
use crate::payload::PayloadCodec;
use crate::tag::{DATA_TAG, SIZE_TAG};

/// Sends values as one envelope message followed by their body.
///
/// Holds no per-transfer state; the queue is borrowed for each call. Two
/// framers sending on one queue at the same time can interleave their
/// envelopes and bodies; serialize them, or use
/// [`GuardedQueue`](crate::GuardedQueue).
#[derive(Debug, Clone)]
pub struct Framer<C> {
    codec: C,
    config: FrameConfig,
}

impl<C: PayloadCodec> Framer<C> {
    /// Create a framer with default configuration.
    pub fn new(codec: C) -> Self {
        Self::with_config(codec, FrameConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(codec: C, config: FrameConfig) -> Self {
        Self { codec, config }
    }

    /// Encode `value` and send it as one logical transfer.
    ///
    /// Returns the number of body bytes enqueued.
    pub fn send<Q, T>(&self, queue: &Q, wait: Wait, value: &T) -> Result<usize>
    where
        Q: MessageQueue + ?Sized,
        T: Serialize + ?Sized,
    {
        let payload = self
            .codec
            .encode(value)
            .map_err(|source| FrameError::Encoding {
                codec: self.codec.name(),
                source,
            })?;
        self.send_bytes(queue, wait, &payload)
    }

    /// Send an already-encoded payload as one logical transfer.
    pub fn send_bytes<Q>(&self, queue: &Q, wait: Wait, payload: &[u8]) -> Result<usize>
    where
        Q: MessageQueue + ?Sized,
    {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        let envelope = Envelope::new(payload.len())?;
        let chunks = self.config.body.split(payload);
        if let Some(limit) = queue.max_message_size() {
            let largest = chunks.iter().map(|chunk| chunk.len()).max().unwrap_or(0);
            if largest > limit {
                debug!(largest, limit, "body message over queue limit; nothing sent");
                return Err(FrameError::PayloadTooLarge {
                    size: largest,
                    max: limit,
                });
            }
        }

        let mut text = BytesMut::with_capacity(ENVELOPE_TEXT_LEN);
        encode_envelope(envelope, &mut text);
        queue
            .enqueue(SIZE_TAG, &text, wait)
            .map_err(FrameError::from_queue)?;

        let mut sent = 0usize;
        for chunk in &chunks {
            match queue.enqueue(DATA_TAG, chunk, wait) {
                Ok(n) => sent += n,
                Err(source) => {
                    warn!(
                        declared = envelope.size(),
                        sent,
                        error = %source,
                        "body enqueue failed after envelope; queue holds an unmatched envelope"
                    );
                    return Err(FrameError::PartialSend {
                        declared: envelope.size(),
                        sent,
                        source,
                    });
                }
            }
        }

        debug!(size = envelope.size(), chunks = chunks.len(), "sent framed payload");
        Ok(sent)
    }

    /// The codec this framer encodes with.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Current framer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use msgqprims_queue::{MemoryQueue, QueueError, QueueLimits};
    use serde_json::json;

    use super::*;
    use crate::envelope::{decode_envelope, BodyLayout};
    use crate::payload::JsonCodec;
    use crate::testing::FaultyQueue;

    fn next_envelope(q: &MemoryQueue) -> usize {
        let text = q.dequeue(SIZE_TAG, ENVELOPE_TEXT_LEN, Wait::NoWait).unwrap();
        decode_envelope(&text).unwrap().size()
    }

    #[test]
    fn envelope_then_body() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);
        let value = json!({"id": 7, "ok": true});

        let sent = framer.send(&q, Wait::Block, &value).unwrap();
        let encoded = serde_json::to_vec(&value).unwrap();

        assert_eq!(sent, encoded.len());
        assert_eq!(q.pending(SIZE_TAG), 1);
        assert_eq!(q.pending(DATA_TAG), 1);
        assert_eq!(next_envelope(&q), encoded.len());
        let body = q.dequeue(DATA_TAG, 1024, Wait::NoWait).unwrap();
        assert_eq!(body.as_ref(), encoded.as_slice());
    }

    #[test]
    fn envelope_size_matches_body_length() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);

        for text in ["", "a", "a longer string with some words in it"] {
            framer.send(&q, Wait::Block, text).unwrap();
            let declared = next_envelope(&q);
            let body = q.dequeue(DATA_TAG, 4096, Wait::NoWait).unwrap();
            assert_eq!(declared, body.len());
        }
    }

    #[test]
    fn zero_length_payload_sends_empty_body() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);

        assert_eq!(framer.send_bytes(&q, Wait::Block, b"").unwrap(), 0);
        assert_eq!(next_envelope(&q), 0);
        assert!(q.dequeue(DATA_TAG, 0, Wait::NoWait).unwrap().is_empty());
    }

    #[test]
    fn encoding_failure_enqueues_nothing() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);
        let mut unencodable = BTreeMap::new();
        unencodable.insert(vec![1u8, 2], "value");

        let err = framer.send(&q, Wait::Block, &unencodable).unwrap_err();
        assert!(matches!(err, FrameError::Encoding { codec: "json", .. }));
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_nowait_is_clean_noop() {
        let q = MemoryQueue::with_limits(QueueLimits {
            max_message_size: 16,
            max_queue_bytes: 16,
        });
        q.enqueue(1, &[0u8; 16], Wait::NoWait).unwrap();
        let framer = Framer::new(JsonCodec);

        let err = framer.send(&q, Wait::NoWait, &42).unwrap_err();
        assert!(matches!(err, FrameError::QueueFull));
        assert!(!err.is_desynchronized());
        assert_eq!(q.len(), 1);
        assert_eq!(q.pending(SIZE_TAG), 0);
    }

    #[test]
    fn body_failure_is_partial_send() {
        let q = FaultyQueue::failing_after(DATA_TAG, 0);
        let framer = Framer::new(JsonCodec);

        let err = framer.send(&q, Wait::Block, "payload").unwrap_err();
        assert!(matches!(
            err,
            FrameError::PartialSend {
                declared: 9,
                sent: 0,
                ..
            }
        ));
        assert!(err.is_desynchronized());
        assert_eq!(q.inner.pending(SIZE_TAG), 1);
        assert_eq!(q.inner.pending(DATA_TAG), 0);
    }

    #[test]
    fn body_full_is_partial_send_not_queue_full() {
        let q = MemoryQueue::with_limits(QueueLimits {
            max_message_size: 16,
            max_queue_bytes: 16,
        });
        let framer = Framer::new(JsonCodec);

        let err = framer
            .send_bytes(&q, Wait::NoWait, b"0123456789")
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::PartialSend {
                source: QueueError::Full,
                ..
            }
        ));
        assert_eq!(q.pending(SIZE_TAG), 1);
    }

    #[test]
    fn oversize_payload_rejected_before_enqueue() {
        let q = MemoryQueue::new();
        let framer = Framer::with_config(
            JsonCodec,
            FrameConfig::default().with_max_payload_size(4),
        );

        let err = framer.send_bytes(&q, Wait::Block, b"12345").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 5, max: 4 }));
        assert!(q.is_empty());
    }

    #[test]
    fn body_over_message_limit_rejected_before_envelope() {
        let q = MemoryQueue::with_limits(QueueLimits {
            max_message_size: 8,
            max_queue_bytes: 1024,
        });
        let framer = Framer::new(JsonCodec);

        let err = framer.send_bytes(&q, Wait::Block, b"123456789").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 8 }));
        assert!(!err.is_desynchronized());
        assert!(q.is_empty());
    }

    #[test]
    fn chunks_within_message_limit_are_sent() {
        let q = MemoryQueue::with_limits(QueueLimits {
            max_message_size: 8,
            max_queue_bytes: 1024,
        });
        let framer = Framer::with_config(
            JsonCodec,
            FrameConfig::default().with_body(BodyLayout::chunked(8)),
        );

        assert_eq!(framer.send_bytes(&q, Wait::Block, b"123456789").unwrap(), 9);
        assert_eq!(next_envelope(&q), 9);
        assert_eq!(q.pending(DATA_TAG), 2);
    }

    #[test]
    fn chunked_body_sends_sequence() {
        let q = MemoryQueue::new();
        let framer = Framer::with_config(
            JsonCodec,
            FrameConfig::default().with_body(BodyLayout::chunked(4)),
        );

        assert_eq!(framer.send_bytes(&q, Wait::Block, b"abcdefghij").unwrap(), 10);
        assert_eq!(next_envelope(&q), 10);
        assert_eq!(q.pending(DATA_TAG), 3);
    }

    #[test]
    fn chunked_partial_send_reports_progress() {
        let q = FaultyQueue::failing_after(DATA_TAG, 2);
        let framer = Framer::with_config(
            JsonCodec,
            FrameConfig::default().with_body(BodyLayout::chunked(4)),
        );

        let err = framer
            .send_bytes(&q, Wait::Block, b"abcdefghij")
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::PartialSend {
                declared: 10,
                sent: 8,
                ..
            }
        ));
    }

    #[test]
    fn envelope_failure_is_queue_error() {
        let q = FaultyQueue::failing_after(SIZE_TAG, 0);
        let framer = Framer::new(JsonCodec);

        let err = framer.send(&q, Wait::Block, &1).unwrap_err();
        assert!(matches!(err, FrameError::Queue(QueueError::Io(_))));
        assert!(q.inner.is_empty());
    }
}
