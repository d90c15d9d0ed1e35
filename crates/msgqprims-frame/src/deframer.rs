use bytes::{Bytes, BytesMut};
use msgqprims_queue::{MessageQueue, QueueError, Wait};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::envelope::{decode_envelope, BodyLayout, EnvelopeWait, FrameConfig, ENVELOPE_TEXT_LEN};
use crate::error::{FrameError, Result};
use crate::payload::PayloadCodec;
use crate::tag::{DATA_TAG, SIZE_TAG};

/// Receives values sent by a [`Framer`](crate::Framer).
///
/// Each call consumes exactly one envelope and the body it announces.
/// A value is decoded only after the whole body has been read, so callers
/// never see a partial value.
#[derive(Debug, Clone)]
pub struct Deframer<C> {
    codec: C,
    config: FrameConfig,
}

impl<C: PayloadCodec> Deframer<C> {
    /// Create a deframer with default configuration.
    pub fn new(codec: C) -> Self {
        Self::with_config(codec, FrameConfig::default())
    }

    /// Create a deframer with explicit configuration.
    pub fn with_config(codec: C, config: FrameConfig) -> Self {
        Self { codec, config }
    }

    /// Receive and decode the next value.
    pub fn receive<Q, T>(&self, queue: &Q, wait: Wait) -> Result<T>
    where
        Q: MessageQueue + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.receive_bytes(queue, wait)?;
        self.codec
            .decode(&payload)
            .map_err(|source| FrameError::Decoding {
                codec: self.codec.name(),
                source,
            })
    }

    /// Receive the next payload without decoding it.
    ///
    /// `wait` always applies to the body. It applies to the envelope only
    /// with [`EnvelopeWait::FollowCaller`]; by default the envelope wait
    /// blocks, since the body buffer cannot be sized before it arrives.
    pub fn receive_bytes<Q>(&self, queue: &Q, wait: Wait) -> Result<Bytes>
    where
        Q: MessageQueue + ?Sized,
    {
        let envelope_wait = match self.config.envelope_wait {
            EnvelopeWait::Block => Wait::Block,
            EnvelopeWait::FollowCaller => wait,
        };
        let text = queue
            .dequeue(SIZE_TAG, ENVELOPE_TEXT_LEN, envelope_wait)
            .map_err(FrameError::from_queue)?;

        let declared = match decode_envelope(&text) {
            Ok(envelope) => envelope.size(),
            Err(err) => {
                warn!(error = %err, "discarded malformed envelope");
                return Err(err);
            }
        };
        if declared > self.config.max_payload_size {
            warn!(
                declared,
                max = self.config.max_payload_size,
                "envelope announces oversized body; body left in queue"
            );
            return Err(FrameError::OversizedEnvelope {
                declared,
                max: self.config.max_payload_size,
            });
        }

        let payload = match self.config.body {
            BodyLayout::Single => self.read_single(queue, declared, wait)?,
            BodyLayout::Chunked { .. } => self.read_chunked(queue, declared, wait)?,
        };

        debug!(size = declared, "received framed payload");
        Ok(payload)
    }

    fn read_single<Q>(&self, queue: &Q, declared: usize, wait: Wait) -> Result<Bytes>
    where
        Q: MessageQueue + ?Sized,
    {
        let body = queue
            .dequeue(DATA_TAG, declared, wait)
            .map_err(|err| body_error(declared, 0, err))?;
        if body.len() != declared {
            warn!(declared, actual = body.len(), "body shorter than envelope");
            return Err(FrameError::FramingMismatch {
                declared,
                actual: Some(body.len()),
            });
        }
        Ok(body)
    }

    fn read_chunked<Q>(&self, queue: &Q, declared: usize, wait: Wait) -> Result<Bytes>
    where
        Q: MessageQueue + ?Sized,
    {
        let mut buf = BytesMut::with_capacity(declared);
        loop {
            let remaining = declared - buf.len();
            let chunk = queue
                .dequeue(DATA_TAG, remaining, wait)
                .map_err(|err| body_error(declared, buf.len(), err))?;
            // An empty body can only terminate an empty transfer.
            if chunk.is_empty() && remaining > 0 {
                warn!(declared, received = buf.len(), "empty body chunk mid-transfer");
                return Err(FrameError::FramingMismatch {
                    declared,
                    actual: Some(buf.len()),
                });
            }
            buf.extend_from_slice(&chunk);
            if buf.len() == declared {
                return Ok(buf.freeze());
            }
        }
    }

    /// The codec this deframer decodes with.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Current deframer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn body_error(declared: usize, received: usize, err: QueueError) -> FrameError {
    match err {
        QueueError::TooBig { .. } => {
            warn!(declared, received, "body larger than envelope; left in queue");
            FrameError::FramingMismatch {
                declared,
                actual: None,
            }
        }
        source => {
            warn!(
                declared,
                received,
                error = %source,
                "body dequeue failed after envelope was consumed"
            );
            FrameError::PartialReceive {
                declared,
                received,
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use bytes::BytesMut;
    use msgqprims_queue::{MemoryQueue, QueueLimits};
    use serde_json::{json, Value};

    use super::*;
    use crate::envelope::{encode_envelope, Envelope};
    use crate::framer::Framer;
    use crate::payload::JsonCodec;
    use crate::testing::FaultyQueue;

    fn push_envelope(q: &MemoryQueue, size: usize) {
        let mut text = BytesMut::new();
        encode_envelope(Envelope::new(size).unwrap(), &mut text);
        q.enqueue(SIZE_TAG, &text, Wait::Block).unwrap();
    }

    #[test]
    fn scenario_object_roundtrip() {
        let q = MemoryQueue::new();
        let value = json!({"id": 7, "ok": true});

        Framer::new(JsonCodec).send(&q, Wait::Block, &value).unwrap();
        let received: Value = Deframer::new(JsonCodec).receive(&q, Wait::Block).unwrap();

        assert_eq!(received, value);
        assert!(q.is_empty());
    }

    #[test]
    fn typed_values_roundtrip() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);
        let deframer = Deframer::new(JsonCodec);

        framer.send(&q, Wait::Block, &Option::<u8>::None).unwrap();
        framer.send(&q, Wait::Block, &13i64).unwrap();
        framer.send(&q, Wait::Block, &2.0f64).unwrap();
        framer.send(&q, Wait::Block, &(1, 2, "foo", None::<u8>)).unwrap();
        framer.send(&q, Wait::Block, &vec![1, 7, 9, 13]).unwrap();

        assert_eq!(deframer.receive::<_, Option<u8>>(&q, Wait::Block).unwrap(), None);
        assert_eq!(deframer.receive::<_, i64>(&q, Wait::Block).unwrap(), 13);
        assert_eq!(deframer.receive::<_, f64>(&q, Wait::Block).unwrap(), 2.0);
        assert_eq!(
            deframer
                .receive::<_, (i32, i32, String, Option<u8>)>(&q, Wait::Block)
                .unwrap(),
            (1, 2, "foo".to_string(), None)
        );
        assert_eq!(
            deframer.receive::<_, Vec<i32>>(&q, Wait::Block).unwrap(),
            vec![1, 7, 9, 13]
        );
    }

    #[test]
    fn sequential_transfers_keep_order() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);
        let deframer = Deframer::new(JsonCodec);

        for i in 0..20u32 {
            framer.send(&q, Wait::Block, &format!("msg-{i}")).unwrap();
        }
        for i in 0..20u32 {
            let got: String = deframer.receive(&q, Wait::Block).unwrap();
            assert_eq!(got, format!("msg-{i}"));
        }
    }

    #[test]
    fn zero_length_payload() {
        let q = MemoryQueue::new();
        Framer::new(JsonCodec)
            .send_bytes(&q, Wait::Block, b"")
            .unwrap();

        let payload = Deframer::new(JsonCodec)
            .receive_bytes(&q, Wait::Block)
            .unwrap();
        assert!(payload.is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn unmatched_envelope_after_partial_send() {
        let q = FaultyQueue::failing_after(DATA_TAG, 0);
        let err = Framer::new(JsonCodec)
            .send(&q, Wait::Block, "lost")
            .unwrap_err();
        assert!(matches!(err, FrameError::PartialSend { .. }));

        let err = Deframer::new(JsonCodec)
            .receive::<_, String>(&q, Wait::NoWait)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::PartialReceive {
                declared: 6,
                received: 0,
                source: QueueError::Empty { .. },
            }
        ));
        assert!(q.inner.is_empty());
    }

    #[test]
    fn envelope_wait_blocks_by_default() {
        let q = Arc::new(MemoryQueue::new());
        q.enqueue(DATA_TAG, b"\"late\"", Wait::Block).unwrap();

        let receiver = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                Deframer::new(JsonCodec).receive::<_, String>(&*q, Wait::NoWait)
            })
        };

        thread::sleep(Duration::from_millis(20));
        push_envelope(&q, 6);
        assert_eq!(receiver.join().unwrap().unwrap(), "late");
    }

    #[test]
    fn envelope_follows_caller_when_configured() {
        let q = MemoryQueue::new();
        let deframer = Deframer::with_config(
            JsonCodec,
            FrameConfig::default().with_envelope_wait(EnvelopeWait::FollowCaller),
        );

        let err = deframer.receive_bytes(&q, Wait::NoWait).unwrap_err();
        assert!(matches!(err, FrameError::QueueEmpty));
        assert!(!err.is_desynchronized());
    }

    #[test]
    fn short_body_is_mismatch() {
        let q = MemoryQueue::new();
        push_envelope(&q, 10);
        q.enqueue(DATA_TAG, b"abc", Wait::Block).unwrap();

        let err = Deframer::new(JsonCodec)
            .receive_bytes(&q, Wait::NoWait)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::FramingMismatch {
                declared: 10,
                actual: Some(3)
            }
        ));
    }

    #[test]
    fn long_body_is_mismatch_and_stays_queued() {
        let q = MemoryQueue::new();
        push_envelope(&q, 3);
        q.enqueue(DATA_TAG, b"0123456789", Wait::Block).unwrap();

        let err = Deframer::new(JsonCodec)
            .receive_bytes(&q, Wait::NoWait)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::FramingMismatch {
                declared: 3,
                actual: None
            }
        ));
        assert_eq!(q.pending(DATA_TAG), 1);
    }

    #[test]
    fn malformed_envelope() {
        let q = MemoryQueue::new();
        q.enqueue(SIZE_TAG, b"\x01", Wait::Block).unwrap();

        let err = Deframer::new(JsonCodec)
            .receive_bytes(&q, Wait::NoWait)
            .unwrap_err();
        assert!(matches!(err, FrameError::MalformedEnvelope { .. }));
    }

    #[test]
    fn oversized_envelope_desynchronizes_queue() {
        let q = MemoryQueue::new();
        let framer = Framer::new(JsonCodec);
        framer.send(&q, Wait::Block, &"x".repeat(100)).unwrap();
        framer.send(&q, Wait::Block, "ok").unwrap();
        let deframer = Deframer::with_config(
            JsonCodec,
            FrameConfig::default().with_max_payload_size(16),
        );

        let err = deframer.receive_bytes(&q, Wait::NoWait).unwrap_err();
        assert!(matches!(
            err,
            FrameError::OversizedEnvelope {
                declared: 102,
                max: 16
            }
        ));
        assert!(err.is_desynchronized());
        assert_eq!(q.pending(SIZE_TAG), 1);
        assert_eq!(q.pending(DATA_TAG), 2);

        // The orphaned body now sits in front of the next transfer's body.
        let next = deframer.receive_bytes(&q, Wait::NoWait).unwrap_err();
        assert!(matches!(
            next,
            FrameError::FramingMismatch {
                declared: 4,
                actual: None
            }
        ));
    }

    #[test]
    fn decoding_failure_consumes_transfer() {
        let q = MemoryQueue::new();
        Framer::new(JsonCodec)
            .send_bytes(&q, Wait::Block, b"{not json")
            .unwrap();

        let err = Deframer::new(JsonCodec)
            .receive::<_, Value>(&q, Wait::Block)
            .unwrap_err();
        assert!(matches!(err, FrameError::Decoding { codec: "json", .. }));
        assert!(!err.is_desynchronized());
        assert!(q.is_empty());
    }

    #[test]
    fn chunked_payload_larger_than_queue() {
        let q = Arc::new(MemoryQueue::with_limits(QueueLimits::default()));
        let config = FrameConfig::default().with_body(BodyLayout::chunked(4096));
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();

        let sender = {
            let q = Arc::clone(&q);
            let payload = payload.clone();
            let framer = Framer::with_config(JsonCodec, config.clone());
            thread::spawn(move || framer.send_bytes(&*q, Wait::Block, &payload).unwrap())
        };

        let received = Deframer::with_config(JsonCodec, config)
            .receive_bytes(&*q, Wait::Block)
            .unwrap();
        assert_eq!(sender.join().unwrap(), payload.len());
        assert_eq!(received.as_ref(), payload.as_slice());
    }

    #[test]
    fn chunked_receiver_accepts_single_body() {
        let q = MemoryQueue::new();
        Framer::new(JsonCodec)
            .send_bytes(&q, Wait::Block, b"single body")
            .unwrap();

        let payload = Deframer::with_config(
            JsonCodec,
            FrameConfig::default().with_body(BodyLayout::chunked(4)),
        )
        .receive_bytes(&q, Wait::Block)
        .unwrap();
        assert_eq!(payload.as_ref(), b"single body");
    }

    #[test]
    fn single_receiver_rejects_chunked_body() {
        let q = MemoryQueue::new();
        Framer::with_config(
            JsonCodec,
            FrameConfig::default().with_body(BodyLayout::chunked(4)),
        )
        .send_bytes(&q, Wait::Block, b"abcdefgh")
        .unwrap();

        let err = Deframer::new(JsonCodec)
            .receive_bytes(&q, Wait::Block)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::FramingMismatch {
                declared: 8,
                actual: Some(4)
            }
        ));
    }

    #[test]
    fn chunked_empty_chunk_mid_transfer_is_mismatch() {
        let q = MemoryQueue::new();
        push_envelope(&q, 6);
        q.enqueue(DATA_TAG, b"abc", Wait::Block).unwrap();
        q.enqueue(DATA_TAG, b"", Wait::Block).unwrap();

        let err = Deframer::with_config(
            JsonCodec,
            FrameConfig::default().with_body(BodyLayout::chunked(3)),
        )
        .receive_bytes(&q, Wait::NoWait)
        .unwrap_err();
        assert!(matches!(
            err,
            FrameError::FramingMismatch {
                declared: 6,
                actual: Some(3)
            }
        ));
    }
}
