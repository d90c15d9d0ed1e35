use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use msgqprims_queue::{MessageQueue, Wait};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::deframer::Deframer;
use crate::envelope::FrameConfig;
use crate::error::Result;
use crate::framer::Framer;
use crate::payload::PayloadCodec;

/// A queue handle that makes each transfer atomic with respect to other
/// transfers made through the same handle.
///
/// Senders share one lock and receivers another, so a send never waits
/// behind a blocked receive. Processes that reach the queue through a
/// different handle are not covered.
#[derive(Debug)]
pub struct GuardedQueue<Q, C> {
    queue: Q,
    framer: Framer<C>,
    deframer: Deframer<C>,
    send_lock: Mutex<()>,
    recv_lock: Mutex<()>,
}

impl<Q, C> GuardedQueue<Q, C>
where
    Q: MessageQueue,
    C: PayloadCodec + Clone,
{
    pub fn new(queue: Q, codec: C) -> Self {
        Self::with_config(queue, codec, FrameConfig::default())
    }

    pub fn with_config(queue: Q, codec: C, config: FrameConfig) -> Self {
        Self {
            queue,
            framer: Framer::with_config(codec.clone(), config.clone()),
            deframer: Deframer::with_config(codec, config),
            send_lock: Mutex::new(()),
            recv_lock: Mutex::new(()),
        }
    }

    /// Send one value; concurrent senders on this handle are serialized.
    pub fn send<T: Serialize + ?Sized>(&self, wait: Wait, value: &T) -> Result<usize> {
        let _guard = self.send_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.framer.send(&self.queue, wait, value)
    }

    pub fn send_bytes(&self, wait: Wait, payload: &[u8]) -> Result<usize> {
        let _guard = self.send_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.framer.send_bytes(&self.queue, wait, payload)
    }

    /// Receive one value; concurrent receivers on this handle are serialized.
    pub fn receive<T: DeserializeOwned>(&self, wait: Wait) -> Result<T> {
        let _guard = self.recv_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.deframer.receive(&self.queue, wait)
    }

    pub fn receive_bytes(&self, wait: Wait) -> Result<Bytes> {
        let _guard = self.recv_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.deframer.receive_bytes(&self.queue, wait)
    }

    /// The underlying queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn into_inner(self) -> Q {
        self.queue
    }
}
