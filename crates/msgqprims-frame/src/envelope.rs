use std::ffi::{c_int, c_long};
use std::mem::size_of;
use std::num::NonZeroUsize;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Native layout of an envelope message: `struct { long mtype; int size; }`.
///
/// Only used to derive [`ENVELOPE_TEXT_LEN`]; the type field travels
/// separately as the message tag.
#[repr(C)]
#[allow(dead_code)]
struct EnvelopeLayout {
    mtype: c_long,
    size: c_int,
}

/// Text length of an envelope message: the native struct minus its type
/// field, tail padding included (8 bytes on LP64 targets).
pub const ENVELOPE_TEXT_LEN: usize = size_of::<EnvelopeLayout>() - size_of::<c_long>();

/// Largest payload an envelope can announce.
pub const MAX_ENVELOPE_SIZE: usize = c_int::MAX as usize;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Size announcement preceding a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    size: usize,
}

impl Envelope {
    /// Create an envelope, rejecting sizes the native `int` field cannot carry.
    pub fn new(size: usize) -> Result<Self> {
        if size > MAX_ENVELOPE_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: MAX_ENVELOPE_SIZE,
            });
        }
        Ok(Self { size })
    }

    /// Exact byte length of the body that follows.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Encode an envelope's message text.
///
/// Wire format (native endianness, as the C struct lays it out):
/// ```text
/// ┌────────────────┬──────────────────────────┐
/// │ size (C int)   │ struct tail padding (0s) │
/// └────────────────┴──────────────────────────┘
/// ```
pub fn encode_envelope(envelope: Envelope, dst: &mut BytesMut) {
    dst.reserve(ENVELOPE_TEXT_LEN);
    dst.put_i32_ne(envelope.size as c_int);
    dst.put_bytes(0, ENVELOPE_TEXT_LEN - size_of::<c_int>());
}

/// Decode an envelope's message text.
///
/// Trailing bytes beyond the `int` field are padding and ignored.
pub fn decode_envelope(mut src: &[u8]) -> Result<Envelope> {
    if src.len() < size_of::<c_int>() {
        return Err(FrameError::MalformedEnvelope {
            reason: format!("{} bytes, need at least {}", src.len(), size_of::<c_int>()),
        });
    }
    let size = src.get_i32_ne();
    let size = usize::try_from(size).map_err(|_| FrameError::MalformedEnvelope {
        reason: format!("negative size {size}"),
    })?;
    Envelope::new(size)
}

/// How a payload is carried after its envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyLayout {
    /// Exactly one body message of the announced size.
    #[default]
    Single,
    /// Consecutive body messages of at most `chunk_size` bytes each.
    ///
    /// An empty payload is still carried by one empty body message.
    Chunked { chunk_size: NonZeroUsize },
}

impl BodyLayout {
    /// Chunked layout, or `Single` when `chunk_size` is zero.
    pub fn chunked(chunk_size: usize) -> Self {
        match NonZeroUsize::new(chunk_size) {
            Some(chunk_size) => Self::Chunked { chunk_size },
            None => Self::Single,
        }
    }

    /// Split a payload into body message texts.
    pub fn split<'a>(&self, payload: &'a [u8]) -> Vec<&'a [u8]> {
        match self {
            Self::Chunked { chunk_size } if !payload.is_empty() => {
                payload.chunks(chunk_size.get()).collect()
            }
            _ => vec![payload],
        }
    }
}

/// Blocking behavior of the envelope step on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeWait {
    /// Always block for the envelope; caller flags apply to the body only.
    #[default]
    Block,
    /// Apply the caller's wait mode to the envelope step as well.
    FollowCaller,
}

/// Configuration shared by framers and deframers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Body layout used when sending and expected when receiving.
    pub body: BodyLayout,
    /// Envelope wait behavior on receive.
    pub envelope_wait: EnvelopeWait,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            body: BodyLayout::Single,
            envelope_wait: EnvelopeWait::Block,
        }
    }
}

impl FrameConfig {
    /// Builder: maximum payload size.
    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Builder: body layout.
    pub fn with_body(mut self, body: BodyLayout) -> Self {
        self.body = body;
        self
    }

    /// Builder: envelope wait behavior.
    pub fn with_envelope_wait(mut self, envelope_wait: EnvelopeWait) -> Self {
        self.envelope_wait = envelope_wait;
        self
    }
}
