//! Envelope/body framing of arbitrarily large values over message queues.
//!
//! This is the core value-add layer of msgqprims. Every value travels as:
//! - An envelope message under [`SIZE_TAG`] carrying the body length as a
//!   native C `int`
//! - One body message (or a chunk sequence) under [`DATA_TAG`] carrying the
//!   codec-encoded payload
//!
//! Receivers learn the exact body size before reading it. No partial values
//! reach user code; partial transfers surface as distinct errors.

pub mod deframer;
pub mod envelope;
pub mod error;
pub mod framer;
pub mod guarded;
pub mod payload;
pub mod recovery;
pub mod tag;

#[cfg(test)]
mod testing;

pub use deframer::Deframer;
pub use envelope::{
    decode_envelope, encode_envelope, BodyLayout, Envelope, EnvelopeWait, FrameConfig,
    DEFAULT_MAX_PAYLOAD, ENVELOPE_TEXT_LEN, MAX_ENVELOPE_SIZE,
};
pub use error::{FrameError, Result};
pub use framer::Framer;
pub use guarded::GuardedQueue;
#[cfg(feature = "msgpack")]
pub use payload::MsgPackCodec;
pub use payload::{CodecError, JsonCodec, PayloadCodec};
pub use recovery::{drain, send_compensating_body, DrainReport, COMPENSATION_FILLER};
pub use tag::{is_protocol_tag, tag_name, DATA_TAG, SIZE_TAG};
