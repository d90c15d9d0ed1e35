//! Framed value transfer over System V message queues.
//!
//! msgqprims sends arbitrarily large serialized values through kernel
//! message queues as an envelope announcing the size followed by the body,
//! so the receiver can size its buffer before reading.
//!
//! # Crate Structure
//!
//! - [`queue`] - Tagged message queue handles (System V, in-memory)
//! - [`frame`] - Envelope/body framing, codecs, guarded access and recovery

/// Re-export queue types.
pub mod queue {
    pub use msgqprims_queue::*;
}

/// Re-export frame types.
pub mod frame {
    pub use msgqprims_frame::*;
}
