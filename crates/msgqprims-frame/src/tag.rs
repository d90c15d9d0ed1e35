//! Reserved message tags.
//!
//! Every sender and receiver speaking the protocol on a queue must agree on
//! these values; the kernel demultiplexes strictly by tag.

use msgqprims_queue::Tag;

/// Envelope messages announcing the size of the following body.
pub const SIZE_TAG: Tag = 2;

/// Body messages carrying the payload.
pub const DATA_TAG: Tag = 3;

const _: () = assert!(SIZE_TAG != DATA_TAG);

/// Returns a human-readable name for a tag.
pub fn tag_name(tag: Tag) -> &'static str {
    match tag {
        SIZE_TAG => "SIZE",
        DATA_TAG => "DATA",
        t if t > 0 => "USER",
        _ => "SELECTOR",
    }
}

/// Returns true if the tag is reserved by the framing protocol.
pub fn is_protocol_tag(tag: Tag) -> bool {
    tag == SIZE_TAG || tag == DATA_TAG
}
