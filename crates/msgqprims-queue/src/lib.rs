//! Typed System V message queue handles.
//!
//! Provides a uniform interface over tagged, bounded, per-tag FIFO queues:
//! - System V kernel message queues (Linux)
//! - An in-process queue with the same delivery semantics
//!
//! This is the lowest layer of msgqprims. Framing builds on top of the
//! [`MessageQueue`] trait provided here.

pub mod control;
pub mod error;
pub mod flags;
pub mod memory;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod key;
#[cfg(target_os = "linux")]
pub mod sysv;

pub use control::{ControlCommand, ControlReply, QueueStats, SystemInfo};
pub use error::{QueueError, Result};
pub use flags::{OpenOptions, Wait};
pub use memory::{MemoryQueue, QueueLimits};
pub use traits::{MessageQueue, Tag};

#[cfg(target_os = "linux")]
pub use key::{derive_key, IpcKey};
#[cfg(target_os = "linux")]
pub use sysv::SysvQueue;
