use std::ffi::{c_int, c_long, c_ushort, c_void};
use std::mem::{size_of, MaybeUninit};

use bytes::Bytes;
use tracing::{debug, info};

use crate::control::{ControlCommand, ControlReply, QueueStats, SystemInfo};
use crate::error::{QueueError, Result};
use crate::flags::{OpenOptions, Wait};
use crate::key::IpcKey;
use crate::traits::{MessageQueue, Tag};

const TYPE_FIELD_LEN: usize = size_of::<c_long>();

/// Kernel message buffer: a native `long` type followed by the message text.
///
/// Backed by `c_long` words so the type field is naturally aligned and the
/// text starts right after it, exactly as `struct msgbuf` lays it out.
struct MessageBuffer {
    words: Vec<c_long>,
    text_len: usize,
}

impl MessageBuffer {
    fn with_text_capacity(text_len: usize) -> Self {
        Self {
            words: vec![0; 1 + text_len.div_ceil(TYPE_FIELD_LEN)],
            text_len,
        }
    }

    fn outgoing(tag: Tag, text: &[u8]) -> Self {
        let mut buf = Self::with_text_capacity(text.len());
        buf.words[0] = tag;
        buf.text_mut().copy_from_slice(text);
        buf
    }

    fn tag(&self) -> Tag {
        self.words[0]
    }

    fn text(&self, len: usize) -> &[u8] {
        let len = len.min(self.text_len);
        // SAFETY: `words` holds one type word plus at least `text_len` bytes of
        // initialized storage after it, and `len <= text_len`.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().add(1).cast::<u8>(), len) }
    }

    fn text_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `text`; the mutable borrow of `self` guarantees exclusivity.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.words.as_mut_ptr().add(1).cast::<u8>(),
                self.text_len,
            )
        }
    }
}

/// `struct msginfo`, filled by `msgctl(IPC_INFO)`.
#[repr(C)]
#[derive(Debug, Default)]
struct MsgInfo {
    msgpool: c_int,
    msgmap: c_int,
    msgmax: c_int,
    msgmnb: c_int,
    msgmni: c_int,
    msgssz: c_int,
    msgtql: c_int,
    msgseg: c_ushort,
}

/// A System V kernel message queue.
///
/// The handle is a plain identifier: copying it does not duplicate the
/// queue, and dropping it does not remove the queue. Use
/// [`SysvQueue::remove`] or [`ControlCommand::Remove`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysvQueue {
    id: i32,
}

impl SysvQueue {
    /// Open (or create, per `options`) the queue bound to `key` (`msgget`).
    pub fn open(key: IpcKey, options: &OpenOptions) -> Result<Self> {
        // SAFETY: msgget takes plain integers and has no memory side effects.
        let id = unsafe { libc::msgget(key.as_raw(), options.to_flags()) };
        if id == -1 {
            return Err(QueueError::Open {
                key: key.as_raw(),
                source: std::io::Error::last_os_error(),
            });
        }
        info!(id, %key, create = options.create, "opened message queue");
        Ok(Self { id })
    }

    /// Create a new private queue with the given permission bits.
    pub fn create_private(mode: u32) -> Result<Self> {
        Self::open(IpcKey::PRIVATE, &OpenOptions::new().create(true).mode(mode))
    }

    /// Wrap a known queue identifier without checking it.
    pub fn from_id(id: i32) -> Self {
        Self { id }
    }

    /// The kernel queue identifier.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Remove the queue from the system (`IPC_RMID`).
    pub fn remove(self) -> Result<()> {
        // SAFETY: IPC_RMID ignores the buffer argument.
        let rc = unsafe { libc::msgctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc == -1 {
            return Err(map_errno(std::io::Error::last_os_error()));
        }
        info!(id = self.id, "removed message queue");
        Ok(())
    }

    /// Queue attributes and counters (`IPC_STAT`).
    pub fn stat(&self) -> Result<QueueStats> {
        let mut ds = MaybeUninit::<libc::msqid_ds>::zeroed();
        // SAFETY: `ds` points to writable storage of the size msgctl expects.
        let rc = unsafe { libc::msgctl(self.id, libc::IPC_STAT, ds.as_mut_ptr()) };
        if rc == -1 {
            return Err(map_errno(std::io::Error::last_os_error()));
        }
        // SAFETY: zero-initialized and then filled by a successful IPC_STAT.
        let ds = unsafe { ds.assume_init() };

        Ok(QueueStats {
            uid: ds.msg_perm.uid,
            gid: ds.msg_perm.gid,
            creator_uid: ds.msg_perm.cuid,
            creator_gid: ds.msg_perm.cgid,
            mode: u32::from(ds.msg_perm.mode) & 0o777,
            message_count: ds.msg_qnum as u64,
            max_bytes: ds.msg_qbytes as u64,
            current_bytes: None,
            last_send_pid: ds.msg_lspid,
            last_recv_pid: ds.msg_lrpid,
            last_send_time: ds.msg_stime as i64,
            last_recv_time: ds.msg_rtime as i64,
            last_change_time: ds.msg_ctime as i64,
        })
    }

    /// System-wide queue limits (`IPC_INFO`).
    pub fn system_info() -> Result<SystemInfo> {
        let mut raw = MsgInfo::default();
        // SAFETY: IPC_INFO writes a `struct msginfo` through the buffer pointer;
        // `raw` has that exact C layout. The queue id is ignored.
        let rc = unsafe {
            libc::msgctl(
                0,
                libc::IPC_INFO,
                (&mut raw as *mut MsgInfo).cast::<libc::msqid_ds>(),
            )
        };
        if rc == -1 {
            return Err(map_errno(std::io::Error::last_os_error()));
        }

        let widen = |v: c_int| v.max(0) as u64;
        Ok(SystemInfo {
            max_message_size: widen(raw.msgmax),
            max_queue_bytes: widen(raw.msgmnb),
            max_queues: widen(raw.msgmni),
            pool_size: widen(raw.msgpool),
            map_entries: widen(raw.msgmap),
            segment_size: widen(raw.msgssz),
            max_headers: widen(raw.msgtql),
            max_segments: u64::from(raw.msgseg),
        })
    }
}

impl MessageQueue for SysvQueue {
    fn enqueue(&self, tag: Tag, text: &[u8], wait: Wait) -> Result<usize> {
        if tag <= 0 {
            return Err(QueueError::InvalidTag(tag));
        }
        let buf = MessageBuffer::outgoing(tag, text);

        // SAFETY: `buf` holds a type word followed by `text.len()` text bytes.
        let rc = unsafe {
            libc::msgsnd(
                self.id,
                buf.words.as_ptr().cast::<c_void>(),
                text.len(),
                wait.to_flags(),
            )
        };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EAGAIN) => QueueError::Full,
                _ => map_errno(err),
            });
        }

        debug!(id = self.id, tag, len = text.len(), "enqueued message");
        Ok(text.len())
    }

    fn dequeue(&self, tag: Tag, max_len: usize, wait: Wait) -> Result<Bytes> {
        let mut buf = MessageBuffer::with_text_capacity(max_len);

        // SAFETY: `buf` has room for a type word plus `max_len` text bytes.
        let received = unsafe {
            libc::msgrcv(
                self.id,
                buf.words.as_mut_ptr().cast::<c_void>(),
                max_len,
                tag,
                wait.to_flags(),
            )
        };
        if received == -1 {
            let err = std::io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::ENOMSG) => QueueError::Empty { tag },
                Some(libc::E2BIG) => QueueError::TooBig { max: max_len },
                _ => map_errno(err),
            });
        }

        let len = received as usize;
        debug!(id = self.id, tag = buf.tag(), len, "dequeued message");
        Ok(Bytes::copy_from_slice(buf.text(len)))
    }

    fn control(&self, command: ControlCommand) -> Result<ControlReply> {
        match command {
            ControlCommand::Remove => self.remove().map(|()| ControlReply::Removed),
            ControlCommand::Set => Err(QueueError::NotImplemented(command)),
            ControlCommand::Stat => self.stat().map(ControlReply::Stat),
            ControlCommand::Info => Self::system_info().map(ControlReply::Info),
        }
    }
}

fn map_errno(err: std::io::Error) -> QueueError {
    match err.raw_os_error() {
        Some(libc::EINTR) => QueueError::Interrupted,
        Some(libc::EIDRM) => QueueError::Removed,
        _ => QueueError::Io(err),
    }
}
