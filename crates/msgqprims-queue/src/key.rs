use std::ffi::CString;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::debug;

use crate::error::{QueueError, Result};
use crate::flags;

/// A System V IPC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpcKey(pub i32);

impl IpcKey {
    /// Request a new queue reachable only through its identifier (`IPC_PRIVATE`).
    pub const PRIVATE: IpcKey = IpcKey(flags::PRIVATE_KEY);

    /// The raw key value.
    pub fn as_raw(self) -> i32 {
        self.0
    }

    pub fn is_private(self) -> bool {
        self == Self::PRIVATE
    }
}

impl fmt::Display for IpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Derive a key from an existing pathname and a project identifier (`ftok`).
///
/// Only the low 8 bits of `project_id` are significant and they must not
/// all be zero.
pub fn derive_key(path: impl AsRef<Path>, project_id: i32) -> Result<IpcKey> {
    let path = path.as_ref();
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        QueueError::KeyDerivation {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path contains an interior NUL byte",
            ),
        }
    })?;

    if project_id & 0xff == 0 {
        return Err(QueueError::KeyDerivation {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "project id must have a non-zero low byte",
            ),
        });
    }

    // SAFETY: `cpath` is a valid NUL-terminated string that outlives the call.
    let key = unsafe { libc::ftok(cpath.as_ptr(), project_id) };
    if key == -1 {
        return Err(QueueError::KeyDerivation {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        });
    }

    let key = IpcKey(key);
    debug!(?path, project_id, %key, "derived ipc key");
    Ok(key)
}
