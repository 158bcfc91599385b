use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::PoisonError;

use config::ConfigError;

use crate::buffer::FrameId;
use crate::storage::FileId;
use crate::storage::PageNo;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the buffer pool and its collaborators.
///
/// Every error is returned to the immediate caller; this layer never retries
/// and never swallows a failure. Unflushed dirty pages or a double-used slot
/// are what silence would cost.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Underlying page storage I/O failure. Fatal to the current call.
    Storage(String),
    /// No evictable frame exists: every slot is pinned. The caller may retry
    /// once pins are released.
    BufferExceeded,
    /// The frame index failed an insert or remove it should have been able
    /// to perform. A structural fault, not an expected runtime error.
    Index(String),
    /// Unpin or flush addressed a page with no resident binding.
    PageNotFound(FileId, PageNo),
    /// Unpin called on a page with no outstanding pin.
    NotPinned(FileId, PageNo),
    /// Flush aborted because a page of the file is still pinned. Partial
    /// progress before the pinned slot is kept.
    PagePinned(FileId, PageNo),
    /// A frame descriptor was observed in an inconsistent state. Indicates a
    /// prior invariant breach; non-recoverable for that slot.
    BadBuffer(FrameId),
    Internal(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Storage(s) => write!(f, "storage error: {}", s),
            Error::BufferExceeded => write!(f, "buffer exceeded: all frames are pinned"),
            Error::Index(s) => write!(f, "frame index error: {}", s),
            Error::PageNotFound(file, page_no) => {
                write!(f, "page {} of file {} is not resident", page_no, file)
            }
            Error::NotPinned(file, page_no) => {
                write!(f, "page {} of file {} is not pinned", page_no, file)
            }
            Error::PagePinned(file, page_no) => {
                write!(f, "page {} of file {} is still pinned", page_no, file)
            }
            Error::BadBuffer(frame_id) => {
                write!(f, "frame {} is in an inconsistent state", frame_id)
            }
            Error::Internal(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::Internal(err.to_string())
    }
}
