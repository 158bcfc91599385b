use std::ops::Deref;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use super::FrameId;
use crate::error::Result;
use crate::storage::FileId;
use crate::storage::PageNo;
use crate::storage::PAGE_SIZE;

/// Per-slot descriptor and the slot memory itself, kept in one struct so the
/// descriptor and the page bytes it describes can never go out of step.
///
/// The pool owns every transition: slots start invalid, are bound on a
/// fetch miss or an allocation, mutate through unpin and repeated fetches,
/// and return to invalid on eviction, dispose or file flush. An invalid
/// slot always has a zero pin count, a clear dirty bit and no owner file.
pub struct FrameData {
    /// Owning file of the current binding, None while unbound.
    pub file: Option<FileId>,
    /// Page number bound to this slot. Meaningless while invalid.
    pub page_no: PageNo,
    /// Outstanding holders preventing eviction.
    pub pin_count: u32,
    /// Contents modified since the last write-back.
    pub dirty: bool,
    /// Set on every access, consumed by the clock scan.
    pub ref_bit: bool,
    /// Whether the slot holds a live (file, page) binding.
    pub valid: bool,
    /// The page bytes, always exactly PAGE_SIZE long.
    pub data: Vec<u8>,
}

impl FrameData {
    fn new() -> Self {
        FrameData {
            file: None,
            page_no: 0,
            pin_count: 0,
            dirty: false,
            ref_bit: false,
            valid: false,
            data: vec![0; PAGE_SIZE],
        }
    }

    /// Bind the slot to (file, page_no) with a single outstanding pin, the
    /// state every fetch miss and allocation starts from.
    pub fn bind(&mut self, file: FileId, page_no: PageNo) {
        self.file = Some(file);
        self.page_no = page_no;
        self.pin_count = 1;
        self.dirty = false;
        self.ref_bit = true;
        self.valid = true;
    }

    /// Return the slot to the unbound state. Pin count, dirty and ref bits
    /// all drop; the page bytes stay behind until the next bind overwrites
    /// them.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_no = 0;
        self.pin_count = 0;
        self.dirty = false;
        self.ref_bit = false;
        self.valid = false;
    }
}

/// A pool slot: immutable frame identity plus the lock-protected descriptor
/// and page memory.
pub struct Frame {
    id: FrameId,
    inner: RwLock<FrameData>,
}

impl Frame {
    pub(crate) fn new(id: FrameId) -> Self {
        Frame { id, inner: RwLock::new(FrameData::new()) }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }
}

impl Deref for Frame {
    type Target = RwLock<FrameData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Non-owning, reference-counted view of a pinned page.
///
/// The pool exclusively owns the slot memory; a handle only grants guarded
/// access to it. While the pin taken out by the originating fetch or
/// allocation is outstanding, the eviction scan will never select the slot,
/// so the bytes behind the handle are stable. Callers pair every handle
/// with exactly one later unpin.
pub struct PageHandle {
    frame: Arc<Frame>,
    file: FileId,
    page_no: PageNo,
}

impl PageHandle {
    pub(crate) fn new(frame: Arc<Frame>, file: FileId, page_no: PageNo) -> Self {
        PageHandle { frame, file, page_no }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Slot this handle points into.
    pub fn frame_id(&self) -> FrameId {
        self.frame.id()
    }

    /// Shared access to the page bytes.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, FrameData>> {
        Ok(self.frame.read()?)
    }

    /// Exclusive access to the page bytes. Mutating them does not mark the
    /// page dirty; that happens at unpin.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, FrameData>> {
        Ok(self.frame.write()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_clear() {
        let frame = Frame::new(3);
        assert_eq!(3, frame.id());

        let mut data = frame.write().unwrap();
        assert!(!data.valid);
        assert_eq!(0, data.pin_count);

        data.bind(7, 42);
        assert!(data.valid);
        assert!(data.ref_bit);
        assert!(!data.dirty);
        assert_eq!(Some(7), data.file);
        assert_eq!(42, data.page_no);
        assert_eq!(1, data.pin_count);
        assert_eq!(PAGE_SIZE, data.data.len());

        data.dirty = true;
        data.clear();
        assert!(!data.valid);
        assert!(!data.dirty);
        assert!(!data.ref_bit);
        assert_eq!(None, data.file);
        assert_eq!(0, data.pin_count);
    }
}
