use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use log::debug;
use log::error;

use super::clock::ClockEvictor;
use super::frame::Frame;
use super::frame::PageHandle;
use super::index::FrameIndex;
use super::index::HashFrameIndex;
use super::FrameId;
use crate::config::Config;
use crate::error::Error;
use crate::error::Result;
use crate::storage::new_store;
use crate::storage::FileId;
use crate::storage::PageNo;
use crate::storage::PageStore;
use crate::storage::PAGE_SIZE;

/// Point-in-time view of one slot, for operator and debug tooling. Not used
/// by any correctness path.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStat {
    pub frame_id: FrameId,
    pub binding: Option<(FileId, PageNo)>,
    pub pin_count: u32,
    pub dirty: bool,
    pub valid: bool,
}

/// The buffer pool core.
///
/// It mediates all page access through a fixed array of page-sized slots,
/// the frame index mapping resident (file, page) pairs to slots, and the
/// clock evictor that owns the scan cursor. The pool is single-threaded and
/// non-reentrant; no operation suspends mid-mutation. Concurrent access
/// goes through [`BufferPoolManager`].
struct BufferPool {
    store: Box<dyn PageStore>,
    /// Slot memory and descriptors, index-aligned with frame ids.
    frames: Vec<Arc<Frame>>,
    /// Resident bindings. For every valid slot there is exactly one entry
    /// pointing at it, and no two valid slots share a binding.
    index: Box<dyn FrameIndex>,
    clock: ClockEvictor,
}

impl BufferPool {
    fn new(store: Box<dyn PageStore>, pool_size: usize) -> Self {
        let frames = (0..pool_size).map(|i| Arc::new(Frame::new(i))).collect();
        BufferPool {
            store,
            frames,
            index: Box::new(HashFrameIndex::new()),
            clock: ClockEvictor::new(pool_size),
        }
    }

    /// Fetch the page, reading it from the store if it is not resident.
    ///
    /// A hit bumps the pin count and reference bit. A miss claims a slot
    /// from the clock scan and populates it; nothing is registered in the
    /// index until the page image is safely in memory, so a failed read
    /// leaves no binding behind.
    fn fetch_page(&mut self, file: FileId, page_no: PageNo) -> Result<PageHandle> {
        // found-at-slot is the only thing that counts as residency; index
        // failures surface on their own and never masquerade as a miss
        if let Some(frame_id) = self.index.lookup(file, page_no) {
            let frame = Arc::clone(&self.frames[frame_id]);
            let mut desc = frame.write()?;
            desc.ref_bit = true;
            desc.pin_count += 1;
            drop(desc);
            return Ok(PageHandle::new(frame, file, page_no));
        }

        let frame_id = self.clock.find_victim(&self.frames)?;
        self.evict(frame_id)?;

        let image = self.store.read_page(file, page_no)?;
        if image.len() != PAGE_SIZE {
            return Err(Error::Storage(format!(
                "short read of page {} in file {}: {} bytes",
                page_no,
                file,
                image.len()
            )));
        }
        self.index.insert(file, page_no, frame_id)?;

        let frame = Arc::clone(&self.frames[frame_id]);
        let mut desc = frame.write()?;
        desc.data.copy_from_slice(&image);
        desc.bind(file, page_no);
        drop(desc);
        Ok(PageHandle::new(frame, file, page_no))
    }

    /// Release one pin. `dirty` marks the page as modified; the mark is
    /// sticky and only a write-back or invalidation clears it.
    fn unpin_page(&mut self, file: FileId, page_no: PageNo, dirty: bool) -> Result<()> {
        let frame_id = match self.index.lookup(file, page_no) {
            Some(frame_id) => frame_id,
            None => return Err(Error::PageNotFound(file, page_no)),
        };
        let mut desc = self.frames[frame_id].write()?;
        if desc.pin_count == 0 {
            return Err(Error::NotPinned(file, page_no));
        }
        desc.pin_count -= 1;
        if dirty {
            desc.dirty = true;
        }
        Ok(())
    }

    /// Allocate a fresh page in `file` and bind it to a slot. The page is
    /// logically empty: the slot memory is zeroed and no disk read happens.
    fn allocate_page(&mut self, file: FileId) -> Result<PageHandle> {
        let page_no = self.store.allocate_page(file)?;
        let frame_id = self.clock.find_victim(&self.frames)?;
        self.evict(frame_id)?;
        self.index.insert(file, page_no, frame_id)?;

        let frame = Arc::clone(&self.frames[frame_id]);
        let mut desc = frame.write()?;
        desc.data.fill(0);
        desc.bind(file, page_no);
        drop(desc);
        Ok(PageHandle::new(frame, file, page_no))
    }

    /// Drop the page from the pool and the store.
    ///
    /// A resident binding is torn down unconditionally, pinned or not, with
    /// no write-back: disposal is a destructive override, and callers are
    /// responsible for not disposing pages others still hold.
    fn dispose_page(&mut self, file: FileId, page_no: PageNo) -> Result<()> {
        if let Some(frame_id) = self.index.lookup(file, page_no) {
            let mut desc = self.frames[frame_id].write()?;
            desc.clear();
            drop(desc);
            self.index.remove(file, page_no);
        }
        self.store.dispose_page(file, page_no)
    }

    /// Write back and drop every resident page of `file`.
    ///
    /// Aborts with PagePinned at the first pinned slot; slots handled
    /// before it stay written back and invalidated.
    fn flush_file(&mut self, file: FileId) -> Result<()> {
        debug!("flushing file {}", file);
        for frame_id in 0..self.frames.len() {
            let frame = Arc::clone(&self.frames[frame_id]);
            let mut desc = frame.write()?;
            if desc.valid && desc.file == Some(file) {
                if desc.pin_count > 0 {
                    return Err(Error::PagePinned(file, desc.page_no));
                }
                if desc.dirty {
                    self.store.write_page(file, desc.page_no, &desc.data)?;
                    desc.dirty = false;
                }
                self.index.remove(file, desc.page_no);
                desc.clear();
            } else if !desc.valid && desc.file == Some(file) {
                return Err(Error::BadBuffer(frame_id));
            }
        }
        Ok(())
    }

    fn stats(&self) -> Result<Vec<FrameStat>> {
        let mut stats = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let desc = frame.read()?;
            stats.push(FrameStat {
                frame_id: frame.id(),
                binding: if desc.valid { desc.file.map(|file| (file, desc.page_no)) } else { None },
                pin_count: desc.pin_count,
                dirty: desc.dirty,
                valid: desc.valid,
            });
        }
        Ok(stats)
    }

    /// Prepare a slot returned by the clock scan for reuse.
    ///
    /// A valid victim loses its index binding before the dirty write-back.
    /// A failed write-back leaves the slot unbound but intact, with its
    /// data and dirty mark, and fails the surrounding call; teardown or a
    /// later eviction retries the write.
    fn evict(&mut self, frame_id: FrameId) -> Result<()> {
        let frame = Arc::clone(&self.frames[frame_id]);
        let mut desc = frame.write()?;
        if !desc.valid {
            return Ok(());
        }
        let file = match desc.file {
            Some(file) => file,
            None => return Err(Error::BadBuffer(frame_id)),
        };
        self.index.remove(file, desc.page_no);
        if desc.dirty {
            debug!("writing back page {} of file {} from frame {}", desc.page_no, file, frame_id);
            self.store.write_page(file, desc.page_no, &desc.data)?;
        }
        desc.clear();
        Ok(())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // a clean shutdown must not lose dirty pages
        for frame in &self.frames {
            let desc = match frame.read() {
                Ok(desc) => desc,
                Err(err) => {
                    error!("teardown skipping poisoned frame: {}", err);
                    continue;
                }
            };
            if desc.valid && desc.dirty {
                if let Some(file) = desc.file {
                    debug!("teardown writing back page {} of file {}", desc.page_no, file);
                    if let Err(err) = self.store.write_page(file, desc.page_no, &desc.data) {
                        error!(
                            "teardown write-back of page {} of file {} failed: {}",
                            desc.page_no, file, err
                        );
                    }
                }
            }
        }
    }
}

/// Buffer pool manager wrapping the pool with a mutex for concurrent
/// access; all the heavy lifting happens in the buffer pool.
///
/// The one lock serializes the eviction scan, index mutation and descriptor
/// transitions, so every check-then-mutate sequence runs as a single
/// critical section. No ordering is promised across concurrent callers
/// beyond mutual exclusion.
pub struct BufferPoolManager {
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(store: Box<dyn PageStore>, pool_size: usize) -> Self {
        let inner = BufferPool::new(store, pool_size);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Build a pool from runtime configuration.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let store = new_store(cfg.storage_type, Path::new(&cfg.data_dir))?;
        Ok(Self::new(store, cfg.pool_size))
    }

    /// Fetch the page, reading it from the store if it is not resident.
    pub fn fetch_page(&self, file: FileId, page_no: PageNo) -> Result<PageHandle> {
        let mut inner = self.inner.lock()?;
        inner.fetch_page(file, page_no)
    }

    /// Release one pin, optionally marking the page dirty.
    pub fn unpin_page(&self, file: FileId, page_no: PageNo, dirty: bool) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.unpin_page(file, page_no, dirty)
    }

    /// Allocate a fresh, zeroed page in `file` and pin it.
    pub fn allocate_page(&self, file: FileId) -> Result<PageHandle> {
        let mut inner = self.inner.lock()?;
        inner.allocate_page(file)
    }

    /// Drop the page from the pool and the store, pinned or not.
    pub fn dispose_page(&self, file: FileId, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.dispose_page(file, page_no)
    }

    /// Write back and drop every resident page of `file`.
    pub fn flush_file(&self, file: FileId) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_file(file)
    }

    /// Per-slot occupancy, pin count and validity.
    pub fn stats(&self) -> Result<Vec<FrameStat>> {
        let inner = self.inner.lock()?;
        inner.stats()
    }
}
