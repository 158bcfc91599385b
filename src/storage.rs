use std::fmt::Debug;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

pub mod disk;
pub mod memory;

/// Stable identity of a data file. Comparable for the lifetime of any
/// binding that references it.
pub type FileId = u64;

/// Page number within a file.
pub type PageNo = u64;

/// Size of a data page in bytes. Fixed and identical across all files and
/// all buffer pool slots.
pub const PAGE_SIZE: usize = 4096;

/// Durable fixed-size-block storage, keyed by file id and page number.
///
/// The buffer pool is the only caller on the hot path and consumes exactly
/// this contract: read, write, allocate, dispose. The trait is designed as
/// `trait object` compatible so pools can be built over any store picked at
/// runtime.
pub trait PageStore: Debug + Send + Sync {
    /// Read a full page image. Reading a page that was never allocated (or
    /// was disposed) is a storage error.
    fn read_page(&self, file: FileId, page_no: PageNo) -> Result<Vec<u8>>;

    /// Write a full page image. `data` must be exactly PAGE_SIZE bytes.
    fn write_page(&mut self, file: FileId, page_no: PageNo, data: &[u8]) -> Result<()>;

    /// Allocate a new page number in `file`. Previously disposed numbers may
    /// be reused; a reused number reads back as a fresh zeroed page.
    fn allocate_page(&mut self, file: FileId) -> Result<PageNo>;

    /// Release a page number back to the store, discarding its contents.
    fn dispose_page(&mut self, file: FileId, page_no: PageNo) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    Disk,
}

pub fn new_store(typ: StorageType, dir: &Path) -> Result<Box<dyn PageStore>> {
    match typ {
        StorageType::Memory => Ok(Box::new(memory::Memory::new())),
        StorageType::Disk => Ok(Box::new(disk::Disk::open(dir)?)),
    }
}
