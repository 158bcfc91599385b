use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use super::FileId;
use super::PageNo;
use super::PageStore;
use super::PAGE_SIZE;
use crate::error::Error;
use crate::error::Result;

/// An in-memory page store, mainly for tests and ephemeral pools.
///
/// Pages live in a BTreeMap keyed by (file, page number). Disposed numbers
/// go to a per-file free list and are handed out again before fresh ones;
/// allocation always installs a zeroed page, so a recycled number never
/// exposes its previous contents.
#[derive(Debug, Clone)]
pub struct Memory {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    pages: BTreeMap<(FileId, PageNo), Vec<u8>>,
    files: HashMap<FileId, FileMeta>,
}

#[derive(Debug, Default)]
struct FileMeta {
    next_page_no: PageNo,
    free: Vec<PageNo>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { inner: Arc::new(Mutex::new(Inner::default())) }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for Memory {
    fn read_page(&self, file: FileId, page_no: PageNo) -> Result<Vec<u8>> {
        let inner = self.inner.lock()?;
        match inner.pages.get(&(file, page_no)) {
            Some(data) => Ok(data.clone()),
            None => {
                Err(Error::Storage(format!("read of unallocated page {} in file {}", page_no, file)))
            }
        }
    }

    fn write_page(&mut self, file: FileId, page_no: PageNo, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(Error::Storage(format!(
                "page write of {} bytes, expected {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        let mut inner = self.inner.lock()?;
        if !inner.pages.contains_key(&(file, page_no)) {
            return Err(Error::Storage(format!(
                "write of unallocated page {} in file {}",
                page_no, file
            )));
        }
        inner.pages.insert((file, page_no), data.to_vec());
        Ok(())
    }

    fn allocate_page(&mut self, file: FileId) -> Result<PageNo> {
        let mut inner = self.inner.lock()?;
        let meta = inner.files.entry(file).or_default();
        let page_no = match meta.free.pop() {
            Some(page_no) => page_no,
            None => {
                let page_no = meta.next_page_no;
                meta.next_page_no += 1;
                page_no
            }
        };
        inner.pages.insert((file, page_no), vec![0; PAGE_SIZE]);
        Ok(page_no)
    }

    fn dispose_page(&mut self, file: FileId, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.pages.remove(&(file, page_no)).is_none() {
            return Err(Error::Storage(format!(
                "dispose of unallocated page {} in file {}",
                page_no, file
            )));
        }
        inner.files.entry(file).or_default().free.push(page_no);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_roundtrip() -> Result<()> {
        let mut store = Memory::new();

        let p0 = store.allocate_page(1)?;
        let p1 = store.allocate_page(1)?;
        assert_eq!(0, p0);
        assert_eq!(1, p1);

        // a fresh page reads back zeroed
        assert_eq!(vec![0u8; PAGE_SIZE], store.read_page(1, p0)?);

        let mut data = vec![0u8; PAGE_SIZE];
        data[..5].copy_from_slice(b"hello");
        store.write_page(1, p0, &data)?;
        assert_eq!(data, store.read_page(1, p0)?);

        Ok(())
    }

    #[test]
    fn test_files_are_independent() -> Result<()> {
        let mut store = Memory::new();

        let a = store.allocate_page(1)?;
        let b = store.allocate_page(2)?;
        // both files start numbering at zero
        assert_eq!(a, b);

        let mut data = vec![7u8; PAGE_SIZE];
        store.write_page(1, a, &data)?;
        data.fill(9);
        store.write_page(2, b, &data)?;
        assert_eq!(vec![7u8; PAGE_SIZE], store.read_page(1, a)?);
        assert_eq!(vec![9u8; PAGE_SIZE], store.read_page(2, b)?);

        Ok(())
    }

    #[test]
    fn test_unallocated_access_fails() -> Result<()> {
        let mut store = Memory::new();

        assert!(matches!(store.read_page(1, 0), Err(Error::Storage(_))));
        assert!(matches!(store.write_page(1, 0, &[0u8; PAGE_SIZE]), Err(Error::Storage(_))));
        assert!(matches!(store.dispose_page(1, 0), Err(Error::Storage(_))));

        // short writes are rejected even for allocated pages
        let p0 = store.allocate_page(1)?;
        assert!(matches!(store.write_page(1, p0, b"short"), Err(Error::Storage(_))));

        Ok(())
    }

    #[test]
    fn test_dispose_recycles_number_with_fresh_page() -> Result<()> {
        let mut store = Memory::new();

        let p0 = store.allocate_page(1)?;
        store.write_page(1, p0, &vec![42u8; PAGE_SIZE])?;
        store.dispose_page(1, p0)?;

        // the disposed number is gone until reallocated
        assert!(matches!(store.read_page(1, p0), Err(Error::Storage(_))));

        // reallocation reuses the number and installs a zeroed page
        let p = store.allocate_page(1)?;
        assert_eq!(p0, p);
        assert_eq!(vec![0u8; PAGE_SIZE], store.read_page(1, p)?);

        Ok(())
    }
}
