use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::FileId;
use super::PageNo;
use super::PageStore;
use super::PAGE_SIZE;
use crate::error::Error;
use crate::error::Result;

/// A disk-backed page store.
///
/// Each file id maps to one data file under the store directory with pages
/// at byte offset `page_no * PAGE_SIZE`. Allocation state (next page number
/// and the free list of disposed numbers) is persisted in a bincode-encoded
/// sidecar next to the data file, so page numbers stay stable across reopen.
/// Writes are synced before returning; the pool's write-back is the
/// durability point.
#[derive(Debug)]
pub struct Disk {
    dir: PathBuf,
    files: HashMap<FileId, DataFile>,
}

#[derive(Debug)]
struct DataFile {
    file: File,
    meta: Meta,
    meta_path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Meta {
    next_page_no: PageNo,
    free: Vec<PageNo>,
}

impl Meta {
    fn load(path: &Path) -> Result<Meta> {
        if !path.exists() {
            return Ok(Meta::default());
        }
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn store(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn is_allocated(&self, page_no: PageNo) -> bool {
        page_no < self.next_page_no && !self.free.contains(&page_no)
    }
}

impl Disk {
    pub fn open(dir: &Path) -> Result<Disk> {
        fs::create_dir_all(dir)?;
        Ok(Disk { dir: dir.to_path_buf(), files: HashMap::new() })
    }

    fn data_path(&self, id: FileId) -> PathBuf {
        self.dir.join(format!("{}.pages", id))
    }

    fn meta_path(&self, id: FileId) -> PathBuf {
        self.dir.join(format!("{}.meta", id))
    }

    fn data_file(&mut self, id: FileId) -> Result<&mut DataFile> {
        let data_path = self.data_path(id);
        let meta_path = self.meta_path(id);
        if let Entry::Vacant(entry) = self.files.entry(id) {
            let file = OpenOptions::new().read(true).write(true).create(true).open(&data_path)?;
            let meta = Meta::load(&meta_path)?;
            entry.insert(DataFile { file, meta, meta_path });
        }
        match self.files.get_mut(&id) {
            Some(data_file) => Ok(data_file),
            None => Err(Error::Internal(format!("missing data file entry for file {}", id))),
        }
    }
}

impl DataFile {
    fn write_at(&mut self, page_no: PageNo, data: &[u8]) -> Result<()> {
        self.file.write_all_at(data, page_no * PAGE_SIZE as u64)?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl PageStore for Disk {
    fn read_page(&self, file: FileId, page_no: PageNo) -> Result<Vec<u8>> {
        let mut data = vec![0u8; PAGE_SIZE];
        match self.files.get(&file) {
            Some(data_file) => {
                if !data_file.meta.is_allocated(page_no) {
                    return Err(Error::Storage(format!(
                        "read of unallocated page {} in file {}",
                        page_no, file
                    )));
                }
                data_file.file.read_exact_at(&mut data, page_no * PAGE_SIZE as u64)?;
            }
            None => {
                // file not opened by this handle yet: read it statelessly
                let meta = Meta::load(&self.meta_path(file))?;
                if !meta.is_allocated(page_no) {
                    return Err(Error::Storage(format!(
                        "read of unallocated page {} in file {}",
                        page_no, file
                    )));
                }
                let reader = File::open(self.data_path(file))?;
                reader.read_exact_at(&mut data, page_no * PAGE_SIZE as u64)?;
            }
        }
        Ok(data)
    }

    fn write_page(&mut self, file: FileId, page_no: PageNo, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(Error::Storage(format!(
                "page write of {} bytes, expected {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        let data_file = self.data_file(file)?;
        if !data_file.meta.is_allocated(page_no) {
            return Err(Error::Storage(format!(
                "write of unallocated page {} in file {}",
                page_no, file
            )));
        }
        data_file.write_at(page_no, data)
    }

    fn allocate_page(&mut self, file: FileId) -> Result<PageNo> {
        let data_file = self.data_file(file)?;
        let page_no = match data_file.meta.free.pop() {
            Some(page_no) => page_no,
            None => {
                let page_no = data_file.meta.next_page_no;
                data_file.meta.next_page_no += 1;
                page_no
            }
        };
        // zero the block so a recycled number never leaks old contents
        data_file.write_at(page_no, &vec![0u8; PAGE_SIZE])?;
        let meta_path = data_file.meta_path.clone();
        data_file.meta.store(&meta_path)?;
        Ok(page_no)
    }

    fn dispose_page(&mut self, file: FileId, page_no: PageNo) -> Result<()> {
        let data_file = self.data_file(file)?;
        if !data_file.meta.is_allocated(page_no) {
            return Err(Error::Storage(format!(
                "dispose of unallocated page {} in file {}",
                page_no, file
            )));
        }
        data_file.meta.free.push(page_no);
        let meta_path = data_file.meta_path.clone();
        data_file.meta.store(&meta_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::*;

    #[test]
    fn test_allocate_and_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = Disk::open(dir.path())?;

        let p0 = store.allocate_page(1)?;
        let p1 = store.allocate_page(1)?;
        assert_eq!(0, p0);
        assert_eq!(1, p1);
        assert_eq!(vec![0u8; PAGE_SIZE], store.read_page(1, p0)?);

        let mut data = vec![0u8; PAGE_SIZE];
        rand::thread_rng().fill_bytes(&mut data);
        store.write_page(1, p1, &data)?;
        assert_eq!(data, store.read_page(1, p1)?);
        // the neighbouring page is untouched
        assert_eq!(vec![0u8; PAGE_SIZE], store.read_page(1, p0)?);

        Ok(())
    }

    #[test]
    fn test_reopen_preserves_pages_and_allocation_state() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut data = vec![0u8; PAGE_SIZE];
        rand::thread_rng().fill_bytes(&mut data);

        let p0 = {
            let mut store = Disk::open(dir.path())?;
            let p0 = store.allocate_page(3)?;
            store.write_page(3, p0, &data)?;
            p0
        };

        let mut store = Disk::open(dir.path())?;
        // contents survive reopen
        assert_eq!(data, store.read_page(3, p0)?);
        // and the allocator does not hand the number out again
        let p1 = store.allocate_page(3)?;
        assert_ne!(p0, p1);

        Ok(())
    }

    #[test]
    fn test_dispose_recycles_number_with_fresh_page() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = Disk::open(dir.path())?;

        let p0 = store.allocate_page(1)?;
        store.write_page(1, p0, &vec![42u8; PAGE_SIZE])?;
        store.dispose_page(1, p0)?;
        assert!(matches!(store.read_page(1, p0), Err(Error::Storage(_))));

        let p = store.allocate_page(1)?;
        assert_eq!(p0, p);
        assert_eq!(vec![0u8; PAGE_SIZE], store.read_page(1, p)?);

        Ok(())
    }

    #[test]
    fn test_unallocated_access_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = Disk::open(dir.path())?;

        store.allocate_page(1)?;
        assert!(matches!(store.read_page(1, 9), Err(Error::Storage(_))));
        assert!(matches!(store.write_page(1, 9, &[0u8; PAGE_SIZE]), Err(Error::Storage(_))));
        assert!(matches!(store.dispose_page(1, 9), Err(Error::Storage(_))));

        Ok(())
    }
}
