use bufpool::buffer::pool::BufferPoolManager;
use bufpool::config::Config;
use bufpool::error::Error;
use bufpool::error::Result;
use bufpool::storage::FileId;
use bufpool::storage::StorageType;

const FILE: FileId = 7;

fn disk_config(dir: &std::path::Path, pool_size: usize) -> Config {
    Config {
        pool_size,
        storage_type: StorageType::Disk,
        data_dir: dir.to_string_lossy().into_owned(),
        log_level: "debug".to_string(),
    }
}

#[test]
fn test_disk_backed_pool_end_to_end() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let cfg = disk_config(dir.path(), 4);

    // Scenario: allocate more pages than the pool holds and stamp each one,
    // so later allocations evict earlier dirty pages to disk.
    let bpm = BufferPoolManager::from_config(&cfg)?;
    let mut page_nos = Vec::new();
    for i in 0..10u8 {
        let handle = bpm.allocate_page(FILE)?;
        handle.write()?.data.fill(i + 1);
        page_nos.push(handle.page_no());
        drop(handle);
        bpm.unpin_page(FILE, page_nos[i as usize], true)?;
    }

    // Scenario: every page reads back through the eviction churn, resident
    // or not.
    for (i, &page_no) in page_nos.iter().enumerate() {
        let handle = bpm.fetch_page(FILE, page_no)?;
        assert!(handle.read()?.data.iter().all(|&b| b == i as u8 + 1));
        bpm.unpin_page(FILE, page_no, false)?;
    }

    // Scenario: flush the file and drop the pool; a fresh pool over the
    // same directory still sees every page image.
    bpm.flush_file(FILE)?;
    assert!(bpm.stats()?.iter().all(|s| !s.valid));
    drop(bpm);

    let bpm = BufferPoolManager::from_config(&cfg)?;
    for (i, &page_no) in page_nos.iter().enumerate() {
        let handle = bpm.fetch_page(FILE, page_no)?;
        assert!(handle.read()?.data.iter().all(|&b| b == i as u8 + 1));
        bpm.unpin_page(FILE, page_no, false)?;
    }

    Ok(())
}

#[test]
fn test_disk_backed_pool_pin_discipline() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let cfg = disk_config(dir.path(), 2);

    let bpm = BufferPoolManager::from_config(&cfg)?;
    let h0 = bpm.allocate_page(FILE)?;
    let h1 = bpm.allocate_page(FILE)?;

    // both slots pinned: no allocation or fetch can claim a frame
    assert!(matches!(bpm.allocate_page(FILE), Err(Error::BufferExceeded)));

    // a flush with outstanding pins aborts
    assert!(matches!(bpm.flush_file(FILE), Err(Error::PagePinned(FILE, _))));

    bpm.unpin_page(FILE, h0.page_no(), false)?;
    bpm.unpin_page(FILE, h1.page_no(), false)?;
    bpm.flush_file(FILE)?;

    Ok(())
}
