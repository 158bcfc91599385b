use serde::Deserialize;

use crate::error::Result;
use crate::storage::StorageType;

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,

    pub storage_type: StorageType,
    /// Directory holding the data files of the disk store. Ignored by the
    /// memory store.
    pub data_dir: String,

    pub log_level: String,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("pool_size", 64)?
            .set_default("storage_type", "memory")?
            .set_default("data_dir", "data")?
            .set_default("log_level", "info")?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("BUFPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(64, cfg.pool_size);
        assert_eq!(StorageType::Memory, cfg.storage_type);
        Ok(())
    }
}
