//! Configuration for the metadata store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one catalog database file per scope
    pub data_dir: PathBuf,
    /// Value rows (rebuild) or posting rows (delete) processed per
    /// maintenance transaction
    pub index_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/metacat"),
            index_batch_size: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_json() {
        let config = StoreConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index_batch_size, 1000);
        assert_eq!(back.data_dir, config.data_dir);
    }
}
