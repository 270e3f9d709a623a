use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::git::ExtensionFilter;
use crate::search::EngineOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote repository holding the corpus
    pub git_url: Option<String>,
    /// Where the corpus clone is stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Index directory; `None` keeps the index in memory
    pub index_dir: Option<PathBuf>,
    /// Index writer memory budget in MB
    pub writer_heap_mb: usize,
    /// Seconds a superseded index snapshot stays readable
    pub snapshot_grace_secs: u64,
    /// Seconds between background syncs (0 = disabled)
    pub update_interval_secs: u64,
    /// Entries kept in each corpus metadata cache
    pub metadata_cache_size: usize,
    /// File extensions indexed from the corpus
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git_url: None,
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8080".to_string(),
            index_dir: None,
            writer_heap_mb: 50,
            snapshot_grace_secs: 60,
            update_interval_secs: 300,
            metadata_cache_size: 1024,
            extensions: vec!["md".to_string()],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MARKUP_GIT_URL") {
            config.git_url = Some(url);
        }
        if let Ok(dir) = std::env::var("MARKUP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("MARKUP_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("MARKUP_INDEX_DIR") {
            if !dir.is_empty() {
                config.index_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(val) = std::env::var("MARKUP_WRITER_HEAP_MB") {
            if let Ok(v) = val.parse() {
                config.writer_heap_mb = v;
            }
        }
        if let Ok(val) = std::env::var("MARKUP_SNAPSHOT_GRACE_SECS") {
            if let Ok(v) = val.parse() {
                config.snapshot_grace_secs = v;
            }
        }
        if let Ok(val) = std::env::var("MARKUP_UPDATE_INTERVAL_SECS") {
            if let Ok(v) = val.parse() {
                config.update_interval_secs = v;
            }
        }
        if let Ok(val) = std::env::var("MARKUP_METADATA_CACHE_SIZE") {
            if let Ok(v) = val.parse() {
                config.metadata_cache_size = v;
            }
        }
        if let Ok(val) = std::env::var("MARKUP_EXTENSIONS") {
            config.extensions = val
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }

        config
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            index_dir: self.index_dir.clone(),
            writer_heap_bytes: self.writer_heap_mb.saturating_mul(1_000_000),
            snapshot_grace: Duration::from_secs(self.snapshot_grace_secs),
        }
    }

    pub fn extension_filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(&self.extensions)
    }

    /// `None` when the periodic updater is disabled.
    pub fn update_interval(&self) -> Option<Duration> {
        (self.update_interval_secs > 0).then(|| Duration::from_secs(self.update_interval_secs))
    }
}
