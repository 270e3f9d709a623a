use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::git::GitMirror;
use crate::render::MarkdownRenderer;
use crate::search::{IndexEngine, Paginator};
use crate::shutdown::ReleaseList;
use crate::sync::SyncCoordinator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<IndexEngine>,
    pub mirror: Arc<GitMirror>,
    pub sync: Arc<SyncCoordinator>,
    pub paginator: Paginator,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let url = config
            .git_url
            .clone()
            .context("MARKUP_GIT_URL must point at the corpus repository")?;

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

        let mirror = GitMirror::new(
            &url,
            &config.data_dir,
            config.extension_filter(),
            config.metadata_cache_size,
        )?;
        let engine = IndexEngine::open(&config.engine_options()).context("Failed to open index")?;

        Ok(Self::from_parts(config, Arc::new(engine), Arc::new(mirror)))
    }

    pub fn from_parts(config: Config, engine: Arc<IndexEngine>, mirror: Arc<GitMirror>) -> Self {
        let sync = SyncCoordinator::new(mirror.clone(), engine.clone(), Arc::new(MarkdownRenderer));
        let paginator = Paginator::new(engine.fields());
        Self {
            config,
            engine,
            mirror,
            sync: Arc::new(sync),
            paginator,
        }
    }

    /// Release steps for everything this state owns. They run as sync
    /// coordinator, index engine, then corpus mirror.
    pub fn release_list(&self) -> ReleaseList {
        let mut list = ReleaseList::new();

        let mirror = self.mirror.clone();
        list.push("corpus mirror", move || Ok(mirror.close()?));

        let engine = self.engine.clone();
        list.push("index engine", move || Ok(engine.close()?));

        let sync = self.sync.clone();
        list.push("sync coordinator", move || Ok(sync.close()?));

        list
    }
}
