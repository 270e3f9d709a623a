use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use git2::Repository;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::git::cache::{BoundedCache, MetadataCache};
use crate::git::clone::{self, ExtensionFilter};
use crate::git::source::{ChangeSet, DocumentSource, Metadata};

/// Local clone of a remote git repository, used as the document corpus.
pub struct GitMirror {
    url: String,
    dir: PathBuf,
    filter: ExtensionFilter,
    repo: Mutex<Option<Repository>>,
    /// Set while a refresh is rewriting the worktree.
    updating: AtomicBool,
    metadata_cache: MetadataCache,
    created_cache: BoundedCache<DateTime<Utc>>,
}

/// Marks the mirror as updating for its lifetime and clears the caches on
/// both ends.
struct UpdatingGuard<'a> {
    mirror: &'a GitMirror,
}

impl<'a> UpdatingGuard<'a> {
    fn new(mirror: &'a GitMirror) -> Self {
        mirror.updating.store(true, Ordering::SeqCst);
        mirror.invalidate_caches();
        Self { mirror }
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.mirror.updating.store(false, Ordering::SeqCst);
        self.mirror.invalidate_caches();
    }
}

impl GitMirror {
    /// Mirror `url` into `<data_dir>/<repo name>`. Nothing is cloned until the
    /// first [`DocumentSource::refresh`].
    pub fn new(
        url: &str,
        data_dir: &Path,
        filter: ExtensionFilter,
        cache_size: usize,
    ) -> Result<Self> {
        let name = clone::repo_name_from_url(url)
            .ok_or_else(|| Error::InvalidRequest(format!("cannot derive a name from {url}")))?;
        Ok(Self::with_dir(url, data_dir.join(name), filter, cache_size))
    }

    pub fn with_dir(url: &str, dir: PathBuf, filter: ExtensionFilter, cache_size: usize) -> Self {
        Self {
            url: url.to_string(),
            dir,
            filter,
            repo: Mutex::new(None),
            updating: AtomicBool::new(false),
            metadata_cache: MetadataCache::new(cache_size),
            created_cache: BoundedCache::new(cache_size),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    /// Release the repository handle. A later call reopens it.
    pub fn close(&self) -> Result<()> {
        self.repo.lock().take();
        self.invalidate_caches();
        tracing::info!("Closed mirror at {}", self.dir.display());
        Ok(())
    }

    fn invalidate_caches(&self) {
        self.metadata_cache.invalidate_all();
        self.created_cache.invalidate_all();
    }

    fn is_cloned(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Run `f` with the repository, opening an existing clone on demand.
    /// `None` if nothing has been cloned yet.
    fn with_repo<T>(&self, f: impl FnOnce(&Repository) -> Result<T>) -> Result<Option<T>> {
        let mut slot = self.repo.lock();
        if slot.is_none() {
            if !self.is_cloned() {
                return Ok(None);
            }
            *slot = Some(Repository::open(&self.dir)?);
        }
        match slot.as_ref() {
            Some(repo) => f(repo).map(Some),
            None => Ok(None),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if !clone::is_safe_key(key) {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    fn load_metadata(&self, key: &str) -> Result<Option<Metadata>> {
        let path = self.resolve(key)?;
        let attributes = match std::fs::metadata(&path) {
            Ok(attributes) if attributes.is_file() => attributes,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Metadata {
            size: attributes.len(),
            last_modified: DateTime::<Utc>::from(attributes.modified()?),
            content_type: content_type(&path),
        }))
    }

    fn load_created_at(&self, key: &str) -> Result<DateTime<Utc>> {
        self.with_repo(|repo| clone::first_appearance(repo, key))?
            .flatten()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

impl DocumentSource for GitMirror {
    fn refresh(&self) -> Result<String> {
        let mut slot = self.repo.lock();
        let _updating = UpdatingGuard::new(self);

        if slot.is_none() {
            if self.is_cloned() {
                *slot = Some(Repository::open(&self.dir)?);
            } else {
                if let Some(parent) = self.dir.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let repo = clone::clone_repo(&self.url, &self.dir)?;
                let head = clone::head_sha(&repo)?;
                *slot = Some(repo);
                return head.ok_or_else(|| Error::NotFound(format!("no commits in {}", self.url)));
            }
        }

        match slot.as_ref() {
            Some(repo) => clone::fast_forward(repo),
            None => Err(Error::NotFound(self.dir.display().to_string())),
        }
    }

    fn head_version(&self) -> Result<Option<String>> {
        Ok(self.with_repo(clone::head_sha)?.flatten())
    }

    fn diff(&self, old: Option<&str>, new: &str) -> Result<ChangeSet> {
        self.with_repo(|repo| clone::diff_commits(repo, old, new))?
            .ok_or_else(|| Error::NotFound(self.dir.display().to_string()))
    }

    fn list_accepted_keys(&self) -> Result<BTreeSet<String>> {
        if !self.dir.is_dir() {
            return Ok(BTreeSet::new());
        }
        Ok(clone::walk_accepted_keys(&self.dir, &self.filter))
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn created_at(&self, key: &str) -> Result<DateTime<Utc>> {
        if self.is_updating() {
            return self.load_created_at(key);
        }
        self.created_cache
            .get_or_try_insert_with(key, || self.load_created_at(key))
    }

    fn accepts(&self, key: &str) -> bool {
        self.filter.accepts(key)
    }

    fn metadata(&self, key: &str) -> Result<Option<Metadata>> {
        if self.is_updating() {
            return self.load_metadata(key);
        }
        self.metadata_cache
            .get_or_try_insert_with(key, || self.load_metadata(key))
    }
}

/// MIME type of `path` by extension. Text types and a few structured text
/// types carry an explicit UTF-8 charset.
fn content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let essence = mime.essence_str();
    if mime.type_() == mime_guess::mime::TEXT
        || matches!(essence, "application/json" | "application/xml" | "application/javascript")
    {
        format!("{essence};charset=utf-8")
    } else {
        essence.to_string()
    }
}
