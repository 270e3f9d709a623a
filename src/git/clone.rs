use std::collections::BTreeSet;
use std::path::{Component, Path};

use chrono::{DateTime, TimeZone, Utc};
use git2::build::CheckoutBuilder;
use git2::{Delta, DiffFindOptions, ErrorCode, Oid, Repository, Sort};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::git::source::ChangeSet;

/// Accepts keys by file extension, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// An empty list accepts every key.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn accepts(&self, key: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let file_name = key.rsplit('/').next().unwrap_or(key);
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(["md"])
    }
}

/// Directory name for a clone of `url`: the last path segment without `.git`.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':', '\\']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Clone a git repository to the target directory.
pub fn clone_repo(url: &str, target: &Path) -> Result<Repository> {
    tracing::info!("Cloning {} into {}", url, target.display());
    let repo = Repository::clone(url, target)?;
    tracing::info!("Clone complete: {}", target.display());
    Ok(repo)
}

/// Fetch `origin` and fast-forward the current branch to it.
///
/// Returns the new head. A local branch that has diverged from `origin` is a
/// [`Error::SyncConflict`] and leaves the worktree untouched.
pub fn fast_forward(repo: &Repository) -> Result<String> {
    let head = repo.head()?;
    let branch = head
        .shorthand()
        .filter(|_| head.is_branch())
        .ok_or_else(|| Error::SyncConflict("HEAD is not on a branch".to_string()))?
        .to_string();
    drop(head);

    tracing::debug!("Fetching origin/{branch}");
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(&[branch.as_str()], None, None)?;

    let fetch_head = repo.find_reference("FETCH_HEAD")?;
    let fetched = repo.reference_to_annotated_commit(&fetch_head)?;
    let (analysis, _) = repo.merge_analysis(&[&fetched])?;

    if analysis.is_up_to_date() {
        tracing::debug!("{branch} is up to date");
    } else if analysis.is_fast_forward() {
        let refname = format!("refs/heads/{branch}");
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(fetched.id(), "fast-forward")?;
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
        tracing::info!("Fast-forwarded {branch} to {}", fetched.id());
    } else {
        return Err(Error::SyncConflict(format!(
            "{branch} cannot be fast-forwarded to origin/{branch}"
        )));
    }

    head_sha(repo)?.ok_or_else(|| Error::NotFound("HEAD".to_string()))
}

/// Commit id of HEAD, or `None` for a repository without commits.
pub fn head_sha(repo: &Repository) -> Result<Option<String>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?.id().to_string())),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Changes between two commits, with rename and copy detection. With no
/// `old` commit every file in `new` is added.
pub fn diff_commits(repo: &Repository, old: Option<&str>, new: &str) -> Result<ChangeSet> {
    if old == Some(new) {
        return Ok(ChangeSet::default());
    }
    let old_tree = match old {
        Some(old) => Some(repo.find_commit(Oid::from_str(old)?)?.tree()?),
        None => None,
    };
    let new_tree = repo.find_commit(Oid::from_str(new)?)?.tree()?;

    let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;
    let mut find = DiffFindOptions::new();
    find.renames(true).copies(true);
    diff.find_similar(Some(&mut find))?;

    let mut changes = ChangeSet::default();
    for delta in diff.deltas() {
        let old_key = delta.old_file().path().and_then(path_to_key);
        let new_key = delta.new_file().path().and_then(path_to_key);
        match (delta.status(), old_key, new_key) {
            (Delta::Added | Delta::Modified | Delta::Copied | Delta::Typechange, _, Some(key)) => {
                changes.added_or_modified.insert(key);
            }
            (Delta::Deleted, Some(key), _) => {
                changes.deleted.insert(key);
            }
            (Delta::Renamed, Some(from), Some(to)) => {
                changes.renamed.insert((from, to));
            }
            (status, old_key, new_key) => {
                tracing::debug!(?status, ?old_key, ?new_key, "Ignoring diff entry");
            }
        }
    }
    Ok(changes)
}

/// Commit time of the oldest commit reachable from HEAD whose tree contains
/// `key`.
pub fn first_appearance(repo: &Repository, key: &str) -> Result<Option<DateTime<Utc>>> {
    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    walk.push_head()?;

    let path = Path::new(key);
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        if commit.tree()?.get_path(path).is_ok() {
            let seconds = commit.time().seconds();
            return Ok(Utc.timestamp_opt(seconds, 0).single());
        }
    }
    Ok(None)
}

/// Walk the worktree at `root` and collect every accepted file as a
/// slash-separated key. The `.git` directory is skipped.
pub fn walk_accepted_keys(root: &Path, filter: &ExtensionFilter) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let Some(key) = path_to_key(relative) else {
            tracing::warn!("Skipping non UTF-8 path {}", relative.display());
            continue;
        };
        if filter.accepts(&key) {
            keys.insert(key);
        }
    }

    keys
}

/// Whether `key` names a file inside the worktree: relative, no `..`, not
/// under `.git`.
pub fn is_safe_key(key: &str) -> bool {
    let mut components = Path::new(key).components().peekable();
    if components.peek().is_none() {
        return false;
    }
    let mut first = true;
    for component in components {
        match component {
            Component::Normal(name) if !(first && name == ".git") => first = false,
            _ => return false,
        }
    }
    true
}

fn path_to_key(path: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = path.components().map(|c| c.as_os_str().to_str()).collect();
    parts.map(|parts| parts.join("/"))
}
