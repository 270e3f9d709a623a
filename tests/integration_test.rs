//! Integration tests for the markup-search pipeline.
//!
//! Each test builds a real git repository in a temp directory, mirrors it,
//! syncs it into an in-memory index and queries the result.

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use git2::{IndexAddOption, Repository, Signature, Time};
use tempfile::TempDir;

use markup_search::config::Config;
use markup_search::error::Error;
use markup_search::git::{DocumentSource, ExtensionFilter, GitMirror};
use markup_search::models::{SearchPage, SearchRequest};
use markup_search::search::{EngineOptions, IndexEngine};
use markup_search::state::AppState;

/// Helper: a non-bare repository standing in for the remote.
struct Remote {
    dir: TempDir,
    repo: Repository,
}

impl Remote {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    fn url(&self) -> String {
        self.dir.path().to_string_lossy().to_string()
    }

    fn write(&self, key: &str, content: impl AsRef<[u8]>) {
        let path = self.dir.path().join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn remove(&self, key: &str) {
        std::fs::remove_file(self.dir.path().join(key)).unwrap();
    }

    fn rename(&self, from: &str, to: &str) {
        let target = self.dir.path().join(to);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::rename(self.dir.path().join(from), target).unwrap();
    }

    /// Commit the whole worktree at `seconds` since the epoch.
    fn commit(&self, message: &str, seconds: i64) -> git2::Oid {
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let signature = Signature::new("Test", "test@example.com", &Time::new(seconds, 0)).unwrap();
        let parent = self.repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }
}

/// Helper: a mirror of `remote` plus an in-memory index, wired like the server.
fn app(remote: &Remote, data: &Path) -> AppState {
    let mirror = GitMirror::with_dir(
        &remote.url(),
        data.join("mirror"),
        ExtensionFilter::default(),
        64,
    );
    let engine = IndexEngine::open(&EngineOptions::default()).unwrap();
    AppState::from_parts(Config::default(), Arc::new(engine), Arc::new(mirror))
}

fn search(state: &AppState, prefix: Option<&str>, keyword: Option<&str>, count: usize) -> SearchPage {
    let request = SearchRequest {
        prefix: prefix.map(String::from),
        keyword: keyword.map(String::from),
        count: Some(count),
        cursor: None,
    };
    state.paginator.search(&state.engine.snapshot(), &request).unwrap()
}

fn follow(state: &AppState, cursor: &str) -> SearchPage {
    let request = SearchRequest {
        cursor: Some(cursor.to_string()),
        ..SearchRequest::default()
    };
    state.paginator.search(&state.engine.snapshot(), &request).unwrap()
}

fn keys(page: &SearchPage) -> Vec<&str> {
    page.list.iter().map(|d| d.key.as_str()).collect()
}

fn scenario() -> (Remote, TempDir, AppState) {
    let remote = Remote::new();
    remote.write("a.md", "hello world");
    remote.commit("add a", 1_000);
    remote.write("b/c.md", "你好世界");
    remote.commit("add b/c", 2_000);

    let data = tempfile::tempdir().unwrap();
    let state = app(&remote, data.path());
    state.sync.update().unwrap();
    (remote, data, state)
}

#[test]
fn test_scenario_keyword_prefix_and_paging() {
    let (_remote, _data, state) = scenario();

    let page = search(&state, None, Some("hello"), 10);
    assert_eq!(keys(&page), vec!["a.md"]);
    assert!(page.cursor.is_none());

    let page = search(&state, Some("b/"), None, 10);
    assert_eq!(keys(&page), vec!["b/c.md"]);
    assert!(page.cursor.is_none());

    let first = search(&state, None, None, 1);
    assert_eq!(first.list.len(), 1);
    let cursor = first.cursor.clone().expect("first page has a cursor");
    assert!(!cursor.is_empty());

    let second = follow(&state, &cursor);
    assert_eq!(second.list.len(), 1);
    assert_ne!(second.list[0].key, first.list[0].key);

    // The second window is full, so one more cursor comes back; following it
    // finds nothing past the last key.
    let cursor = second.cursor.clone().expect("full window has a cursor");
    let third = follow(&state, &cursor);
    assert!(third.list.is_empty());
    assert!(third.cursor.is_none());
}

#[test]
fn test_full_iteration_descends_by_created() {
    let remote = Remote::new();
    for (i, key) in ["x.md", "dir/y.md", "z.md", "dir/sub/w.md", "v.md"].iter().enumerate() {
        remote.write(key, format!("document number {i}"));
        remote.commit(&format!("add {key}"), 1_000 + i as i64 * 100);
    }
    let data = tempfile::tempdir().unwrap();
    let state = app(&remote, data.path());
    state.sync.update().unwrap();

    let mut seen = Vec::new();
    let mut page = search(&state, None, Some(""), 2);
    loop {
        seen.extend(page.list.iter().cloned());
        match page.cursor {
            Some(cursor) => page = follow(&state, &cursor),
            None => break,
        }
    }

    let keys: Vec<&str> = seen.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, vec!["v.md", "dir/sub/w.md", "z.md", "dir/y.md", "x.md"]);
    assert!(seen.windows(2).all(|w| w[0].created_at > w[1].created_at));
}

#[test]
fn test_exact_and_fuzzy_keywords() {
    let remote = Remote::new();
    remote.write("short.md", "the rust book");
    remote.write("long.md", "a guide to databases");
    remote.write("other.md", "nothing relevant here");
    remote.commit("init", 1_000);
    let data = tempfile::tempdir().unwrap();
    let state = app(&remote, data.path());
    state.sync.update().unwrap();

    assert_eq!(keys(&search(&state, None, Some("rust"), 10)), vec!["short.md"]);
    assert!(search(&state, None, Some("rus"), 10).list.is_empty());

    // "databse" is one edit from "database", two from "databases".
    assert_eq!(keys(&search(&state, None, Some("databse"), 10)), vec!["long.md"]);
}

#[test]
fn test_pinyin_forms_find_cjk_document() {
    let remote = Remote::new();
    remote.write("china.md", "我爱中国");
    remote.write("english.md", "no chinese text");
    remote.commit("init", 1_000);
    let data = tempfile::tempdir().unwrap();
    let state = app(&remote, data.path());
    state.sync.update().unwrap();

    for keyword in ["中国", "zhongguo", "zg", "ZhongGuo"] {
        let page = search(&state, None, Some(keyword), 10);
        assert_eq!(keys(&page), vec!["china.md"], "keyword {keyword}");
    }
}

#[test]
fn test_sync_adds_modifies_and_deletes() {
    let (remote, _data, state) = scenario();
    let created = state.engine.get_by_key("a.md").unwrap().unwrap().created_at;
    assert_eq!(created, Utc.timestamp_opt(1_000, 0).unwrap());

    remote.write("a.md", "hello again");
    remote.remove("b/c.md");
    remote.write("new.md", "fresh");
    remote.write("skip.txt", "not markdown");
    remote.commit("edit", 3_000);

    let report = state.sync.update().unwrap();
    assert_eq!((report.upserted, report.deleted), (2, 1));
    assert!(report.committed);

    let toc: Vec<String> = state.engine.list_keys().unwrap().into_iter().collect();
    assert_eq!(toc, vec!["a.md", "new.md"]);

    let a = state.engine.get_by_key("a.md").unwrap().unwrap();
    assert_eq!(a.content, "hello again");
    assert_eq!(a.created_at, created);
    assert!(a.html.contains("<p>hello again</p>"));
    assert_eq!(
        state.engine.get_by_key("new.md").unwrap().unwrap().created_at,
        Utc.timestamp_opt(3_000, 0).unwrap()
    );
    assert_eq!(state.sync.status().synced, state.mirror.head_version().unwrap());
}

#[test]
fn test_sync_handles_rename() {
    let (remote, _data, state) = scenario();
    remote.rename("a.md", "moved/a.md");
    remote.commit("move", 3_000);

    state.sync.update().unwrap();
    let toc: Vec<String> = state.engine.list_keys().unwrap().into_iter().collect();
    assert_eq!(toc, vec!["b/c.md", "moved/a.md"]);
    assert_eq!(keys(&search(&state, None, Some("hello"), 10)), vec!["moved/a.md"]);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let remote = Remote::new();
    remote.write("good.md", "fine");
    remote.write("bad.md", [0xffu8, 0xfe, 0x00, 0x81]);
    remote.commit("init", 1_000);
    let data = tempfile::tempdir().unwrap();
    let state = app(&remote, data.path());

    let report = state.sync.update().unwrap();
    assert_eq!(report.skipped, 1);
    assert!(report.committed);
    let toc: Vec<String> = state.engine.list_keys().unwrap().into_iter().collect();
    assert_eq!(toc, vec!["good.md"]);
}

#[test]
fn test_diverged_remote_is_conflict() {
    let (remote, _data, state) = scenario();
    let synced = state.sync.status().synced.clone();

    // Commit in the mirror so its branch no longer descends from the remote.
    let mirror_repo = Repository::open(state.mirror.dir()).unwrap();
    std::fs::write(state.mirror.dir().join("local.md"), "local only").unwrap();
    let mut index = mirror_repo.index().unwrap();
    index.add_path(Path::new("local.md")).unwrap();
    index.write().unwrap();
    let tree = mirror_repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::new("Local", "local@example.com", &Time::new(2_500, 0)).unwrap();
    let head = mirror_repo.head().unwrap().peel_to_commit().unwrap();
    mirror_repo
        .commit(Some("HEAD"), &signature, &signature, "local", &tree, &[&head])
        .unwrap();

    remote.write("remote.md", "remote only");
    remote.commit("remote", 3_000);

    assert!(matches!(state.sync.update(), Err(Error::SyncConflict(_))));
    assert_eq!(state.sync.status().synced, synced);
    assert!(state.engine.get_by_key("remote.md").unwrap().is_none());
}

#[test]
fn test_reconcile_drops_files_gone_from_worktree() {
    let (_remote, _data, state) = scenario();
    std::fs::remove_file(state.mirror.dir().join("a.md")).unwrap();

    assert_eq!(state.sync.reconcile().unwrap(), 1);
    let toc: Vec<String> = state.engine.list_keys().unwrap().into_iter().collect();
    assert_eq!(toc, vec!["b/c.md"]);
}

#[test]
fn test_mirror_metadata_and_read() {
    let (_remote, _data, state) = scenario();
    let metadata = state.mirror.metadata("b/c.md").unwrap().unwrap();
    assert_eq!(metadata.size, "你好世界".len() as u64);
    assert_eq!(metadata.content_type, "text/markdown;charset=utf-8");
    assert_eq!(state.mirror.read("a.md").unwrap(), b"hello world");
    assert!(state.mirror.metadata("missing.md").unwrap().is_none());
    assert!(matches!(state.mirror.read("missing.md"), Err(Error::NotFound(_))));
}

#[test]
fn test_release_list_closes_everything() {
    let (_remote, _data, state) = scenario();
    let release = state.release_list();
    assert_eq!(release.len(), 3);
    assert_eq!(release.run(), 0);
}
