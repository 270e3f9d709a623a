use crate::error::{Error, Result};
use crate::models::{SearchPage, SearchRequest};
use crate::search::cursor::Cursor;
use crate::search::query::QueryPlanner;
use crate::search::snapshot::{Fields, Snapshot};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Turns search requests and cursors into result pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    planner: QueryPlanner,
}

impl Paginator {
    pub fn new(fields: Fields) -> Self {
        Self {
            planner: QueryPlanner::new(fields),
        }
    }

    /// Run `request` against `snapshot`. A cursor in the request takes
    /// precedence over its prefix, keyword and count.
    pub fn search(&self, snapshot: &Snapshot, request: &SearchRequest) -> Result<SearchPage> {
        let cursor = match request.cursor.as_deref() {
            Some(encoded) => Cursor::decode(encoded)?,
            None => Cursor {
                prefix: request.prefix.clone(),
                keyword: request.keyword.clone(),
                count: request.count.unwrap_or(DEFAULT_PAGE_SIZE),
                offset: 0,
                last_key: None,
            },
        };
        self.fetch_page(snapshot, &cursor)
    }

    /// Fetch the page described by `cursor`.
    ///
    /// The window `[0, offset + count)` is fetched in sort order and walked
    /// backward until `count` items are collected or the previous page's
    /// last key is reached. A next cursor is returned only for a non-empty
    /// page whose window came back full. The page is not pinned to a
    /// snapshot: documents inserted ahead of the boundary shift later pages.
    pub fn fetch_page(&self, snapshot: &Snapshot, cursor: &Cursor) -> Result<SearchPage> {
        if cursor.count == 0 {
            return Err(Error::InvalidRequest("count must be at least 1".to_string()));
        }
        let count = cursor.count.min(MAX_PAGE_SIZE);
        let window = cursor
            .offset
            .checked_add(count)
            .ok_or_else(|| Error::InvalidRequest(format!("offset {} is too large", cursor.offset)))?;

        let keyword = cursor.keyword.as_deref().filter(|k| !k.is_empty());
        let query = self.planner.build_query(cursor.prefix.as_deref(), keyword)?;
        let sort = QueryPlanner::build_sort(keyword.is_some());
        // The window is client-controlled; never size the collector past the index.
        let limit = window.min(usize::try_from(snapshot.num_docs()).unwrap_or(usize::MAX));
        let addresses = snapshot.top_addresses(query.as_ref(), sort, limit)?;
        let exhausted = addresses.len() < window;

        let mut list = Vec::with_capacity(count.min(addresses.len()));
        for address in addresses.into_iter().rev() {
            if list.len() == count {
                break;
            }
            let document = snapshot.document(address)?;
            if cursor.last_key.as_deref() == Some(document.key.as_str()) {
                break;
            }
            list.push(document);
        }
        list.reverse();

        let next = list.last().filter(|_| !exhausted).map(|last| Cursor {
            prefix: cursor.prefix.clone(),
            keyword: cursor.keyword.clone(),
            count,
            offset: window,
            last_key: Some(last.key.clone()),
        });

        tracing::debug!(
            offset = cursor.offset,
            count,
            returned = list.len(),
            generation = snapshot.generation(),
            "Fetched page"
        );

        Ok(SearchPage {
            list,
            cursor: next.map(|c| c.encode()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::search::engine::{EngineOptions, IndexEngine};
    use chrono::{TimeZone, Utc};

    fn engine_with(docs: &[(&str, &str, i64)]) -> IndexEngine {
        let engine = IndexEngine::open(&EngineOptions::default()).unwrap();
        for (key, content, created) in docs {
            engine
                .upsert(&Document {
                    key: key.to_string(),
                    content: content.to_string(),
                    html: String::new(),
                    created_at: Utc.timestamp_opt(*created, 0).unwrap(),
                })
                .unwrap();
        }
        engine.commit().unwrap();
        engine
    }

    fn keys(page: &SearchPage) -> Vec<&str> {
        page.list.iter().map(|d| d.key.as_str()).collect()
    }

    #[test]
    fn test_walks_all_keys_newest_first() {
        let engine = engine_with(&[
            ("a.md", "x", 10),
            ("b.md", "x", 30),
            ("c.md", "x", 20),
            ("d.md", "x", 30),
            ("e.md", "x", 5),
        ]);
        let paginator = Paginator::new(engine.fields());
        let snapshot = engine.snapshot();

        let mut seen = Vec::new();
        let mut request = SearchRequest {
            count: Some(2),
            ..SearchRequest::default()
        };
        loop {
            let page = paginator.search(&snapshot, &request).unwrap();
            seen.extend(keys(&page).into_iter().map(String::from));
            match page.cursor {
                Some(cursor) => {
                    request = SearchRequest {
                        cursor: Some(cursor),
                        ..SearchRequest::default()
                    }
                }
                None => break,
            }
        }
        assert_eq!(seen, vec!["b.md", "d.md", "c.md", "a.md", "e.md"]);
    }

    #[test]
    fn test_cursor_overrides_request_fields() {
        let engine = engine_with(&[("a.md", "x", 1), ("b/c.md", "x", 2), ("b/d.md", "x", 3)]);
        let paginator = Paginator::new(engine.fields());
        let snapshot = engine.snapshot();

        let first = paginator
            .search(
                &snapshot,
                &SearchRequest {
                    prefix: Some("b/".to_string()),
                    count: Some(1),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(keys(&first), vec!["b/d.md"]);

        let second = paginator
            .search(
                &snapshot,
                &SearchRequest {
                    prefix: None,
                    count: Some(50),
                    cursor: first.cursor,
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(keys(&second), vec!["b/c.md"]);
    }

    #[test]
    fn test_stops_at_previous_last_key() {
        let engine = engine_with(&[("a.md", "x", 1), ("b.md", "x", 2)]);
        let paginator = Paginator::new(engine.fields());
        let cursor = Cursor {
            count: 5,
            offset: 0,
            last_key: Some("b.md".to_string()),
            ..Cursor::default()
        };
        let page = paginator.fetch_page(&engine.snapshot(), &cursor).unwrap();
        assert_eq!(keys(&page), vec!["a.md"]);
    }

    #[test]
    fn test_short_window_has_no_cursor() {
        let engine = engine_with(&[("a.md", "hello world", 1), ("b.md", "other", 2)]);
        let paginator = Paginator::new(engine.fields());
        let page = paginator
            .search(
                &engine.snapshot(),
                &SearchRequest {
                    keyword: Some("hello".to_string()),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(keys(&page), vec!["a.md"]);
        assert!(page.cursor.is_none());
    }

    #[test]
    fn test_empty_page_has_no_cursor() {
        let engine = engine_with(&[("a.md", "hello", 1)]);
        let paginator = Paginator::new(engine.fields());
        let page = paginator
            .search(
                &engine.snapshot(),
                &SearchRequest {
                    keyword: Some("absent".to_string()),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert!(page.list.is_empty());
        assert!(page.cursor.is_none());
    }

    #[test]
    fn test_count_validation() {
        let engine = engine_with(&[("a.md", "x", 1)]);
        let paginator = Paginator::new(engine.fields());
        let zero = SearchRequest {
            count: Some(0),
            ..SearchRequest::default()
        };
        assert!(matches!(
            paginator.search(&engine.snapshot(), &zero),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_count_is_capped() {
        let docs: Vec<(String, i64)> = (0..MAX_PAGE_SIZE as i64 + 5)
            .map(|i| (format!("doc{i:03}.md"), i))
            .collect();
        let refs: Vec<(&str, &str, i64)> = docs.iter().map(|(k, c)| (k.as_str(), "x", *c)).collect();
        let engine = engine_with(&refs);
        let paginator = Paginator::new(engine.fields());

        let huge = Cursor {
            count: 10_000,
            ..Cursor::default()
        };
        let page = paginator.fetch_page(&engine.snapshot(), &huge).unwrap();
        assert_eq!(page.list.len(), MAX_PAGE_SIZE);
        let next = Cursor::decode(page.cursor.as_deref().unwrap()).unwrap();
        assert_eq!(next.count, MAX_PAGE_SIZE);
        assert_eq!(next.offset, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_huge_offset_yields_empty_page() {
        let engine = engine_with(&[("a.md", "x", 1), ("b.md", "x", 2)]);
        let paginator = Paginator::new(engine.fields());
        let forged = Cursor {
            count: 10,
            offset: 1 << 40,
            ..Cursor::default()
        };
        let request = SearchRequest {
            cursor: Some(forged.encode()),
            ..SearchRequest::default()
        };
        let page = paginator.search(&engine.snapshot(), &request).unwrap();
        assert!(page.list.is_empty());
        assert!(page.cursor.is_none());

        let overflow = Cursor {
            count: 10,
            offset: usize::MAX,
            ..Cursor::default()
        };
        assert!(matches!(
            paginator.fetch_page(&engine.snapshot(), &overflow),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_long_prefix_is_matched_literally() {
        let long = "a".repeat(2000);
        let key = format!("{long}/doc.md");
        let engine = engine_with(&[(key.as_str(), "x", 1), ("a.md", "x", 2), ("b.md", "x", 3)]);
        let paginator = Paginator::new(engine.fields());

        let page = paginator
            .search(
                &engine.snapshot(),
                &SearchRequest {
                    prefix: Some(long.clone()),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert_eq!(keys(&page), vec![key.as_str()]);

        let page = paginator
            .search(
                &engine.snapshot(),
                &SearchRequest {
                    prefix: Some(format!("{long}b")),
                    ..SearchRequest::default()
                },
            )
            .unwrap();
        assert!(page.list.is_empty());
    }

    #[test]
    fn test_prefix_excludes_sibling_keys() {
        let engine = engine_with(&[
            ("b/c.md", "x", 1),
            ("b0.md", "x", 2),
            ("b.md", "x", 3),
            ("目录/a.md", "x", 4),
        ]);
        let paginator = Paginator::new(engine.fields());
        let search = |prefix: &str| {
            paginator
                .search(
                    &engine.snapshot(),
                    &SearchRequest {
                        prefix: Some(prefix.to_string()),
                        ..SearchRequest::default()
                    },
                )
                .unwrap()
        };
        assert_eq!(keys(&search("b/")), vec!["b/c.md"]);
        assert_eq!(keys(&search("目录/")), vec!["目录/a.md"]);
    }

    #[test]
    fn test_malformed_cursor_is_client_error() {
        let engine = engine_with(&[("a.md", "x", 1)]);
        let paginator = Paginator::new(engine.fields());
        let request = SearchRequest {
            cursor: Some("%%%".to_string()),
            ..SearchRequest::default()
        };
        assert!(matches!(
            paginator.search(&engine.snapshot(), &request),
            Err(Error::MalformedCursor(_))
        ));
    }
}
