//! # markup-search
//!
//! A full-text search service over a corpus of markdown files mirrored from a
//! git repository. Chinese text is segmented into words and indexed together
//! with its pinyin, so `中国`, `zhongguo` and `zg` all find the same document.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐  refresh / diff / read   ┌──────────────────┐
//!   │  GitMirror   │◄─────────────────────────│ SyncCoordinator  │
//!   │ (git2 clone) │                          │  single-flight   │
//!   └──────────────┘                          └────────┬─────────┘
//!                                                      │ render + upsert / delete
//!                                                      ▼
//!                       ┌───────────────────────────────────────────┐
//!                       │               IndexEngine                 │
//!                       │  staged writer ──commit──► Snapshot (gen) │
//!                       │  old snapshots ──► reaper (grace period)  │
//!                       └──────────────────────┬────────────────────┘
//!                                              │ current snapshot
//!                                              ▼
//!   ┌──────────────┐   query + sort   ┌──────────────────┐
//!   │ QueryPlanner │─────────────────►│    Paginator     │──► page + cursor
//!   └──────────────┘                  └──────────────────┘
//! ```
//!
//! Text passes through the same analyzer at index and query time:
//! script-aware segmentation (jieba for CJK runs), lowercasing, then pinyin
//! expansion at the same token position.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration
//! - [`models`] - Shared data types: `Document`, search request and page
//! - [`analysis`] - Segmentation, case folding and pinyin expansion; the tantivy tokenizer
//! - [`search::engine`] - Staged writes, commits and snapshot publishing
//! - [`search::query`] - Prefix filter, exact and fuzzy keyword queries, sort order
//! - [`search::paginate`] - Reverse-scan pagination with opaque [`search::cursor`]s
//! - [`git`] - The corpus: document source trait and its git mirror
//! - [`render`] - Markdown to HTML
//! - [`sync`] - Incremental corpus to index synchronization
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state
//! - [`shutdown`] - Ordered release of resources

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod git;
pub mod models;
pub mod render;
pub mod search;
pub mod shutdown;
pub mod state;
pub mod sync;
