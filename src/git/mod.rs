//! The document corpus: a git mirror and the source trait the sync loop reads through.

pub mod cache;
pub mod clone;
pub mod mirror;
pub mod source;

pub use clone::ExtensionFilter;
pub use mirror::GitMirror;
pub use source::{ChangeSet, DocumentSource, Metadata};
