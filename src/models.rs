use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An indexed corpus file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Slash-separated path relative to the corpus root; unique and case-sensitive.
    pub key: String,
    pub content: String,
    /// Rendered HTML. Stored alongside the document, never indexed.
    pub html: String,
    /// Time of the first commit that contains `key`.
    pub created_at: DateTime<Utc>,
}

/// Search request as received at the query boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    /// Restrict results to keys starting with this prefix
    #[serde(rename = "p")]
    pub prefix: Option<String>,
    /// Free-text keyword
    #[serde(rename = "q")]
    pub keyword: Option<String>,
    /// Page size
    #[serde(rename = "n")]
    pub count: Option<usize>,
    /// Opaque pagination cursor; overrides the other fields when present
    #[serde(rename = "c")]
    pub cursor: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub list: Vec<Document>,
    /// Cursor for the next page; absent once the results are exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Table of contents response
#[derive(Debug, Clone, Serialize)]
pub struct TocResponse {
    pub toc: Vec<String>,
}
