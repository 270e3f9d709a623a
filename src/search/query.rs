use std::ops::Bound;

use tantivy::query::{
    AllQuery, BooleanQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur, Query,
    RangeQuery, TermQuery,
};
use tantivy::schema::IndexRecordOption;
use tantivy::Term;

use crate::analysis::Analyzer;
use crate::error::Result;
use crate::search::snapshot::{Fields, KEY};

/// Terms up to this many characters are matched exactly; fuzzy matching on
/// short terms produces too many false positives.
pub const EXACT_MATCH_MAX_CHARS: usize = 4;

/// Edit distance for fuzzy matching of longer terms.
pub const DEFAULT_FUZZY_DISTANCE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest `created` first, ties broken by ascending key.
    CreatedDesc,
    /// Highest BM25 score first.
    Relevance,
}

/// Builds tantivy queries from a key prefix and a free-text keyword.
#[derive(Debug, Clone, Copy)]
pub struct QueryPlanner {
    fields: Fields,
    analyzer: Analyzer,
}

impl QueryPlanner {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            analyzer: Analyzer::new(),
        }
    }

    /// Empty strings count as absent.
    pub fn build_query(&self, prefix: Option<&str>, keyword: Option<&str>) -> Result<Box<dyn Query>> {
        let prefix = prefix.filter(|p| !p.is_empty());
        let keyword = keyword.filter(|k| !k.is_empty());

        let query: Box<dyn Query> = match (prefix, keyword) {
            (None, None) => Box::new(AllQuery),
            (Some(prefix), None) => self.prefix_filter(prefix)?,
            (None, Some(keyword)) => {
                let clauses = self.keyword_clauses(keyword);
                if clauses.is_empty() {
                    Box::new(EmptyQuery)
                } else {
                    Box::new(BooleanQuery::new(clauses))
                }
            }
            (Some(prefix), Some(keyword)) => {
                let clauses = self.keyword_clauses(keyword);
                if clauses.is_empty() {
                    Box::new(EmptyQuery)
                } else {
                    let mut all = Vec::with_capacity(clauses.len() + 1);
                    all.push((Occur::Must, self.prefix_filter(prefix)?));
                    all.extend(clauses);
                    Box::new(BooleanQuery::new(all))
                }
            }
        };

        tracing::debug!(?prefix, ?keyword, "Built query {:?}", query);
        Ok(query)
    }

    pub fn build_sort(keyword_present: bool) -> SortOrder {
        if keyword_present {
            SortOrder::Relevance
        } else {
            SortOrder::CreatedDesc
        }
    }

    /// Literal prefix match on the key, as the term range
    /// `[prefix, prefix_successor(prefix))`. Scores zero so it never
    /// influences relevance ordering.
    fn prefix_filter(&self, prefix: &str) -> Result<Box<dyn Query>> {
        let successor = prefix_successor(prefix);
        let upper = match successor.as_deref() {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let range = RangeQuery::new_str_bounds(KEY.to_string(), Bound::Included(prefix), upper);
        Ok(Box::new(ConstScoreQuery::new(Box::new(range), 0.0)))
    }

    /// One required clause per distinct analyzed term of `keyword`.
    fn keyword_clauses(&self, keyword: &str) -> Vec<(Occur, Box<dyn Query>)> {
        self.analyzer
            .terms(keyword)
            .into_iter()
            .map(|text| {
                let term = Term::from_field_text(self.fields.content, &text);
                let clause: Box<dyn Query> = if text.chars().count() <= EXACT_MATCH_MAX_CHARS {
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
                } else {
                    Box::new(FuzzyTermQuery::new(term, DEFAULT_FUZZY_DISTANCE, true))
                };
                (Occur::Must, clause)
            })
            .collect()
    }
}

/// Smallest string greater than every string starting with `prefix`, or
/// `None` when no such string exists. UTF-8 byte order equals code point
/// order, so this is also the bound in the term dictionary.
fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = (last as u32 + 1..=char::MAX as u32).find_map(char::from_u32) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
