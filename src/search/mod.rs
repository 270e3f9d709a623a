//! Full-text index, query planning and cursor pagination.

pub mod cursor;
pub mod engine;
pub mod paginate;
pub mod query;
pub mod snapshot;

pub use cursor::Cursor;
pub use engine::{EngineOptions, IndexEngine};
pub use paginate::Paginator;
pub use query::{QueryPlanner, SortOrder};
pub use snapshot::Snapshot;
