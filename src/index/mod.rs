//! Feature indexing
//!
//! One search segment per registered source file, built wholesale from the
//! file's records and replaced atomically on rebuild. Records become flat
//! documents of sortable-encoded fields; queries compose per-field term,
//! prefix, and range matches; the manager owns the per-file state machine and
//! serves paged search, grouping, and rebuilds.

pub mod document;
pub mod fields;
pub mod manager;
pub mod query;
pub mod segment;

pub use document::{Document, FieldValue};
pub use fields::{FeatureIndexEntry, FeatureType, FieldKind, IndexField, VariationType};
pub use manager::{GroupEntry, IndexManager, IndexOptions, IndexStatus, RecordSource, SearchResult};
pub use query::{ComposedQuery, Filter, FilterOp, FilterTerm, QueryRequest, SortRule};
pub use segment::Segment;
