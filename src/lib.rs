//! Feature indexing and track retrieval for genome browsers
//!
//! `featrack` maintains one searchable segment per registered variant or
//! annotation file and serves filtered, sorted, paged feature queries over any
//! subset of them. Track assembly fans sub-range reads out over a bounded
//! worker set; reference sequence is stored in the 4-bit nib codec and read
//! through memory maps.

pub mod error;
pub mod index;
pub mod nib;
pub mod prelude;
pub mod sortable;
pub mod track;

pub use error::{Error, Result};
pub use index::{
    Document, FeatureIndexEntry, FeatureType, FieldKind, FieldValue, Filter, FilterOp, FilterTerm,
    GroupEntry, IndexField, IndexManager, IndexOptions, IndexStatus, QueryRequest, RecordSource,
    SearchResult, SortRule, VariationType,
};
pub use nib::{NibFile, NibSequence, NibSlice};
pub use track::{
    assemble, Block, ChunkExecutor, ChunkReader, ExecutorOptions, IntervalPlan, SubRange, Track,
    TrackQuery,
};
