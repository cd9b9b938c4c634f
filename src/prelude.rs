pub use super::{Error, Result};

pub use crate::index::{
    FeatureIndexEntry, Filter, FilterTerm, IndexManager, IndexOptions, QueryRequest, RecordSource,
    SortRule,
};
pub use crate::nib::{NibFile, NibSequence, NibSlice};
pub use crate::track::{
    assemble, Block, ChunkExecutor, ChunkReader, ExecutorOptions, SubRange, Track, TrackQuery,
};
