use std::path::PathBuf;
use std::time::Duration;

/// Custom Result type for featrack operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the featrack library, encompassing all possible error
/// cases that can occur during indexing, codec, and track retrieval operations.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Malformed queries, filters, documents, or track requests, rejected before
    /// touching index state
    ValidationError(#[from] ValidationError),
    /// Errors reading, writing, or swapping index segments
    IndexError(#[from] IndexError),
    /// Errors in the nib nucleotide codec or its on-disk container
    CodecError(#[from] CodecError),
    /// Errors raised by the chunked retrieval machinery
    ConcurrencyError(#[from] ConcurrencyError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Generic errors raised by collaborator-supplied readers and sources
    AnyhowError(#[from] anyhow::Error),
}

/// Errors for requests that fail validation before any index or file state is read
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// A filter or sort rule referenced a field the registry does not know
    ///
    /// # Arguments
    /// * `String` - The unknown field name
    #[error("Unknown index field: {0}")]
    UnknownField(String),

    /// A filter term (or stored value) does not match the declared kind of its field
    ///
    /// # Fields
    /// * `field` - The field name
    /// * `expected` - The kind declared in the field registry
    /// * `got` - The kind that was supplied
    #[error("Field '{field}' expects {expected} values, got {got}")]
    KindMismatch {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    /// A mandatory document field was absent when converting to or from a document
    #[error("Missing mandatory field: {0}")]
    MissingField(&'static str),

    /// A stored field value could not be parsed back into its domain type
    ///
    /// # Fields
    /// * `field` - The field name
    /// * `value` - The unrecognized stored value
    #[error("Field '{field}' holds unrecognized value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    /// An annotation key collides with a registered field name
    #[error("Annotation key collides with registered field: {0}")]
    AnnotationCollision(String),

    /// A range filter carries no bounds or inverted bounds
    #[error("Invalid range bounds on field '{0}'")]
    InvalidRange(String),

    /// Pagination parameters must be 1-based and non-zero
    ///
    /// # Fields
    /// * `page` - The requested page number
    /// * `page_size` - The requested page size
    #[error("Invalid pagination: page {page}, page size {page_size} (both must be >= 1)")]
    InvalidPage { page: u32, page_size: u32 },

    /// The group-by field kind has no stable value rendering
    #[error("Field '{0}' cannot be grouped")]
    UngroupableField(String),

    /// A genomic interval with a non-positive span
    ///
    /// # Fields
    /// * `start` - The requested start boundary
    /// * `end` - The requested end boundary
    #[error("Invalid interval: [{start}, {end})")]
    InvalidInterval { start: i64, end: i64 },

    /// Track coordinates must be 1-based with start <= end
    #[error("Invalid track bounds: [{start}, {end}] (1-based inclusive)")]
    InvalidTrackBounds { start: i32, end: i32 },

    /// A splitter or executor budget was zero
    #[error("Budget '{0}' must be greater than zero")]
    InvalidBudget(&'static str),

    /// A track cache key or assembly was requested with an identity field unset
    #[error("Track request is missing required field: {0}")]
    MissingTrackField(&'static str),

    /// Scale factors must be finite and positive
    #[error("Invalid scale factor: {0}")]
    InvalidScaleFactor(f64),
}

/// Errors reading, writing, or serving index segments
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The magic number in the segment header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid segment magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The segment format version is not supported
    #[error("Invalid segment format version: {0}")]
    InvalidFormatVersion(u8),

    /// The segment file is smaller than its fixed-size header
    ///
    /// # Fields
    /// * `path` - The segment file path
    /// * `len` - The actual file length in bytes
    #[error("Segment file {path:?} is truncated ({len} bytes)")]
    TruncatedSegment { path: PathBuf, len: usize },

    /// The number of entries decoded does not match the header count
    ///
    /// # Fields
    /// * `path` - The segment file path
    /// * `expected` - The entry count recorded in the header
    /// * `got` - The number of entries actually decoded
    #[error("Segment {path:?} decoded {got} entries, header declares {expected}")]
    EntryCountMismatch {
        path: PathBuf,
        expected: u64,
        got: u64,
    },

    /// The segment payload could not be decoded
    #[error("Corrupt segment {path:?}: {detail}")]
    CorruptSegment { path: PathBuf, detail: String },

    /// A search or group request scoped a file id with no servable segment
    ///
    /// # Arguments
    /// * `i64` - The file id whose segment is absent, still building, or failed
    #[error("No ready index segment for file id {0}")]
    SegmentNotReady(i64),

    /// An I/O failure while reading, writing, or swapping a segment file
    #[error("Segment I/O failure at {path:?}")]
    SegmentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in the nib codec and its on-disk container
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// A base character outside the nib alphabet was encoded
    ///
    /// # Arguments
    /// * `u8` - The unsupported input byte
    #[error("Unsupported base character (byte {0:#04x})")]
    UnsupportedBase(u8),

    /// A nibble outside the assigned alphabet was decoded
    ///
    /// # Arguments
    /// * `u8` - The unassigned nibble value
    #[error("Unassigned nibble value: {0}")]
    UnassignedNibble(u8),

    /// A decode range falls outside the sequence bounds
    ///
    /// # Fields
    /// * `start` - The requested start position (0-based)
    /// * `len` - The requested length
    /// * `size` - The number of bases in the sequence
    #[error("Requested range ({start}, len {len}) is out of sequence bounds ({size})")]
    RangeOutOfBounds {
        start: usize,
        len: usize,
        size: usize,
    },

    /// The magic number in the nib container header does not match
    #[error("Invalid nib container magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The nib container format version is not supported
    #[error("Invalid nib container format version: {0}")]
    InvalidFormatVersion(u8),

    /// The nib container payload is shorter than its base count requires
    ///
    /// # Fields
    /// * `path` - The container path
    /// * `expected` - The expected payload size in bytes
    /// * `got` - The actual payload size in bytes
    #[error("Nib container {path:?} holds {got} payload bytes, expected {expected}")]
    TruncatedContainer {
        path: PathBuf,
        expected: usize,
        got: usize,
    },

    /// A packed buffer does not match the declared base count
    #[error("Packed buffer of {got} bytes cannot hold {bases} bases")]
    BufferSizeMismatch { bases: usize, got: usize },
}

/// Errors raised by the chunk task executor and rebuild coordination
#[derive(thiserror::Error, Debug)]
pub enum ConcurrencyError {
    /// A chunked retrieval exceeded its caller-supplied deadline
    ///
    /// # Fields
    /// * `deadline` - The configured deadline
    /// * `completed` - Chunks that finished before expiry
    /// * `total` - Chunks in the retrieval plan
    #[error("Chunked retrieval exceeded deadline {deadline:?} ({completed}/{total} chunks done)")]
    Timeout {
        deadline: Duration,
        completed: usize,
        total: usize,
    },

    /// A rebuild was requested while one was already in flight for the file id
    ///
    /// # Arguments
    /// * `i64` - The file id with a rebuild already in flight
    #[error("Index rebuild already in progress for file id {0}")]
    RebuildConflict(i64),
}
