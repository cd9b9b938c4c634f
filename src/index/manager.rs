//! Index lifecycle and search
//!
//! The manager owns one segment per registered source file and moves it
//! through a small state machine:
//!
//! ```text
//! Empty -> Building -> Ready            (initial build)
//! Ready -> Rebuilding -> Ready          (rebuild; old segment stays servable)
//! Building | Rebuilding -> Failed       (on error; retry with another rebuild)
//! ```
//!
//! Builds happen outside the registry lock. Readers clone `Arc` handles under
//! a short read lock and then search lock-free against an immutable segment;
//! the only write-lock hold on the read path is the pointer swap at the end of
//! a build, so a search sees fully-old or fully-new data and never a mix.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ConcurrencyError, IndexError, ValidationError};
use crate::index::document::{from_document, Document, FieldValue};
use crate::index::fields::{FeatureIndexEntry, FieldKind, IndexField};
use crate::index::query::{self, ComposedQuery, QueryRequest};
use crate::index::segment::{Segment, DEFAULT_COMPRESSION};
use crate::sortable::{self, CaseMode};
use crate::Result;

/// File name of the live segment inside a per-file directory
const SEGMENT_FILE: &str = "segment.fseg";

/// Supplies raw feature entries for source files
///
/// Implementations wrap whatever holds the primary data (a VCF/GFF parser, a
/// database, a test fixture). `rebuild_aux` asks the source to regenerate its
/// auxiliary positional artifacts before reading.
pub trait RecordSource: Send + Sync {
    /// Loads every indexable entry for one source file
    ///
    /// # Errors
    /// Any failure reading the primary data.
    fn load_entries(&self, file_id: i64, rebuild_aux: bool) -> Result<Vec<FeatureIndexEntry>>;
}

impl<F> RecordSource for F
where
    F: Fn(i64, bool) -> Result<Vec<FeatureIndexEntry>> + Send + Sync,
{
    fn load_entries(&self, file_id: i64, rebuild_aux: bool) -> Result<Vec<FeatureIndexEntry>> {
        self(file_id, rebuild_aux)
    }
}

/// Storage configuration for the index manager
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Directory holding one sub-directory per indexed file id
    pub index_root: PathBuf,
    /// zstd level for segment payloads
    pub compression_level: i32,
}

impl IndexOptions {
    #[must_use]
    pub fn new(index_root: impl Into<PathBuf>) -> Self {
        Self {
            index_root: index_root.into(),
            compression_level: DEFAULT_COMPRESSION,
        }
    }

    #[must_use]
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }
}

/// Lifecycle of one file's segment
enum SegmentState {
    /// Registered, never built
    Empty,
    /// Initial build in progress, nothing servable yet
    Building,
    Ready(Arc<Segment>),
    /// New build in progress while the previous segment stays servable
    Rebuilding(Arc<Segment>),
    Failed(String),
}

/// Externally visible lifecycle stage of one file's index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Empty,
    Building,
    Ready,
    Rebuilding,
    Failed,
}

/// One page of search results with the exact overall total
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub entries: Vec<FeatureIndexEntry>,
    /// Matches across the whole scope, independent of pagination
    pub total_count: usize,
}

/// One bucket of a group aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub value: String,
    pub count: usize,
}

/// Thread-safe registry of per-file index segments
pub struct IndexManager<S> {
    options: IndexOptions,
    source: S,
    registry: RwLock<HashMap<i64, SegmentState>>,
}

impl<S: RecordSource> IndexManager<S> {
    /// Creates a manager rooted at `options.index_root`, recovering any
    /// segment files already on disk into Ready state
    ///
    /// # Errors
    /// Returns an error when the root directory cannot be created or listed.
    /// An individual segment that fails to load does not abort construction;
    /// its file id starts in Failed state instead.
    pub fn new(options: IndexOptions, source: S) -> Result<Self> {
        std::fs::create_dir_all(&options.index_root)?;
        let manager = Self {
            options,
            source,
            registry: RwLock::new(HashMap::new()),
        };
        manager.recover()?;
        Ok(manager)
    }

    fn recover(&self) -> Result<()> {
        let mut registry = self.registry.write();
        for dir_entry in std::fs::read_dir(&self.options.index_root)? {
            let dir_entry = dir_entry?;
            let Ok(name) = dir_entry.file_name().into_string() else {
                continue;
            };
            let Ok(dir_id) = name.parse::<i64>() else {
                continue;
            };
            let path = dir_entry.path().join(SEGMENT_FILE);
            if !path.is_file() {
                continue;
            }
            match Segment::open(&path) {
                Ok(segment) => {
                    if segment.file_id() != dir_id {
                        log::warn!(
                            "segment at {path:?} claims file {} but lives under {dir_id}, skipping",
                            segment.file_id()
                        );
                        continue;
                    }
                    log::debug!("recovered segment for file {dir_id} ({} documents)", segment.len());
                    registry.insert(dir_id, SegmentState::Ready(Arc::new(segment)));
                }
                Err(err) => {
                    log::warn!("segment for file {dir_id} failed to load: {err}");
                    registry.insert(dir_id, SegmentState::Failed(err.to_string()));
                }
            }
        }
        Ok(())
    }

    fn segment_dir(&self, file_id: i64) -> PathBuf {
        self.options.index_root.join(file_id.to_string())
    }

    fn segment_path(&self, file_id: i64) -> PathBuf {
        self.segment_dir(file_id).join(SEGMENT_FILE)
    }

    /// Registers a source file and runs its initial build
    ///
    /// Re-registering an already indexed file rebuilds it.
    ///
    /// # Errors
    /// [`ConcurrencyError::RebuildConflict`] when a build for this file is
    /// already in progress, or any build failure (which leaves the file in
    /// Failed state).
    pub fn register_file(&self, file_id: i64) -> Result<()> {
        {
            let mut registry = self.registry.write();
            match registry.get(&file_id) {
                Some(SegmentState::Building | SegmentState::Rebuilding(_)) => {
                    return Err(ConcurrencyError::RebuildConflict(file_id).into());
                }
                Some(_) => {}
                None => {
                    registry.insert(file_id, SegmentState::Empty);
                }
            }
        }
        log::info!("file {file_id} registered, building index");
        self.rebuild(file_id, false)
    }

    /// Rebuilds the segment for one registered file
    ///
    /// Exactly one build per file id runs at a time; a concurrent attempt is
    /// rejected immediately rather than queued. While the rebuild runs, the
    /// previous Ready segment keeps serving reads. On failure the file ends in
    /// Failed state with no fallback to the stale segment.
    ///
    /// # Arguments
    /// * `file_id` - The registered source file to re-index
    /// * `rebuild_aux` - Ask the record source to regenerate its auxiliary
    ///   positional artifacts before reading
    ///
    /// # Errors
    /// [`ConcurrencyError::RebuildConflict`] when a build is already running,
    /// [`IndexError::SegmentNotReady`] for an unregistered file id, or any
    /// source/validation/write failure.
    pub fn rebuild(&self, file_id: i64, rebuild_aux: bool) -> Result<()> {
        self.claim_build(file_id)?;
        self.run_build(file_id, rebuild_aux)
    }

    fn claim_build(&self, file_id: i64) -> Result<()> {
        let mut registry = self.registry.write();
        let next = match registry.get(&file_id) {
            Some(SegmentState::Building | SegmentState::Rebuilding(_)) => {
                return Err(ConcurrencyError::RebuildConflict(file_id).into());
            }
            Some(SegmentState::Ready(old)) => SegmentState::Rebuilding(Arc::clone(old)),
            Some(SegmentState::Empty | SegmentState::Failed(_)) => SegmentState::Building,
            None => return Err(IndexError::SegmentNotReady(file_id).into()),
        };
        registry.insert(file_id, next);
        Ok(())
    }

    fn run_build(&self, file_id: i64, rebuild_aux: bool) -> Result<()> {
        let started = std::time::Instant::now();
        let outcome = self.build_segment(file_id, rebuild_aux);

        let mut registry = self.registry.write();
        if !registry.contains_key(&file_id) {
            // Removed while the build ran; the result has no owner
            log::warn!("file {file_id} was removed during indexing, discarding result");
            drop(registry);
            let _ = std::fs::remove_dir_all(self.segment_dir(file_id));
            return outcome.map(|_| ());
        }
        match outcome {
            Ok(segment) => {
                log::info!(
                    "indexed file {file_id}: {} features in {:?}",
                    segment.len(),
                    started.elapsed()
                );
                registry.insert(file_id, SegmentState::Ready(Arc::new(segment)));
                Ok(())
            }
            Err(err) => {
                log::warn!("indexing failed for file {file_id}: {err}");
                registry.insert(file_id, SegmentState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn build_segment(&self, file_id: i64, rebuild_aux: bool) -> Result<Segment> {
        let entries = self.source.load_entries(file_id, rebuild_aux)?;
        let segment = Segment::from_entries(file_id, &entries)?;
        std::fs::create_dir_all(self.segment_dir(file_id))?;
        segment.write(&self.segment_path(file_id), self.options.compression_level)?;
        Ok(segment)
    }

    /// Removes a file's registry entry and deletes its segment directory
    ///
    /// A build still running for this file discards its result on completion.
    ///
    /// # Errors
    /// Returns an error when the segment directory exists but cannot be
    /// deleted.
    pub fn remove_file(&self, file_id: i64) -> Result<()> {
        let existed = self.registry.write().remove(&file_id).is_some();
        let dir = self.segment_dir(file_id);
        if dir.exists() {
            if let Err(err) = std::fs::remove_dir_all(&dir) {
                log::warn!("segment directory {dir:?} for file {file_id} not deleted: {err}");
                return Err(err.into());
            }
        }
        if existed {
            log::info!("file {file_id} removed from index");
        }
        Ok(())
    }

    /// The lifecycle stage of one file id, if registered
    #[must_use]
    pub fn status(&self, file_id: i64) -> Option<IndexStatus> {
        self.registry.read().get(&file_id).map(|state| match state {
            SegmentState::Empty => IndexStatus::Empty,
            SegmentState::Building => IndexStatus::Building,
            SegmentState::Ready(_) => IndexStatus::Ready,
            SegmentState::Rebuilding(_) => IndexStatus::Rebuilding,
            SegmentState::Failed(_) => IndexStatus::Failed,
        })
    }

    /// The failure detail for a file in Failed state
    #[must_use]
    pub fn failure(&self, file_id: i64) -> Option<String> {
        match self.registry.read().get(&file_id) {
            Some(SegmentState::Failed(detail)) => Some(detail.clone()),
            _ => None,
        }
    }

    /// Clones segment handles for the requested scope
    ///
    /// An empty scope means every servable file. A Rebuilding file serves its
    /// previous segment.
    fn scoped_segments(&self, file_ids: &[i64]) -> Result<Vec<Arc<Segment>>> {
        let registry = self.registry.read();
        if file_ids.is_empty() {
            let mut segments: Vec<_> = registry
                .values()
                .filter_map(|state| match state {
                    SegmentState::Ready(segment) | SegmentState::Rebuilding(segment) => {
                        Some(Arc::clone(segment))
                    }
                    _ => None,
                })
                .collect();
            segments.sort_by_key(|segment| segment.file_id());
            return Ok(segments);
        }
        let mut ids = file_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|id| match registry.get(&id) {
                Some(SegmentState::Ready(segment) | SegmentState::Rebuilding(segment)) => {
                    Ok(Arc::clone(segment))
                }
                _ => Err(IndexError::SegmentNotReady(id).into()),
            })
            .collect()
    }

    /// Runs a structured search over the scoped segments
    ///
    /// Matches from every segment merge into one list, sorted by the request's
    /// rules plus the stable default order, then the 1-based page is sliced
    /// out. A page past the end yields an empty entry list with the correct
    /// total.
    ///
    /// # Errors
    /// [`ValidationError`] for a malformed request, or
    /// [`IndexError::SegmentNotReady`] when an explicitly scoped file id is
    /// not servable.
    pub fn search(&self, request: &QueryRequest) -> Result<SearchResult> {
        let composed = query::build(request)?;
        let paging = request.paging()?;
        let segments = self.scoped_segments(&request.file_ids)?;

        let mut matches: Vec<&Document> = Vec::new();
        for segment in &segments {
            matches.extend(segment.select(&composed));
        }
        matches.sort_by(|a, b| query::compare_documents(a, b, &request.order_by));
        let total_count = matches.len();
        log::debug!(
            "search matched {total_count} documents across {} segments",
            segments.len()
        );

        let window: &[&Document] = match paging {
            Some((page, page_size)) => {
                let page_size = page_size as usize;
                let offset = (page as usize - 1) * page_size;
                if offset >= matches.len() {
                    &[]
                } else {
                    &matches[offset..(offset + page_size).min(matches.len())]
                }
            }
            None => &matches,
        };
        let entries = window
            .iter()
            .map(|&doc| from_document(doc))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResult {
            entries,
            total_count,
        })
    }

    /// Counts distinct values of one field across the matching documents
    ///
    /// Every element of a multi-valued field counts. Buckets come back ordered
    /// by descending count, ties broken by value.
    ///
    /// # Errors
    /// [`ValidationError::UnknownField`] for an unregistered group field,
    /// [`ValidationError::UngroupableField`] for a float field (no stable
    /// value rendering), or any scope/filter error a search would raise.
    pub fn group(&self, request: &QueryRequest, group_by: &str) -> Result<Vec<GroupEntry>> {
        let field = IndexField::from_name(group_by)
            .ok_or_else(|| ValidationError::UnknownField(group_by.to_string()))?;
        if field.kind() == FieldKind::Float {
            return Err(ValidationError::UngroupableField(group_by.to_string()).into());
        }
        let composed = query::build(request)?;
        let segments = self.scoped_segments(&request.file_ids)?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for segment in &segments {
            for doc in segment.select(&composed) {
                let Some(values) = doc.get(group_by).and_then(|v| v.group_values()) else {
                    continue;
                };
                for value in values {
                    *counts.entry(value).or_insert(0) += 1;
                }
            }
        }
        let mut groups: Vec<GroupEntry> = counts
            .into_iter()
            .map(|(value, count)| GroupEntry { value, count })
            .collect();
        groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        Ok(groups)
    }

    /// Prefix lookup over feature ids and names, for jump-to-feature boxes
    ///
    /// Matches either identifier case-insensitively, in the stable default
    /// order, capped at `limit`. An empty prefix matches nothing.
    ///
    /// # Errors
    /// [`IndexError::SegmentNotReady`] when a scoped file id is not servable.
    pub fn find_features(
        &self,
        prefix: &str,
        file_ids: &[i64],
        limit: usize,
    ) -> Result<Vec<FeatureIndexEntry>> {
        if prefix.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let key = sortable::encode_str(prefix, CaseMode::Insensitive);
        let composed = ComposedQuery::Or(vec![
            ComposedQuery::Prefix {
                field: IndexField::FeatureId.name().to_string(),
                key: key.clone(),
            },
            ComposedQuery::Prefix {
                field: IndexField::FeatureName.name().to_string(),
                key,
            },
        ]);
        let segments = self.scoped_segments(file_ids)?;

        let mut matches: Vec<&Document> = Vec::new();
        for segment in &segments {
            matches.extend(segment.select(&composed));
        }
        matches.sort_by(|a, b| query::compare_documents(a, b, &[]));
        matches.truncate(limit);
        matches.into_iter().map(from_document).collect()
    }

    /// Sorted distinct chromosome ids holding at least one indexed feature
    ///
    /// # Errors
    /// [`IndexError::SegmentNotReady`] when a scoped file id is not servable.
    pub fn chromosomes_with_features(&self, file_ids: &[i64]) -> Result<Vec<i64>> {
        let segments = self.scoped_segments(file_ids)?;
        let mut ids = BTreeSet::new();
        for segment in &segments {
            for doc in segment.documents() {
                if let Some(FieldValue::Long(id)) = doc.get(IndexField::ChromosomeId.name()) {
                    ids.insert(*id);
                }
            }
        }
        Ok(ids.into_iter().collect())
    }
}
