//! Track assembly over the interval splitter and chunk executor
//!
//! [`assemble`] is the retrieval pipeline in one call: validate the query,
//! split its range into sub-ranges sized for the executor, run the chunk
//! reader over every sub-range, and concatenate the block lists in genomic
//! order. A feature that spans a sub-range boundary is reported by the chunk
//! containing its start index; the reader applies that rule, so concatenation
//! over disjoint gap-free sub-ranges needs no deduplication.

use std::time::Duration;

use crate::track::executor::{ChunkExecutor, ChunkReader};
use crate::track::split::split;
use crate::track::{Block, Track, TrackQuery};
use crate::Result;

/// Retrieves one track: split, fan out, concatenate
///
/// The query range is 1-based inclusive; the sub-ranges handed to `reader`
/// are its 0-based half-open image, so a reader maps a chunk back to genome
/// coordinates as `range.start + 1 ..= range.end`.
///
/// # Arguments
/// * `query` - Identity and range of the track to assemble
/// * `max_block_size` - Target sub-range size for the splitter
/// * `executor` - Retrieval strategy; sequential and parallel yield identical
///   tracks for identical inputs
/// * `deadline` - Optional wall-clock budget for the whole retrieval
/// * `reader` - Produces the ordered block list of one sub-range
///
/// # Errors
/// Query validation failures, the first reader error, or
/// [`ConcurrencyError::Timeout`](crate::error::ConcurrencyError::Timeout)
/// when the deadline expires.
pub fn assemble<B, R>(
    query: &TrackQuery,
    max_block_size: i64,
    executor: &ChunkExecutor,
    deadline: Option<Duration>,
    reader: &R,
) -> Result<Track<B>>
where
    B: Send,
    R: ChunkReader<Vec<Block<B>>>,
{
    let bounds = query.validate()?;
    let plan = split(
        i64::from(bounds.start_index) - 1,
        i64::from(bounds.end_index),
        max_block_size,
        executor.max_tasks(),
    )?;
    let chunk_lists = executor.retrieve(&plan, reader, deadline)?;
    let blocks: Vec<Block<B>> = chunk_lists.into_iter().flatten().collect();
    log::debug!(
        "assembled track file={} chromosome={} range={}..={} blocks={}",
        bounds.file_id,
        bounds.chromosome_id,
        bounds.start_index,
        bounds.end_index,
        blocks.len()
    );
    Ok(Track {
        file_id: bounds.file_id,
        chromosome_id: bounds.chromosome_id,
        start_index: bounds.start_index,
        end_index: bounds.end_index,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConcurrencyError, ValidationError};
    use crate::track::executor::ExecutorOptions;
    use crate::track::split::SubRange;
    use crate::track::window_blocks;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SPAN: (i32, i32) = (1, 1200);

    fn query() -> TrackQuery {
        TrackQuery::new(7, 3, SPAN.0, SPAN.1)
    }

    fn chunk_bounds(range: &SubRange) -> (i32, i32) {
        ((range.start + 1) as i32, range.end as i32)
    }

    #[test]
    fn test_blocks_concatenate_in_genomic_order() -> Result<()> {
        let reader = |range: &SubRange| -> Result<Vec<Block<i64>>> {
            let (lo, hi) = chunk_bounds(range);
            Ok(vec![Block::new(lo, hi, range.start)])
        };
        let executor = ChunkExecutor::parallel(&ExecutorOptions::new(4));
        let track = assemble(&query(), 100, &executor, None, &reader)?;

        assert_eq!(track.file_id, 7);
        assert_eq!(track.chromosome_id, 3);
        assert_eq!((track.start_index, track.end_index), SPAN);
        let starts: Vec<i32> = track.blocks.iter().map(|block| block.start_index).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(track.blocks.first().map(|block| block.start_index), Some(1));
        assert_eq!(track.blocks.last().map(|block| block.end_index), Some(1200));
        Ok(())
    }

    #[test]
    fn test_sequential_and_parallel_tracks_match() -> Result<()> {
        // 50-base summary windows line up with every chunk size the two
        // strategies can plan over this span
        let reader = |range: &SubRange| -> Result<Vec<Block<f64>>> {
            let (lo, hi) = chunk_bounds(range);
            let blocks = window_blocks(lo, hi, 0.02)?
                .into_iter()
                .map(|(start, end)| Block::new(start, end, f64::from(end - start + 1)))
                .collect();
            Ok(blocks)
        };
        let sequential = assemble(&query(), 100, &ChunkExecutor::sequential(), None, &reader)?;
        let parallel = assemble(
            &query(),
            100,
            &ChunkExecutor::parallel(&ExecutorOptions::new(4)),
            None,
            &reader,
        )?;
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.blocks.len(), 24);
        Ok(())
    }

    #[test]
    fn test_spanning_feature_reported_once_by_starting_chunk() -> Result<()> {
        const FEATURES: [(i32, i32); 4] = [(90, 410), (250, 260), (590, 610), (1100, 1200)];
        let reader = |range: &SubRange| -> Result<Vec<Block<()>>> {
            let (lo, hi) = chunk_bounds(range);
            Ok(FEATURES
                .iter()
                .filter(|feature| lo <= feature.0 && feature.0 <= hi)
                .map(|&(start, end)| Block::new(start, end, ()))
                .collect())
        };

        let executor = ChunkExecutor::parallel(&ExecutorOptions::new(4));
        let track = assemble(&query(), 100, &executor, None, &reader)?;
        let spans: Vec<(i32, i32)> = track
            .blocks
            .iter()
            .map(|block| (block.start_index, block.end_index))
            .collect();
        assert_eq!(spans, FEATURES);

        let sequential = assemble(&query(), 100, &ChunkExecutor::sequential(), None, &reader)?;
        assert_eq!(sequential, track);
        Ok(())
    }

    #[test]
    fn test_invalid_query_rejected_before_reading() {
        let calls = AtomicUsize::new(0);
        let reader = |_range: &SubRange| -> Result<Vec<Block<u8>>> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        };
        let query = TrackQuery {
            end_index: None,
            ..TrackQuery::new(7, 3, 1, 100)
        };
        let err = assemble(&query, 100, &ChunkExecutor::sequential(), None, &reader).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::ValidationError(ValidationError::MissingTrackField("endIndex"))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reader_error_aborts_assembly() {
        let reader = |range: &SubRange| -> Result<Vec<Block<u8>>> {
            if range.end >= 600 {
                return Err(anyhow::anyhow!("chunk backend unavailable").into());
            }
            Ok(Vec::new())
        };
        let executor = ChunkExecutor::parallel(&ExecutorOptions::new(2));
        let err = assemble(&query(), 100, &executor, None, &reader).unwrap_err();
        assert!(err.to_string().contains("chunk backend unavailable"));
    }

    #[test]
    fn test_deadline_expires_during_assembly() {
        let reader = |range: &SubRange| -> Result<Vec<Block<u8>>> {
            std::thread::sleep(Duration::from_millis(30));
            let (lo, hi) = chunk_bounds(range);
            Ok(vec![Block::new(lo, hi, 0)])
        };
        let err = assemble(
            &query(),
            100,
            &ChunkExecutor::sequential(),
            Some(Duration::from_millis(10)),
            &reader,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::ConcurrencyError(ConcurrencyError::Timeout { .. })
        ));
    }
}
