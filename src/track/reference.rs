//! Reference-track readers over nib-packed sequence data
//!
//! The two readers here cover the resolutions a browser asks for: raw bases
//! when zoomed in, GC-content summaries when zoomed out. Both take a borrowed
//! [`NibSlice`] so they decode straight out of a mapped container, and both
//! speak 1-based inclusive genome coordinates.

use crate::error::ValidationError;
use crate::nib::{is_gc_code, NibSlice};
use crate::track::{window_blocks, Block};
use crate::Result;

/// One block per base over a 1-based inclusive range
///
/// # Errors
/// [`ValidationError::InvalidTrackBounds`] unless `1 <= start <= end`, or a
/// codec error when the range runs past the sequence.
pub fn base_blocks(sequence: &NibSlice<'_>, start: i32, end: i32) -> Result<Vec<Block<u8>>> {
    if start < 1 || end < start {
        return Err(ValidationError::InvalidTrackBounds { start, end }.into());
    }
    let len = (end - start + 1) as usize;
    let bases = sequence.decode_range((start - 1) as usize, len)?;
    Ok(bases
        .into_iter()
        .zip(start..)
        .map(|(base, index)| Block::new(index, index, base))
        .collect())
}

/// GC-content fraction per summary window
///
/// Windows come from [`window_blocks`]; the fraction is GC codes (either
/// case) over the full window length, so `N` runs and gaps dilute it rather
/// than being skipped.
///
/// # Errors
/// The validation errors of [`window_blocks`], or a codec error when the
/// range runs past the sequence.
pub fn gc_blocks(
    sequence: &NibSlice<'_>,
    start: i32,
    end: i32,
    scale_factor: f64,
) -> Result<Vec<Block<f32>>> {
    let windows = window_blocks(start, end, scale_factor)?;
    let mut blocks = Vec::with_capacity(windows.len());
    for (window_start, window_end) in windows {
        let mut gc = 0u32;
        for pos in window_start..=window_end {
            if is_gc_code(sequence.code_at((pos - 1) as usize)?) {
                gc += 1;
            }
        }
        let window_len = (window_end - window_start + 1) as u32;
        blocks.push(Block::new(
            window_start,
            window_end,
            gc as f32 / window_len as f32,
        ));
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, Error};
    use crate::nib::NibSequence;
    use crate::track::executor::{ChunkExecutor, ExecutorOptions};
    use crate::track::split::SubRange;
    use crate::track::{assembler, TrackQuery};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_base_blocks_full_resolution() -> Result<()> {
        let seq = NibSequence::from_bases(b"ACGTN")?;
        let blocks = base_blocks(&seq.as_slice(), 2, 4)?;
        assert_eq!(
            blocks,
            vec![
                Block::new(2, 2, b'C'),
                Block::new(3, 3, b'G'),
                Block::new(4, 4, b'T'),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_base_blocks_preserve_case_and_gaps() -> Result<()> {
        let bases = b"acgTN-?";
        let seq = NibSequence::from_bases(bases)?;
        let blocks = base_blocks(&seq.as_slice(), 1, bases.len() as i32)?;
        let decoded: Vec<u8> = blocks.iter().map(|block| block.payload).collect();
        assert_eq!(decoded, bases);
        assert_eq!(blocks.first().map(|block| block.start_index), Some(1));
        assert_eq!(blocks.last().map(|block| block.end_index), Some(7));
        Ok(())
    }

    #[test]
    fn test_base_blocks_rejects_bad_bounds() -> Result<()> {
        let seq = NibSequence::from_bases(b"ACGT")?;
        let slice = seq.as_slice();
        assert!(matches!(
            base_blocks(&slice, 0, 3).unwrap_err(),
            Error::ValidationError(ValidationError::InvalidTrackBounds { start: 0, end: 3 })
        ));
        assert!(matches!(
            base_blocks(&slice, 3, 2).unwrap_err(),
            Error::ValidationError(ValidationError::InvalidTrackBounds { .. })
        ));
        assert!(matches!(
            base_blocks(&slice, 2, 9).unwrap_err(),
            Error::CodecError(CodecError::RangeOutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_gc_blocks_summarized() -> Result<()> {
        // Four 5-base windows with known GC counts 5, 0, 4, 2
        let seq = NibSequence::from_bases(b"GGGGGATATAGCgcANNNCG")?;
        let blocks = gc_blocks(&seq.as_slice(), 1, 20, 0.2)?;
        assert_eq!(
            blocks,
            vec![
                Block::new(1, 5, 1.0),
                Block::new(6, 10, 0.0),
                Block::new(11, 15, 0.8),
                Block::new(16, 20, 0.4),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_gc_blocks_full_resolution() -> Result<()> {
        let seq = NibSequence::from_bases(b"GCAT")?;
        let blocks = gc_blocks(&seq.as_slice(), 1, 4, 1.0)?;
        let fractions: Vec<f32> = blocks.iter().map(|block| block.payload).collect();
        assert_eq!(fractions, vec![1.0, 1.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_gc_blocks_clamped_last_window() -> Result<()> {
        let seq = NibSequence::from_bases(b"ATGCGGC")?;
        let blocks = gc_blocks(&seq.as_slice(), 1, 7, 1.0 / 3.0)?;
        assert_eq!(
            blocks,
            vec![
                Block::new(1, 3, 1.0 / 3.0),
                Block::new(4, 6, 1.0),
                Block::new(7, 7, 1.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_gc_blocks_rejects_bad_input() -> Result<()> {
        let seq = NibSequence::from_bases(b"ACGT")?;
        let slice = seq.as_slice();
        assert!(matches!(
            gc_blocks(&slice, 1, 4, 0.0).unwrap_err(),
            Error::ValidationError(ValidationError::InvalidScaleFactor(_))
        ));
        assert!(matches!(
            gc_blocks(&slice, 1, 10, 1.0).unwrap_err(),
            Error::CodecError(CodecError::RangeOutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_reference_track_assembly() -> Result<()> {
        let alphabet = b"ACGTNacgtn";
        let mut rng = SmallRng::seed_from_u64(7);
        let bases: Vec<u8> = (0..1200)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();
        let seq = NibSequence::from_bases(&bases)?;
        let slice = seq.as_slice();
        let reader = move |range: &SubRange| -> Result<Vec<Block<u8>>> {
            base_blocks(&slice, (range.start + 1) as i32, range.end as i32)
        };

        let query = TrackQuery::new(11, 1, 1, 1200);
        let parallel = assembler::assemble(
            &query,
            100,
            &ChunkExecutor::parallel(&ExecutorOptions::new(4)),
            None,
            &reader,
        )?;
        let sequential =
            assembler::assemble(&query, 100, &ChunkExecutor::sequential(), None, &reader)?;
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.blocks.len(), 1200);
        let decoded: Vec<u8> = parallel.blocks.iter().map(|block| block.payload).collect();
        assert_eq!(decoded, bases);
        Ok(())
    }
}
