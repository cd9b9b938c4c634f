//! Chunked track retrieval
//!
//! A track is the renderable answer to one browser request: an ordered list of
//! blocks covering a chromosome range for one source file. Assembly splits the
//! range into sub-ranges, retrieves each through a [`ChunkReader`], and
//! concatenates the per-chunk blocks back in coordinate order. All track
//! coordinates are 1-based and inclusive on the outside; the splitter works on
//! the 0-based half-open image internally.

pub mod assembler;
pub mod executor;
pub mod reference;
pub mod split;

pub use assembler::assemble;
pub use executor::{ChunkExecutor, ChunkReader, ExecutorOptions};
pub use split::{split, IntervalPlan, SubRange};

use crate::error::ValidationError;
use crate::Result;

/// One rendered block of a track
#[derive(Debug, Clone, PartialEq)]
pub struct Block<B> {
    /// First base the block covers, 1-based inclusive
    pub start_index: i32,
    /// Last base the block covers, 1-based inclusive
    pub end_index: i32,
    pub payload: B,
}

impl<B> Block<B> {
    #[must_use]
    pub const fn new(start_index: i32, end_index: i32, payload: B) -> Self {
        Self {
            start_index,
            end_index,
            payload,
        }
    }
}

/// A fully assembled track over one chromosome range
#[derive(Debug, Clone, PartialEq)]
pub struct Track<B> {
    pub file_id: i64,
    pub chromosome_id: i64,
    /// 1-based inclusive range the track covers
    pub start_index: i32,
    pub end_index: i32,
    /// Blocks in ascending coordinate order
    pub blocks: Vec<Block<B>>,
}

/// One track request as it arrives from the outer layer
///
/// The identity fields are optional because the transport may omit any of
/// them; [`cache_key`](Self::cache_key) and [`validate`](Self::validate)
/// reject incomplete queries instead of guessing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackQuery {
    pub file_id: Option<i64>,
    pub chromosome_id: Option<i64>,
    pub start_index: Option<i32>,
    pub end_index: Option<i32>,
    /// Rendered points per base; `1.0` is full resolution, smaller values
    /// summarize
    pub scale_factor: Option<f64>,
}

impl TrackQuery {
    #[must_use]
    pub const fn new(file_id: i64, chromosome_id: i64, start_index: i32, end_index: i32) -> Self {
        Self {
            file_id: Some(file_id),
            chromosome_id: Some(chromosome_id),
            start_index: Some(start_index),
            end_index: Some(end_index),
            scale_factor: None,
        }
    }

    #[must_use]
    pub const fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = Some(scale_factor);
        self
    }

    fn require<T: Copy>(value: Option<T>, field: &'static str) -> Result<T> {
        value.ok_or_else(|| ValidationError::MissingTrackField(field).into())
    }

    /// The deterministic cache key identifying this track request
    ///
    /// # Errors
    /// [`ValidationError::MissingTrackField`] when any identity field is
    /// absent.
    pub fn cache_key(&self) -> Result<String> {
        let file_id = Self::require(self.file_id, "fileId")?;
        let chromosome_id = Self::require(self.chromosome_id, "chromosomeId")?;
        let start_index = Self::require(self.start_index, "startIndex")?;
        let end_index = Self::require(self.end_index, "endIndex")?;

        let mut long_buf = itoa::Buffer::new();
        let mut int_buf = itoa::Buffer::new();
        let mut key = String::with_capacity(32);
        key.push_str(long_buf.format(file_id));
        key.push('_');
        key.push_str(long_buf.format(chromosome_id));
        key.push('_');
        key.push_str(int_buf.format(start_index));
        key.push('_');
        key.push_str(int_buf.format(end_index));
        Ok(key)
    }

    /// Resolves the query into concrete bounds for assembly
    ///
    /// # Errors
    /// [`ValidationError::MissingTrackField`] for an absent identity field,
    /// [`ValidationError::InvalidTrackBounds`] unless `1 <= start <= end`, or
    /// [`ValidationError::InvalidScaleFactor`] for a non-finite or
    /// non-positive scale.
    pub fn validate(&self) -> Result<TrackBounds> {
        let file_id = Self::require(self.file_id, "fileId")?;
        let chromosome_id = Self::require(self.chromosome_id, "chromosomeId")?;
        let start_index = Self::require(self.start_index, "startIndex")?;
        let end_index = Self::require(self.end_index, "endIndex")?;
        if start_index < 1 || end_index < start_index {
            return Err(ValidationError::InvalidTrackBounds {
                start: start_index,
                end: end_index,
            }
            .into());
        }
        let scale_factor = self.scale_factor.unwrap_or(1.0);
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(ValidationError::InvalidScaleFactor(scale_factor).into());
        }
        Ok(TrackBounds {
            file_id,
            chromosome_id,
            start_index,
            end_index,
            scale_factor,
        })
    }
}

/// A validated track request with every field resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackBounds {
    pub file_id: i64,
    pub chromosome_id: i64,
    pub start_index: i32,
    pub end_index: i32,
    pub scale_factor: f64,
}

/// Splits a 1-based inclusive range into summary windows for one scale factor
///
/// The window step is `max(1, round(1 / scale_factor))` bases; the last window
/// clamps to `end`. At `scale_factor >= 1.0` every window is a single base.
///
/// # Errors
/// [`ValidationError::InvalidTrackBounds`] unless `1 <= start <= end`, or
/// [`ValidationError::InvalidScaleFactor`] for a non-finite or non-positive
/// scale.
pub fn window_blocks(start: i32, end: i32, scale_factor: f64) -> Result<Vec<(i32, i32)>> {
    if start < 1 || end < start {
        return Err(ValidationError::InvalidTrackBounds { start, end }.into());
    }
    if !scale_factor.is_finite() || scale_factor <= 0.0 {
        return Err(ValidationError::InvalidScaleFactor(scale_factor).into());
    }
    let span = i64::from(end) - i64::from(start) + 1;
    // The reciprocal cast saturates for tiny scales; clamping to the span
    // keeps the window sums in range
    let step = ((1.0 / scale_factor).round() as i64).max(1).min(span);
    let mut windows = Vec::with_capacity(usize::try_from((span + step - 1) / step).unwrap_or(0));
    let mut window_start = i64::from(start);
    let last = i64::from(end);
    while window_start <= last {
        let window_end = (window_start + step - 1).min(last);
        windows.push((window_start as i32, window_end as i32));
        window_start = window_end + 1;
    }
    Ok(windows)
}
