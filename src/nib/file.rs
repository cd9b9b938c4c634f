//! On-disk container for nib-packed reference sequence
//!
//! Each registered reference chromosome is written once as a nib container: a
//! fixed 12-byte header followed by the packed payload. Reads go through a
//! memory map so range decodes touch only the pages they need, which is what
//! keeps random access into multi-hundred-megabase chromosomes cheap.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use memmap2::Mmap;

use crate::error::{CodecError, ValidationError};
use crate::Result;

use super::{NibSequence, NibSlice};

/// Current magic number: "NIB1" in ASCII (in little-endian byte order)
const MAGIC: u32 = u32::from_le_bytes(*b"NIB1");

/// Current format version of the nib container
const FORMAT: u8 = 1;

/// Size of the container header in bytes
pub const SIZE_HEADER: usize = 12;

/// A read-only, memory-mapped nib container
///
/// Layout: magic u32, format u8, 3 reserved bytes, base count u32 (all
/// little-endian), then the packed payload. Only the payload packing order is
/// shared with older data; the header is this crate's own framing.
#[derive(Debug)]
pub struct NibFile {
    mmap: Mmap,
    bases: usize,
}

impl NibFile {
    /// Writes a packed sequence to a container file
    ///
    /// # Arguments
    /// * `path` - Destination path, truncated if it exists
    /// * `sequence` - The packed sequence to persist
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write<P: AsRef<Path>>(path: P, sequence: &NibSequence) -> Result<()> {
        let mut writer = BufWriter::new(File::create(&path)?);
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], MAGIC);
        buffer[4] = FORMAT;
        LittleEndian::write_u32(&mut buffer[8..12], sequence.len() as u32);
        writer.write_all(&buffer)?;
        writer.write_all(sequence.as_bytes())?;
        writer.flush()?;
        debug!(
            "wrote nib container {:?} ({} bases)",
            path.as_ref(),
            sequence.len()
        );
        Ok(())
    }

    /// Opens and validates a container file
    ///
    /// # Errors
    /// Returns a [`CodecError`] if the header is malformed or the payload is
    /// shorter than the recorded base count requires.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;

        // Safety: containers are written once at registration and never modified
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SIZE_HEADER {
            return Err(CodecError::TruncatedContainer {
                path: path.as_ref().to_path_buf(),
                expected: SIZE_HEADER,
                got: mmap.len(),
            }
            .into());
        }
        let magic = LittleEndian::read_u32(&mmap[0..4]);
        if magic != MAGIC {
            return Err(CodecError::InvalidMagicNumber(magic).into());
        }
        let format = mmap[4];
        if format != FORMAT {
            return Err(CodecError::InvalidFormatVersion(format).into());
        }
        let bases = LittleEndian::read_u32(&mmap[8..12]) as usize;
        let expected = bases.div_ceil(2);
        let got = mmap.len() - SIZE_HEADER;
        if got < expected {
            return Err(CodecError::TruncatedContainer {
                path: path.as_ref().to_path_buf(),
                expected,
                got,
            }
            .into());
        }
        Ok(Self { mmap, bases })
    }

    /// Number of bases in the container
    #[must_use]
    pub fn num_bases(&self) -> usize {
        self.bases
    }

    /// A decodable view over the mapped payload
    #[must_use]
    pub fn sequence(&self) -> NibSlice<'_> {
        let payload = &self.mmap[SIZE_HEADER..SIZE_HEADER + self.bases.div_ceil(2)];
        NibSlice::from_raw(payload, self.bases)
    }

    /// Decodes a 1-based inclusive coordinate range
    ///
    /// Genome-browser coordinates are 1-based and inclusive on both ends;
    /// this is the translation point to the codec's 0-based positions.
    ///
    /// # Errors
    /// Returns a [`ValidationError::InvalidTrackBounds`] when `start < 1` or
    /// `end < start`, or a [`CodecError::RangeOutOfBounds`] when the range
    /// runs past the sequence.
    pub fn read_range(&self, start: i32, end: i32) -> Result<Vec<u8>> {
        if start < 1 || end < start {
            return Err(ValidationError::InvalidTrackBounds { start, end }.into());
        }
        let len = (end - start + 1) as usize;
        self.sequence().decode_range((start - 1) as usize, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;

    #[test]
    fn test_write_open_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("chr1.nib");

        let bases = b"ACGTNacgtn-?ACG";
        let seq = NibSequence::from_bases(bases)?;
        NibFile::write(&path, &seq)?;

        let file = NibFile::open(&path)?;
        assert_eq!(file.num_bases(), bases.len());
        assert_eq!(file.sequence().decode_range(0, bases.len())?, bases);
        Ok(())
    }

    #[test]
    fn test_one_based_range_reads() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("chr2.nib");
        NibFile::write(&path, &NibSequence::from_bases(b"TTACGGTT")?)?;

        let file = NibFile::open(&path)?;
        assert_eq!(file.read_range(3, 6)?, b"ACGG");
        assert_eq!(file.read_range(1, 1)?, b"T");
        assert_eq!(file.read_range(8, 8)?, b"T");

        assert!(file.read_range(0, 4).is_err());
        assert!(file.read_range(5, 4).is_err());
        assert!(file.read_range(7, 9).is_err());
        Ok(())
    }

    #[test]
    fn test_bad_magic_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.nib");
        NibFile::write(&path, &NibSequence::from_bases(b"ACGT")?)?;

        let mut handle = std::fs::OpenOptions::new().write(true).open(&path)?;
        handle.seek(SeekFrom::Start(0))?;
        handle.write_all(b"XXXX")?;
        drop(handle);

        assert!(NibFile::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_truncated_payload_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("short.nib");
        NibFile::write(&path, &NibSequence::from_bases(b"ACGTACGT")?)?;

        let handle = std::fs::OpenOptions::new().write(true).open(&path)?;
        handle.set_len((SIZE_HEADER + 2) as u64)?;
        drop(handle);

        assert!(NibFile::open(&path).is_err());
        Ok(())
    }
}
