//! Owned and borrowed views over nib-packed sequence data

use crate::error::CodecError;
use crate::Result;

use super::{decode_base, encode_base};

/// An owned nib-packed nucleotide sequence
///
/// Built once from FASTA-derived bytes at reference registration time and
/// immutable afterwards. A sequence of odd length leaves the low nibble of its
/// last byte unused (zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibSequence {
    data: Vec<u8>,
    bases: usize,
}

impl NibSequence {
    /// Packs a buffer of base characters into nib form
    ///
    /// # Arguments
    /// * `bases` - ASCII base characters, all within the nib alphabet
    ///
    /// # Errors
    /// Returns a [`CodecError::UnsupportedBase`] on the first character
    /// outside the alphabet; nothing is returned partially packed.
    pub fn from_bases(bases: &[u8]) -> Result<Self> {
        let mut data = Vec::with_capacity(bases.len().div_ceil(2));
        for pair in bases.chunks(2) {
            let hi = encode_base(pair[0])?;
            let lo = if pair.len() == 2 { encode_base(pair[1])? } else { 0 };
            data.push(hi << 4 | lo);
        }
        Ok(Self {
            data,
            bases: bases.len(),
        })
    }

    /// Reassembles a sequence from an already-packed buffer and its base count
    ///
    /// # Errors
    /// Returns a [`CodecError::BufferSizeMismatch`] if the buffer length does
    /// not equal `bases.div_ceil(2)`.
    pub fn from_raw_parts(data: Vec<u8>, bases: usize) -> Result<Self> {
        if data.len() != bases.div_ceil(2) {
            return Err(CodecError::BufferSizeMismatch {
                bases,
                got: data.len(),
            }
            .into());
        }
        Ok(Self { data, bases })
    }

    /// Number of bases in the sequence
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases == 0
    }

    /// The packed bytes, high nibble first within each byte
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// A borrowed view over the packed data
    #[must_use]
    pub fn as_slice(&self) -> NibSlice<'_> {
        NibSlice::from_raw(&self.data, self.bases)
    }

    /// Decodes the base character at a 0-based position
    pub fn get(&self, pos: usize) -> Result<u8> {
        self.as_slice().get(pos)
    }

    /// Decodes a sub-range back into base characters
    pub fn decode_range(&self, start: usize, len: usize) -> Result<Vec<u8>> {
        self.as_slice().decode_range(start, len)
    }
}

/// A borrowed view over nib-packed bytes
///
/// The same read operations as [`NibSequence`] without owning the buffer, so
/// memory-mapped containers can be decoded without copying the payload.
#[derive(Debug, Clone, Copy)]
pub struct NibSlice<'a> {
    data: &'a [u8],
    bases: usize,
}

impl<'a> NibSlice<'a> {
    /// Wraps a packed buffer and its base count
    ///
    /// # Errors
    /// Returns a [`CodecError::BufferSizeMismatch`] if the buffer length does
    /// not equal `bases.div_ceil(2)`.
    pub fn new(data: &'a [u8], bases: usize) -> Result<Self> {
        if data.len() != bases.div_ceil(2) {
            return Err(CodecError::BufferSizeMismatch {
                bases,
                got: data.len(),
            }
            .into());
        }
        Ok(Self { data, bases })
    }

    /// Internal constructor for buffers whose size is already validated
    pub(crate) const fn from_raw(data: &'a [u8], bases: usize) -> Self {
        Self { data, bases }
    }

    /// Number of bases in the view
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bases
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bases == 0
    }

    /// The raw nibble code at a 0-based position
    ///
    /// Position `i` reads byte `i >> 1` and selects the high nibble when `i`
    /// is even, the low nibble when odd.
    pub fn code_at(&self, pos: usize) -> Result<u8> {
        if pos >= self.bases {
            return Err(CodecError::RangeOutOfBounds {
                start: pos,
                len: 1,
                size: self.bases,
            }
            .into());
        }
        let byte = self.data[pos >> 1];
        Ok(if pos & 1 == 0 { byte >> 4 } else { byte & 0x0f })
    }

    /// Decodes the base character at a 0-based position
    pub fn get(&self, pos: usize) -> Result<u8> {
        decode_base(self.code_at(pos)?)
    }

    /// Decodes a sub-range back into base characters
    ///
    /// Reproduces the packed input base-for-base for any in-bounds range.
    ///
    /// # Arguments
    /// * `start` - 0-based position of the first base
    /// * `len` - Number of bases to decode
    ///
    /// # Errors
    /// Returns a [`CodecError::RangeOutOfBounds`] if `start + len` exceeds the
    /// sequence, or a [`CodecError::UnassignedNibble`] if the underlying
    /// buffer holds a code outside the alphabet. A failed call corrupts
    /// nothing: no partial output is returned.
    pub fn decode_range(&self, start: usize, len: usize) -> Result<Vec<u8>> {
        match start.checked_add(len) {
            Some(end) if end <= self.bases => {}
            _ => {
                return Err(CodecError::RangeOutOfBounds {
                    start,
                    len,
                    size: self.bases,
                }
                .into())
            }
        }
        let mut out = Vec::with_capacity(len);
        for pos in start..start + len {
            let byte = self.data[pos >> 1];
            let nibble = if pos & 1 == 0 { byte >> 4 } else { byte & 0x0f };
            out.push(decode_base(nibble)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    const ALPHABET: &[u8; 12] = b"TCAGN-?tcagn";

    fn random_bases(rng: &mut SmallRng, n: usize) -> Vec<u8> {
        (0..n).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())]).collect()
    }

    #[test]
    fn test_pack_golden_bytes() -> Result<()> {
        let seq = NibSequence::from_bases(b"TCAG")?;
        assert_eq!(seq.as_bytes(), &[0x01, 0x23]);

        // Odd length leaves the final low nibble zero
        let seq = NibSequence::from_bases(b"TCA")?;
        assert_eq!(seq.as_bytes(), &[0x01, 0x20]);
        assert_eq!(seq.len(), 3);
        Ok(())
    }

    #[test]
    fn test_round_trip_all_lengths() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(99);
        for n in 0..64 {
            let bases = random_bases(&mut rng, n);
            let seq = NibSequence::from_bases(&bases)?;
            assert_eq!(seq.decode_range(0, n)?, bases);
        }
        Ok(())
    }

    #[test]
    fn test_every_sub_range_matches_source() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(4);
        let bases = random_bases(&mut rng, 37);
        let seq = NibSequence::from_bases(&bases)?;
        for start in 0..bases.len() {
            for len in 0..=(bases.len() - start) {
                assert_eq!(seq.decode_range(start, len)?, &bases[start..start + len]);
            }
        }
        Ok(())
    }

    #[test]
    fn test_positional_get() -> Result<()> {
        let bases = b"acgtACGTNn-?";
        let seq = NibSequence::from_bases(bases)?;
        for (pos, &base) in bases.iter().enumerate() {
            assert_eq!(seq.get(pos)?, base);
        }
        assert!(seq.get(bases.len()).is_err());
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_ranges() -> Result<()> {
        let seq = NibSequence::from_bases(b"ACGTN")?;
        assert!(seq.decode_range(0, 6).is_err());
        assert!(seq.decode_range(5, 1).is_err());
        assert!(seq.decode_range(usize::MAX, 2).is_err());
        assert!(seq.decode_range(2, 3).is_ok());
        Ok(())
    }

    #[test]
    fn test_unassigned_code_in_buffer_fails_decode() -> Result<()> {
        // High nibble 7 is unassigned
        let seq = NibSequence::from_raw_parts(vec![0x71], 2)?;
        assert!(seq.decode_range(0, 2).is_err());
        // The neighboring valid base still decodes on its own
        assert_eq!(seq.get(1)?, b'C');
        Ok(())
    }

    #[test]
    fn test_raw_parts_size_validation() {
        assert!(NibSequence::from_raw_parts(vec![0x01], 3).is_err());
        assert!(NibSequence::from_raw_parts(vec![0x01, 0x23], 3).is_ok());
        assert!(NibSlice::new(&[0x01], 4).is_err());
    }
}
