//! The nib nucleotide codec
//!
//! Nib packs reference sequence at 4 bits per base, 2 bases per byte, with the
//! high nibble holding the first base of each pair. Unlike 2-bit packings the
//! alphabet keeps case, ambiguity, and gap information, which genome browsers
//! need to render soft-masked and incomplete assemblies faithfully.
//!
//! The alphabet is fixed and total:
//!
//! | char | nibble | char | nibble |
//! |------|--------|------|--------|
//! | `T`  | 0      | `t`  | 8      |
//! | `C`  | 1      | `c`  | 9      |
//! | `A`  | 2      | `a`  | 10     |
//! | `G`  | 3      | `g`  | 11     |
//! | `N`  | 4      | `n`  | 12     |
//! | `-`  | 5      | `?`  | 6      |
//!
//! Nibbles 7 and 13-15 are unassigned; decoding one is a [`CodecError`], never
//! a silent substitution. The packing order is a bit-exact on-disk format:
//! files written by earlier builds must keep decoding.
//!
//! [`CodecError`]: crate::error::CodecError

mod file;
mod sequence;

pub use file::{NibFile, SIZE_HEADER};
pub use sequence::{NibSequence, NibSlice};

use crate::error::CodecError;
use crate::Result;

/// Number of bases packed into one byte
pub const BASES_PER_BYTE: usize = 2;

/// Encodes one base character into its nibble code
///
/// # Arguments
/// * `base` - An ASCII base character from the nib alphabet
///
/// # Errors
/// Returns a [`CodecError::UnsupportedBase`] for any byte outside the twelve
/// supported characters.
pub fn encode_base(base: u8) -> Result<u8> {
    let nibble = match base {
        b'T' => 0,
        b'C' => 1,
        b'A' => 2,
        b'G' => 3,
        b'N' => 4,
        b'-' => 5,
        b'?' => 6,
        b't' => 8,
        b'c' => 9,
        b'a' => 10,
        b'g' => 11,
        b'n' => 12,
        _ => return Err(CodecError::UnsupportedBase(base).into()),
    };
    Ok(nibble)
}

/// Decodes one nibble code back into its base character
///
/// # Arguments
/// * `nibble` - A value in `0..16`
///
/// # Errors
/// Returns a [`CodecError::UnassignedNibble`] for 7, 13, 14, 15, or any value
/// above 15.
pub fn decode_base(nibble: u8) -> Result<u8> {
    let base = match nibble {
        0 => b'T',
        1 => b'C',
        2 => b'A',
        3 => b'G',
        4 => b'N',
        5 => b'-',
        6 => b'?',
        8 => b't',
        9 => b'c',
        10 => b'a',
        11 => b'g',
        12 => b'n',
        _ => return Err(CodecError::UnassignedNibble(nibble).into()),
    };
    Ok(base)
}

/// Packs two base characters into one byte, first base in the high nibble
///
/// # Errors
/// Returns a [`CodecError::UnsupportedBase`] if either character is outside
/// the alphabet.
pub fn pack_pair(first: u8, second: u8) -> Result<u8> {
    Ok(encode_base(first)? << 4 | encode_base(second)?)
}

/// Whether a nibble code is a G or C base (either case)
///
/// Ambiguous bases, gaps, and unknowns are not GC.
#[must_use]
pub fn is_gc_code(nibble: u8) -> bool {
    matches!(nibble & 0x07, 1 | 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHABET: &[u8; 12] = b"TCAGN-?tcagn";

    #[test]
    fn test_round_trip_full_alphabet() -> Result<()> {
        for &base in ALPHABET {
            assert_eq!(decode_base(encode_base(base)?)?, base);
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_bases_rejected() {
        for base in [b'U', b'x', b'*', b' ', 0u8] {
            assert!(encode_base(base).is_err());
        }
    }

    #[test]
    fn test_unassigned_nibbles_rejected() {
        for nibble in [7u8, 13, 14, 15, 16, 255] {
            assert!(decode_base(nibble).is_err());
        }
    }

    #[test]
    fn test_pack_pair_high_nibble_first() -> Result<()> {
        assert_eq!(pack_pair(b'T', b'C')?, 0x01);
        assert_eq!(pack_pair(b'A', b'G')?, 0x23);
        assert_eq!(pack_pair(b'n', b'N')?, 0xc4);
        Ok(())
    }

    #[test]
    fn test_gc_codes() -> Result<()> {
        for &base in ALPHABET {
            let expected = matches!(base, b'G' | b'C' | b'g' | b'c');
            assert_eq!(is_gc_code(encode_base(base)?), expected, "base {}", base as char);
        }
        Ok(())
    }
}
