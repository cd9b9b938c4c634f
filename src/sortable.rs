//! Order-preserving byte encodings for index fields
//!
//! Every encoder in this module produces bytes whose unsigned lexicographic
//! order equals the natural order of the encoded value. That single property is
//! what lets one stored representation double as both the field value and its
//! sort key: comparisons at query time are plain byte comparisons, with no
//! per-comparison decoding.
//!
//! The integer and float layouts are bit-exact on-disk formats. Segments
//! written by earlier builds must keep decoding, so the transforms here must
//! not change.

/// Case handling for string encodings
///
/// Index fields default to [`CaseMode::Insensitive`], matching the
/// lower-cased terms the query layer produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseMode {
    /// Lower-case the string before encoding
    #[default]
    Insensitive,
    /// Encode the string verbatim
    Sensitive,
}

/// Encodes a signed 32-bit integer as 4 order-preserving bytes
///
/// The value is reinterpreted as unsigned with the sign bit flipped, then
/// written big-endian. Flipping the sign bit shifts the signed range onto the
/// unsigned range, so unsigned byte comparison matches signed numeric
/// comparison across the negative/positive boundary.
#[must_use]
pub fn encode_i32(value: i32) -> [u8; 4] {
    ((value as u32) ^ 0x8000_0000).to_be_bytes()
}

/// Decodes 4 bytes produced by [`encode_i32`] back into the exact input value
#[must_use]
pub fn decode_i32(bytes: [u8; 4]) -> i32 {
    (u32::from_be_bytes(bytes) ^ 0x8000_0000) as i32
}

/// Encodes a signed 64-bit integer as 8 order-preserving bytes
///
/// Same transform as [`encode_i32`] at 64 bits. Used for file ids and
/// chromosome ids.
#[must_use]
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}

/// Decodes 8 bytes produced by [`encode_i64`] back into the exact input value
#[must_use]
pub fn decode_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ 0x8000_0000_0000_0000) as i64
}

/// Encodes a 32-bit float as 4 order-preserving bytes
///
/// The IEEE-754 bits are taken as a signed integer; for negative values the
/// low 31 bits are flipped as well, which reverses the backwards ordering of
/// negative floats in raw bit space. The result then goes through the integer
/// transform.
///
/// The byte order equals [`f32::total_cmp`] order. NaN placement is fixed and
/// intentional: positive NaN sorts above positive infinity, negative NaN
/// below negative infinity, and `-0.0` sorts immediately below `+0.0`.
#[must_use]
pub fn encode_f32(value: f32) -> [u8; 4] {
    let mut bits = value.to_bits() as i32;
    bits ^= (bits >> 31) & 0x7fff_ffff;
    encode_i32(bits)
}

/// Decodes 4 bytes produced by [`encode_f32`] back into the bit-exact input
///
/// The negative-branch flip preserves the sign bit, so applying the same mask
/// again inverts it exactly; NaN payload bits survive the round trip.
#[must_use]
pub fn decode_f32(bytes: [u8; 4]) -> f32 {
    let mut bits = decode_i32(bytes);
    bits ^= (bits >> 31) & 0x7fff_ffff;
    f32::from_bits(bits as u32)
}

/// Encodes a string for ordered comparison
///
/// UTF-8 byte order equals code-point order, so the bytes are the string
/// itself, lower-cased first under [`CaseMode::Insensitive`].
#[must_use]
pub fn encode_str(value: &str, mode: CaseMode) -> Vec<u8> {
    match mode {
        CaseMode::Insensitive => value.to_lowercase().into_bytes(),
        CaseMode::Sensitive => value.as_bytes().to_vec(),
    }
}
