//! On-disk index segments
//!
//! A segment is the immutable indexed form of one source file: every feature
//! became a validated document, serialized into a zstd-compressed block behind
//! a fixed little-endian header. Numeric values are stored as their
//! order-preserving encodings, strings keep their original case. A segment is
//! always written under a temporary name and renamed over the live one, so a
//! reader never observes a half-written file.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use zstd::{Decoder, Encoder};

use crate::error::{IndexError, ValidationError};
use crate::index::document::{to_document, Document, FieldValue};
use crate::index::fields::FeatureIndexEntry;
use crate::index::query::ComposedQuery;
use crate::sortable;
use crate::Result;

/// Magic number identifying segment files ("FSEG" in ASCII)
pub const MAGIC: u32 = u32::from_le_bytes(*b"FSEG");

/// Current segment format version
pub const FORMAT: u8 = 1;

/// Size of the fixed segment header in bytes
///
/// Layout: magic (u32), version (u8), 3 reserved bytes, owning file id (i64),
/// document count (u64). All fields little-endian.
pub const SIZE_HEADER: usize = 24;

/// Default zstd compression level for segment payloads
pub const DEFAULT_COMPRESSION: i32 = 3;

// Wire codes for field kinds
const KIND_INT: u8 = 0;
const KIND_LONG: u8 = 1;
const KIND_FLOAT: u8 = 2;
const KIND_STR: u8 = 3;
const KIND_STR_SET: u8 = 4;

/// An immutable set of indexed feature documents owned by one source file
#[derive(Debug, Clone)]
pub struct Segment {
    file_id: i64,
    documents: Vec<Document>,
}

impl Segment {
    /// Validates raw feature entries into documents for one source file
    ///
    /// # Arguments
    /// * `file_id` - The source file every entry must belong to
    /// * `entries` - The raw entries pulled from the record source
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when an entry fails document validation
    /// or claims a different owning file id.
    pub fn from_entries(file_id: i64, entries: &[FeatureIndexEntry]) -> Result<Self> {
        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.file_id != file_id {
                return Err(ValidationError::InvalidValue {
                    field: "fileId",
                    value: entry.file_id.to_string(),
                }
                .into());
            }
            documents.push(to_document(entry)?);
        }
        Ok(Self { file_id, documents })
    }

    /// The source file id this segment indexes
    #[must_use]
    pub const fn file_id(&self) -> i64 {
        self.file_id
    }

    /// Number of documents in the segment
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the segment holds no documents
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All documents in the segment
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// The documents matching a composed query
    #[must_use]
    pub fn select(&self, query: &ComposedQuery) -> Vec<&Document> {
        self.documents.iter().filter(|doc| query.matches(doc)).collect()
    }

    /// Writes the segment to `path` through a temporary sibling file
    ///
    /// The payload is serialized and compressed first, then written under
    /// `<name>.tmp-<nonce>` and renamed over `path`. The rename is the atomic
    /// publish point; a reader holding the old file keeps a valid mapping.
    ///
    /// # Arguments
    /// * `path` - Final segment path; its parent directory must exist
    /// * `level` - zstd compression level for the document block
    ///
    /// # Errors
    /// Returns an [`IndexError::SegmentIo`] when any filesystem step fails.
    pub fn write(&self, path: &Path, level: i32) -> Result<()> {
        let mut ubuf = Vec::new();
        for doc in &self.documents {
            encode_document(&mut ubuf, doc)?;
        }

        let mut zbuf = Vec::new();
        let mut encoder = Encoder::new(&mut zbuf, level).map_err(|e| io_err(path, e))?;
        encoder.write_all(&ubuf).map_err(|e| io_err(path, e))?;
        encoder.finish().map_err(|e| io_err(path, e))?;

        let mut header = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut header[0..4], MAGIC);
        header[4] = FORMAT;
        LittleEndian::write_i64(&mut header[8..16], self.file_id);
        LittleEndian::write_u64(&mut header[16..24], self.documents.len() as u64);

        let tmp = tmp_path(path)?;
        if let Err(err) = write_file(&tmp, &header, &zbuf) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
        if let Err(source) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, source));
        }
        log::debug!(
            "wrote segment for file {}: {} documents, {} bytes compressed",
            self.file_id,
            self.documents.len(),
            zbuf.len()
        );
        Ok(())
    }

    /// Opens a segment file, validating the header and decoding every document
    ///
    /// # Errors
    /// Returns an [`IndexError`] when the file is missing, truncated, carries
    /// a bad magic number or version, fails zstd decoding, or decodes to a
    /// different document count than the header declares.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        if !file.metadata().map_err(|e| io_err(path, e))?.is_file() {
            return Err(io_err(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        // Safety: segments are immutable once renamed into place; rewrites go
        // through a fresh inode, never through the mapped one
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_err(path, e))?;
        if mmap.len() < SIZE_HEADER {
            return Err(IndexError::TruncatedSegment {
                path: path.to_path_buf(),
                len: mmap.len(),
            }
            .into());
        }
        let magic = LittleEndian::read_u32(&mmap[0..4]);
        if magic != MAGIC {
            return Err(IndexError::InvalidMagicNumber(magic).into());
        }
        if mmap[4] != FORMAT {
            return Err(IndexError::InvalidFormatVersion(mmap[4]).into());
        }
        let file_id = LittleEndian::read_i64(&mmap[8..16]);
        let expected = LittleEndian::read_u64(&mmap[16..24]);

        let mut decoder = Decoder::with_buffer(&mmap[SIZE_HEADER..]).map_err(|e| io_err(path, e))?;
        let mut payload = Vec::new();
        decoder
            .read_to_end(&mut payload)
            .map_err(|e| corrupt(path, format!("zstd decode failed: {e}")))?;

        let mut reader = SliceReader {
            buf: &payload,
            pos: 0,
            path,
        };
        let mut documents = Vec::new();
        while reader.remaining() > 0 {
            documents.push(parse_document(&mut reader)?);
        }
        if documents.len() as u64 != expected {
            return Err(IndexError::EntryCountMismatch {
                path: path.to_path_buf(),
                expected,
                got: documents.len() as u64,
            }
            .into());
        }
        log::debug!(
            "opened segment for file {file_id}: {} documents from {path:?}",
            documents.len()
        );
        Ok(Self { file_id, documents })
    }
}

fn io_err(path: &Path, source: std::io::Error) -> crate::Error {
    IndexError::SegmentIo {
        path: path.to_path_buf(),
        source,
    }
    .into()
}

fn corrupt(path: &Path, detail: impl Into<String>) -> crate::Error {
    IndexError::CorruptSegment {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
    .into()
}

fn tmp_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io_err(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "segment path has no file name"),
        )
    })?;
    let nonce: u32 = rand::random();
    Ok(path.with_file_name(format!("{}.tmp-{nonce:08x}", name.to_string_lossy())))
}

fn write_file(path: &Path, header: &[u8], payload: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;
    file.write_all(header).map_err(|e| io_err(path, e))?;
    file.write_all(payload).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))?;
    Ok(())
}

fn encode_document(buf: &mut Vec<u8>, doc: &Document) -> Result<()> {
    buf.write_u16::<LittleEndian>(doc.len() as u16)?;
    for (name, value) in doc.fields() {
        buf.write_u16::<LittleEndian>(name.len() as u16)?;
        buf.write_all(name.as_bytes())?;
        encode_value(buf, value)?;
    }
    Ok(())
}

fn encode_value(buf: &mut Vec<u8>, value: &FieldValue) -> Result<()> {
    match value {
        FieldValue::Int(v) => {
            buf.push(KIND_INT);
            buf.write_all(&sortable::encode_i32(*v))?;
        }
        FieldValue::Long(v) => {
            buf.push(KIND_LONG);
            buf.write_all(&sortable::encode_i64(*v))?;
        }
        FieldValue::Float(v) => {
            buf.push(KIND_FLOAT);
            buf.write_all(&sortable::encode_f32(*v))?;
        }
        FieldValue::Str(s) => {
            buf.push(KIND_STR);
            buf.write_u32::<LittleEndian>(s.len() as u32)?;
            buf.write_all(s.as_bytes())?;
        }
        FieldValue::StrSet(values) => {
            buf.push(KIND_STR_SET);
            buf.write_u16::<LittleEndian>(values.len() as u16)?;
            for s in values {
                buf.write_u32::<LittleEndian>(s.len() as u32)?;
                buf.write_all(s.as_bytes())?;
            }
        }
    }
    Ok(())
}

/// Bounds-checked cursor over the decompressed document block
struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> SliceReader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        match self.pos.checked_add(len) {
            Some(end) if end <= self.buf.len() => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            _ => Err(corrupt(self.path, "document block ends mid-field")),
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn take_str(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| corrupt(self.path, "field text is not valid UTF-8"))
    }
}

fn parse_document(reader: &mut SliceReader) -> Result<Document> {
    let field_count = reader.read_u16()?;
    let mut doc = Document::default();
    for _ in 0..field_count {
        let name_len = reader.read_u16()? as usize;
        let name = reader.take_str(name_len)?;
        let value = parse_value(reader)?;
        doc.insert(name, value);
    }
    Ok(doc)
}

fn parse_value(reader: &mut SliceReader) -> Result<FieldValue> {
    match reader.read_u8()? {
        KIND_INT => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(reader.take(4)?);
            Ok(FieldValue::Int(sortable::decode_i32(raw)))
        }
        KIND_LONG => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(reader.take(8)?);
            Ok(FieldValue::Long(sortable::decode_i64(raw)))
        }
        KIND_FLOAT => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(reader.take(4)?);
            Ok(FieldValue::Float(sortable::decode_f32(raw)))
        }
        KIND_STR => {
            let len = reader.read_u32()? as usize;
            Ok(FieldValue::Str(reader.take_str(len)?))
        }
        KIND_STR_SET => {
            let count = reader.read_u16()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let len = reader.read_u32()? as usize;
                values.push(reader.take_str(len)?);
            }
            Ok(FieldValue::StrSet(values))
        }
        other => Err(corrupt(reader.path, format!("unknown field kind {other}"))),
    }
}
