//! The indexable document form of a feature record
//!
//! A document is a flat map from canonical field names to typed values whose
//! sort keys come from the order-preserving encoders, so one stored value
//! doubles as its own sort key. Conversion validates in both directions:
//! records missing mandatory fields never reach a segment, and documents read
//! back from a segment are checked before becoming records again.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::sortable::{self, CaseMode};
use crate::Result;

use super::fields::{FeatureIndexEntry, FeatureType, FieldKind, IndexField, VariationType};

/// A typed field value
///
/// The typed half of a sortable value; [`FieldValue::sort_key`] derives the
/// byte half on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Str(String),
    /// Multiple values for one document; all of them participate in matching
    /// and grouping, not just the first
    StrSet(Vec<String>),
}

impl FieldValue {
    /// The kind this value belongs to
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Int(_) => FieldKind::Int,
            Self::Long(_) => FieldKind::Long,
            Self::Float(_) => FieldKind::Float,
            Self::Str(_) => FieldKind::Str,
            Self::StrSet(_) => FieldKind::StrSet,
        }
    }

    /// The order-preserving sort key for this value
    ///
    /// Strings encode case-insensitively; a multi-value sorts by its minimum
    /// element. An empty set has no key and sorts as missing.
    #[must_use]
    pub fn sort_key(&self) -> Option<Vec<u8>> {
        match self {
            Self::Int(v) => Some(sortable::encode_i32(*v).to_vec()),
            Self::Long(v) => Some(sortable::encode_i64(*v).to_vec()),
            Self::Float(v) => Some(sortable::encode_f32(*v).to_vec()),
            Self::Str(v) => Some(sortable::encode_str(v, CaseMode::Insensitive)),
            Self::StrSet(values) => values
                .iter()
                .map(|v| sortable::encode_str(v, CaseMode::Insensitive))
                .min(),
        }
    }

    /// The groupable renderings of this value, one per element
    ///
    /// Floats have no stable rendering and return `None`; grouping requests
    /// reject float fields before evaluation.
    #[must_use]
    pub fn group_values(&self) -> Option<Vec<String>> {
        let mut buf = itoa::Buffer::new();
        match self {
            Self::Int(v) => Some(vec![buf.format(*v).to_string()]),
            Self::Long(v) => Some(vec![buf.format(*v).to_string()]),
            Self::Float(_) => None,
            Self::Str(v) => Some(vec![v.clone()]),
            Self::StrSet(values) => Some(values.clone()),
        }
    }
}

/// One indexed document: canonical field names mapped to typed values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub(crate) fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// The value stored under a field name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The sort key for a field, when the field is present and keyed
    #[must_use]
    pub fn sort_key(&self, name: &str) -> Option<Vec<u8>> {
        self.get(name).and_then(FieldValue::sort_key)
    }

    /// Iterates fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields in the document
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn registry_collision(key: &str) -> bool {
    IndexField::ALL
        .into_iter()
        .any(|field| field.name().eq_ignore_ascii_case(key))
}

/// Converts a feature record into its indexable document
///
/// Mandatory fields (file id, chromosome id and name, start, end, feature
/// type) are validated here so malformed records never reach a segment.
/// Annotation keys are lower-cased; a key that collides with a registered
/// field name, or with another annotation key after lower-casing, is a
/// [`ValidationError::AnnotationCollision`].
///
/// # Errors
/// Returns a [`ValidationError`] naming the offending field.
pub fn to_document(entry: &FeatureIndexEntry) -> Result<Document> {
    if entry.chromosome_name.is_empty() {
        return Err(ValidationError::MissingField(IndexField::ChromosomeName.name()).into());
    }
    if entry.start_index < 1 || entry.end_index < entry.start_index {
        return Err(ValidationError::InvalidTrackBounds {
            start: entry.start_index,
            end: entry.end_index,
        }
        .into());
    }

    let mut doc = Document::default();
    doc.insert(IndexField::Uid.name(), FieldValue::Str(entry.uid()));
    doc.insert(IndexField::FileId.name(), FieldValue::Long(entry.file_id));
    doc.insert(
        IndexField::ChromosomeId.name(),
        FieldValue::Long(entry.chromosome_id),
    );
    doc.insert(
        IndexField::ChromosomeName.name(),
        FieldValue::Str(entry.chromosome_name.clone()),
    );
    doc.insert(
        IndexField::StartIndex.name(),
        FieldValue::Int(entry.start_index),
    );
    doc.insert(IndexField::EndIndex.name(), FieldValue::Int(entry.end_index));
    doc.insert(
        IndexField::FeatureType.name(),
        FieldValue::Str(entry.feature_type.as_str().to_string()),
    );

    if let Some(feature_id) = &entry.feature_id {
        doc.insert(
            IndexField::FeatureId.name(),
            FieldValue::Str(feature_id.clone()),
        );
    }
    if let Some(feature_name) = &entry.feature_name {
        doc.insert(
            IndexField::FeatureName.name(),
            FieldValue::Str(feature_name.clone()),
        );
    }
    if let Some(variation_type) = entry.variation_type {
        doc.insert(
            IndexField::VariationType.name(),
            FieldValue::Str(variation_type.as_str().to_string()),
        );
    }
    if let Some(quality) = entry.quality {
        doc.insert(IndexField::Quality.name(), FieldValue::Float(quality));
    }
    if !entry.gene_ids.is_empty() {
        doc.insert(
            IndexField::GeneId.name(),
            FieldValue::StrSet(entry.gene_ids.clone()),
        );
    }
    if !entry.gene_names.is_empty() {
        doc.insert(
            IndexField::GeneName.name(),
            FieldValue::StrSet(entry.gene_names.clone()),
        );
    }
    if !entry.failed_filters.is_empty() {
        doc.insert(
            IndexField::FailedFilter.name(),
            FieldValue::StrSet(entry.failed_filters.clone()),
        );
    }

    for (key, value) in &entry.info {
        let key = key.to_lowercase();
        if registry_collision(&key) || doc.get(&key).is_some() {
            return Err(ValidationError::AnnotationCollision(key).into());
        }
        doc.insert(key, value.clone());
    }

    Ok(doc)
}

fn require<'a>(doc: &'a Document, field: IndexField) -> Result<&'a FieldValue> {
    doc.get(field.name())
        .ok_or_else(|| ValidationError::MissingField(field.name()).into())
}

fn kind_mismatch(field: IndexField, value: &FieldValue) -> crate::Error {
    ValidationError::KindMismatch {
        field: field.name().to_string(),
        expected: field.kind().as_str(),
        got: value.kind().as_str(),
    }
    .into()
}

fn require_long(doc: &Document, field: IndexField) -> Result<i64> {
    match require(doc, field)? {
        FieldValue::Long(v) => Ok(*v),
        other => Err(kind_mismatch(field, other)),
    }
}

fn require_int(doc: &Document, field: IndexField) -> Result<i32> {
    match require(doc, field)? {
        FieldValue::Int(v) => Ok(*v),
        other => Err(kind_mismatch(field, other)),
    }
}

fn require_str<'a>(doc: &'a Document, field: IndexField) -> Result<&'a str> {
    match require(doc, field)? {
        FieldValue::Str(v) => Ok(v),
        other => Err(kind_mismatch(field, other)),
    }
}

fn optional_str<'a>(doc: &'a Document, field: IndexField) -> Result<Option<&'a str>> {
    match doc.get(field.name()) {
        None => Ok(None),
        Some(FieldValue::Str(v)) => Ok(Some(v)),
        Some(other) => Err(kind_mismatch(field, other)),
    }
}

fn optional_set(doc: &Document, field: IndexField) -> Result<Vec<String>> {
    match doc.get(field.name()) {
        None => Ok(Vec::new()),
        Some(FieldValue::StrSet(values)) => Ok(values.clone()),
        Some(other) => Err(kind_mismatch(field, other)),
    }
}

/// Converts a document read from a segment back into a feature record
///
/// The reverse of [`to_document`], used when search results travel back to
/// callers as domain records.
///
/// # Errors
/// Returns a [`ValidationError`] if a mandatory field is missing, a field
/// holds the wrong kind, or a stored enum value is unrecognized.
pub fn from_document(doc: &Document) -> Result<FeatureIndexEntry> {
    let feature_type_name = require_str(doc, IndexField::FeatureType)?;
    let feature_type = FeatureType::from_name(feature_type_name).ok_or_else(|| {
        ValidationError::InvalidValue {
            field: IndexField::FeatureType.name(),
            value: feature_type_name.to_string(),
        }
    })?;

    let variation_type = match optional_str(doc, IndexField::VariationType)? {
        None => None,
        Some(name) => Some(VariationType::from_name(name).ok_or_else(|| {
            ValidationError::InvalidValue {
                field: IndexField::VariationType.name(),
                value: name.to_string(),
            }
        })?),
    };

    let quality = match doc.get(IndexField::Quality.name()) {
        None => None,
        Some(FieldValue::Float(v)) => Some(*v),
        Some(other) => return Err(kind_mismatch(IndexField::Quality, other)),
    };

    let mut info = BTreeMap::new();
    for (name, value) in doc.fields() {
        if !registry_collision(name) {
            info.insert(name.to_string(), value.clone());
        }
    }

    Ok(FeatureIndexEntry {
        file_id: require_long(doc, IndexField::FileId)?,
        chromosome_id: require_long(doc, IndexField::ChromosomeId)?,
        chromosome_name: require_str(doc, IndexField::ChromosomeName)?.to_string(),
        start_index: require_int(doc, IndexField::StartIndex)?,
        end_index: require_int(doc, IndexField::EndIndex)?,
        feature_id: optional_str(doc, IndexField::FeatureId)?.map(String::from),
        feature_name: optional_str(doc, IndexField::FeatureName)?.map(String::from),
        feature_type,
        variation_type,
        gene_ids: optional_set(doc, IndexField::GeneId)?,
        gene_names: optional_set(doc, IndexField::GeneName)?,
        quality,
        failed_filters: optional_set(doc, IndexField::FailedFilter)?,
        info,
    })
}
