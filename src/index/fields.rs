//! The index field registry and the domain record it describes

use std::collections::BTreeMap;

use crate::index::document::FieldValue;

/// Kinds a registered field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 32-bit signed integer (genomic coordinates)
    Int,
    /// 64-bit signed integer (file and chromosome ids)
    Long,
    /// 32-bit float (quality scores)
    Float,
    /// Single string value
    Str,
    /// Multiple string values per document (gene ids, failed filters)
    StrSet,
}

impl FieldKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Str => "string",
            Self::StrSet => "string-set",
        }
    }
}

/// The registry of known index fields
///
/// The single source of truth for field names and kinds. Annotation fields
/// outside this registry live in the document's explicit extra bucket with
/// lower-cased keys; a key colliding with a registered name is rejected at
/// document build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    Uid,
    FeatureId,
    FeatureName,
    FeatureType,
    FileId,
    ChromosomeId,
    ChromosomeName,
    StartIndex,
    EndIndex,
    VariationType,
    GeneId,
    GeneName,
    Quality,
    FailedFilter,
}

impl IndexField {
    /// Every registered field, in registry order
    pub const ALL: [Self; 14] = [
        Self::Uid,
        Self::FeatureId,
        Self::FeatureName,
        Self::FeatureType,
        Self::FileId,
        Self::ChromosomeId,
        Self::ChromosomeName,
        Self::StartIndex,
        Self::EndIndex,
        Self::VariationType,
        Self::GeneId,
        Self::GeneName,
        Self::Quality,
        Self::FailedFilter,
    ];

    /// The canonical field name used in documents, filters, and sort rules
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::FeatureId => "featureId",
            Self::FeatureName => "featureName",
            Self::FeatureType => "featureType",
            Self::FileId => "fileId",
            Self::ChromosomeId => "chromosomeId",
            Self::ChromosomeName => "chromosomeName",
            Self::StartIndex => "startIndex",
            Self::EndIndex => "endIndex",
            Self::VariationType => "variationType",
            Self::GeneId => "geneId",
            Self::GeneName => "geneName",
            Self::Quality => "quality",
            Self::FailedFilter => "failedFilter",
        }
    }

    /// The value kind this field holds
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Uid
            | Self::FeatureId
            | Self::FeatureName
            | Self::FeatureType
            | Self::ChromosomeName
            | Self::VariationType => FieldKind::Str,
            Self::FileId | Self::ChromosomeId => FieldKind::Long,
            Self::StartIndex | Self::EndIndex => FieldKind::Int,
            Self::GeneId | Self::GeneName | Self::FailedFilter => FieldKind::StrSet,
            Self::Quality => FieldKind::Float,
        }
    }

    /// Looks a field up by its canonical name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// Feature classes the index distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Variation,
    Gene,
    Mrna,
    Exon,
}

impl FeatureType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Variation => "VARIATION",
            Self::Gene => "GENE",
            Self::Mrna => "MRNA",
            Self::Exon => "EXON",
        }
    }

    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "VARIATION" => Some(Self::Variation),
            "GENE" => Some(Self::Gene),
            "MRNA" => Some(Self::Mrna),
            "EXON" => Some(Self::Exon),
            _ => None,
        }
    }
}

/// Variant classes for variant-call records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationType {
    Snv,
    Mnp,
    Ins,
    Del,
    Dup,
    Inv,
    Bnd,
    Mixed,
}

impl VariationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Snv => "SNV",
            Self::Mnp => "MNP",
            Self::Ins => "INS",
            Self::Del => "DEL",
            Self::Dup => "DUP",
            Self::Inv => "INV",
            Self::Bnd => "BND",
            Self::Mixed => "MIXED",
        }
    }

    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SNV" => Some(Self::Snv),
            "MNP" => Some(Self::Mnp),
            "INS" => Some(Self::Ins),
            "DEL" => Some(Self::Del),
            "DUP" => Some(Self::Dup),
            "INV" => Some(Self::Inv),
            "BND" => Some(Self::Bnd),
            "MIXED" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// One indexed genomic feature record
///
/// Immutable once built: entries are produced in batches during an index
/// build and the whole segment is replaced on rebuild, never patched.
/// Coordinates are 1-based and inclusive on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureIndexEntry {
    /// Owning source file id
    pub file_id: i64,
    /// Chromosome the feature sits on
    pub chromosome_id: i64,
    pub chromosome_name: String,
    /// 1-based inclusive start position
    pub start_index: i32,
    /// 1-based inclusive end position
    pub end_index: i32,
    pub feature_id: Option<String>,
    pub feature_name: Option<String>,
    pub feature_type: FeatureType,
    /// Set for variant records, absent for annotation features
    pub variation_type: Option<VariationType>,
    pub gene_ids: Vec<String>,
    pub gene_names: Vec<String>,
    pub quality: Option<f32>,
    /// Filter labels from the source; empty means the record passed
    pub failed_filters: Vec<String>,
    /// Annotation fields outside the registry, keys lower-cased
    pub info: BTreeMap<String, FieldValue>,
}

impl FeatureIndexEntry {
    /// The deterministic per-entry uid
    ///
    /// `{file_id}_{chromosome_id}_{start}_{end}` with the feature id appended
    /// when present. Stable across rebuilds, which makes it usable as the
    /// final sort tie-break.
    #[must_use]
    pub fn uid(&self) -> String {
        let mut buf = itoa::Buffer::new();
        let mut uid = String::new();
        uid.push_str(buf.format(self.file_id));
        uid.push('_');
        uid.push_str(buf.format(self.chromosome_id));
        uid.push('_');
        uid.push_str(buf.format(self.start_index));
        uid.push('_');
        uid.push_str(buf.format(self.end_index));
        if let Some(feature_id) = &self.feature_id {
            uid.push('_');
            uid.push_str(feature_id);
        }
        uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_round_trip() {
        for field in IndexField::ALL {
            assert_eq!(IndexField::from_name(field.name()), Some(field));
        }
        assert_eq!(IndexField::from_name("nope"), None);
    }

    #[test]
    fn test_variation_type_parsing() {
        assert_eq!(VariationType::from_name("del"), Some(VariationType::Del));
        assert_eq!(VariationType::from_name("SNV"), Some(VariationType::Snv));
        assert_eq!(VariationType::from_name("weird"), None);
        assert_eq!(VariationType::Bnd.as_str(), "BND");
    }

    #[test]
    fn test_uid_is_deterministic() {
        let entry = FeatureIndexEntry {
            file_id: 3,
            chromosome_id: 12,
            chromosome_name: "chr12".into(),
            start_index: 100,
            end_index: 250,
            feature_id: Some("rs123".into()),
            feature_name: None,
            feature_type: FeatureType::Variation,
            variation_type: Some(VariationType::Snv),
            gene_ids: vec![],
            gene_names: vec![],
            quality: None,
            failed_filters: vec![],
            info: BTreeMap::new(),
        };
        assert_eq!(entry.uid(), "3_12_100_250_rs123");
        assert_eq!(entry.uid(), entry.clone().uid());
    }
}
