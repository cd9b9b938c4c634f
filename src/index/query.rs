//! Query composition over the field registry
//!
//! A [`QueryRequest`] is the structured form of a browser filter panel: a set
//! of per-field filters, an optional chromosome scope, sort rules, and
//! pagination. [`build`] turns it into a [`ComposedQuery`], a boolean tree
//! evaluated against documents. Terms within one filter combine by OR unless
//! the filter's conjunction flag is set; distinct filters always combine by
//! AND.

use std::cmp::Ordering;

use crate::error::ValidationError;
use crate::index::document::{Document, FieldValue};
use crate::index::fields::{FieldKind, IndexField};
use crate::sortable::{self, CaseMode};
use crate::Result;

/// A single literal term inside a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTerm {
    Int(i32),
    Long(i64),
    Float(f32),
    Str(String),
}

impl FilterTerm {
    const fn kind_str(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }
}

/// Matching operator for one filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact term match; numeric terms compare as degenerate ranges
    #[default]
    Equals,
    /// Starts-with match over string fields
    Prefix,
    /// Inclusive range: one term matches exactly, two terms are [min, max]
    Range,
}

/// One per-field filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Registry field name the filter applies to
    pub field: String,
    pub op: FilterOp,
    pub terms: Vec<FilterTerm>,
    /// Terms combine by AND when set, OR otherwise
    pub conjunction: bool,
}

impl Filter {
    /// An equality filter whose terms combine by OR
    #[must_use]
    pub fn any_of(field: impl Into<String>, terms: Vec<FilterTerm>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equals,
            terms,
            conjunction: false,
        }
    }

    /// An equality filter whose terms combine by AND
    #[must_use]
    pub fn all_of(field: impl Into<String>, terms: Vec<FilterTerm>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equals,
            terms,
            conjunction: true,
        }
    }

    /// A starts-with filter whose terms combine by OR
    #[must_use]
    pub fn prefix(field: impl Into<String>, terms: Vec<FilterTerm>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Prefix,
            terms,
            conjunction: false,
        }
    }

    /// An inclusive range filter
    #[must_use]
    pub fn range(field: impl Into<String>, bounds: Vec<FilterTerm>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Range,
            terms: bounds,
            conjunction: false,
        }
    }
}

/// One sort rule: a field and a direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRule {
    pub field: String,
    pub descending: bool,
}

impl SortRule {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// A structured search request
///
/// `file_ids` scope the search to specific source files; empty means every
/// Ready segment. Pagination is 1-based and only applies when both components
/// are present; otherwise the full sorted result is returned.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub filters: Vec<Filter>,
    pub file_ids: Vec<i64>,
    /// Optional chromosome scope, AND-ed with the filters
    pub chromosome: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Tie-break rules in priority order; the stable default order applies
    /// after (or instead of) them
    pub order_by: Vec<SortRule>,
}

impl QueryRequest {
    /// The validated pagination window, when both components are present
    ///
    /// # Errors
    /// Returns a [`ValidationError::InvalidPage`] when either component is 0.
    pub fn paging(&self) -> Result<Option<(u32, u32)>> {
        match (self.page, self.page_size) {
            (Some(page), Some(page_size)) => {
                if page == 0 || page_size == 0 {
                    return Err(ValidationError::InvalidPage { page, page_size }.into());
                }
                Ok(Some((page, page_size)))
            }
            _ => Ok(None),
        }
    }
}

/// An evaluable boolean query tree
///
/// String comparisons work on the case-insensitive encoded keys, so matching
/// agrees exactly with sort order. Multi-valued fields match when any element
/// matches.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposedQuery {
    /// Matches every document (an empty filter list)
    MatchAll,
    Term {
        field: String,
        key: Vec<u8>,
    },
    Prefix {
        field: String,
        key: Vec<u8>,
    },
    IntRange {
        field: String,
        min: i32,
        max: i32,
    },
    LongRange {
        field: String,
        min: i64,
        max: i64,
    },
    FloatRange {
        field: String,
        min: f32,
        max: f32,
    },
    StrRange {
        field: String,
        min: Vec<u8>,
        max: Vec<u8>,
    },
    And(Vec<ComposedQuery>),
    Or(Vec<ComposedQuery>),
}

impl ComposedQuery {
    /// Whether a document satisfies this query
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Term { field, key } => {
                str_keys(doc.get(field)).any(|candidate| candidate == *key)
            }
            Self::Prefix { field, key } => {
                str_keys(doc.get(field)).any(|candidate| candidate.starts_with(key))
            }
            Self::IntRange { field, min, max } => match doc.get(field) {
                Some(FieldValue::Int(v)) => *min <= *v && *v <= *max,
                _ => false,
            },
            Self::LongRange { field, min, max } => match doc.get(field) {
                Some(FieldValue::Long(v)) => *min <= *v && *v <= *max,
                _ => false,
            },
            Self::FloatRange { field, min, max } => match doc.get(field) {
                Some(FieldValue::Float(v)) => {
                    min.total_cmp(v).is_le() && v.total_cmp(max).is_le()
                }
                _ => false,
            },
            Self::StrRange { field, min, max } => {
                str_keys(doc.get(field)).any(|candidate| *min <= candidate && candidate <= *max)
            }
            Self::And(clauses) => clauses.iter().all(|clause| clause.matches(doc)),
            Self::Or(clauses) => clauses.iter().any(|clause| clause.matches(doc)),
        }
    }
}

/// The encoded string keys a field value exposes for matching
fn str_keys(value: Option<&FieldValue>) -> impl Iterator<Item = Vec<u8>> + '_ {
    let slice: &[String] = match value {
        Some(FieldValue::Str(s)) => std::slice::from_ref(s),
        Some(FieldValue::StrSet(values)) => values.as_slice(),
        _ => &[],
    };
    slice
        .iter()
        .map(|s| sortable::encode_str(s, CaseMode::Insensitive))
}

fn known_field(name: &str) -> Result<IndexField> {
    IndexField::from_name(name)
        .ok_or_else(|| ValidationError::UnknownField(name.to_string()).into())
}

fn kind_mismatch(field: &str, expected: &'static str, term: &FilterTerm) -> crate::Error {
    ValidationError::KindMismatch {
        field: field.to_string(),
        expected,
        got: term.kind_str(),
    }
    .into()
}

/// Builds the clause for one term against one field
fn term_clause(field: IndexField, term: &FilterTerm) -> Result<ComposedQuery> {
    let name = field.name().to_string();
    match (field.kind(), term) {
        (FieldKind::Str | FieldKind::StrSet, FilterTerm::Str(s)) => Ok(ComposedQuery::Term {
            field: name,
            key: sortable::encode_str(s, CaseMode::Insensitive),
        }),
        (FieldKind::Int, FilterTerm::Int(v)) => Ok(ComposedQuery::IntRange {
            field: name,
            min: *v,
            max: *v,
        }),
        (FieldKind::Long, FilterTerm::Long(v)) => Ok(ComposedQuery::LongRange {
            field: name,
            min: *v,
            max: *v,
        }),
        (FieldKind::Float, FilterTerm::Float(v)) => Ok(ComposedQuery::FloatRange {
            field: name,
            min: *v,
            max: *v,
        }),
        (kind, term) => Err(kind_mismatch(field.name(), kind.as_str(), term)),
    }
}

fn prefix_clause(field: IndexField, term: &FilterTerm) -> Result<ComposedQuery> {
    match (field.kind(), term) {
        (FieldKind::Str | FieldKind::StrSet, FilterTerm::Str(s)) => Ok(ComposedQuery::Prefix {
            field: field.name().to_string(),
            key: sortable::encode_str(s, CaseMode::Insensitive),
        }),
        (_, term) => Err(kind_mismatch(field.name(), "string", term)),
    }
}

fn range_clause(field: IndexField, terms: &[FilterTerm]) -> Result<ComposedQuery> {
    let (min, max) = match terms {
        [single] => (single, single),
        [min, max] => (min, max),
        _ => return Err(ValidationError::InvalidRange(field.name().to_string()).into()),
    };
    let name = field.name().to_string();
    match (field.kind(), min, max) {
        (FieldKind::Int, FilterTerm::Int(lo), FilterTerm::Int(hi)) => {
            if lo > hi {
                return Err(ValidationError::InvalidRange(name).into());
            }
            Ok(ComposedQuery::IntRange {
                field: name,
                min: *lo,
                max: *hi,
            })
        }
        (FieldKind::Long, FilterTerm::Long(lo), FilterTerm::Long(hi)) => {
            if lo > hi {
                return Err(ValidationError::InvalidRange(name).into());
            }
            Ok(ComposedQuery::LongRange {
                field: name,
                min: *lo,
                max: *hi,
            })
        }
        (FieldKind::Float, FilterTerm::Float(lo), FilterTerm::Float(hi)) => {
            if lo.total_cmp(hi).is_gt() {
                return Err(ValidationError::InvalidRange(name).into());
            }
            Ok(ComposedQuery::FloatRange {
                field: name,
                min: *lo,
                max: *hi,
            })
        }
        (FieldKind::Str | FieldKind::StrSet, FilterTerm::Str(lo), FilterTerm::Str(hi)) => {
            let min = sortable::encode_str(lo, CaseMode::Insensitive);
            let max = sortable::encode_str(hi, CaseMode::Insensitive);
            if min > max {
                return Err(ValidationError::InvalidRange(name).into());
            }
            Ok(ComposedQuery::StrRange {
                field: name,
                min,
                max,
            })
        }
        (kind, term, _) => Err(kind_mismatch(field.name(), kind.as_str(), term)),
    }
}

fn combine(mut clauses: Vec<ComposedQuery>, conjunction: bool) -> ComposedQuery {
    if clauses.len() == 1 {
        return clauses.remove(0);
    }
    if conjunction {
        ComposedQuery::And(clauses)
    } else {
        ComposedQuery::Or(clauses)
    }
}

/// Builds the sub-query for one filter
///
/// A filter with no terms contributes nothing, mirroring a browser filter
/// panel with the section left blank.
fn build_filter(filter: &Filter) -> Result<Option<ComposedQuery>> {
    let field = known_field(&filter.field)?;
    if filter.terms.is_empty() {
        return Ok(None);
    }
    let clause = match filter.op {
        FilterOp::Equals => {
            let clauses = filter
                .terms
                .iter()
                .map(|term| term_clause(field, term))
                .collect::<Result<Vec<_>>>()?;
            combine(clauses, filter.conjunction)
        }
        FilterOp::Prefix => {
            let clauses = filter
                .terms
                .iter()
                .map(|term| prefix_clause(field, term))
                .collect::<Result<Vec<_>>>()?;
            combine(clauses, filter.conjunction)
        }
        FilterOp::Range => range_clause(field, &filter.terms)?,
    };
    Ok(Some(clause))
}

/// Composes a full request into one evaluable query
///
/// Each filter becomes a sub-query (terms OR-ed or AND-ed per its conjunction
/// flag), all sub-queries AND together, and a chromosome scope joins as one
/// more AND-ed equality clause. An empty composition matches everything in
/// scope.
///
/// # Errors
/// Returns a [`ValidationError`] for unknown fields, term/kind mismatches,
/// malformed ranges, or unknown sort fields.
pub fn build(request: &QueryRequest) -> Result<ComposedQuery> {
    for rule in &request.order_by {
        known_field(&rule.field)?;
    }

    let mut clauses = Vec::new();
    for filter in &request.filters {
        if let Some(clause) = build_filter(filter)? {
            clauses.push(clause);
        }
    }
    if let Some(chromosome_id) = request.chromosome {
        clauses.push(ComposedQuery::LongRange {
            field: IndexField::ChromosomeId.name().to_string(),
            min: chromosome_id,
            max: chromosome_id,
        });
    }

    Ok(match clauses.len() {
        0 => ComposedQuery::MatchAll,
        1 => clauses.remove(0),
        _ => ComposedQuery::And(clauses),
    })
}

/// Compares two keyed values with missing values ordered last
///
/// Missing-last holds under both directions so incomplete records never float
/// to the top of a descending sort.
fn key_ord(a: Option<Vec<u8>>, b: Option<Vec<u8>>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            if descending {
                y.cmp(&x)
            } else {
                x.cmp(&y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The composite comparator: explicit rules first, then the stable default
///
/// The default chain (chromosome name, start index, uid) always terminates
/// the comparison so every sort is total and page slices are reproducible.
pub(crate) fn compare_documents(a: &Document, b: &Document, rules: &[SortRule]) -> Ordering {
    for rule in rules {
        let ord = key_ord(a.sort_key(&rule.field), b.sort_key(&rule.field), rule.descending);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    key_ord(
        a.sort_key(IndexField::ChromosomeName.name()),
        b.sort_key(IndexField::ChromosomeName.name()),
        false,
    )
    .then_with(|| {
        key_ord(
            a.sort_key(IndexField::StartIndex.name()),
            b.sort_key(IndexField::StartIndex.name()),
            false,
        )
    })
    .then_with(|| {
        key_ord(
            a.sort_key(IndexField::Uid.name()),
            b.sort_key(IndexField::Uid.name()),
            false,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::to_document;
    use crate::index::fields::{FeatureIndexEntry, FeatureType, VariationType};
    use std::collections::BTreeMap;

    fn entry(
        chromosome: (i64, &str),
        start: i32,
        variation: VariationType,
        genes: &[&str],
        quality: Option<f32>,
    ) -> FeatureIndexEntry {
        FeatureIndexEntry {
            file_id: 1,
            chromosome_id: chromosome.0,
            chromosome_name: chromosome.1.into(),
            start_index: start,
            end_index: start + 1,
            feature_id: Some(format!("var_{start}")),
            feature_name: None,
            feature_type: FeatureType::Variation,
            variation_type: Some(variation),
            gene_ids: genes.iter().map(|g| format!("ENSG_{g}")).collect(),
            gene_names: genes.iter().map(ToString::to_string).collect(),
            quality,
            failed_filters: vec![],
            info: BTreeMap::new(),
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            to_document(&entry((1, "chr1"), 100, VariationType::Del, &["BRCA1"], Some(20.0))).unwrap(),
            to_document(&entry((1, "chr1"), 200, VariationType::Inv, &["BRCA2"], Some(40.0))).unwrap(),
            to_document(&entry((2, "chr2"), 50, VariationType::Snv, &["TP53", "BRCA1"], None)).unwrap(),
        ]
    }

    fn matching(query: &ComposedQuery) -> Vec<usize> {
        docs()
            .iter()
            .enumerate()
            .filter(|(_, doc)| query.matches(doc))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_empty_request_matches_all() -> Result<()> {
        let query = build(&QueryRequest::default())?;
        assert_eq!(query, ComposedQuery::MatchAll);
        assert_eq!(matching(&query), vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_or_terms_union() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::any_of(
                "variationType",
                vec![
                    FilterTerm::Str("DEL".into()),
                    FilterTerm::Str("INV".into()),
                ],
            )],
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_terms_match_case_insensitively() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::any_of(
                "variationType",
                vec![FilterTerm::Str("del".into())],
            )],
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![0]);
        Ok(())
    }

    #[test]
    fn test_and_terms_over_multi_valued_field() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::all_of(
                "geneName",
                vec![
                    FilterTerm::Str("TP53".into()),
                    FilterTerm::Str("BRCA1".into()),
                ],
            )],
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![2]);
        Ok(())
    }

    #[test]
    fn test_distinct_filters_intersect() -> Result<()> {
        let request = QueryRequest {
            filters: vec![
                Filter::any_of("geneName", vec![FilterTerm::Str("BRCA1".into())]),
                Filter::any_of("variationType", vec![FilterTerm::Str("SNV".into())]),
            ],
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![2]);
        Ok(())
    }

    #[test]
    fn test_prefix_matches_any_element() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::prefix(
                "geneId",
                vec![FilterTerm::Str("ensg_tp".into())],
            )],
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![2]);
        Ok(())
    }

    #[test]
    fn test_int_range_inclusive() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::range(
                "startIndex",
                vec![FilterTerm::Int(100), FilterTerm::Int(200)],
            )],
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_single_term_range_is_exact() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::range("quality", vec![FilterTerm::Float(40.0)])],
            ..Default::default()
        };
        // The doc with no quality never matches a quality range
        assert_eq!(matching(&build(&request)?), vec![1]);
        Ok(())
    }

    #[test]
    fn test_chromosome_scope_is_anded() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::any_of(
                "geneName",
                vec![FilterTerm::Str("BRCA1".into())],
            )],
            chromosome: Some(2),
            ..Default::default()
        };
        assert_eq!(matching(&build(&request)?), vec![2]);
        Ok(())
    }

    #[test]
    fn test_unknown_field_rejected() {
        let request = QueryRequest {
            filters: vec![Filter::any_of("bogus", vec![FilterTerm::Str("x".into())])],
            ..Default::default()
        };
        let err = build(&request).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_unknown_sort_field_rejected() {
        let request = QueryRequest {
            order_by: vec![SortRule::asc("bogus")],
            ..Default::default()
        };
        assert!(build(&request).is_err());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let request = QueryRequest {
            filters: vec![Filter::any_of("startIndex", vec![FilterTerm::Str("x".into())])],
            ..Default::default()
        };
        assert!(build(&request).is_err());
    }

    #[test]
    fn test_prefix_on_numeric_field_rejected() {
        let request = QueryRequest {
            filters: vec![Filter::prefix("quality", vec![FilterTerm::Str("3".into())])],
            ..Default::default()
        };
        assert!(build(&request).is_err());
    }

    #[test]
    fn test_malformed_ranges_rejected() {
        let inverted = QueryRequest {
            filters: vec![Filter::range(
                "startIndex",
                vec![FilterTerm::Int(200), FilterTerm::Int(100)],
            )],
            ..Default::default()
        };
        assert!(build(&inverted).is_err());

        let too_many = QueryRequest {
            filters: vec![Filter::range(
                "startIndex",
                vec![FilterTerm::Int(1), FilterTerm::Int(2), FilterTerm::Int(3)],
            )],
            ..Default::default()
        };
        assert!(build(&too_many).is_err());
    }

    #[test]
    fn test_empty_terms_filter_is_skipped() -> Result<()> {
        let request = QueryRequest {
            filters: vec![Filter::any_of("geneName", vec![])],
            ..Default::default()
        };
        assert_eq!(build(&request)?, ComposedQuery::MatchAll);
        Ok(())
    }

    #[test]
    fn test_paging_validation() {
        let mut request = QueryRequest::default();
        assert_eq!(request.paging().unwrap(), None);

        request.page = Some(1);
        assert_eq!(request.paging().unwrap(), None);

        request.page_size = Some(20);
        assert_eq!(request.paging().unwrap(), Some((1, 20)));

        request.page = Some(0);
        assert!(request.paging().is_err());
    }

    #[test]
    fn test_default_order_chromosome_then_start() {
        let mut all = docs();
        all.sort_by(|a, b| compare_documents(a, b, &[]));
        let starts: Vec<_> = all
            .iter()
            .map(|d| d.get("startIndex").cloned())
            .collect();
        assert_eq!(
            starts,
            vec![
                Some(FieldValue::Int(100)),
                Some(FieldValue::Int(200)),
                Some(FieldValue::Int(50)),
            ]
        );
    }

    #[test]
    fn test_descending_rule_with_missing_last() {
        let mut all = docs();
        all.sort_by(|a, b| compare_documents(a, b, &[SortRule::desc("quality")]));
        let qualities: Vec<_> = all.iter().map(|d| d.get("quality").cloned()).collect();
        assert_eq!(
            qualities,
            vec![
                Some(FieldValue::Float(40.0)),
                Some(FieldValue::Float(20.0)),
                None,
            ]
        );

        // Ascending also keeps the missing value last
        all.sort_by(|a, b| compare_documents(a, b, &[SortRule::asc("quality")]));
        let qualities: Vec<_> = all.iter().map(|d| d.get("quality").cloned()).collect();
        assert_eq!(
            qualities,
            vec![
                Some(FieldValue::Float(20.0)),
                Some(FieldValue::Float(40.0)),
                None,
            ]
        );
    }
}
