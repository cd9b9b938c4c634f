use std::collections::BTreeMap;

use anyhow::Result;
use featrack::{
    FeatureIndexEntry, FeatureType, Filter, FilterTerm, IndexManager, IndexOptions, QueryRequest,
    SortRule, VariationType,
};

const GENES: [&str; 4] = ["BRCA1", "BRCA2", "TP53", "NPHP1"];
const TYPES: [VariationType; 4] = [
    VariationType::Snv,
    VariationType::Del,
    VariationType::Inv,
    VariationType::Dup,
];

/// Deterministic stand-in for a VCF-backed record source.
fn synthetic_entries(file_id: i64) -> Vec<FeatureIndexEntry> {
    (0..40)
        .map(|i: i32| {
            let (chromosome_id, chromosome_name) =
                if i % 3 == 0 { (2, "chr2") } else { (1, "chr1") };
            let start = 1_000 + 97 * i + 13 * file_id as i32;
            let gene = GENES[(i as usize * 7 + file_id as usize) % GENES.len()];
            FeatureIndexEntry {
                file_id,
                chromosome_id,
                chromosome_name: chromosome_name.into(),
                start_index: start,
                end_index: start + 1 + i % 5,
                feature_id: Some(format!("rs{file_id}{i:02}")),
                feature_name: None,
                feature_type: FeatureType::Variation,
                variation_type: Some(TYPES[i as usize % TYPES.len()]),
                gene_ids: vec![format!("ENSG_{gene}")],
                gene_names: vec![gene.to_string()],
                quality: Some(10.0 + i as f32),
                failed_filters: if i % 5 == 0 { vec!["q10".into()] } else { vec![] },
                info: BTreeMap::new(),
            }
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let dir = tempfile::tempdir()?;
    let source = |file_id: i64, _rebuild_aux: bool| -> featrack::Result<Vec<FeatureIndexEntry>> {
        Ok(synthetic_entries(file_id))
    };
    let manager = IndexManager::new(IndexOptions::new(dir.path()), source)?;
    for file_id in [1, 2] {
        manager.register_file(file_id)?;
    }

    let request = QueryRequest {
        filters: vec![Filter::any_of(
            "variationType",
            vec![
                FilterTerm::Str("DEL".into()),
                FilterTerm::Str("INV".into()),
            ],
        )],
        page: Some(1),
        page_size: Some(8),
        order_by: vec![SortRule::desc("quality")],
        ..Default::default()
    };
    let result = manager.search(&request)?;
    println!(
        "{} deletions and inversions across both files, best quality first:",
        result.total_count
    );
    for entry in &result.entries {
        println!(
            "  {:<16} {}:{}-{} {:<4} q={:.1}",
            entry.uid(),
            entry.chromosome_name,
            entry.start_index,
            entry.end_index,
            entry.variation_type.map_or("-", VariationType::as_str),
            entry.quality.unwrap_or(0.0),
        );
    }

    println!();
    println!("Counts by variation type:");
    for group in manager.group(&QueryRequest::default(), "variationType")? {
        println!("  {:<6} {}", group.value, group.count);
    }

    println!();
    let hits = manager.find_features("rs2", &[], 5)?;
    println!("First {} features matching prefix 'rs2':", hits.len());
    for entry in &hits {
        println!(
            "  {} at {}:{}",
            entry.feature_id.as_deref().unwrap_or("?"),
            entry.chromosome_name,
            entry.start_index
        );
    }
    Ok(())
}
