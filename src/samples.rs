use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::catalog::Catalog;

/// Path segment marking the quantification output area for a project.
pub const SAMPLE_AREA_MARKER: &str = "Salmon_Quant";

const QUANT_FILE: &str = "quant.sf";
const GENE_QUANT_FILE: &str = "quant.genes.sf";
const LOG_FILE: &str = "salmon_quant.log";
const META_FILE: &str = "meta_info.json";
const DONE_SUFFIX: &str = ".done";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub complete: bool,
    pub has_quant: bool,
    pub has_gene_quant: bool,
    pub has_log: bool,
    pub has_meta: bool,
    pub file_count: usize,
    pub latest_modified: Option<DateTime<Utc>>,
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"(?:^|/){SAMPLE_AREA_MARKER}/(.+)$")).unwrap()
    })
}

/// Reconstructs per-sample completeness from a flat catalog. Pure function of
/// its input: recomputed in full on every call, independent of row order.
pub fn aggregate(catalog: &Catalog) -> Vec<SampleRecord> {
    let mut groups: BTreeMap<String, Vec<(&str, Option<DateTime<Utc>>)>> = BTreeMap::new();

    for record in catalog.records() {
        let Some(rest) = marker_pattern()
            .captures(&record.key)
            .and_then(|captures| captures.get(1))
            .map(|group| group.as_str())
        else {
            continue;
        };
        let Some(sample_id) = sample_id_for(rest) else {
            continue;
        };
        groups
            .entry(sample_id)
            .or_default()
            .push((rest, record.last_modified));
    }

    let mut samples: Vec<SampleRecord> = groups
        .into_iter()
        .filter_map(|(sample_id, members)| build_record(sample_id, &members))
        .collect();

    samples.sort_by(|a, b| {
        b.complete
            .cmp(&a.complete)
            .then_with(|| a.sample_id.cmp(&b.sample_id))
    });
    samples
}

/// Sample id from the path below the marker: the directory segment when one
/// exists, otherwise the stem of a terminal `<id>.done` marker file.
fn sample_id_for(rest: &str) -> Option<String> {
    if let Some((dir, _)) = rest.split_once('/') {
        if dir.is_empty() {
            return None;
        }
        return Some(dir.to_string());
    }
    let stem = rest.strip_suffix(DONE_SUFFIX)?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn build_record(
    sample_id: String,
    members: &[(&str, Option<DateTime<Utc>>)],
) -> Option<SampleRecord> {
    let done_name = format!("{sample_id}{DONE_SUFFIX}");
    let mut record = SampleRecord {
        sample_id,
        complete: false,
        has_quant: false,
        has_gene_quant: false,
        has_log: false,
        has_meta: false,
        file_count: members.len(),
        latest_modified: None,
    };

    for (rest, modified) in members {
        let file_name = rest.rsplit('/').next().unwrap_or(rest);
        match file_name {
            QUANT_FILE => record.has_quant = true,
            GENE_QUANT_FILE => record.has_gene_quant = true,
            LOG_FILE => record.has_log = true,
            META_FILE => record.has_meta = true,
            name if name == done_name => record.complete = true,
            _ => {}
        }
        if *modified > record.latest_modified {
            record.latest_modified = *modified;
        }
    }

    let matched = record.complete
        || record.has_quant
        || record.has_gene_quant
        || record.has_log
        || record.has_meta;
    matched.then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_id_prefers_directory_segment() {
        assert_eq!(sample_id_for("S1/quant.sf").as_deref(), Some("S1"));
        assert_eq!(sample_id_for("S1/S2.done").as_deref(), Some("S1"));
        assert_eq!(sample_id_for("S1.done").as_deref(), Some("S1"));
        assert_eq!(sample_id_for("summary.txt"), None);
    }

    #[test]
    fn marker_must_be_a_path_segment() {
        assert!(marker_pattern().captures("proj/Salmon_Quant/S1/quant.sf").is_some());
        assert!(marker_pattern().captures("Salmon_Quant/S1.done").is_some());
        assert!(marker_pattern().captures("proj/NotSalmon_Quantx/S1").is_none());
        assert!(marker_pattern().captures("proj/Salmon_Quant/").is_none());
    }
}
