use chrono::{DateTime, Utc};

use crate::catalog::ObjectRecord;
use crate::samples::SampleRecord;

/// Tabular view capability. The variant is chosen at construction time by
/// the caller; there is no runtime feature detection.
pub trait TableView {
    fn render_objects(&self, records: &[ObjectRecord]) -> String;
    fn render_samples(&self, samples: &[SampleRecord]) -> String;
}

pub struct HtmlTable;

pub struct TextGrid;

const OBJECT_HEADERS: [&str; 4] = ["key", "size", "last_modified", "storage_class"];
const SAMPLE_HEADERS: [&str; 8] = [
    "sample_id",
    "complete",
    "quant",
    "gene_quant",
    "log",
    "meta",
    "files",
    "latest_modified",
];

fn object_row(record: &ObjectRecord) -> Vec<String> {
    vec![
        record.key.clone(),
        human_size(record.size),
        format_timestamp(record.last_modified),
        record.storage_class.clone().unwrap_or_default(),
    ]
}

fn sample_row(sample: &SampleRecord) -> Vec<String> {
    vec![
        sample.sample_id.clone(),
        sample.complete.to_string(),
        sample.has_quant.to_string(),
        sample.has_gene_quant.to_string(),
        sample.has_log.to_string(),
        sample.has_meta.to_string(),
        sample.file_count.to_string(),
        format_timestamp(sample.latest_modified),
    ]
}

impl TableView for HtmlTable {
    fn render_objects(&self, records: &[ObjectRecord]) -> String {
        html_table(&OBJECT_HEADERS, records.iter().map(object_row))
    }

    fn render_samples(&self, samples: &[SampleRecord]) -> String {
        html_table(&SAMPLE_HEADERS, samples.iter().map(sample_row))
    }
}

impl TableView for TextGrid {
    fn render_objects(&self, records: &[ObjectRecord]) -> String {
        text_grid(&OBJECT_HEADERS, records.iter().map(object_row))
    }

    fn render_samples(&self, samples: &[SampleRecord]) -> String {
        text_grid(&SAMPLE_HEADERS, samples.iter().map(sample_row))
    }
}

fn html_table<I>(headers: &[&str], rows: I) -> String
where
    I: Iterator<Item = Vec<String>>,
{
    let mut out = String::from("<table>\n<thead><tr>");
    for header in headers {
        out.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>");
    out
}

fn text_grid<I>(headers: &[&str], rows: I) -> String
where
    I: Iterator<Item = Vec<String>>,
{
    let rows: Vec<Vec<String>> = rows.collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.len());
        }
    }

    let mut out = String::new();
    let render_line = |cells: Vec<String>| {
        let mut line = String::new();
        for (index, cell) in cells.into_iter().enumerate() {
            if index > 0 {
                line.push_str("  ");
            }
            line.push_str(&format!("{cell:<width$}", width = widths[index]));
        }
        line.trim_end().to_string()
    };

    out.push_str(&render_line(
        headers.iter().map(|h| h.to_string()).collect(),
    ));
    for row in rows {
        out.push('\n');
        out.push_str(&render_line(row));
    }
    out
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn human_size(size: Option<i64>) -> String {
    let Some(size) = size else {
        return String::new();
    };
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return if unit == "B" {
                format!("{size} B")
            } else {
                format!("{value:.2} {unit}")
            };
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(None), "");
        assert_eq!(human_size(Some(512)), "512 B");
        assert_eq!(human_size(Some(2048)), "2.00 KB");
        assert_eq!(human_size(Some(5 * 1024 * 1024)), "5.00 MB");
    }

    #[test]
    fn timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(format_timestamp(Some(ts)), "2026-03-14 09:26:53 UTC");
        assert_eq!(format_timestamp(None), "");
    }

    #[test]
    fn html_table_escapes_cells() {
        let records = vec![ObjectRecord {
            key: "a<b>&c".to_string(),
            size: None,
            last_modified: None,
            storage_class: None,
        }];
        let html = HtmlTable.render_objects(&records);
        assert!(html.contains("a&lt;b&gt;&amp;c"));
    }

    #[test]
    fn text_grid_aligns_columns() {
        let records = vec![
            ObjectRecord {
                key: "short".to_string(),
                size: Some(1),
                last_modified: None,
                storage_class: None,
            },
            ObjectRecord {
                key: "a-much-longer-key".to_string(),
                size: Some(2048),
                last_modified: None,
                storage_class: Some("STANDARD".to_string()),
            },
        ];
        let grid = TextGrid.render_objects(&records);
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("key"));
        assert!(lines[2].contains("2.00 KB"));
    }
}
