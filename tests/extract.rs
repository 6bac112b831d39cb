use std::io::{Cursor, Write};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::tempdir;
use zip::write::{SimpleFileOptions, ZipWriter};

use rnaseq_browser::error::BrowserError;
use rnaseq_browser::extract::{extract_archive, find_report};

fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn temp_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join("out")).unwrap()
}

#[test]
fn extracts_archive_tree() {
    let dir = tempdir().unwrap();
    let root = temp_root(&dir);
    let bytes = build_zip(&[
        ("sample_fastqc/fastqc_report.html", "<html></html>"),
        ("sample_fastqc/Images/x.png", "png-bytes"),
    ]);

    extract_archive(&bytes, "proj/FastQC/sample_fastqc.zip", &root).unwrap();

    assert!(root.join("sample_fastqc/fastqc_report.html").is_file());
    assert!(root.join("sample_fastqc/Images/x.png").is_file());

    let report = find_report(&root, "proj/FastQC/sample_fastqc.zip").unwrap();
    assert_eq!(report, Utf8PathBuf::from("sample_fastqc/fastqc_report.html"));
}

#[test]
fn traversal_entries_are_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let root = temp_root(&dir);
    let bytes = build_zip(&[
        ("good/fastqc_report.html", "<html></html>"),
        ("../evil.txt", "escape"),
        ("/etc/evil.txt", "escape"),
    ]);

    extract_archive(&bytes, "proj/FastQC/poisoned.zip", &root).unwrap();

    assert!(root.join("good/fastqc_report.html").is_file());
    // Nothing may land outside the extraction root.
    assert!(!dir.path().join("evil.txt").exists());
    assert!(!root.join("evil.txt").exists());
}

#[test]
fn repeat_extraction_into_same_root_succeeds() {
    let dir = tempdir().unwrap();
    let root = temp_root(&dir);
    let bytes = build_zip(&[("a/fastqc_report.html", "<html></html>")]);

    extract_archive(&bytes, "proj/FastQC/a.zip", &root).unwrap();
    extract_archive(&bytes, "proj/FastQC/a.zip", &root).unwrap();

    assert!(root.join("a/fastqc_report.html").is_file());
}

#[test]
fn report_discovery_falls_back_to_any_html() {
    let dir = tempdir().unwrap();
    let root = temp_root(&dir);
    let bytes = build_zip(&[
        ("report/summary.txt", "text"),
        ("report/overview.html", "<html></html>"),
    ]);

    extract_archive(&bytes, "proj/FastQC/b.zip", &root).unwrap();

    let report = find_report(&root, "proj/FastQC/b.zip").unwrap();
    assert_eq!(report, Utf8PathBuf::from("report/overview.html"));
}

#[test]
fn archive_without_html_reports_not_found() {
    let dir = tempdir().unwrap();
    let root = temp_root(&dir);
    let bytes = build_zip(&[("data/raw.txt", "text")]);

    extract_archive(&bytes, "proj/FastQC/c.zip", &root).unwrap();

    let err = find_report(&root, "proj/FastQC/c.zip").unwrap_err();
    assert_matches!(err, BrowserError::ReportNotFound { ref key } if key == "proj/FastQC/c.zip");
}

#[test]
fn garbage_bytes_are_a_malformed_archive() {
    let dir = tempdir().unwrap();
    let root = temp_root(&dir);

    let err = extract_archive(b"definitely not a zip", "proj/FastQC/d.zip", &root).unwrap_err();
    assert_matches!(err, BrowserError::MalformedArchive { .. });
}
