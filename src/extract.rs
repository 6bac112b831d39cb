use std::fs;
use std::io::{self, Cursor};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use zip::ZipArchive;

use crate::error::BrowserError;

/// Canonical FastQC report entry point inside an archive.
pub const REPORT_FILENAME: &str = "fastqc_report.html";

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub source_key: String,
    pub local_root: Utf8PathBuf,
    /// Relative to the web root, ready to serve without path arithmetic.
    pub report_path: String,
}

/// Extracts an in-memory archive under `root`. Entries whose normalized path
/// is absolute, climbs out via `..`, or resolves outside `root` are skipped
/// and logged; a single poisoned entry never aborts the rest of the archive.
pub fn extract_archive(bytes: &[u8], key: &str, root: &Utf8Path) -> Result<(), BrowserError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|err| BrowserError::MalformedArchive {
            key: key.to_string(),
            message: err.to_string(),
        })?;

    fs::create_dir_all(root.as_std_path())
        .map_err(|err| BrowserError::Filesystem(err.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| BrowserError::MalformedArchive {
                key: key.to_string(),
                message: err.to_string(),
            })?;

        let Some(relative) = entry
            .enclosed_name()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        else {
            tracing::warn!(key, entry = entry.name(), "skipping unsafe archive entry");
            continue;
        };

        let destination = root.join(&relative);
        if !destination.starts_with(root) {
            tracing::warn!(key, entry = entry.name(), "skipping entry escaping the root");
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(destination.as_std_path())
                .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(destination.as_std_path())
            .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
    }

    Ok(())
}

/// Locates the report entry point under an extraction root: the canonical
/// report filename when present, otherwise any HTML file. The returned path
/// is relative to `root`.
pub fn find_report(root: &Utf8Path, key: &str) -> Result<Utf8PathBuf, BrowserError> {
    let mut html_files: Vec<Utf8PathBuf> = walk_files(root)?
        .into_iter()
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("html"))
                .unwrap_or(false)
        })
        .filter_map(|path| path.strip_prefix(root).ok().map(Utf8Path::to_path_buf))
        .collect();
    html_files.sort();

    if let Some(exact) = html_files
        .iter()
        .find(|path| path.file_name() == Some(REPORT_FILENAME))
    {
        return Ok(exact.clone());
    }

    html_files
        .into_iter()
        .next()
        .ok_or_else(|| BrowserError::ReportNotFound {
            key: key.to_string(),
        })
}

fn walk_files(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, BrowserError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = dir
            .read_dir_utf8()
            .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| BrowserError::Filesystem(err.to_string()))?;
            let path = entry.path().to_path_buf();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}
