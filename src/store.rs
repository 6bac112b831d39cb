use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

use crate::error::BrowserError;

/// Local filesystem layout: a web-servable root for previews and extracted
/// reports, plus a flat directory for raw downloads.
#[derive(Debug, Clone)]
pub struct LocalStore {
    web_root: Utf8PathBuf,
    download_dir: Utf8PathBuf,
}

impl LocalStore {
    pub fn new(web_root: Utf8PathBuf, download_dir: Utf8PathBuf) -> Self {
        Self {
            web_root,
            download_dir,
        }
    }

    pub fn web_root(&self) -> &Utf8Path {
        &self.web_root
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    pub fn ensure_layout(&self) -> Result<(), BrowserError> {
        fs::create_dir_all(self.web_downloads_dir().as_std_path())
            .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
        fs::create_dir_all(self.download_dir.as_std_path())
            .map_err(|err| BrowserError::Filesystem(err.to_string()))
    }

    pub fn web_downloads_dir(&self) -> Utf8PathBuf {
        self.web_root.join("downloads")
    }

    pub fn preview_rel(&self, key: &str) -> String {
        format!("downloads/fastqc_{}.html", short_digest(key))
    }

    pub fn preview_path(&self, key: &str) -> Utf8PathBuf {
        self.web_root.join(self.preview_rel(key))
    }

    pub fn preview_url(&self, key: &str) -> String {
        format!("/{}", self.preview_rel(key))
    }

    pub fn extraction_rel(&self, key: &str) -> String {
        format!("downloads/fastqc_zip_{}", short_digest(key))
    }

    pub fn extraction_root(&self, key: &str) -> Utf8PathBuf {
        self.web_root.join(self.extraction_rel(key))
    }

    /// Flat-namespace local path for a raw download: path separators in the
    /// remote key become double underscores.
    pub fn flat_download_path(&self, key: &str) -> Utf8PathBuf {
        self.download_dir.join(key.replace('/', "__"))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), BrowserError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| BrowserError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| BrowserError::Filesystem(err.to_string()))
    }
}

/// Fixed-width digest used to derive collision-free, idempotent local names
/// from remote keys.
pub fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_fixed_width() {
        let first = short_digest("proj/FastQC/sample_fastqc.zip");
        let second = short_digest("proj/FastQC/sample_fastqc.zip");
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));

        let other = short_digest("proj/FastQC/other_fastqc.zip");
        assert_ne!(first, other);
    }

    #[test]
    fn layout_paths() {
        let store = LocalStore::new(
            Utf8PathBuf::from("www"),
            Utf8PathBuf::from("downloads"),
        );
        let preview = store.preview_path("proj/FastQC/a.html");
        assert!(preview.starts_with("www/downloads"));
        assert!(preview.as_str().ends_with(".html"));
        assert_eq!(
            store.preview_url("proj/FastQC/a.html"),
            format!("/downloads/fastqc_{}.html", short_digest("proj/FastQC/a.html"))
        );

        let flat = store.flat_download_path("proj/Fastq/S1_R1.fastq.gz");
        assert_eq!(
            flat,
            Utf8PathBuf::from("downloads/proj__Fastq__S1_R1.fastq.gz")
        );
    }
}
