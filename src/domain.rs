use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

/// Pipeline stage subfolders found under each project prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Subfolder {
    #[default]
    Root,
    Fastq,
    Fastqc,
    Qc,
    SalmonQuant,
    Deseq2,
}

impl Subfolder {
    pub const ALL: [Subfolder; 6] = [
        Subfolder::Root,
        Subfolder::Fastq,
        Subfolder::Fastqc,
        Subfolder::Qc,
        Subfolder::SalmonQuant,
        Subfolder::Deseq2,
    ];

    pub fn as_prefix(self) -> &'static str {
        match self {
            Subfolder::Root => "",
            Subfolder::Fastq => "Fastq/",
            Subfolder::Fastqc => "FastQC/",
            Subfolder::Qc => "QC/",
            Subfolder::SalmonQuant => "Salmon_Quant/",
            Subfolder::Deseq2 => "DESeq2/",
        }
    }
}

impl fmt::Display for Subfolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subfolder::Root => write!(f, "(project root)"),
            other => write!(f, "{}", other.as_prefix()),
        }
    }
}

impl FromStr for Subfolder {
    type Err = BrowserError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_end_matches('/').to_ascii_lowercase();
        match normalized.as_str() {
            "" | "(project root)" | "root" => Ok(Subfolder::Root),
            "fastq" => Ok(Subfolder::Fastq),
            "fastqc" => Ok(Subfolder::Fastqc),
            "qc" => Ok(Subfolder::Qc),
            "salmon_quant" | "salmon-quant" => Ok(Subfolder::SalmonQuant),
            "deseq2" => Ok(Subfolder::Deseq2),
            _ => Err(BrowserError::InvalidSubfolder(value.to_string())),
        }
    }
}

/// Strips leading slashes and guarantees a trailing slash on non-empty prefixes.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Full listing prefix for one (project, subfolder) pair.
pub fn object_prefix(base_prefix: &str, project: &str, subfolder: Subfolder) -> String {
    normalize_prefix(&format!(
        "{base_prefix}{project}/{}",
        subfolder.as_prefix()
    ))
}

/// Extracts the project name from a delimiter-listing common prefix,
/// e.g. `vendor-data/projA/` yields `projA`.
pub fn project_from_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_end_matches('/');
    let name = trimmed.rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn normalize_prefix_variants() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("  /vendor-data"), "vendor-data/");
        assert_eq!(normalize_prefix("vendor-data/"), "vendor-data/");
        assert_eq!(normalize_prefix("a/b"), "a/b/");
    }

    #[test]
    fn object_prefix_joins_parts() {
        assert_eq!(
            object_prefix("vendor-data/", "projA", Subfolder::SalmonQuant),
            "vendor-data/projA/Salmon_Quant/"
        );
        assert_eq!(
            object_prefix("vendor-data/", "projA", Subfolder::Root),
            "vendor-data/projA/"
        );
    }

    #[test]
    fn parse_subfolder() {
        let sub: Subfolder = "FastQC/".parse().unwrap();
        assert_eq!(sub, Subfolder::Fastqc);
        let sub: Subfolder = "".parse().unwrap();
        assert_eq!(sub, Subfolder::Root);
        let err = "Bowtie/".parse::<Subfolder>().unwrap_err();
        assert_matches!(err, BrowserError::InvalidSubfolder(_));
    }

    #[test]
    fn project_name_from_common_prefix() {
        assert_eq!(
            project_from_prefix("vendor-data/projA/").as_deref(),
            Some("projA")
        );
        assert_eq!(project_from_prefix("/"), None);
    }
}
