use std::io::{self, Write};

use serde::Serialize;

use crate::catalog::Catalog;
use crate::extract::ExtractionResult;
use crate::samples::SampleRecord;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_projects(projects: &[String]) -> io::Result<()> {
        Self::print_json(&projects)
    }

    pub fn print_catalog(catalog: &Catalog) -> io::Result<()> {
        Self::print_json(catalog)
    }

    pub fn print_samples(samples: &[SampleRecord]) -> io::Result<()> {
        Self::print_json(&samples)
    }

    pub fn print_extraction(result: &ExtractionResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
