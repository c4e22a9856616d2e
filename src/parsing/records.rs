//! Pre-scanned entity records produced by external tools.
//!
//! A `*.records.json` file holds one [`ScanOutput`]: a module record plus its
//! top-level functions and classes. This is how scanners for languages the
//! crate has no grammar for plug into the pipeline.

use super::Scanner;
use crate::error::ScanError;
use crate::types::ScanOutput;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct JsonRecordScanner;

impl JsonRecordScanner {
    pub fn new() -> Self {
        Self
    }
}

impl Scanner for JsonRecordScanner {
    fn name(&self) -> &'static str {
        "records"
    }

    fn extensions(&self) -> &[&str] {
        &["records.json"]
    }

    fn scan(&self, path: &str, source: &str) -> Result<ScanOutput, ScanError> {
        let output: ScanOutput = serde_json::from_str(source).map_err(|e| ScanError::InvalidRecord {
            path: PathBuf::from(path),
            reason: e.to_string(),
        })?;
        output.validate().map_err(|reason| ScanError::InvalidRecord {
            path: PathBuf::from(path),
            reason,
        })?;
        Ok(output)
    }

    fn reads_module_source(&self) -> bool {
        false
    }
}
