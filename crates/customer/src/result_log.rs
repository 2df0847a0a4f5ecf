//! Append-only result log, one JSON object per line

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::driver::CustomerRecord;
use crate::error::DriverError;

#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as one line, creating the file if needed
    pub fn append(&self, record: &CustomerRecord) -> Result<(), DriverError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read every record back, skipping blank lines
    pub fn read_all(&self) -> Result<Vec<CustomerRecord>, DriverError> {
        let contents = std::fs::read_to_string(&self.path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(DriverError::from))
            .collect()
    }
}
