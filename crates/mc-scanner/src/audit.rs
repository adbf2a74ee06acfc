//! CSV audit sink for remediated files.
//!
//! One header-less `path,owner` row per bad file. The file is recreated at
//! the start of each run and flushed when the run ends.

use std::fs::File;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{Writer, WriterBuilder};
use mc_core::OwnerKind;

use crate::error::ScanError;

/// An open audit file.
#[derive(Debug)]
pub struct AuditLog {
    path: Utf8PathBuf,
    writer: Writer<File>,
}

impl AuditLog {
    /// Creates (or truncates) the audit file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Audit`] if the file cannot be created.
    pub fn create(path: &Utf8Path) -> Result<Self, ScanError> {
        let writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|source| ScanError::audit(path, source))?;
        Ok(Self {
            path: path.to_owned(),
            writer,
        })
    }

    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Audit`] if the row cannot be written.
    pub fn write(&mut self, file: &Utf8Path, owner: OwnerKind) -> Result<(), ScanError> {
        self.writer
            .write_record([file.as_str(), owner.as_str()])
            .map_err(|source| ScanError::audit(&self.path, source))
    }

    /// Flushes buffered rows and closes the file.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Audit`] if the flush fails.
    pub fn close(mut self) -> Result<(), ScanError> {
        self.writer
            .flush()
            .map_err(|source| ScanError::audit(&self.path, source.into()))
    }
}
