//! # Dialect Serializers
//!
//! The contract between table building and an external archive dialect. The
//! core only ships the tab-separated dialect; other dialects implement the
//! same trait outside the crate.

use super::table::ExportTable;
use crate::IsaError;
use csv::{QuoteStyle, Terminator, WriterBuilder};

/// Turns an export table into the bytes of one file.
pub trait DialectSerializer {
    /// Short dialect name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the dialect can express processings with several inputs.
    fn allows_pooling(&self) -> bool {
        true
    }

    /// Serialize a table.
    fn serialize(&self, table: &ExportTable) -> Result<Vec<u8>, IsaError>;
}

/// Tab-separated text with every cell double-quoted.
///
/// Inner quotes are doubled. Tabs and line breaks inside a cell stay inside
/// its quotes.
#[derive(Debug, Clone, Copy)]
pub struct TabDialect {
    pooling: bool,
}

impl Default for TabDialect {
    fn default() -> Self {
        Self { pooling: true }
    }
}

impl TabDialect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject graphs with pooling processings.
    #[must_use]
    pub fn without_pooling(mut self) -> Self {
        self.pooling = false;
        self
    }
}

fn write_error(e: csv::Error) -> IsaError {
    IsaError::SerializationError(format!("tab dialect: {}", e))
}

impl DialectSerializer for TabDialect {
    fn name(&self) -> &'static str {
        "tab"
    }

    fn allows_pooling(&self) -> bool {
        self.pooling
    }

    fn serialize(&self, table: &ExportTable) -> Result<Vec<u8>, IsaError> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(&table.headers).map_err(write_error)?;
        for row in &table.rows {
            writer.write_record(row).map_err(write_error)?;
        }
        writer
            .into_inner()
            .map_err(|e| IsaError::SerializationError(format!("tab dialect: {}", e.error())))
    }
}
