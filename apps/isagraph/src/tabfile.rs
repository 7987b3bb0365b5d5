//! # Tab-Separated Tokenizer
//!
//! Reads a table file into header and record cells. Cells may be wrapped in
//! double quotes, with inner quotes doubled; quoted cells may hold tabs and
//! line breaks. Blank lines and `#` lines before the header are skipped.
//! Every line after the header is a record.

use csv::{ReaderBuilder, Trim};
use isagraph_core::grammar::SectionDef;
use isagraph_core::{IsaError, Location, SectionInstance};

/// The text from the header line on.
fn skip_preamble(text: &str) -> &str {
    let mut rest = text;
    while !rest.is_empty() {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            break;
        }
        rest = tail;
    }
    rest
}

/// Tokenize a whole file into headers and rows.
///
/// Trailing records with only empty cells are dropped; records in between
/// keep their position.
pub fn tokenize(text: &str) -> Result<(Vec<String>, Vec<Vec<String>>), csv::Error> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(skip_preamble(text).as_bytes());

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record?;
        lines.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    while lines
        .last()
        .is_some_and(|cells| cells.iter().all(String::is_empty))
    {
        lines.pop();
    }

    let mut lines = lines.into_iter();
    let headers = lines.next().unwrap_or_default();
    Ok((headers, lines.collect()))
}

/// Tokenize a file and bind it to a grammar section.
///
/// # Errors
/// Returns `IsaError::Structural` for an unreadable file or a file without a
/// header line, or whatever binding the section reports.
pub fn parse_section(
    file_id: &str,
    section: &SectionDef,
    text: &str,
) -> Result<SectionInstance, IsaError> {
    let location = || Location::section(file_id, &section.id);
    let (headers, rows) = tokenize(text)
        .map_err(|e| IsaError::structural(location(), format!("unreadable table: {}", e)))?;
    if headers.iter().all(|h| h.is_empty()) {
        return Err(IsaError::structural(location(), "file has no header line"));
    }
    SectionInstance::from_rows(file_id, section, &headers, rows)
}
