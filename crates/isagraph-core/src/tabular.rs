//! # Tabular Instance
//!
//! Parsed raw data of one submission: format-set-instance -> format-instance
//! -> section-instance -> record.
//!
//! A section instance owns its fields (each bound to a zero-based column and,
//! when recognized, to a grammar field) and its records. Instances are built
//! once from already-tokenized rows and are read-only afterwards.

use crate::grammar::{FieldRole, FileRole, FormatDef, SectionDef, normalize_id};
use crate::primitives::{MAX_CELL_LENGTH, MAX_SECTION_COLUMNS};
use crate::{IsaError, Location};

// =============================================================================
// HEADER
// =============================================================================

/// A column header split into its name and optional bracketed qualifier.
///
/// `Characteristics [organism]` -> name `Characteristics`, qualifier `organism`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// The header exactly as it appeared.
    pub raw: String,
    /// Name part, trimmed.
    pub name: String,
    /// Bracketed qualifier, trimmed.
    pub qualifier: Option<String>,
}

impl Header {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(open), true) = (trimmed.find('['), trimmed.ends_with(']')) {
            let name = trimmed[..open].trim().to_string();
            let qualifier = trimmed[open + 1..trimmed.len() - 1].trim().to_string();
            return Self {
                raw: raw.to_string(),
                name,
                qualifier: Some(qualifier),
            };
        }
        Self {
            raw: raw.to_string(),
            name: trimmed.to_string(),
            qualifier: None,
        }
    }

    /// Normalized name used to match grammar fields.
    #[must_use]
    pub fn key(&self) -> String {
        normalize_id(&self.name)
    }
}

// =============================================================================
// FIELD & RECORD
// =============================================================================

/// One column of a section instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInstance {
    pub header: Header,
    /// Zero-based column index.
    pub column: usize,
    /// Role of the grammar field this column matched, if any.
    pub role: Option<FieldRole>,
    /// Normalized identifier of the matched grammar field.
    pub field_key: Option<String>,
}

impl FieldInstance {
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        self.role.is_some()
    }
}

/// One row: a positional array of cell values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    cells: Vec<String>,
}

impl Record {
    /// Cell at a column; missing trailing cells read as empty.
    #[must_use]
    pub fn get(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

// =============================================================================
// SECTION INSTANCE
// =============================================================================

/// A parsed section: ordered fields and ordered records.
#[derive(Debug, Clone)]
pub struct SectionInstance {
    pub section_id: String,
    fields: Vec<FieldInstance>,
    records: Vec<Record>,
}

impl SectionInstance {
    /// Bind headers to the grammar section and load the records.
    ///
    /// Rows shorter than the header are padded; extra trailing cells must be
    /// empty.
    pub fn from_rows<S: AsRef<str>>(
        file_id: &str,
        section: &SectionDef,
        headers: &[S],
        rows: Vec<Vec<String>>,
    ) -> Result<Self, IsaError> {
        let location = || Location::section(file_id, &section.id);

        if headers.len() > MAX_SECTION_COLUMNS {
            return Err(IsaError::structural(
                location(),
                format!(
                    "{} columns exceed the limit of {}",
                    headers.len(),
                    MAX_SECTION_COLUMNS
                ),
            ));
        }

        let fields = headers
            .iter()
            .enumerate()
            .map(|(column, raw)| {
                let header = Header::parse(raw.as_ref());
                let def = section.field(&header.name);
                FieldInstance {
                    column,
                    role: def.map(|d| d.role),
                    field_key: def.map(|d| d.key.clone()),
                    header,
                }
            })
            .collect::<Vec<_>>();

        let width = fields.len();
        let mut records = Vec::with_capacity(rows.len());
        for (row, mut cells) in rows.into_iter().enumerate() {
            if let Some(extra) = cells.iter().skip(width).position(|c| !c.trim().is_empty()) {
                return Err(IsaError::structural(
                    location().with_row(row),
                    format!("value in column {} has no header", width + extra),
                ));
            }
            if let Some(column) = cells.iter().position(|c| c.len() > MAX_CELL_LENGTH) {
                return Err(IsaError::structural(
                    location().with_row(row).with_field(
                        fields
                            .get(column)
                            .map(|f| f.header.raw.clone())
                            .unwrap_or_default(),
                        column,
                    ),
                    "cell value exceeds the maximum length",
                ));
            }
            cells.truncate(width);
            cells.resize(width, String::new());
            records.push(Record { cells });
        }

        Ok(Self {
            section_id: section.id.clone(),
            fields,
            records,
        })
    }

    pub fn fields(&self) -> &[FieldInstance] {
        &self.fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn field(&self, column: usize) -> Option<&FieldInstance> {
        self.fields.get(column)
    }

    /// First field whose header name matches (normalized).
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&FieldInstance> {
        let key = normalize_id(name);
        self.fields.iter().find(|f| f.header.key() == key)
    }

    /// Value at (row, column).
    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.records.get(row).map(|r| r.get(column))
    }

    /// Value of the first column with the given header name.
    #[must_use]
    pub fn value_by_name(&self, row: usize, name: &str) -> Option<&str> {
        let column = self.field_by_name(name)?.column;
        self.value(row, column)
    }

    /// Columns that matched no grammar field.
    pub fn unrecognized(&self) -> impl Iterator<Item = &FieldInstance> {
        self.fields.iter().filter(|f| !f.is_recognized())
    }

    /// Recognized node and protocol columns, in layout order.
    pub fn mapper_fields(&self) -> impl Iterator<Item = &FieldInstance> {
        self.fields
            .iter()
            .filter(|f| f.role.is_some_and(|r| r.is_mapper()))
    }
}

// =============================================================================
// FORMAT & FORMAT-SET INSTANCES
// =============================================================================

/// One parsed file.
#[derive(Debug, Clone)]
pub struct FormatInstance {
    pub format_id: String,
    /// File-local identifier used inside accessions.
    pub file_id: String,
    pub role: FileRole,
    sections: Vec<SectionInstance>,
}

impl FormatInstance {
    #[must_use]
    pub fn new(format: &FormatDef, file_id: impl Into<String>) -> Self {
        Self {
            format_id: format.id.clone(),
            file_id: file_id.into(),
            role: format.role,
            sections: Vec::new(),
        }
    }

    /// Append a parsed section (parsing stage only).
    pub fn push_section(&mut self, section: SectionInstance) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[SectionInstance] {
        &self.sections
    }

    #[must_use]
    pub fn section(&self, id: &str) -> Option<&SectionInstance> {
        self.sections.iter().find(|s| s.section_id == id)
    }
}

/// All parsed files of one submission.
#[derive(Debug, Clone, Default)]
pub struct FormatSetInstance {
    formats: Vec<FormatInstance>,
}

impl FormatSetInstance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_format(&mut self, format: FormatInstance) {
        self.formats.push(format);
    }

    pub fn formats(&self) -> &[FormatInstance] {
        &self.formats
    }

    /// Sample files first, then assay files, each in insertion order.
    ///
    /// This is the order in which a submission must be mapped so assay rows
    /// can resolve the samples their sample file declared.
    pub fn in_mapping_order(&self) -> impl Iterator<Item = &FormatInstance> {
        self.formats
            .iter()
            .filter(|f| f.role == FileRole::Sample)
            .chain(self.formats.iter().filter(|f| f.role == FileRole::Assay))
    }
}

// =============================================================================
// TESTS
// =============================================================================
