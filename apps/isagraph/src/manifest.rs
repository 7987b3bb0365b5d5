//! # Submission Manifest
//!
//! A TOML file naming the study context and the table files of one
//! submission:
//!
//! ```toml
//! [study]
//! accession = "S-1"
//! term_sources = ["OBI", "NCBITaxon"]
//!
//! [[study.protocols]]
//! name = "sample collection"
//! parameters = ["method"]
//!
//! [[files]]
//! path = "s_main.txt"
//! format = "study_samples"
//! ```
//!
//! File paths are relative to the manifest's directory.

use crate::tabfile;
use isagraph_core::{FormatInstance, FormatSetInstance, Grammar, IsaError, Protocol, Study};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Maximum size of any input file (64 MB).
pub const MAX_INPUT_FILE_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub study: StudyEntry,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyEntry {
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub term_sources: Vec<String>,
    #[serde(default)]
    pub protocols: Vec<ProtocolEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub protocol_type: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Grammar format the file follows.
    pub format: String,
    /// File identifier; defaults to the file stem.
    #[serde(default)]
    pub id: Option<String>,
    /// Grammar section the table fills; defaults to the format's first.
    #[serde(default)]
    pub section: Option<String>,
}

impl FileEntry {
    pub fn file_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

impl Manifest {
    pub fn from_toml_str(text: &str) -> Result<Self, IsaError> {
        let manifest: Manifest =
            toml::from_str(text).map_err(|e| IsaError::Config(format!("manifest: {}", e)))?;

        let mut seen = std::collections::BTreeSet::new();
        for file in &manifest.files {
            let id = file.file_id();
            if id.is_empty() {
                return Err(IsaError::Config(format!(
                    "manifest file '{}' has no usable id",
                    file.path.display()
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(IsaError::Config(format!("duplicate file id '{}'", id)));
            }
        }
        Ok(manifest)
    }

    /// The study context the mapping runs against.
    pub fn study(&self) -> Study {
        let mut study = match &self.study.accession {
            Some(accession) => Study::new(accession.clone()),
            None => Study::anonymous(),
        };
        for source in &self.study.term_sources {
            study.declare_term_source(source.clone());
        }
        for entry in &self.study.protocols {
            let mut protocol = Protocol::new(entry.name.clone())
                .with_parameters(entry.parameters.iter().cloned());
            if let Some(protocol_type) = &entry.protocol_type {
                protocol = protocol.with_type(protocol_type.clone());
            }
            study.declare_protocol(protocol);
        }
        study
    }

    pub fn file(&self, id: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.file_id() == id)
    }

    /// Read and tokenize every listed file.
    ///
    /// `base` is the directory relative paths resolve against.
    pub fn load_submission(
        &self,
        grammar: &Grammar,
        base: &Path,
    ) -> Result<FormatSetInstance, IsaError> {
        let mut set = FormatSetInstance::new();
        for entry in &self.files {
            let file_id = entry.file_id();
            let format_def = grammar.format(&entry.format).ok_or_else(|| {
                IsaError::Config(format!(
                    "file '{}' names unknown format '{}'",
                    file_id, entry.format
                ))
            })?;
            let section_def = match &entry.section {
                Some(id) => format_def.section(id),
                None => format_def.sections.first(),
            }
            .ok_or_else(|| {
                IsaError::Config(format!(
                    "format '{}' has no section for file '{}'",
                    entry.format, file_id
                ))
            })?;

            let text = read_input(&base.join(&entry.path))?;
            let section = tabfile::parse_section(&file_id, section_def, &text)?;
            tracing::debug!(
                file = %file_id,
                format = %entry.format,
                rows = section.records().len(),
                "loaded table"
            );

            let mut format = FormatInstance::new(format_def, file_id);
            format.push_section(section);
            set.push_format(format);
        }
        Ok(set)
    }
}

/// Read a UTF-8 input file after checking its size.
pub fn read_input(path: &Path) -> Result<String, IsaError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| IsaError::IoError(format!("cannot read '{}': {}", path.display(), e)))?;
    if !metadata.is_file() {
        return Err(IsaError::IoError(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(IsaError::IoError(format!(
            "'{}' is {} bytes, above the limit of {}",
            path.display(),
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| IsaError::IoError(format!("cannot read '{}': {}", path.display(), e)))
}
