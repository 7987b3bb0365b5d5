//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::manifest::{Manifest, read_input};
use isagraph_core::{
    FileContext, FileRole, FormatSetInstance, Grammar, IsaError, MappingConfig, MappingSession,
    MappingSummary, Severity, TabDialect, ValidationReport, graph_to_bytes,
};
use std::io::Write;
use std::path::{Path, PathBuf};

// =============================================================================
// INPUTS
// =============================================================================

/// Everything a command reads before touching the transform.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub grammar: Grammar,
    pub manifest: Manifest,
    pub config: MappingConfig,
    /// Directory manifest file paths resolve against.
    pub base: PathBuf,
}

impl Inputs {
    /// Load grammar, manifest and optional configuration from disk.
    pub fn load(
        grammar_path: &Path,
        manifest_path: &Path,
        config_path: Option<&Path>,
    ) -> Result<Self, IsaError> {
        let grammar_text = read_input(grammar_path)?;
        let grammar = match grammar_path.extension().and_then(|e| e.to_str()) {
            Some("json") => Grammar::from_json_str(&grammar_text)?,
            _ => Grammar::from_toml_str(&grammar_text)?,
        };

        let manifest = Manifest::from_toml_str(&read_input(manifest_path)?)?;
        let config = match config_path {
            Some(path) => MappingConfig::from_toml_str(&read_input(path)?)?,
            None => MappingConfig::default(),
        };
        let base = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        tracing::debug!(
            formats = grammar.formats().len(),
            files = manifest.files.len(),
            strict = config.strict,
            "inputs loaded"
        );
        Ok(Self {
            grammar,
            manifest,
            config,
            base,
        })
    }

    /// Tokenize every file the manifest lists.
    pub fn submission(&self) -> Result<FormatSetInstance, IsaError> {
        self.manifest.load_submission(&self.grammar, &self.base)
    }

    pub fn session(&self) -> Result<MappingSession<'_>, IsaError> {
        MappingSession::new(&self.grammar, self.manifest.study(), self.config.clone())
    }

    /// Map the whole submission in a fresh session.
    pub fn map(&self, consolidate: bool) -> Result<(MappingSession<'_>, MappingSummary), IsaError> {
        let submission = self.submission()?;
        let mut session = self.session()?;
        let summary = session.map_format_set(&submission)?;
        if consolidate {
            session.consolidate()?;
        }
        Ok((session, summary))
    }

    /// The export context of a manifest file.
    pub fn context(&self, file_id: &str) -> Result<FileContext, IsaError> {
        let entry = self
            .manifest
            .file(file_id)
            .ok_or_else(|| IsaError::Config(format!("manifest lists no file '{}'", file_id)))?;
        let format = self.grammar.format(&entry.format).ok_or_else(|| {
            IsaError::Config(format!("file '{}' names unknown format '{}'", file_id, entry.format))
        })?;
        Ok(match format.role {
            FileRole::Sample => FileContext::Sample(file_id.to_string()),
            FileRole::Assay => FileContext::Assay(file_id.to_string()),
        })
    }
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Validate every table. Fails when the report holds errors.
pub fn cmd_validate(inputs: &Inputs, json_mode: bool) -> Result<(), IsaError> {
    let submission = inputs.submission()?;
    let report = inputs.session()?.validate_format_set(&submission)?;
    print_report(&report, json_mode)?;

    match report.first_error() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

// =============================================================================
// MAP COMMAND
// =============================================================================

/// Map the submission and print a summary.
pub fn cmd_map(
    inputs: &Inputs,
    json_mode: bool,
    consolidate: bool,
    snapshot: Option<&Path>,
) -> Result<(), IsaError> {
    let (session, summary) = inputs.map(consolidate)?;
    let graph = session.graph();

    if let Some(path) = snapshot {
        let target = validate_output_path(path)?;
        let data = graph_to_bytes(graph)?;
        std::fs::write(&target, &data)
            .map_err(|e| IsaError::IoError(format!("write snapshot: {}", e)))?;
        tracing::info!(path = %target.display(), bytes = data.len(), "snapshot written");
    }

    if json_mode {
        let output = serde_json::json!({
            "summary": summary,
            "node_count": graph.node_count(),
            "processing_count": graph.processing_count(),
            "term_count": graph.term_count(),
            "report": session.report(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    print_report(session.report(), false)?;
    println!("isagraph Mapping Summary");
    println!("========================");
    println!(
        "Sections:     {} ({} failed)",
        summary.sections, summary.failed_sections
    );
    println!("Rows:         {} ({} failed)", summary.rows, summary.failed_rows);
    println!("Nodes:        {}", graph.node_count());
    println!("Processings:  {}", graph.processing_count());
    println!("Terms:        {}", graph.term_count());

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Map the submission and render one file.
pub fn cmd_export(
    inputs: &Inputs,
    file_id: &str,
    output: Option<&Path>,
    no_pooling: bool,
) -> Result<(), IsaError> {
    let context = inputs.context(file_id)?;
    let (session, _) = inputs.map(true)?;

    let dialect = if no_pooling {
        TabDialect::new().without_pooling()
    } else {
        TabDialect::new()
    };
    let data = session.export_file(&context, &dialect)?;

    match output {
        Some(path) => {
            let target = validate_output_path(path)?;
            std::fs::write(&target, &data)
                .map_err(|e| IsaError::IoError(format!("write export: {}", e)))?;
            eprintln!("Exported {} bytes to {:?}", data.len(), target);
        }
        None => std::io::stdout()
            .write_all(&data)
            .map_err(|e| IsaError::IoError(format!("write stdout: {}", e)))?,
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Print the structural report, one violation per line.
fn print_report(report: &ValidationReport, json_mode: bool) -> Result<(), IsaError> {
    if json_mode {
        let text = serde_json::to_string_pretty(report)
            .map_err(|e| IsaError::SerializationError(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }
    for violation in report.violations() {
        let tag = match violation.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("{}: {}: {}", tag, violation.location, violation.message);
    }
    if report.is_empty() {
        println!("No violations.");
    }
    Ok(())
}

/// Resolve an output path against a canonical, existing parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, IsaError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        IsaError::IoError(format!(
            "invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(IsaError::IoError(format!(
            "output directory '{}' is not a directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| IsaError::IoError("output path has no file name".to_string()))?;
    Ok(canonical_parent.join(filename))
}
