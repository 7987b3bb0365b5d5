//! # Schema Grammar
//!
//! Declarative, read-only description of the file formats a submission may
//! contain: format-set -> format -> section -> field, plus per-field
//! cardinality and ordering constraints.
//!
//! The grammar is loaded once (TOML or JSON), validated, and then shared by
//! reference with every parse, validation and mapping pass. Nothing in this
//! crate mutates a loaded `Grammar`.

mod registry;

pub use registry::{FieldRole, NODE_TYPES, NodeType, Owner, PropertyRole, QualifierRole};

use crate::primitives::NOTHING_SENTINEL;
use crate::IsaError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DEFINITION (serde-friendly input)
// =============================================================================

/// Raw grammar definition as written by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrammarDefinition {
    #[serde(default)]
    pub formats: Vec<FormatDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDefinition {
    pub id: String,
    pub role: FileRole,
    #[serde(default)]
    pub sections: Vec<SectionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub id: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintDefinition {
    Cardinality {
        #[serde(default)]
        min: usize,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default)]
        level: Level,
    },
    Follows {
        target: String,
        #[serde(default)]
        level: Level,
    },
    Precedes {
        target: String,
        #[serde(default)]
        level: Level,
    },
}

// =============================================================================
// VALIDATED GRAMMAR
// =============================================================================

/// Which side of a study a file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// The study-level sample file (sources -> samples).
    Sample,
    /// An assay file (samples -> extracts -> data).
    Assay,
}

/// Whether a constraint violation is an error or a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Mandatory,
    Advisory,
}

/// The other end of an ordering constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTarget {
    /// The sentinel: must be first (follows) or last (precedes).
    Nothing,
    /// A normalized field identifier of the same section.
    Field(String),
}

/// A validated constraint on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    Cardinality {
        min: usize,
        max: Option<usize>,
        level: Level,
    },
    Follows {
        target: OrderTarget,
        level: Level,
    },
    Precedes {
        target: OrderTarget,
        level: Level,
    },
}

impl Constraint {
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::Cardinality { level, .. }
            | Self::Follows { level, .. }
            | Self::Precedes { level, .. } => *level,
        }
    }
}

/// A validated field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    /// Identifier as written in the grammar.
    pub id: String,
    /// Normalized identifier used for matching headers.
    pub key: String,
    /// Declared value-type string.
    pub value_type: Option<String>,
    /// Resolved role.
    pub role: FieldRole,
    pub constraints: Vec<Constraint>,
}

/// A validated section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub id: String,
    fields: Vec<FieldDef>,
    by_key: BTreeMap<String, usize>,
}

impl SectionDef {
    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by identifier (normalized before matching).
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldDef> {
        self.by_key.get(&normalize_id(id)).map(|&i| &self.fields[i])
    }
}

/// A validated format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDef {
    pub id: String,
    pub role: FileRole,
    pub sections: Vec<SectionDef>,
}

impl FormatDef {
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&SectionDef> {
        self.sections.iter().find(|s| s.id == id)
    }
}

/// The loaded, validated format-set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grammar {
    formats: Vec<FormatDef>,
}

impl Grammar {
    /// Parse and validate a TOML grammar definition.
    pub fn from_toml_str(text: &str) -> Result<Self, IsaError> {
        let definition: GrammarDefinition =
            toml::from_str(text).map_err(|e| IsaError::Grammar(e.to_string()))?;
        Self::from_definition(definition)
    }

    /// Parse and validate a JSON grammar definition.
    pub fn from_json_str(text: &str) -> Result<Self, IsaError> {
        let definition: GrammarDefinition =
            serde_json::from_str(text).map_err(|e| IsaError::Grammar(e.to_string()))?;
        Self::from_definition(definition)
    }

    /// Validate a definition and resolve every declared type.
    pub fn from_definition(definition: GrammarDefinition) -> Result<Self, IsaError> {
        let mut format_ids = BTreeSet::new();
        let mut formats = Vec::with_capacity(definition.formats.len());

        for format in definition.formats {
            if !format_ids.insert(format.id.clone()) {
                return Err(IsaError::Grammar(format!(
                    "duplicate format id '{}'",
                    format.id
                )));
            }

            let mut section_ids = BTreeSet::new();
            let mut sections = Vec::with_capacity(format.sections.len());
            for section in format.sections {
                if !section_ids.insert(section.id.clone()) {
                    return Err(IsaError::Grammar(format!(
                        "duplicate section id '{}' in format '{}'",
                        section.id, format.id
                    )));
                }
                sections.push(build_section(&format.id, section)?);
            }

            formats.push(FormatDef {
                id: format.id,
                role: format.role,
                sections,
            });
        }

        Ok(Self { formats })
    }

    /// All formats in declaration order.
    pub fn formats(&self) -> &[FormatDef] {
        &self.formats
    }

    #[must_use]
    pub fn format(&self, id: &str) -> Option<&FormatDef> {
        self.formats.iter().find(|f| f.id == id)
    }
}

fn build_section(format_id: &str, section: SectionDefinition) -> Result<SectionDef, IsaError> {
    let context = format!("{}/{}", format_id, section.id);

    let mut by_key = BTreeMap::new();
    for (i, field) in section.fields.iter().enumerate() {
        if by_key.insert(normalize_id(&field.id), i).is_some() {
            return Err(IsaError::Grammar(format!(
                "duplicate field '{}' in {}",
                field.id, context
            )));
        }
    }

    let resolve_target = |target: &str| -> Result<OrderTarget, IsaError> {
        if target.eq_ignore_ascii_case(NOTHING_SENTINEL) {
            return Ok(OrderTarget::Nothing);
        }
        let key = normalize_id(target);
        if by_key.contains_key(&key) {
            Ok(OrderTarget::Field(key))
        } else {
            Err(IsaError::Grammar(format!(
                "constraint in {} references unknown field '{}'",
                context, target
            )))
        }
    };

    let mut fields = Vec::with_capacity(section.fields.len());
    for field in section.fields {
        let role = FieldRole::from_declared(field.value_type.as_deref()).ok_or_else(|| {
            IsaError::Grammar(format!(
                "field '{}' in {} declares unknown type '{}'",
                field.id,
                context,
                field.value_type.as_deref().unwrap_or_default()
            ))
        })?;

        let mut constraints = Vec::with_capacity(field.constraints.len());
        for constraint in field.constraints {
            constraints.push(match constraint {
                ConstraintDefinition::Cardinality { min, max, level } => {
                    if max.is_some_and(|max| max < min) {
                        return Err(IsaError::Grammar(format!(
                            "field '{}' in {} has cardinality max below min",
                            field.id, context
                        )));
                    }
                    Constraint::Cardinality { min, max, level }
                }
                ConstraintDefinition::Follows { target, level } => Constraint::Follows {
                    target: resolve_target(&target)?,
                    level,
                },
                ConstraintDefinition::Precedes { target, level } => Constraint::Precedes {
                    target: resolve_target(&target)?,
                    level,
                },
            });
        }

        fields.push(FieldDef {
            key: normalize_id(&field.id),
            id: field.id,
            value_type: field.value_type,
            role,
            constraints,
        });
    }

    Ok(SectionDef {
        id: section.id,
        fields,
        by_key,
    })
}

/// Normalize a field identifier or header name for matching:
/// lowercase, trimmed, whitespace runs collapsed to one space.
#[must_use]
pub fn normalize_id(id: &str) -> String {
    id.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_GRAMMAR: &str = r#"
[[formats]]
id = "study_samples"
role = "sample"

[[formats.sections]]
id = "samples"

[[formats.sections.fields]]
id = "Source Name"
type = "source"

[[formats.sections.fields.constraints]]
kind = "cardinality"
min = 1
max = 1

[[formats.sections.fields.constraints]]
kind = "follows"
target = "nothing"

[[formats.sections.fields]]
id = "Characteristics"
type = "characteristic"

[[formats.sections.fields]]
id = "Protocol REF"
type = "protocol_ref"

[[formats.sections.fields]]
id = "Sample Name"
type = "sample"

[[formats.sections.fields.constraints]]
kind = "precedes"
target = "nothing"
level = "advisory"

[[formats.sections.fields]]
id = "Notes"
"#;

    #[test]
    fn loads_toml_grammar() {
        let grammar = Grammar::from_toml_str(SAMPLE_GRAMMAR).expect("load");
        let format = grammar.format("study_samples").expect("format");
        assert_eq!(format.role, FileRole::Sample);

        let section = format.section("samples").expect("section");
        assert_eq!(section.fields().len(), 5);

        let source = section.field("source   name").expect("field");
        assert_eq!(source.role, FieldRole::Node(NodeType::Source));
        assert_eq!(source.constraints.len(), 2);
        assert_eq!(
            source.constraints[1],
            Constraint::Follows {
                target: OrderTarget::Nothing,
                level: Level::Mandatory
            }
        );

        let sample = section.field("Sample Name").expect("field");
        assert_eq!(sample.constraints[0].level(), Level::Advisory);

        let notes = section.field("Notes").expect("field");
        assert_eq!(notes.role, FieldRole::Property(PropertyRole::Annotation));
    }

    #[test]
    fn loads_json_grammar() {
        let json = r#"{"formats":[{"id":"a","role":"assay","sections":[{"id":"s","fields":[
            {"id":"Sample Name","type":"sample"},
            {"id":"Raw Data File","type":"raw_data","constraints":[
                {"kind":"follows","target":"Sample Name","level":"advisory"}]}]}]}]}"#;
        let grammar = Grammar::from_json_str(json).expect("load");
        let section = grammar
            .format("a")
            .and_then(|f| f.section("s"))
            .expect("section");
        assert_eq!(
            section.field("Raw Data File").expect("field").constraints[0],
            Constraint::Follows {
                target: OrderTarget::Field("sample name".into()),
                level: Level::Advisory
            }
        );
    }

    #[test]
    fn rejects_constraint_on_unknown_field() {
        let text = r#"
[[formats]]
id = "f"
role = "assay"
[[formats.sections]]
id = "s"
[[formats.sections.fields]]
id = "Sample Name"
type = "sample"
[[formats.sections.fields.constraints]]
kind = "follows"
target = "Extract Name"
"#;
        let result = Grammar::from_toml_str(text);
        assert!(matches!(result, Err(IsaError::Grammar(_))));
    }

    #[test]
    fn rejects_unknown_type_and_duplicates() {
        let unknown = r#"{"formats":[{"id":"f","role":"assay","sections":[{"id":"s","fields":[
            {"id":"X","type":"spreadsheet"}]}]}]}"#;
        assert!(matches!(
            Grammar::from_json_str(unknown),
            Err(IsaError::Grammar(_))
        ));

        let duplicate = r#"{"formats":[{"id":"f","role":"assay","sections":[{"id":"s","fields":[
            {"id":"Sample Name","type":"sample"},{"id":"sample name","type":"sample"}]}]}]}"#;
        assert!(matches!(
            Grammar::from_json_str(duplicate),
            Err(IsaError::Grammar(_))
        ));
    }

    #[test]
    fn rejects_inverted_cardinality() {
        let text = r#"{"formats":[{"id":"f","role":"assay","sections":[{"id":"s","fields":[
            {"id":"Sample Name","type":"sample","constraints":[{"kind":"cardinality","min":3,"max":1}]}]}]}]}"#;
        assert!(matches!(
            Grammar::from_json_str(text),
            Err(IsaError::Grammar(_))
        ));
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_id("  Term   Source REF "), "term source ref");
    }
}
