//! # Field-Type Registry
//!
//! Maps the type string a grammar field declares onto one closed variant.
//! Every mapping decision downstream dispatches on these variants.

use crate::types::NodeKind;
use serde::{Deserialize, Serialize};

// =============================================================================
// NODE TYPES
// =============================================================================

/// Every vertex type a node column can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Source,
    Sample,
    Extract,
    LabeledExtract,
    HybridizationAssay,
    Assay,
    Scan,
    Normalization,
    DataTransformation,
    RawData,
    DerivedData,
    ArrayData,
    ArrayDataMatrix,
    DerivedArrayData,
    RawSpectralData,
    DerivedSpectralData,
    Image,
    MetaboliteAssignment,
}

/// Every node type, in declaration order.
pub const NODE_TYPES: &[NodeType] = &[
    NodeType::Source,
    NodeType::Sample,
    NodeType::Extract,
    NodeType::LabeledExtract,
    NodeType::HybridizationAssay,
    NodeType::Assay,
    NodeType::Scan,
    NodeType::Normalization,
    NodeType::DataTransformation,
    NodeType::RawData,
    NodeType::DerivedData,
    NodeType::ArrayData,
    NodeType::ArrayDataMatrix,
    NodeType::DerivedArrayData,
    NodeType::RawSpectralData,
    NodeType::DerivedSpectralData,
    NodeType::Image,
    NodeType::MetaboliteAssignment,
];

impl NodeType {
    /// (type string, accession tag, header, kind)
    fn entry(&self) -> (&'static str, &'static str, &'static str, NodeKind) {
        use NodeKind::{Data, Material};
        match self {
            Self::Source => ("source", "src", "Source Name", Material),
            Self::Sample => ("sample", "smp", "Sample Name", Material),
            Self::Extract => ("extract", "ext", "Extract Name", Material),
            Self::LabeledExtract => ("labeled_extract", "lbx", "Labeled Extract Name", Material),
            Self::HybridizationAssay => (
                "hybridization_assay",
                "hyb",
                "Hybridization Assay Name",
                Material,
            ),
            Self::Assay => ("assay", "asy", "Assay Name", Material),
            Self::Scan => ("scan", "scn", "Scan Name", Data),
            Self::Normalization => ("normalization", "nrm", "Normalization Name", Data),
            Self::DataTransformation => (
                "data_transformation",
                "dtx",
                "Data Transformation Name",
                Data,
            ),
            Self::RawData => ("raw_data", "raw", "Raw Data File", Data),
            Self::DerivedData => ("derived_data", "drv", "Derived Data File", Data),
            Self::ArrayData => ("array_data", "arr", "Array Data File", Data),
            Self::ArrayDataMatrix => ("array_data_matrix", "adm", "Array Data Matrix File", Data),
            Self::DerivedArrayData => (
                "derived_array_data",
                "dad",
                "Derived Array Data File",
                Data,
            ),
            Self::RawSpectralData => ("raw_spectral_data", "rsd", "Raw Spectral Data File", Data),
            Self::DerivedSpectralData => (
                "derived_spectral_data",
                "dsd",
                "Derived Spectral Data File",
                Data,
            ),
            Self::Image => ("image", "img", "Image File", Data),
            Self::MetaboliteAssignment => (
                "metabolite_assignment",
                "mas",
                "Metabolite Assignment File",
                Data,
            ),
        }
    }

    /// Look up a node type by its declared type string.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        NODE_TYPES
            .iter()
            .find(|t| t.type_name() == name)
            .copied()
    }

    /// The declared type string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.entry().0
    }

    /// Short tag used inside accession keys.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.entry().1
    }

    /// Column header this type renders under.
    #[must_use]
    pub fn header(&self) -> &'static str {
        self.entry().2
    }

    /// Material or Data.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.entry().3
    }
}

// =============================================================================
// PROPERTY & QUALIFIER ROLES
// =============================================================================

/// Which mapper may own a property column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Node,
    Protocol,
    Any,
}

/// Property columns attached to a node or protocol column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyRole {
    MaterialType,
    Label,
    Provider,
    Description,
    Characteristic,
    FactorValue,
    ParameterValue,
    Performer,
    Date,
    Comment,
    /// A grammar field that declares no type: free text kept under its header.
    Annotation,
}

impl PropertyRole {
    fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "material_type" => Self::MaterialType,
            "label" => Self::Label,
            "provider" => Self::Provider,
            "description" => Self::Description,
            "characteristic" => Self::Characteristic,
            "factor_value" => Self::FactorValue,
            "parameter_value" => Self::ParameterValue,
            "performer" => Self::Performer,
            "date" => Self::Date,
            "comment" => Self::Comment,
            _ => return None,
        })
    }

    /// Header family the property renders under.
    ///
    /// Qualified roles render as `Family[label]`; annotations render under
    /// their own label.
    #[must_use]
    pub fn header_family(&self) -> &'static str {
        match self {
            Self::MaterialType => "Material Type",
            Self::Label => "Label",
            Self::Provider => "Provider",
            Self::Description => "Description",
            Self::Characteristic => "Characteristics",
            Self::FactorValue => "Factor Value",
            Self::ParameterValue => "Parameter Value",
            Self::Performer => "Performer",
            Self::Date => "Date",
            Self::Comment => "Comment",
            Self::Annotation => "",
        }
    }

    /// Whether the header carries a bracketed qualifier.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        matches!(
            self,
            Self::Characteristic | Self::FactorValue | Self::ParameterValue | Self::Comment
        )
    }

    /// Which mapper may own this property.
    #[must_use]
    pub fn owner(&self) -> Owner {
        match self {
            Self::ParameterValue | Self::Performer | Self::Date => Owner::Protocol,
            Self::Comment => Owner::Any,
            _ => Owner::Node,
        }
    }

    /// Export position of the role within its owner's groups.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::MaterialType => 0,
            Self::Label => 1,
            Self::Provider => 2,
            Self::Description => 3,
            Self::Characteristic => 4,
            Self::FactorValue => 5,
            Self::ParameterValue => 6,
            Self::Performer => 7,
            Self::Date => 8,
            Self::Comment => 9,
            Self::Annotation => 10,
        }
    }
}

/// Columns that qualify the property column before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualifierRole {
    Unit,
    TermSource,
    TermAccession,
}

// =============================================================================
// FIELD ROLE
// =============================================================================

/// What a recognized column does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    /// Starts a pipeline vertex.
    Node(NodeType),
    /// Starts a protocol application.
    Protocol,
    /// Describes the node or protocol column before it.
    Property(PropertyRole),
    /// Qualifies the property column before it.
    Qualifier(QualifierRole),
}

impl FieldRole {
    /// Resolve a declared type string. `None` declares a free-text annotation.
    ///
    /// Returns `None` for an unknown type string.
    #[must_use]
    pub fn from_declared(declared: Option<&str>) -> Option<Self> {
        let Some(name) = declared else {
            return Some(Self::Property(PropertyRole::Annotation));
        };
        if let Some(node) = NodeType::from_type_name(name) {
            return Some(Self::Node(node));
        }
        if let Some(property) = PropertyRole::from_type_name(name) {
            return Some(Self::Property(property));
        }
        match name {
            "protocol_ref" => Some(Self::Protocol),
            "unit" => Some(Self::Qualifier(QualifierRole::Unit)),
            "term_source_ref" => Some(Self::Qualifier(QualifierRole::TermSource)),
            "term_accession" => Some(Self::Qualifier(QualifierRole::TermAccession)),
            _ => None,
        }
    }

    /// Node and protocol fields start a mapper; the rest attach to one.
    #[must_use]
    pub fn is_mapper(&self) -> bool {
        matches!(self, Self::Node(_) | Self::Protocol)
    }
}

// =============================================================================
// TESTS
// =============================================================================
