//! Vocabulary snapshot types.
//!
//! The snapshot is a JSON document produced by whatever process owns the
//! ontology; this crate only reads it. Shape:
//!
//! ```json
//! {
//!   "base": "https://id.kb.se/vocab/",
//!   "namespaces": { "kbv": "https://id.kb.se/vocab/" },
//!   "classes": { "Print": { "subClassOf": ["Instance"], "labelByLang": { "en": "Print" } } },
//!   "properties": { "title": { "type": "DatatypeProperty", "domain": ["Work"] } },
//!   "enums": { "eng": { "type": "Language", "code": "eng" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RDF_TYPE: &str = "rdf:type";
pub const TYPE_KEY: &str = "@type";
pub const ID_KEY: &str = "@id";
pub const REVERSE_KEY: &str = "@reverse";
pub const SEARCH_KEY: &str = "_str";

pub const XSD_DATE: &str = "xsd:date";
pub const XSD_DATE_TIME: &str = "xsd:dateTime";
pub const XSD_BOOLEAN: &str = "xsd:boolean";

/// Category marking a property as a default traversal hop between entity types.
pub const INTEGRAL_CATEGORY: &str = "integral";

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabSnapshot {
    /// IRI prefix for vocabulary terms (`title` → `<base>title`).
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: BTreeMap<String, ClassDef>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDef>,
    #[serde(default)]
    pub enums: BTreeMap<String, EnumDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub label_by_lang: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alt_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Labels {
    /// Every string a user might type to mean this term.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.label
            .iter()
            .chain(self.label_by_lang.values())
            .chain(self.alt_labels.iter())
            .chain(self.code.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDef {
    #[serde(default)]
    pub sub_class_of: Vec<String>,
    #[serde(flatten)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDef {
    #[serde(rename = "type")]
    pub enum_type: String,
    #[serde(flatten)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    ObjectProperty,
    #[default]
    DatatypeProperty,
}

/// Has-value restriction attached to a narrowed sub-property.
///
/// `onProperty` is a dotted path relative to the restricted property's base,
/// e.g. `isbn` narrows `identifiedBy` with `{ onProperty: "rdf:type", hasValue: "ISBN" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    pub on_property: String,
    pub has_value: String,
}

impl Restriction {
    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.on_property.split('.')
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    /// Filled in from the snapshot map key on load.
    #[serde(default, skip_serializing)]
    pub key: String,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub domain: Vec<String>,
    #[serde(default)]
    pub range: Vec<String>,
    #[serde(default)]
    pub sub_property_of: Vec<String>,
    /// Alternative chains this shorthand stands for; each chain is a list of
    /// property keys traversed in order.
    #[serde(default)]
    pub property_chain_axiom: Vec<Vec<String>>,
    #[serde(default)]
    pub composite_of: Vec<String>,
    #[serde(default)]
    pub inverse_of: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    /// Whether a narrowed property has its own field in the search index.
    #[serde(default)]
    pub has_index_key: bool,
    #[serde(default)]
    pub query_code: Option<String>,
    #[serde(flatten)]
    pub labels: Labels,
    #[serde(skip)]
    pub kind: PropertyKind,
    /// Values are controlled-vocabulary terms (enums) rather than free strings.
    #[serde(skip)]
    pub vocab_term: bool,
}

/// How a property behaves during expansion; resolved once on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PropertyKind {
    #[default]
    Plain,
    RdfType,
    ShortHand {
        chains: Vec<Vec<String>>,
    },
    Composite {
        components: Vec<String>,
    },
    Restricted {
        base: String,
        restrictions: Vec<Restriction>,
        indexed: bool,
    },
}

impl PropertyDef {
    pub fn resolve_kind(&self) -> PropertyKind {
        if self.key == RDF_TYPE {
            PropertyKind::RdfType
        } else if !self.property_chain_axiom.is_empty() {
            PropertyKind::ShortHand {
                chains: self.property_chain_axiom.clone(),
            }
        } else if !self.composite_of.is_empty() {
            PropertyKind::Composite {
                components: self.composite_of.clone(),
            }
        } else if let (Some(base), false) = (self.sub_property_of.first(), self.restrictions.is_empty()) {
            PropertyKind::Restricted {
                base: base.clone(),
                restrictions: self.restrictions.clone(),
                indexed: self.has_index_key,
            }
        } else {
            PropertyKind::Plain
        }
    }

    pub fn is_object_property(&self) -> bool {
        self.property_type == PropertyType::ObjectProperty
    }

    pub fn is_type(&self) -> bool {
        self.kind == PropertyKind::RdfType
    }

    pub fn is_date(&self) -> bool {
        self.range.iter().any(|r| r == XSD_DATE || r == XSD_DATE_TIME)
    }

    pub fn is_boolean(&self) -> bool {
        self.range.iter().any(|r| r == XSD_BOOLEAN)
    }

    pub fn has_vocab_value(&self) -> bool {
        self.vocab_term || self.is_type()
    }

    pub fn is_integral(&self) -> bool {
        self.category.iter().any(|c| c == INTEGRAL_CATEGORY)
    }

    /// The key users see in re-serialized queries.
    pub fn canonical_key(&self) -> &str {
        self.query_code.as_deref().unwrap_or(&self.key)
    }
}
