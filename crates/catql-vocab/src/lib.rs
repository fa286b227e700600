//! Catql collaborators
//!
//! Read-only views of the two external descriptions the query pipeline
//! consults:
//! - the vocabulary (classes, properties, enums, aliases) via [`Vocabulary`]
//! - the search index field mappings via [`FieldMappings`]
//!
//! Both are loaded once from JSON snapshots and shared immutably.

pub mod aliases;
pub mod error;
pub mod mappings;
pub mod model;
pub mod vocab;

pub use aliases::{AliasTable, Mapping};
pub use error::LoadError;
pub use mappings::{EsMappings, FieldMappings};
pub use model::{
    ClassDef, EnumDef, Labels, PropertyDef, PropertyKind, PropertyType, Restriction, VocabSnapshot,
};
pub use vocab::{is_iri, JsonVocab, Vocabulary};
