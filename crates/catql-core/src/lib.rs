//! Catql query trees
//!
//! Everything between the flattened parse and the engine request:
//! - `builder`: `FlatNode` → `QueryTree` (keys, properties and values resolved
//!   against the vocabulary)
//! - `expand`: `QueryTree` → `ExpandedQueryTree` (what the index can answer)
//! - `es`: `ExpandedQueryTree` → engine query DSL with post filter
//! - `presentation`: search mappings with up links for the UI
//!
//! All stages are pure functions of the tree and a shared, immutable
//! [`QueryContext`].

pub mod builder;
pub mod context;
pub mod error;
pub mod es;
pub mod expand;
pub mod facets;
pub mod filter;
pub mod node;
pub mod presentation;
pub mod selector;
pub mod settings;
pub mod tree;
pub mod util;
pub mod value;

pub use builder::QueryTreeBuilder;
pub use context::QueryContext;
pub use error::{InvalidQuery, QueryError};
pub use es::{EsNode, EsQueryTree};
pub use expand::{expand, ExpandedQueryTree};
pub use facets::{SelectedFacets, Selection};
pub use filter::{FilterAlias, FilterRegistry};
pub use node::{AnyKind, Condition, FreeText, Node, NodePath};
pub use presentation::{LinkParams, SearchMapping};
pub use selector::{Key, KeyState, Property, Selector};
pub use settings::Settings;
pub use tree::{QueryTree, ReducedQueryTree};
pub use value::{QueryDate, Value};
