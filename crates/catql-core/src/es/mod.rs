//! Expanded query tree → search engine query DSL.
//!
//! The expanded tree is first regrouped into an [`EsQueryTree`] (conditions
//! sharing a nested field gathered under one `nested` node, selected facets
//! split off into a post filter), which then emits JSON.

mod boost;
mod compile;
pub mod dsl;
mod freetext;
mod leaf;

pub use compile::{EsNode, EsQueryTree};
pub use freetext::is_simple_query;
