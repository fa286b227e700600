//! What a condition is about: a vocabulary property, a raw key, or a path of them.

use catql_dsl::Token;
use catql_vocab::model::{PropertyDef, REVERSE_KEY, TYPE_KEY};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum KeyState {
    /// Index-level keys (`@id`, `_str`, ...) that need no vocabulary backing.
    Recognized,
    Unrecognized { suggestions: Vec<String> },
    Ambiguous { candidates: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub token: Token,
    pub state: KeyState,
}

impl Key {
    pub fn recognized(name: impl Into<String>) -> Key {
        Key {
            token: Token::synthetic(name),
            state: KeyState::Recognized,
        }
    }

    pub fn name(&self) -> &str {
        &self.token.value
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub def: Arc<PropertyDef>,
    pub token: Token,
    /// Traversed against its direction (`@reverse.instanceOf`).
    pub reversed: bool,
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.def.key == other.def.key && self.reversed == other.reversed
    }
}

impl Property {
    pub fn new(def: Arc<PropertyDef>) -> Property {
        let token = Token::synthetic(def.key.as_str());
        Property {
            def,
            token,
            reversed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.def.key
    }

    pub fn toggle_reversed(mut self) -> Property {
        self.reversed = !self.reversed;
        self
    }

    fn query_key(&self) -> String {
        let key = match self.def.query_code.as_deref() {
            None if self.def.is_type() => TYPE_KEY,
            _ => self.def.canonical_key(),
        };
        if self.reversed {
            format!("{REVERSE_KEY}.{key}")
        } else {
            key.to_string()
        }
    }

    fn es_field(&self) -> String {
        if self.def.is_type() {
            TYPE_KEY.to_string()
        } else if self.reversed {
            format!("{REVERSE_KEY}.{}", self.def.key)
        } else {
            self.def.key.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Key(Key),
    Property(Property),
    Path(Vec<Selector>),
}

impl Selector {
    /// Build from path elements, unwrapping a single element.
    pub fn from_elements(mut elements: Vec<Selector>) -> Selector {
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            Selector::Path(elements)
        }
    }

    /// Key as written back into a query string, quoted when it would not
    /// lex as a single word.
    pub fn formatted_key(&self) -> String {
        Token::synthetic(self.query_key()).formatted()
    }

    pub fn query_key(&self) -> String {
        match self {
            Selector::Key(key) => key.name().to_string(),
            Selector::Property(p) => p.query_key(),
            Selector::Path(elements) => elements
                .iter()
                .map(Selector::query_key)
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    /// Dotted field name in the search index.
    pub fn es_field(&self) -> String {
        match self {
            Selector::Key(key) => key.name().to_string(),
            Selector::Property(p) => p.es_field(),
            Selector::Path(elements) => elements
                .iter()
                .map(Selector::es_field)
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Selector::Key(key) => key.state == KeyState::Recognized,
            Selector::Property(_) => true,
            Selector::Path(elements) => elements.iter().all(Selector::is_valid),
        }
    }

    /// Flattened path elements (a non-path selector is its own single element).
    pub fn elements(&self) -> Vec<&Selector> {
        match self {
            Selector::Path(elements) => elements.iter().flat_map(Selector::elements).collect(),
            other => vec![other],
        }
    }

    pub fn into_elements(self) -> Vec<Selector> {
        match self {
            Selector::Path(elements) => elements.into_iter().flat_map(Selector::into_elements).collect(),
            other => vec![other],
        }
    }

    pub fn first_property(&self) -> Option<&Property> {
        match self.elements().first() {
            Some(Selector::Property(p)) => Some(p),
            _ => None,
        }
    }

    pub fn last_property(&self) -> Option<&Property> {
        match self.elements().last() {
            Some(Selector::Property(p)) => Some(p),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Selector::Property(p) if p.def.is_type() && !p.reversed)
    }

    pub fn is_object_property(&self) -> bool {
        self.last_property().is_some_and(|p| p.def.is_object_property())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catql_vocab::model::{PropertyKind, PropertyType, RDF_TYPE};

    fn def(key: &str, query_code: Option<&str>) -> Arc<PropertyDef> {
        let mut def = PropertyDef {
            key: key.to_string(),
            property_type: PropertyType::ObjectProperty,
            query_code: query_code.map(str::to_string),
            ..PropertyDef::default()
        };
        def.kind = def.resolve_kind();
        Arc::new(def)
    }

    #[test]
    fn keys_use_query_codes_and_fields_use_property_keys() {
        let lang = Selector::Property(Property::new(def("language", Some("lang"))));
        assert_eq!(lang.query_key(), "lang");
        assert_eq!(lang.es_field(), "language");

        let path = Selector::Path(vec![
            Selector::Property(Property::new(def("instanceOf", None)).toggle_reversed()),
            Selector::Property(Property::new(def(RDF_TYPE, None))),
        ]);
        assert_eq!(path.query_key(), "@reverse.instanceOf.@type");
        assert_eq!(path.es_field(), "@reverse.instanceOf.@type");

        let prefixed = Selector::Property(Property::new(def("bf2:role", None)));
        assert_eq!(prefixed.formatted_key(), "\"bf2:role\"");
        assert!(!path.is_type());
        assert_eq!(path.last_property().map(|p| p.def.kind.clone()), Some(PropertyKind::RdfType));
    }

    #[test]
    fn unrecognized_keys_invalidate_paths() {
        let path = Selector::Path(vec![
            Selector::Property(Property::new(def("identifiedBy", None))),
            Selector::Key(Key {
                token: Token::synthetic("valeu"),
                state: KeyState::Unrecognized {
                    suggestions: vec!["value".into()],
                },
            }),
        ]);
        assert!(!path.is_valid());
        assert!(Selector::Key(Key::recognized("_str")).is_valid());
        assert_eq!(path.elements().len(), 2);
    }
}
