//! The vocabulary collaborator.
//!
//! `Vocabulary` is the read-only view the query pipeline needs: alias
//! resolution, the class and property hierarchies, and term descriptions for
//! the search mapping. `JsonVocab` answers it from a `VocabSnapshot`.

use crate::aliases::{AliasTable, Mapping};
use crate::error::{read_to_string, LoadError};
use crate::model::{
    ClassDef, EnumDef, Labels, PropertyDef, PropertyType, VocabSnapshot, ID_KEY, RDF_TYPE, TYPE_KEY,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub trait Vocabulary: Send + Sync {
    /// IRI prefix of vocabulary terms.
    fn base(&self) -> &str;

    fn property(&self, key: &str) -> Option<Arc<PropertyDef>>;

    fn class(&self, key: &str) -> Option<&ClassDef>;

    fn map_property(&self, alias: &str) -> Mapping;

    fn map_class(&self, alias: &str) -> Mapping;

    /// Resolve an enum value admissible for `property`'s range.
    fn map_enum(&self, alias: &str, property: &PropertyDef) -> Mapping;

    /// All transitive subclasses of `class`, excluding `class` itself.
    fn sub_classes(&self, class: &str) -> BTreeSet<String>;

    /// All transitive sub-properties of `property`, excluding `property` itself.
    fn sub_properties(&self, property: &str) -> BTreeSet<String>;

    /// Reflexive, transitive.
    fn is_sub_class_of(&self, class: &str, ancestor: &str) -> bool;

    /// Integral (default traversal) relations whose domain covers `class`.
    fn integral_relations_for_type(&self, class: &str) -> Vec<String>;

    /// `prefix:local` → full IRI. Full IRIs are returned unchanged.
    fn expand_prefixed(&self, value: &str) -> Option<String>;

    fn to_prefixed(&self, iri: &str) -> String;

    /// JSON-LD description of a term, used verbatim in search mappings.
    fn term_description(&self, key: &str) -> Value;

    fn known_property_keys(&self) -> Vec<&str>;
}

pub fn is_iri(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

// ============================================================================
// JsonVocab
// ============================================================================

#[derive(Debug, Default)]
pub struct JsonVocab {
    base: String,
    namespaces: BTreeMap<String, String>,
    classes: BTreeMap<String, ClassDef>,
    properties: BTreeMap<String, Arc<PropertyDef>>,
    enums: BTreeMap<String, EnumDef>,
    class_children: BTreeMap<String, BTreeSet<String>>,
    property_children: BTreeMap<String, BTreeSet<String>>,
    property_aliases: AliasTable,
    class_aliases: AliasTable,
    enum_aliases: AliasTable,
}

impl JsonVocab {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_json_str(&read_to_string(path.as_ref())?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let snapshot: VocabSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    pub fn from_snapshot(snapshot: VocabSnapshot) -> Result<Self, LoadError> {
        let VocabSnapshot {
            base,
            namespaces,
            classes,
            mut properties,
            enums,
        } = snapshot;

        properties.entry(RDF_TYPE.to_string()).or_insert_with(|| PropertyDef {
            property_type: PropertyType::ObjectProperty,
            ..PropertyDef::default()
        });

        let mut vocab = JsonVocab {
            base,
            namespaces,
            classes,
            enums,
            ..JsonVocab::default()
        };

        for (key, class) in &vocab.classes {
            for parent in &class.sub_class_of {
                if !vocab.classes.contains_key(parent) {
                    warn!(class = %key, parent = %parent, "subClassOf refers to an unknown class");
                }
                vocab
                    .class_children
                    .entry(parent.clone())
                    .or_default()
                    .insert(key.clone());
            }
        }

        let enum_types: BTreeSet<String> = vocab.enums.values().map(|e| e.enum_type.clone()).collect();
        let known: BTreeSet<String> = properties.keys().cloned().collect();

        for (key, mut def) in properties {
            def.key = key.clone();
            for referenced in def.property_chain_axiom.iter().flatten().chain(def.composite_of.iter()) {
                if !known.contains(referenced) {
                    return Err(LoadError::Invalid(format!(
                        "property '{key}' refers to unknown property '{referenced}'"
                    )));
                }
            }
            if !def.restrictions.is_empty() && def.sub_property_of.is_empty() {
                warn!(property = %key, "restrictions without a base property are ignored");
            }

            def.kind = def.resolve_kind();
            def.vocab_term = !def.is_type()
                && def
                    .range
                    .iter()
                    .any(|r| enum_types.iter().any(|t| vocab.is_ancestor(t, r)));

            for parent in &def.sub_property_of {
                vocab
                    .property_children
                    .entry(parent.clone())
                    .or_default()
                    .insert(key.clone());
            }
            vocab.properties.insert(key, Arc::new(def));
        }

        vocab.index_aliases();

        debug!(
            classes = vocab.classes.len(),
            properties = vocab.properties.len(),
            enums = vocab.enums.len(),
            "vocabulary loaded"
        );
        Ok(vocab)
    }

    fn index_aliases(&mut self) {
        let mut property_aliases = AliasTable::default();
        for (key, def) in &self.properties {
            for alias in self.term_aliases(key, &def.labels) {
                property_aliases.add(&alias, key);
            }
            if let Some(code) = &def.query_code {
                property_aliases.add(code, key);
            }
        }
        property_aliases.add(TYPE_KEY, RDF_TYPE);
        property_aliases.add("type", RDF_TYPE);

        let mut class_aliases = AliasTable::default();
        for (key, class) in &self.classes {
            for alias in self.term_aliases(key, &class.labels) {
                class_aliases.add(&alias, key);
            }
        }

        let mut enum_aliases = AliasTable::default();
        for (key, term) in &self.enums {
            for alias in self.term_aliases(key, &term.labels) {
                enum_aliases.add(&alias, key);
            }
        }

        self.property_aliases = property_aliases;
        self.class_aliases = class_aliases;
        self.enum_aliases = enum_aliases;
    }

    fn term_aliases(&self, key: &str, labels: &Labels) -> Vec<String> {
        let iri = self.iri(key);
        let mut aliases = vec![key.to_string(), self.to_prefixed(&iri), iri];
        aliases.extend(labels.aliases().map(str::to_string));
        aliases
    }

    fn iri(&self, key: &str) -> String {
        if is_iri(key) {
            key.to_string()
        } else if key.contains(':') {
            self.expand_prefixed(key).unwrap_or_else(|| key.to_string())
        } else {
            format!("{}{}", self.base, key)
        }
    }

    fn is_ancestor(&self, class: &str, ancestor: &str) -> bool {
        if class == ancestor {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([class]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(def) = self.classes.get(current) {
                for parent in &def.sub_class_of {
                    if parent == ancestor {
                        return true;
                    }
                    queue.push_back(parent);
                }
            }
        }
        false
    }

    fn descendants(children: &BTreeMap<String, BTreeSet<String>>, root: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for child in children.get(current).into_iter().flatten() {
                if child != root && out.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        out
    }

    fn describe(&self, key: &str, term_type: &str, labels: &Labels) -> Value {
        let mut out = serde_json::Map::new();
        out.insert(ID_KEY.to_string(), json!(self.iri(key)));
        out.insert(TYPE_KEY.to_string(), json!(term_type));
        if let Ok(Value::Object(labels)) = serde_json::to_value(labels) {
            out.extend(labels);
        }
        Value::Object(out)
    }
}

impl Vocabulary for JsonVocab {
    fn base(&self) -> &str {
        &self.base
    }

    fn property(&self, key: &str) -> Option<Arc<PropertyDef>> {
        self.properties.get(key).cloned()
    }

    fn class(&self, key: &str) -> Option<&ClassDef> {
        self.classes.get(key)
    }

    fn map_property(&self, alias: &str) -> Mapping {
        let mapping = self.property_aliases.resolve(
            alias,
            |_| true,
            |k| self.properties.get(k).is_some_and(|p| p.query_code.is_some()),
        );
        trace!(alias, ?mapping, "property alias");
        mapping
    }

    fn map_class(&self, alias: &str) -> Mapping {
        let mapping = self.class_aliases.resolve(alias, |_| true, |_| false);
        trace!(alias, ?mapping, "class alias");
        mapping
    }

    fn map_enum(&self, alias: &str, property: &PropertyDef) -> Mapping {
        let admissible = |key: &str| {
            property.range.is_empty()
                || self.enums.get(key).is_some_and(|term| {
                    property
                        .range
                        .iter()
                        .any(|r| self.is_ancestor(&term.enum_type, r))
                })
        };
        let mapping = self.enum_aliases.resolve(alias, admissible, |_| false);
        trace!(alias, property = %property.key, ?mapping, "enum alias");
        mapping
    }

    fn sub_classes(&self, class: &str) -> BTreeSet<String> {
        Self::descendants(&self.class_children, class)
    }

    fn sub_properties(&self, property: &str) -> BTreeSet<String> {
        Self::descendants(&self.property_children, property)
    }

    fn is_sub_class_of(&self, class: &str, ancestor: &str) -> bool {
        self.is_ancestor(class, ancestor)
    }

    fn integral_relations_for_type(&self, class: &str) -> Vec<String> {
        self.properties
            .values()
            .filter(|p| p.is_integral())
            .filter(|p| p.domain.iter().any(|d| self.is_ancestor(class, d)))
            .map(|p| p.key.clone())
            .collect()
    }

    fn expand_prefixed(&self, value: &str) -> Option<String> {
        if is_iri(value) {
            return Some(value.to_string());
        }
        let (prefix, local) = value.split_once(':')?;
        self.namespaces.get(prefix).map(|ns| format!("{ns}{local}"))
    }

    fn to_prefixed(&self, iri: &str) -> String {
        self.namespaces
            .iter()
            .filter(|(_, ns)| !ns.is_empty() && iri.starts_with(ns.as_str()))
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{prefix}:{}", &iri[ns.len()..]))
            .unwrap_or_else(|| iri.to_string())
    }

    fn term_description(&self, key: &str) -> Value {
        if let Some(def) = self.properties.get(key) {
            let term_type = match def.property_type {
                PropertyType::ObjectProperty => "ObjectProperty",
                PropertyType::DatatypeProperty => "DatatypeProperty",
            };
            let mut out = self.describe(key, term_type, &def.labels);
            if let (Some(code), Value::Object(map)) = (&def.query_code, &mut out) {
                map.insert("queryCode".to_string(), json!(code));
            }
            return out;
        }
        if let Some(class) = self.classes.get(key) {
            return self.describe(key, "Class", &class.labels);
        }
        if let Some(term) = self.enums.get(key) {
            return self.describe(key, &term.enum_type, &term.labels);
        }
        json!({ ID_KEY: self.iri(key) })
    }

    fn known_property_keys(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyKind;

    const SNAPSHOT: &str = r#"{
        "base": "https://id.kb.se/vocab/",
        "namespaces": { "kbv": "https://id.kb.se/vocab/", "rdf": "http://www.w3.org/1999/02/22-rdf-syntax-ns#" },
        "classes": {
            "Resource": {},
            "Work": { "subClassOf": ["Resource"] },
            "Instance": { "subClassOf": ["Resource"] },
            "Print": { "subClassOf": ["Instance"], "labelByLang": { "sv": "Tryck" } },
            "Electronic": { "subClassOf": ["Instance"] },
            "Braille": { "subClassOf": ["Print"] },
            "Language": {}
        },
        "properties": {
            "title": { "labelByLang": { "sv": "titel" } },
            "language": { "type": "ObjectProperty", "range": ["Language"], "queryCode": "lang" },
            "languageNote": { "label": "lang" },
            "instanceOf": { "type": "ObjectProperty", "domain": ["Instance"], "range": ["Work"], "category": ["integral"] },
            "contribution": { "type": "ObjectProperty" },
            "primaryContribution": { "type": "ObjectProperty", "subPropertyOf": ["contribution"] },
            "subjectOfWork": { "propertyChainAxiom": [["instanceOf", "subject"]] },
            "subject": { "type": "ObjectProperty" }
        },
        "enums": {
            "eng": { "type": "Language", "code": "eng", "labelByLang": { "sv": "engelska" } }
        }
    }"#;

    fn vocab() -> JsonVocab {
        JsonVocab::from_json_str(SNAPSHOT).expect("snapshot")
    }

    #[test]
    fn properties_resolve_by_key_label_and_iri() {
        let v = vocab();
        assert_eq!(v.map_property("Titel"), Mapping::Resolved("title".into()));
        assert_eq!(v.map_property("kbv:title"), Mapping::Resolved("title".into()));
        assert_eq!(
            v.map_property("https://id.kb.se/vocab/title"),
            Mapping::Resolved("title".into())
        );
        assert_eq!(v.map_property("type"), Mapping::Resolved(RDF_TYPE.into()));
        assert_eq!(v.map_property("nope"), Mapping::Unrecognized);
    }

    #[test]
    fn query_code_breaks_alias_ties() {
        assert_eq!(vocab().map_property("lang"), Mapping::Resolved("language".into()));
    }

    #[test]
    fn sub_classes_are_transitive_and_sorted() {
        let v = vocab();
        let subs: Vec<String> = v.sub_classes("Instance").into_iter().collect();
        assert_eq!(subs, vec!["Braille", "Electronic", "Print"]);
        assert!(v.is_sub_class_of("Braille", "Instance"));
        assert!(v.is_sub_class_of("Print", "Print"));
        assert!(!v.is_sub_class_of("Work", "Instance"));
    }

    #[test]
    fn kinds_and_vocab_terms_are_resolved_on_load() {
        let v = vocab();
        let language = v.property("language").expect("language");
        assert!(language.vocab_term);
        assert!(!v.property("title").expect("title").vocab_term);
        assert!(matches!(
            v.property("subjectOfWork").expect("shorthand").kind,
            PropertyKind::ShortHand { .. }
        ));
        assert!(v.property(RDF_TYPE).expect("rdf:type").is_type());
    }

    #[test]
    fn enums_resolve_against_the_property_range() {
        let v = vocab();
        let language = v.property("language").expect("language");
        assert_eq!(v.map_enum("Engelska", &language), Mapping::Resolved("eng".into()));
        let subject = v.property("subject").expect("subject");
        assert_eq!(v.map_enum("ENG", &subject), Mapping::Resolved("eng".into()));
        let title = PropertyDef {
            range: vec!["Work".into()],
            ..PropertyDef::default()
        };
        assert_eq!(v.map_enum("eng", &title), Mapping::Unrecognized);
    }

    #[test]
    fn hierarchy_queries() {
        let v = vocab();
        assert_eq!(
            v.sub_properties("contribution").into_iter().collect::<Vec<_>>(),
            vec!["primaryContribution"]
        );
        assert_eq!(v.integral_relations_for_type("Print"), vec!["instanceOf"]);
        assert!(v.integral_relations_for_type("Work").is_empty());
    }

    #[test]
    fn prefixes_round_trip() {
        let v = vocab();
        assert_eq!(
            v.expand_prefixed("kbv:Print").as_deref(),
            Some("https://id.kb.se/vocab/Print")
        );
        assert_eq!(v.expand_prefixed("nope:x"), None);
        assert_eq!(v.to_prefixed("https://id.kb.se/vocab/Print"), "kbv:Print");
        assert_eq!(v.term_description("Print")["@id"], "https://id.kb.se/vocab/Print");
        assert_eq!(v.term_description("eng")["@type"], "Language");
    }

    #[test]
    fn dangling_chain_references_fail_to_load() {
        let err = JsonVocab::from_json_str(
            r#"{ "properties": { "x": { "propertyChainAxiom": [["missing"]] } } }"#,
        )
        .expect_err("dangling");
        assert!(matches!(err, LoadError::Invalid(_)));
    }
}
