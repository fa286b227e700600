//! Flattened AST → canonical query tree.
//!
//! This is where user strings meet the vocabulary: keys become properties,
//! values become typed values, and bare words become free text or filters.
//! In strict mode anything the vocabulary cannot place rejects the query;
//! lenient mode keeps it as an unrecognized key or invalid value.

use crate::context::QueryContext;
use crate::error::InvalidQuery;
use crate::node::{AnyKind, Condition, FreeText, Node};
use crate::selector::{Key, KeyState, Property, Selector};
use crate::util::suggestions;
use crate::value::{InvalidKind, QueryDate, Value};
use catql_dsl::flatten::runs_compatible;
use catql_dsl::{Connective, FlatNode, Operator, Token};
use catql_vocab::model::{PropertyDef, REVERSE_KEY};
use catql_vocab::{is_iri, Mapping};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::trace;

fn year_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{0,4})-(\d{0,4})$").expect("valid regex"))
}

pub struct QueryTreeBuilder<'a> {
    ctx: &'a QueryContext,
}

impl<'a> QueryTreeBuilder<'a> {
    pub fn new(ctx: &'a QueryContext) -> Self {
        Self { ctx }
    }

    pub fn build(&self, flat: &FlatNode) -> Result<Node, InvalidQuery> {
        match flat {
            FlatNode::And { operands } => self.build_group(Connective::And, operands),
            FlatNode::Or { operands } => self.build_group(Connective::Or, operands),
            FlatNode::Not { operand } => Ok(self.build(operand)?.invert()),
            FlatNode::Leaf { tokens, connective } => Ok(self.build_leaf(tokens, *connective)),
            FlatNode::Code {
                key,
                operator,
                operand,
            } => self.build_code(key, *operator, operand),
        }
    }

    fn build_leaf(&self, tokens: &[Token], connective: Connective) -> Node {
        if let [single] = tokens {
            if !single.quoted {
                if let Some(filter) = self.ctx.filters.get(&single.value) {
                    return Node::ActiveFilter(filter.clone());
                }
            }
            if single.is_wildcard() {
                return Node::Any(AnyKind::Wildcard);
            }
        }
        Node::FreeText(FreeText::new(tokens.to_vec(), connective))
    }

    fn build_group(&self, connective: Connective, operands: &[FlatNode]) -> Result<Node, InvalidQuery> {
        let mut children = Vec::with_capacity(operands.len());
        for operand in operands {
            match (connective, self.build(operand)?) {
                (Connective::And, Node::And(grandchildren)) | (Connective::Or, Node::Or(grandchildren)) => {
                    children.extend(grandchildren)
                }
                (_, child) => children.push(child),
            }
        }

        // `x *` means `x`.
        if connective == Connective::And && children.len() > 1 {
            children.retain(|c| *c != Node::Any(AnyKind::Wildcard));
            if children.is_empty() {
                children.push(Node::Any(AnyKind::Wildcard));
            }
        }

        Ok(Node::group(connective, hoist_free_text(connective, children)))
    }

    fn build_code(&self, key: &Token, operator: Operator, operand: &FlatNode) -> Result<Node, InvalidQuery> {
        if operator == Operator::NotEquals {
            return Ok(self.build_code(key, Operator::Equals, operand)?.invert());
        }
        match operand {
            FlatNode::Not { operand } => Ok(self.build_code(key, operator, operand)?.invert()),
            FlatNode::And { operands } | FlatNode::Or { operands } => {
                let connective = if matches!(operand, FlatNode::And { .. }) {
                    Connective::And
                } else {
                    Connective::Or
                };
                let children = operands
                    .iter()
                    .map(|o| self.build_code(key, operator, o))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::group(connective, children))
            }
            FlatNode::Leaf { tokens, connective } => {
                let selector = self.resolve_key(key)?;
                let value = self.build_value(&selector, tokens, *connective)?;
                Ok(Node::Condition(Condition::new(selector, operator, value)))
            }
            FlatNode::Code { .. } => Err(InvalidQuery::NestedCodeInGroup {
                key: key.value.clone(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    /// Resolve a (possibly dotted) key. `@reverse` reverses the segment after it.
    pub fn resolve_key(&self, key: &Token) -> Result<Selector, InvalidQuery> {
        let base_offset = key.offset.map(|o| o + usize::from(key.quoted));
        let mut elements = Vec::new();
        let mut reverse_next = false;
        let mut position = 0;

        for segment in key.value.split('.') {
            let token = Token {
                value: segment.to_string(),
                offset: base_offset.map(|o| o + position),
                quoted: false,
            };
            position += segment.len() + 1;

            if segment == REVERSE_KEY {
                reverse_next = true;
                continue;
            }
            let element = match self.resolve_segment(token)? {
                Selector::Property(p) if reverse_next => Selector::Property(p.toggle_reversed()),
                other => {
                    if reverse_next {
                        elements.push(Selector::Key(Key::recognized(REVERSE_KEY)));
                    }
                    other
                }
            };
            reverse_next = false;
            elements.push(element);
        }
        if reverse_next {
            elements.push(Selector::Key(Key::recognized(REVERSE_KEY)));
        }

        Ok(Selector::from_elements(elements))
    }

    fn resolve_segment(&self, token: Token) -> Result<Selector, InvalidQuery> {
        let vocab = &self.ctx.vocab;
        let lenient = self.ctx.settings.lenient;
        let is_index_key = token.value.starts_with('@') || token.value.starts_with('_');

        match vocab.map_property(&token.value) {
            Mapping::Resolved(key) => match vocab.property(&key) {
                Some(def) => Ok(Selector::Property(Property {
                    def,
                    token,
                    reversed: false,
                })),
                None => Ok(Selector::Key(Key {
                    token,
                    state: KeyState::Recognized,
                })),
            },
            _ if is_index_key => Ok(Selector::Key(Key {
                token,
                state: KeyState::Recognized,
            })),
            Mapping::Ambiguous(candidates) if lenient => Ok(Selector::Key(Key {
                token,
                state: KeyState::Ambiguous { candidates },
            })),
            Mapping::Ambiguous(candidates) => Err(InvalidQuery::AmbiguousKey {
                key: token.value,
                candidates,
            }),
            Mapping::Unrecognized => {
                let suggestions = suggestions(&token.value, vocab.known_property_keys(), 2, 3);
                trace!(key = %token.value, ?suggestions, "unrecognized key");
                if lenient {
                    Ok(Selector::Key(Key {
                        token,
                        state: KeyState::Unrecognized { suggestions },
                    }))
                } else {
                    Err(InvalidQuery::UnrecognizedKey {
                        key: token.value,
                        suggestions,
                    })
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    fn build_value(
        &self,
        selector: &Selector,
        tokens: &[Token],
        connective: Connective,
    ) -> Result<Value, InvalidQuery> {
        let token = match tokens {
            [single] => single,
            _ => {
                return Ok(Value::FreeText {
                    tokens: tokens.to_vec(),
                    connective,
                })
            }
        };
        if token.is_wildcard() {
            return Ok(Value::Wildcard);
        }

        let Some(property) = selector.last_property() else {
            return Ok(plain_value(token));
        };
        let def = &property.def;

        if def.is_date() {
            if let Some(date) = QueryDate::parse(&token.value) {
                return Ok(Value::DateTime {
                    date,
                    token: token.clone(),
                });
            }
        }
        if def.has_vocab_value() {
            return self.vocab_value(selector, def, token);
        }
        if def.is_object_property() {
            if let Some(link) = self.link(token) {
                return Ok(link);
            }
        }
        Ok(plain_value(token))
    }

    fn vocab_value(&self, selector: &Selector, def: &PropertyDef, token: &Token) -> Result<Value, InvalidQuery> {
        let vocab = &self.ctx.vocab;
        let mapping = if def.is_type() {
            vocab.map_class(&token.value)
        } else {
            vocab.map_enum(&token.value, def)
        };

        match mapping {
            Mapping::Resolved(key) => Ok(Value::VocabTerm {
                description: vocab.term_description(&key),
                key,
                token: token.clone(),
            }),
            unresolved => {
                if let Some(link) = self.link(token) {
                    return Ok(link);
                }
                let lenient = self.ctx.settings.lenient;
                match unresolved {
                    Mapping::Ambiguous(candidates) if lenient => Ok(Value::Invalid {
                        kind: InvalidKind::Ambiguous(candidates),
                        token: token.clone(),
                    }),
                    Mapping::Ambiguous(candidates) => Err(InvalidQuery::AmbiguousValue {
                        key: selector.query_key(),
                        value: token.value.clone(),
                        candidates,
                    }),
                    _ if lenient => Ok(Value::Invalid {
                        kind: InvalidKind::Forbidden,
                        token: token.clone(),
                    }),
                    _ => Err(InvalidQuery::UnrecognizedValue {
                        key: selector.query_key(),
                        value: token.value.clone(),
                    }),
                }
            }
        }
    }

    /// A link when the value is an IRI, directly or after prefix expansion.
    fn link(&self, token: &Token) -> Option<Value> {
        let iri = if is_iri(&token.value) {
            token.value.clone()
        } else if token.value.contains(':') {
            self.ctx.vocab.expand_prefixed(&token.value)?
        } else {
            return None;
        };
        Some(Value::Link {
            description: json!({ "@id": iri }),
            iri,
            token: token.clone(),
        })
    }
}

/// Quoted values stay literal; bare ones may be numbers or year ranges.
fn plain_value(token: &Token) -> Value {
    if token.quoted {
        return Value::Literal(token.clone());
    }
    if let Some(caps) = year_range_pattern().captures(&token.value) {
        let year = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u16>().ok());
        let (min, max) = (year(1), year(2));
        if min.is_some() || max.is_some() {
            return Value::YearRange {
                min,
                max,
                token: token.clone(),
            };
        }
    }
    if !token.value.is_empty() && token.value.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(value) = token.value.parse::<i64>() {
            return Value::Numeric {
                value,
                token: token.clone(),
            };
        }
    }
    Value::Literal(token.clone())
}

/// Gather a group's plain free-text children into the first one.
fn hoist_free_text(connective: Connective, children: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    let mut anchor: Option<usize> = None;

    for child in children {
        match child {
            Node::FreeText(ft) if !ft.negated && ft.property.is_none() => {
                if let Some(Node::FreeText(first)) = anchor.and_then(|i| out.get_mut(i)) {
                    if runs_compatible(
                        (first.tokens.as_slice(), first.connective),
                        (ft.tokens.as_slice(), ft.connective),
                        connective,
                    ) {
                        first.tokens.extend(ft.tokens);
                        first.connective = connective;
                        continue;
                    }
                } else {
                    anchor = Some(out.len());
                }
                out.push(Node::FreeText(ft));
            }
            other => out.push(other),
        }
    }
    out
}
