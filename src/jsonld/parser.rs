//! JSON-LD to triples
//!
//! Expands node objects directly into a [`Graph`]. Covers the part of
//! JSON-LD 1.1 that change-event producers emit: inline contexts, compact
//! IRIs, keyword aliases, type coercion, value objects, embedded nodes and
//! a top-level `@graph`. Lists, reverse properties and named graphs are
//! reported as unsupported rather than silently dropped.

use super::context::{ActiveContext, Coercion};
use super::{ParseError, PayloadParser};
use crate::graph::{ns, Graph, Iri, Literal, Term};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// The default [`PayloadParser`]: reads `application/ld+json`.
#[derive(Debug, Clone, Default)]
pub struct JsonLdParser {
    base: Option<String>,
}

impl JsonLdParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative `@id`s against `base`
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Parse an already-decoded JSON document.
    pub fn parse_value(&self, document: &Value) -> Result<Graph, ParseError> {
        let ctx = match &self.base {
            Some(base) => ActiveContext::new().with_base(base.clone()),
            None => ActiveContext::new(),
        };
        let mut expander = Expander::default();

        match document {
            Value::Array(items) => {
                for item in items {
                    expander.top_level(item, &ctx)?;
                }
            }
            Value::Object(_) => expander.top_level(document, &ctx)?,
            other => {
                return Err(ParseError::InvalidDocument(format!(
                    "top-level value must be an object or array, got {}",
                    other
                )))
            }
        }

        Ok(expander.graph)
    }
}

impl PayloadParser for JsonLdParser {
    fn media_type(&self) -> &str {
        "application/ld+json"
    }

    fn parse(&self, payload: &str) -> Result<Graph, ParseError> {
        let document: Value = serde_json::from_str(payload)?;
        self.parse_value(&document)
    }
}

/// Per-document expansion state
#[derive(Default)]
struct Expander {
    graph: Graph,
    /// Document blank-node labels mapped to fresh labels
    blank_labels: HashMap<String, String>,
    next_blank: usize,
}

impl Expander {
    fn fresh_blank(&mut self) -> Term {
        let label = format!("b{}", self.next_blank);
        self.next_blank += 1;
        Term::blank(label)
    }

    fn blank(&mut self, label: &str) -> Term {
        if let Some(existing) = self.blank_labels.get(label) {
            return Term::blank(existing.clone());
        }
        let fresh = self.fresh_blank();
        if let Term::Blank(id) = &fresh {
            self.blank_labels.insert(label.to_string(), id.as_str().to_string());
        }
        fresh
    }

    /// Resolve an `@id` (or `@id`-coerced string) to a subject term.
    fn reference(
        &mut self,
        id: &str,
        ctx: &ActiveContext,
        vocab: bool,
    ) -> Result<Term, ParseError> {
        if let Some(label) = id.strip_prefix("_:") {
            return Ok(self.blank(label));
        }
        match ctx.expand_iri(id, vocab) {
            Some(iri) if !iri.starts_with('@') => Ok(Term::iri(iri)),
            _ => Err(ParseError::InvalidDocument(format!("invalid node reference '{}'", id))),
        }
    }

    fn top_level(&mut self, value: &Value, ctx: &ActiveContext) -> Result<(), ParseError> {
        let Value::Object(map) = value else {
            return Err(ParseError::InvalidDocument(format!(
                "expected a node object, got {}",
                value
            )));
        };

        let ctx = match map.get("@context") {
            Some(local) => ctx.merge(local)?,
            None => ctx.clone(),
        };

        let graph_key = map
            .keys()
            .find(|k| ctx.expand_key(k).as_deref() == Some("@graph"))
            .cloned();

        match graph_key {
            None => {
                self.node(map, &ctx)?;
            }
            Some(key) => {
                let has_other_entries = map
                    .keys()
                    .any(|k| k != "@context" && k != &key);
                if has_other_entries {
                    return Err(ParseError::Unsupported("named graphs".into()));
                }
                match &map[&key] {
                    Value::Array(items) => {
                        for item in items {
                            self.embedded(item, &ctx)?;
                        }
                    }
                    Value::Object(_) => {
                        self.embedded(&map[&key], &ctx)?;
                    }
                    Value::Null => {}
                    other => {
                        return Err(ParseError::InvalidDocument(format!(
                            "@graph must hold node objects, got {}",
                            other
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    fn embedded(&mut self, value: &Value, ctx: &ActiveContext) -> Result<Term, ParseError> {
        match value {
            Value::Object(map) => self.node(map, ctx),
            other => Err(ParseError::InvalidDocument(format!(
                "expected a node object, got {}",
                other
            ))),
        }
    }

    /// Expand a node object, emit its triples and return its subject.
    fn node(
        &mut self,
        map: &Map<String, Value>,
        outer: &ActiveContext,
    ) -> Result<Term, ParseError> {
        let local;
        let ctx = match map.get("@context") {
            Some(c) => {
                local = outer.merge(c)?;
                &local
            }
            None => outer,
        };

        let mut subject = None;
        let mut types = Vec::new();
        let mut properties = Vec::new();

        for (key, value) in map {
            if key == "@context" {
                continue;
            }
            let Some(expanded) = ctx.expand_key(key) else {
                continue;
            };
            match expanded.as_str() {
                "@id" => match value {
                    Value::String(id) => subject = Some(self.reference(id, ctx, false)?),
                    other => {
                        return Err(ParseError::InvalidDocument(format!(
                            "@id must be a string, got {}",
                            other
                        )))
                    }
                },
                "@type" => {
                    for ty in string_or_strings(value, "@type")? {
                        types.push(self.reference(ty, ctx, true)?);
                    }
                }
                "@index" => {}
                "@graph" => return Err(ParseError::Unsupported("nested @graph".into())),
                "@reverse" | "@list" | "@included" | "@nest" => {
                    return Err(ParseError::Unsupported(expanded.clone()))
                }
                keyword if keyword.starts_with('@') => {
                    return Err(ParseError::InvalidDocument(format!(
                        "unexpected {} in node object",
                        keyword
                    )))
                }
                _ => properties.push((key.as_str(), Iri::new(expanded.clone()), value)),
            }
        }

        let subject = match subject {
            Some(s) => s,
            None => self.fresh_blank(),
        };

        for ty in types {
            self.graph.add(subject.clone(), ns::RDF_TYPE, ty);
        }

        for (key, predicate, value) in properties {
            let coercion = ctx.definition(key).and_then(|d| d.coercion.clone());
            for object in self.objects(value, coercion.as_ref(), ctx)? {
                self.graph.add(subject.clone(), predicate.clone(), object);
            }
        }

        Ok(subject)
    }

    /// Expand a property value into zero or more object terms.
    fn objects(
        &mut self,
        value: &Value,
        coercion: Option<&Coercion>,
        ctx: &ActiveContext,
    ) -> Result<Vec<Term>, ParseError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.extend(self.objects(item, coercion, ctx)?);
                }
                Ok(out)
            }
            Value::String(s) => Ok(vec![match coercion {
                Some(Coercion::Id) => self.reference(s, ctx, false)?,
                Some(Coercion::Vocab) => self.reference(s, ctx, true)?,
                Some(Coercion::Datatype(dt)) => {
                    Term::literal(Literal::typed(s.clone(), dt.clone()))
                }
                None => match ctx.language() {
                    Some(lang) => Term::literal(Literal::lang_string(s.clone(), lang)),
                    None => Term::literal(Literal::string(s.clone())),
                },
            }]),
            Value::Number(n) => Ok(vec![Term::literal(match coercion {
                Some(Coercion::Datatype(dt)) => Literal::typed(n.to_string(), dt.clone()),
                _ => number_literal(n),
            })]),
            Value::Bool(b) => Ok(vec![Term::literal(match coercion {
                Some(Coercion::Datatype(dt)) => Literal::typed(b.to_string(), dt.clone()),
                _ => Literal::boolean(*b),
            })]),
            Value::Object(map) => self.object_value(map, ctx),
        }
    }

    fn object_value(
        &mut self,
        map: &Map<String, Value>,
        ctx: &ActiveContext,
    ) -> Result<Vec<Term>, ParseError> {
        let mut keywords: HashMap<String, &Value> = HashMap::new();
        let mut has_properties = false;
        for (key, value) in map {
            match ctx.expand_key(key) {
                Some(k) if k.starts_with('@') => {
                    keywords.insert(k, value);
                }
                Some(_) => has_properties = true,
                None => {}
            }
        }

        if keywords.contains_key("@list") {
            return Err(ParseError::Unsupported("@list".into()));
        }

        if let Some(inner) = keywords.get("@set") {
            return self.objects(inner, None, ctx);
        }

        if let Some(raw) = keywords.get("@value") {
            let datatype = keywords.get("@type").copied();
            let language = keywords.get("@language").copied();
            return value_object(raw, datatype, language, ctx)
                .map(|lit| lit.into_iter().map(Term::literal).collect());
        }

        let only_reference = !has_properties
            && keywords.contains_key("@id")
            && keywords.keys().all(|k| k == "@id" || k == "@context");
        if only_reference {
            return match keywords["@id"] {
                Value::String(id) => Ok(vec![self.reference(id, ctx, false)?]),
                other => Err(ParseError::InvalidDocument(format!(
                    "@id must be a string, got {}",
                    other
                ))),
            };
        }

        Ok(vec![self.node(map, ctx)?])
    }
}

fn string_or_strings<'a>(value: &'a Value, keyword: &str) -> Result<Vec<&'a str>, ParseError> {
    match value {
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    ParseError::InvalidDocument(format!("{} values must be strings", keyword))
                })
            })
            .collect(),
        _ => Err(ParseError::InvalidDocument(format!(
            "{} must be a string or array of strings",
            keyword
        ))),
    }
}

fn number_literal(n: &Number) -> Literal {
    if let Some(i) = n.as_i64() {
        Literal::integer(i)
    } else if n.is_u64() {
        Literal::typed(n.to_string(), ns::XSD_INTEGER)
    } else {
        Literal::double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Expand a value object (`{"@value": .., "@type"|"@language": ..}`).
/// A null `@value` produces no literal.
fn value_object(
    raw: &Value,
    datatype: Option<&Value>,
    language: Option<&Value>,
    ctx: &ActiveContext,
) -> Result<Option<Literal>, ParseError> {
    if datatype.is_some() && language.is_some() {
        return Err(ParseError::InvalidDocument(
            "value object cannot have both @type and @language".into(),
        ));
    }

    let datatype = match datatype {
        None => None,
        Some(Value::String(dt)) => Some(ctx.expand_iri(dt, true).ok_or_else(|| {
            ParseError::InvalidDocument(format!("cannot expand datatype '{}'", dt))
        })?),
        Some(other) => {
            return Err(ParseError::InvalidDocument(format!(
                "@type of a value object must be a string, got {}",
                other
            )))
        }
    };

    let literal = match (raw, datatype, language) {
        (Value::Null, _, _) => return Ok(None),
        (Value::String(s), None, Some(Value::String(lang))) => {
            Literal::lang_string(s.clone(), lang.to_lowercase())
        }
        (_, None, Some(_)) => {
            return Err(ParseError::InvalidDocument(
                "@language requires a string @value and string language tag".into(),
            ))
        }
        (Value::String(s), Some(dt), None) => Literal::typed(s.clone(), dt),
        (Value::String(s), None, None) => Literal::string(s.clone()),
        (Value::Number(n), Some(dt), None) => Literal::typed(n.to_string(), dt),
        (Value::Number(n), None, None) => number_literal(n),
        (Value::Bool(b), Some(dt), None) => Literal::typed(b.to_string(), dt),
        (Value::Bool(b), None, None) => Literal::boolean(*b),
        (other, _, _) => {
            return Err(ParseError::InvalidDocument(format!(
                "@value must be a scalar, got {}",
                other
            )))
        }
    };

    Ok(Some(literal))
}
