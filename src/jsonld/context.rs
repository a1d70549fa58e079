//! Active context: term definitions, `@vocab`, `@base` and keyword aliases

use super::ParseError;
use crate::graph::Iri;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// How string values of a term are interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// `"@type": "@id"`: strings are document-relative IRIs
    Id,
    /// `"@type": "@vocab"`: strings are vocabulary-relative IRIs
    Vocab,
    /// `"@type": "<datatype>"`: strings are typed literals
    Datatype(String),
}

/// A single term definition.
///
/// `iri` is `None` when the term is explicitly mapped to `null`, which
/// stops it from expanding through `@vocab`.
#[derive(Debug, Clone, PartialEq)]
pub struct TermDefinition {
    pub iri: Option<String>,
    pub coercion: Option<Coercion>,
}

/// The context in effect while expanding a node object
#[derive(Debug, Clone, Default)]
pub struct ActiveContext {
    base: Option<String>,
    vocab: Option<String>,
    language: Option<String>,
    terms: HashMap<String, TermDefinition>,
}

impl ActiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Default language for plain string values
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn definition(&self, term: &str) -> Option<&TermDefinition> {
        self.terms.get(term)
    }

    /// Apply a local `@context` value, producing a new active context.
    pub fn merge(&self, local: &Value) -> Result<ActiveContext, ParseError> {
        match local {
            Value::Null => Ok(ActiveContext {
                base: self.base.clone(),
                ..Default::default()
            }),
            Value::String(url) => Err(ParseError::Unsupported(format!(
                "remote context '{}'",
                url
            ))),
            Value::Array(items) => items.iter().try_fold(self.clone(), |ctx, item| ctx.merge(item)),
            Value::Object(map) => self.merge_object(map),
            other => Err(ParseError::InvalidDocument(format!(
                "@context must be an object, array, string or null, got {}",
                other
            ))),
        }
    }

    fn merge_object(&self, local: &Map<String, Value>) -> Result<ActiveContext, ParseError> {
        let mut ctx = self.clone();

        if let Some(base) = local.get("@base") {
            ctx.base = match base {
                Value::Null => None,
                Value::String(s) => Some(ctx.resolve(s)),
                _ => {
                    return Err(ParseError::InvalidDocument(
                        "@base must be a string or null".into(),
                    ))
                }
            };
        }

        if let Some(vocab) = local.get("@vocab") {
            ctx.vocab = match vocab {
                Value::Null => None,
                Value::String(s) => match ctx.expand_iri(s, true) {
                    Some(iri) => Some(iri),
                    None => {
                        return Err(ParseError::InvalidDocument(format!(
                            "cannot expand @vocab '{}'",
                            s
                        )))
                    }
                },
                _ => {
                    return Err(ParseError::InvalidDocument(
                        "@vocab must be a string or null".into(),
                    ))
                }
            };
        }

        if let Some(language) = local.get("@language") {
            ctx.language = match language {
                Value::Null => None,
                Value::String(s) => Some(s.to_lowercase()),
                _ => {
                    return Err(ParseError::InvalidDocument(
                        "@language must be a string or null".into(),
                    ))
                }
            };
        }

        let mut defined = HashMap::new();
        for term in local.keys() {
            if term.starts_with('@') {
                continue;
            }
            ctx.create_term(local, term, &mut defined)?;
        }

        Ok(ctx)
    }

    /// Create the definition for `term`, first defining any term of the
    /// same local context it depends on. `defined` tracks in-progress
    /// terms (`false`) so cycles are reported instead of recursing forever.
    fn create_term(
        &mut self,
        local: &Map<String, Value>,
        term: &str,
        defined: &mut HashMap<String, bool>,
    ) -> Result<(), ParseError> {
        match defined.get(term) {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(ParseError::InvalidDocument(format!(
                    "cyclic IRI mapping for term '{}'",
                    term
                )))
            }
            None => {}
        }
        defined.insert(term.to_string(), false);

        let definition = match &local[term] {
            Value::Null => TermDefinition { iri: None, coercion: None },
            Value::String(id) => TermDefinition {
                iri: Some(self.expand_in_definition(id, local, defined)?),
                coercion: None,
            },
            Value::Object(spec) => self.expanded_definition(term, spec, local, defined)?,
            other => {
                return Err(ParseError::InvalidDocument(format!(
                    "invalid definition for term '{}': {}",
                    term, other
                )))
            }
        };

        self.terms.insert(term.to_string(), definition);
        defined.insert(term.to_string(), true);
        Ok(())
    }

    fn expanded_definition(
        &mut self,
        term: &str,
        spec: &Map<String, Value>,
        local: &Map<String, Value>,
        defined: &mut HashMap<String, bool>,
    ) -> Result<TermDefinition, ParseError> {
        for unsupported in ["@reverse", "@context", "@nest"] {
            if spec.contains_key(unsupported) {
                return Err(ParseError::Unsupported(format!(
                    "{} in definition of '{}'",
                    unsupported, term
                )));
            }
        }
        if let Some(Value::String(container)) = spec.get("@container") {
            if container == "@list" {
                return Err(ParseError::Unsupported(format!("@list container on '{}'", term)));
            }
        }

        let iri = match spec.get("@id") {
            Some(Value::Null) => None,
            Some(Value::String(id)) => Some(self.expand_in_definition(id, local, defined)?),
            Some(_) => {
                return Err(ParseError::InvalidDocument(format!(
                    "@id of term '{}' must be a string",
                    term
                )))
            }
            None => Some(self.expand_in_definition(term, local, defined)?),
        };

        let coercion = match spec.get("@type") {
            None => None,
            Some(Value::String(ty)) if ty == "@id" => Some(Coercion::Id),
            Some(Value::String(ty)) if ty == "@vocab" => Some(Coercion::Vocab),
            Some(Value::String(ty)) => Some(Coercion::Datatype(
                self.expand_in_definition(ty, local, defined)?,
            )),
            Some(_) => {
                return Err(ParseError::InvalidDocument(format!(
                    "@type of term '{}' must be a string",
                    term
                )))
            }
        };

        Ok(TermDefinition { iri, coercion })
    }

    /// Expand an IRI that appears inside a term definition, defining the
    /// referenced prefix or term first when it belongs to the same local context.
    fn expand_in_definition(
        &mut self,
        value: &str,
        local: &Map<String, Value>,
        defined: &mut HashMap<String, bool>,
    ) -> Result<String, ParseError> {
        if let Some((prefix, _)) = value.split_once(':') {
            if local.contains_key(prefix) && !prefix.starts_with('@') {
                self.create_term(local, prefix, defined)?;
            }
        } else if local.contains_key(value) && defined.get(value) != Some(&false) {
            self.create_term(local, value, defined)?;
        }

        self.expand_iri(value, true).ok_or_else(|| {
            ParseError::InvalidDocument(format!("cannot expand '{}' to an absolute IRI", value))
        })
    }

    /// Expand a compact IRI, term or keyword.
    ///
    /// `vocab` selects vocabulary-relative expansion (property names,
    /// `@type` values). Otherwise relative values resolve against `@base`,
    /// and are returned as-is when no base is set.
    pub fn expand_iri(&self, value: &str, vocab: bool) -> Option<String> {
        if value.starts_with('@') {
            return Some(value.to_string());
        }

        if vocab {
            if let Some(def) = self.terms.get(value) {
                return def.iri.clone();
            }
        }

        if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix == "_" || suffix.starts_with("//") {
                return Some(value.to_string());
            }
            if let Some(TermDefinition { iri: Some(ns), .. }) = self.terms.get(prefix) {
                return Some(format!("{}{}", ns, suffix));
            }
            if Iri::is_absolute(value) {
                return Some(value.to_string());
            }
        }

        if vocab {
            return self.vocab.as_ref().map(|v| format!("{}{}", v, value));
        }

        Some(self.resolve(value))
    }

    /// Expand an object key. Returns a keyword or an absolute IRI; keys
    /// that expand to neither are dropped by the caller.
    pub fn expand_key(&self, key: &str) -> Option<String> {
        let expanded = self.expand_iri(key, true)?;
        let absolute = Iri::is_absolute(&expanded) && !expanded.starts_with("_:");
        if expanded.starts_with('@') || absolute {
            Some(expanded)
        } else {
            None
        }
    }

    /// Resolve a document-relative reference against `@base`.
    fn resolve(&self, reference: &str) -> String {
        let Some(base) = &self.base else {
            return reference.to_string();
        };
        if Iri::is_absolute(reference) {
            return reference.to_string();
        }
        if reference.is_empty() {
            return base.clone();
        }
        if reference.starts_with('#') {
            let stem = base.split('#').next().unwrap_or(base.as_str());
            return format!("{}{}", stem, reference);
        }
        match base.rfind('/') {
            Some(idx) => format!("{}{}", &base[..=idx], reference),
            None => format!("{}{}", base, reference),
        }
    }
}
