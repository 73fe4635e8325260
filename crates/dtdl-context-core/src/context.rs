//! JSON `@context` front-end and the fully resolved context of an element.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::catalogs::DTMI_PREFIX;
use crate::errors::{ErrorKind, ErrorSink, ParsingError, Resolution, UnitAborted};
use crate::types::*;
use crate::vocabulary::VersionedVocabulary;

// ---------------------------------------------------------------------------
// Context stack
// ---------------------------------------------------------------------------

/// Ordered entries of one `@context` declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStack {
    entries: Vec<ContextEntry>,
}

impl ContextStack {
    pub fn new(entries: Vec<ContextEntry>) -> Self {
        Self { entries }
    }

    /// Build a stack from a JSON `@context` value: a string, an object, or
    /// an array of those. Every malformed entry and definition is reported.
    pub fn from_json(value: &Value, sink: &mut dyn ErrorSink) -> Resolution<Self> {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut entries = Vec::with_capacity(items.len());
        let mut failed = false;
        for (index, item) in items.into_iter().enumerate() {
            match item {
                Value::String(specifier) => entries.push(ContextEntry::Remote(specifier.clone())),
                Value::Object(map) => {
                    let mut definitions = LocalDefinitions::new();
                    for (term, definition) in map {
                        match definition_text(definition) {
                            Some(text) => {
                                definitions.declarations.insert(term.clone(), text);
                            }
                            None => {
                                sink.report(
                                    ParsingError::new(
                                        ErrorKind::InvalidTermDefinition,
                                        format!(
                                            "Definition of term \"{term}\" must be a string, null, or an object with a string \"@id\"."
                                        ),
                                    )
                                    .with("term", term)
                                    .with("definition", definition),
                                );
                                failed = true;
                            }
                        }
                    }
                    entries.push(ContextEntry::Local(definitions));
                }
                other => {
                    sink.report(
                        ParsingError::new(
                            ErrorKind::InvalidContextEntry,
                            format!(
                                "Context entry {index} must be a string specifier or an object of term definitions."
                            ),
                        )
                        .with("index", index)
                        .with("value", other),
                    );
                    failed = true;
                }
            }
        }

        if failed {
            Err(UnitAborted)
        } else {
            Ok(Self { entries })
        }
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = ContextComponent<'_>> {
        let last = self.entries.len().saturating_sub(1);
        self.entries
            .iter()
            .enumerate()
            .map(move |(index, entry)| ContextComponent {
                index,
                is_last: index == last,
                entry,
            })
    }
}

/// `Some(None)` for `null`, `Some(Some(..))` for a usable definition.
fn definition_text(value: &Value) -> Option<Option<String>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) => Some(Some(s.clone())),
        Value::Object(map) => match map.get("@id") {
            Some(Value::String(s)) => Some(Some(s.clone())),
            Some(Value::Null) => Some(None),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Resolved context
// ---------------------------------------------------------------------------

/// Everything an element's `@context` resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContext {
    pub dtdl: Arc<VersionedVocabulary>,
    pub affiliates: Vec<AffiliateContext>,
    pub scope: ScopedDefinitions,
}

impl ResolvedContext {
    pub fn dtdl_version(&self) -> u32 {
        self.dtdl.major_version()
    }

    /// Expand a term or compact identifier to its full identifier.
    ///
    /// Local definitions win, then affiliates (last declared first), then
    /// the DTDL vocabulary. `prefix:suffix` forms expand through a matching
    /// prefix; absolute identifiers pass through unchanged. A name the local
    /// block declares `null` expands to nothing.
    pub fn expand_term(&self, term: &str) -> Option<String> {
        if self.scope.is_undefined(term) {
            return None;
        }
        if let Some(id) = self.scope.terms.get(term) {
            return Some(id.to_string());
        }

        if let Some((prefix, suffix)) = term.split_once(':') {
            if let Some(expansion) = self.expand_prefix(prefix) {
                return Some(format!("{expansion}{suffix}"));
            }
            if term.starts_with(DTMI_PREFIX) || Url::parse(term).is_ok() {
                return Some(term.to_string());
            }
            return None;
        }

        self.affiliates
            .iter()
            .rev()
            .map(|a| a.vocabulary.as_ref())
            .chain(std::iter::once(self.dtdl.as_ref()))
            .find_map(|v| v.term(term))
            .map(ToString::to_string)
    }

    fn expand_prefix(&self, prefix: &str) -> Option<&str> {
        if self.scope.is_undefined(prefix) {
            return None;
        }
        if let Some(p) = self.scope.prefixes.get(prefix) {
            return Some(p.as_str());
        }
        self.affiliates
            .iter()
            .rev()
            .map(|a| a.vocabulary.as_ref())
            .chain(std::iter::once(self.dtdl.as_ref()))
            .find_map(|v| v.prefix(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_string_context() {
        let mut sink: Vec<ParsingError> = Vec::new();
        let stack = ContextStack::from_json(&json!("dtmi:dtdl:context;3"), &mut sink).unwrap();
        assert_eq!(
            stack.entries(),
            &[ContextEntry::Remote("dtmi:dtdl:context;3".into())]
        );
    }

    #[test]
    fn array_with_local_block() {
        let mut sink: Vec<ParsingError> = Vec::new();
        let value = json!([
            "dtmi:dtdl:context;3",
            "dtmi:dtdl:extension:mqtt;1",
            { "sensor": "dtmi:com:example:Sensor;1", "gone": null, "ex": { "@id": "https://example.com/" } }
        ]);
        let stack = ContextStack::from_json(&value, &mut sink).unwrap();
        assert_eq!(stack.len(), 3);

        let components: Vec<_> = stack.components().collect();
        assert!(!components[0].is_last);
        assert!(components[2].is_last);

        let ContextEntry::Local(defs) = &stack.entries()[2] else {
            panic!("expected local block");
        };
        assert_eq!(
            defs.declarations.get("sensor"),
            Some(&Some("dtmi:com:example:Sensor;1".to_string()))
        );
        assert_eq!(defs.declarations.get("gone"), Some(&None));
        assert_eq!(
            defs.declarations.get("ex"),
            Some(&Some("https://example.com/".to_string()))
        );
    }

    #[test]
    fn reports_every_malformed_entry() {
        let mut sink: Vec<ParsingError> = Vec::new();
        let value = json!(["dtmi:dtdl:context;3", 42, { "bad": 7 }, true]);
        let result = ContextStack::from_json(&value, &mut sink);
        assert_eq!(result, Err(UnitAborted));
        let kinds: Vec<ErrorKind> = sink.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::InvalidContextEntry,
                ErrorKind::InvalidTermDefinition,
                ErrorKind::InvalidContextEntry
            ]
        );
    }

    #[test]
    fn undefined_name_expands_to_nothing() {
        let dtdl = crate::catalogs::DTDL_CONTEXT_HISTORY
            .versions()
            .iter()
            .find(|v| v.major_version() == 3)
            .cloned()
            .unwrap();
        let mut scope = ScopedDefinitions::default();
        scope.undefined.insert("dtdl".to_string());
        scope.undefined.insert("Interface".to_string());
        let context = ResolvedContext {
            dtdl,
            affiliates: Vec::new(),
            scope,
        };

        assert_eq!(context.expand_term("Interface"), None);
        // No longer a prefix, so the compact form reads as an absolute URI.
        assert_eq!(
            context.expand_term("dtdl:class:Telemetry;3").as_deref(),
            Some("dtdl:class:Telemetry;3")
        );
        assert_eq!(
            context.expand_term("Telemetry").as_deref(),
            Some("dtmi:dtdl:class:Telemetry;3")
        );
        assert_eq!(
            context.expand_term("dtmi:com:example:Thing;1").as_deref(),
            Some("dtmi:com:example:Thing;1")
        );
    }
}
