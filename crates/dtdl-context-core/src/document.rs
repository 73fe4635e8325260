//! Batch processing of DTDL documents: one unit of work per top-level element.

use serde::Serialize;
use serde_json::Value;

use crate::context::ContextStack;
use crate::errors::{
    ErrorKind, ErrorSink, ParsingError, ParsingErrorCollection, Resolution, UnitAborted,
};
use crate::resolver::ContextResolver;
use crate::types::ScopedDefinitions;

/// A parsed JSON document and the name it is reported under.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub content: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    /// An `@id` + `@context` element without `@type`: declares an extension context.
    ExtensionContext,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedElement {
    pub document: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: ElementKind,
    pub dtdl_version: u32,
    pub affiliates: Vec<String>,
    pub scope: ScopedDefinitions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

/// Resolve the contexts of every element of every document, in order.
///
/// A failed element is skipped after its errors are recorded; the batch
/// continues. Extension contexts declared by an element are visible to all
/// elements processed after it.
pub fn process_documents(
    resolver: &mut ContextResolver,
    documents: &[Document],
    errors: &mut ParsingErrorCollection,
) -> Vec<ResolvedElement> {
    let mut resolved = Vec::new();

    for document in documents {
        errors.set_document(Some(&document.source));
        let elements: Vec<&Value> = match &document.content {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        for (index, element) in elements.into_iter().enumerate() {
            match process_element(resolver, &document.source, index, element, errors) {
                Ok(element) => resolved.push(element),
                Err(_) => {
                    tracing::debug!(document = %document.source, index, "element skipped after errors")
                }
            }
        }
    }
    errors.set_document(None);

    resolved
}

fn process_element(
    resolver: &mut ContextResolver,
    source: &str,
    index: usize,
    element: &Value,
    sink: &mut dyn ErrorSink,
) -> Resolution<ResolvedElement> {
    let Some(context) = element.get("@context") else {
        sink.report(
            ParsingError::new(
                ErrorKind::MissingDtdlContext,
                format!("Element {index} has no @context declaration."),
            )
            .with("index", index),
        );
        return Err(UnitAborted);
    };

    let stack = ContextStack::from_json(context, sink)?;
    let id = element.get("@id").and_then(Value::as_str).map(String::from);

    if let (Some(id), None) = (&id, element.get("@type")) {
        let registered = resolver.register_extension_context(id, &stack, sink)?;
        return Ok(ResolvedElement {
            document: source.to_string(),
            index,
            id: Some(id.clone()),
            kind: ElementKind::ExtensionContext,
            dtdl_version: registered.dtdl_version,
            affiliates: Vec::new(),
            scope: ScopedDefinitions {
                terms: registered.vocabulary.term_definitions().clone(),
                prefixes: registered.vocabulary.prefix_definitions().clone(),
                ..ScopedDefinitions::default()
            },
            types: Vec::new(),
        });
    }

    let context = resolver.process_context(&stack, None, sink)?;

    if let Some(id) = &id {
        if resolver.is_identifier_reserved(id) {
            sink.report(
                ParsingError::new(
                    ErrorKind::ReservedIdentifier,
                    format!("Identifier \"{id}\" is reserved and cannot be used by a model element."),
                )
                .with("id", id),
            );
            return Err(UnitAborted);
        }
    }

    let types = match element.get("@type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
    .into_iter()
    .map(|t| context.expand_term(t).unwrap_or_else(|| t.to_string()))
    .collect();

    Ok(ResolvedElement {
        document: source.to_string(),
        index,
        id,
        kind: ElementKind::Model,
        dtdl_version: context.dtdl_version(),
        affiliates: context.affiliates.iter().map(|a| a.specifier()).collect(),
        scope: context.scope,
        types,
    })
}
