//! FFI-oriented JSON API for cross-language bindings.
//!
//! All functions take string inputs and return JSON strings,
//! minimizing the FFI surface area.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{ContextStack, ResolvedContext};
use crate::document::{process_documents, Document, ResolvedElement};
use crate::errors::{ParsingError, ParsingErrorCollection};
use crate::resolver::ContextResolver;
use crate::types::*;

// ---------------------------------------------------------------------------
// Result types (serialized to JSON output)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct FfiResult<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of resolving a single `@context` value.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOutput {
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtdl_version: Option<u32>,
    pub affiliates: Vec<String>,
    pub scope: ScopedDefinitions,
    pub errors: Vec<ParsingError>,
}

impl ContextOutput {
    fn new(context: Option<ResolvedContext>, errors: Vec<ParsingError>) -> Self {
        match context {
            Some(context) => Self {
                resolved: true,
                dtdl_version: Some(context.dtdl_version()),
                affiliates: context.affiliates.iter().map(|a| a.specifier()).collect(),
                scope: context.scope,
                errors,
            },
            None => Self {
                resolved: false,
                dtdl_version: None,
                affiliates: Vec::new(),
                scope: ScopedDefinitions::default(),
                errors,
            },
        }
    }
}

/// Outcome of processing a batch of documents.
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub elements: Vec<ResolvedElement>,
    pub errors: Vec<ParsingError>,
}

// ---------------------------------------------------------------------------
// Public FFI functions
// ---------------------------------------------------------------------------

/// Resolve one `@context` value and return the resulting scope as JSON.
///
/// Input: JSON `@context` value + options JSON (`ResolverOptions`)
/// Output: JSON envelope containing a `ContextOutput`
pub fn resolve_context_to_json(context_json: &str, options_json: &str) -> String {
    let options: ResolverOptions = match serde_json::from_str(options_json) {
        Ok(o) => o,
        Err(e) => return failure_json(format!("Invalid options JSON: {e}")),
    };
    let context: Value = match serde_json::from_str(context_json) {
        Ok(v) => v,
        Err(e) => return failure_json(format!("Invalid context JSON: {e}")),
    };

    let result = std::panic::catch_unwind(move || {
        let resolver = ContextResolver::new(options);
        let mut errors: Vec<ParsingError> = Vec::new();
        let resolved = ContextStack::from_json(&context, &mut errors)
            .and_then(|stack| resolver.process_context(&stack, None, &mut errors))
            .ok();
        ContextOutput::new(resolved, errors)
    });

    match result {
        Ok(output) => success_json(output),
        Err(_) => failure_json("Internal resolver panic".to_string()),
    }
}

/// Process a batch of documents in order and return every resolved element
/// and every error as JSON.
///
/// Input: JSON array of `{ "source": "...", "content": <document> }` objects
/// Output: JSON envelope containing a `BatchOutput`
pub fn process_documents_to_json(documents_json: &str, options_json: &str) -> String {
    #[derive(Deserialize)]
    struct DocumentInput {
        source: String,
        content: Value,
    }

    let options: ResolverOptions = match serde_json::from_str(options_json) {
        Ok(o) => o,
        Err(e) => return failure_json(format!("Invalid options JSON: {e}")),
    };
    let inputs: Vec<DocumentInput> = match serde_json::from_str(documents_json) {
        Ok(d) => d,
        Err(e) => return failure_json(format!("Invalid input JSON: {e}")),
    };

    let result = std::panic::catch_unwind(move || {
        let documents: Vec<Document> = inputs
            .into_iter()
            .map(|d| Document {
                source: d.source,
                content: d.content,
            })
            .collect();
        let mut resolver = ContextResolver::new(options);
        let mut errors = ParsingErrorCollection::new();
        let elements = process_documents(&mut resolver, &documents, &mut errors);
        BatchOutput {
            elements,
            errors: errors.into_vec(),
        }
    });

    match result {
        Ok(output) => success_json(output),
        Err(_) => failure_json("Internal resolver panic".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

fn success_json<T: Serialize>(data: T) -> String {
    let ffi_result = FfiResult {
        success: true,
        data: Some(data),
        error: None,
    };
    serde_json::to_string(&ffi_result)
        .unwrap_or_else(|e| failure_json(format!("JSON serialization error: {e}")))
}

fn failure_json(message: String) -> String {
    serde_json::to_string(&FfiResult::<()> {
        success: false,
        data: None,
        error: Some(message),
    })
    .unwrap()
}
