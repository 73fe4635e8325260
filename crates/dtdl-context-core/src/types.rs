use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::dtmi::Identifier;
use crate::vocabulary::{VersionPair, VersionedVocabulary};

// ---------------------------------------------------------------------------
// Resolver options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverOptions {
    /// Highest DTDL major version accepted in a core context specifier.
    pub max_dtdl_version: Option<u32>,
    /// Treat unknown extension contexts as unresolved instead of errors.
    pub allow_undefined_extensions: bool,
}

// ---------------------------------------------------------------------------
// Context entries
// ---------------------------------------------------------------------------

/// One entry of a context stack.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEntry {
    /// A context referenced by specifier, e.g. `dtmi:dtdl:context;3`.
    Remote(String),
    /// An inline block of term declarations.
    Local(LocalDefinitions),
}

impl ContextEntry {
    pub fn is_local(&self) -> bool {
        matches!(self, ContextEntry::Local(_))
    }
}

/// Term declarations of a local context block, in declaration order.
/// `None` marks a term explicitly declared `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalDefinitions {
    pub declarations: IndexMap<String, Option<String>>,
}

impl LocalDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, term: &str, definition: Option<&str>) -> Self {
        self.declarations
            .insert(term.to_string(), definition.map(String::from));
        self
    }
}

/// A context entry together with its place in the stack.
#[derive(Debug, Clone, Copy)]
pub struct ContextComponent<'a> {
    pub index: usize,
    pub is_last: bool,
    pub entry: &'a ContextEntry,
}

// ---------------------------------------------------------------------------
// Resolution results
// ---------------------------------------------------------------------------

/// Term and prefix tables of one document scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScopedDefinitions {
    pub terms: IndexMap<String, Identifier>,
    pub prefixes: IndexMap<String, String>,
    /// Names declared `null`. They stay undefined in this scope even when an
    /// affiliate or the DTDL vocabulary defines them.
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub undefined: IndexSet<String>,
}

impl ScopedDefinitions {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.prefixes.is_empty() && self.undefined.is_empty()
    }

    /// Drop a name from every table, whichever form it had.
    pub fn remove(&mut self, term: &str) {
        self.terms.shift_remove(term);
        self.prefixes.shift_remove(term);
        self.undefined.shift_remove(term);
    }

    pub fn is_undefined(&self, term: &str) -> bool {
        self.undefined.contains(term)
    }
}

/// A resolved affiliate (extension) context.
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliateContext {
    pub name: String,
    pub vocabulary: Arc<VersionedVocabulary>,
}

impl AffiliateContext {
    pub fn version(&self) -> VersionPair {
        self.vocabulary.version()
    }

    /// `name;major[.minor]`
    pub fn specifier(&self) -> String {
        format!("{};{}", self.name, self.version())
    }
}

/// An extension context recorded by [`register_extension_context`].
///
/// [`register_extension_context`]: crate::ContextResolver::register_extension_context
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredExtension {
    pub name: String,
    /// DTDL version the extension's terms were validated against.
    pub dtdl_version: u32,
    pub vocabulary: Arc<VersionedVocabulary>,
}
