//! Parsing errors and the sink they are reported to.
//!
//! Resolution never fails fast on the first problem: every violation is
//! recorded as a [`ParsingError`] in an [`ErrorSink`], and the operation that
//! found it returns [`UnitAborted`] so the caller abandons the current unit of
//! work while the session keeps collecting errors from other units.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Validation identifier of a reported error (serialized in camelCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    // Malformed specifiers
    InvalidContextSpecifier,
    InvalidContextSpecifierForVersion,
    NonDtmiContextSpecifier,
    // Version resolution
    MissingContextVersion,
    UnrecognizedContextVersion,
    DisallowedContextVersion,
    UnresolvableContextVersion,
    // Placement
    LocalContextNotLast,
    DtdlContextFollowsAffiliate,
    MissingDtdlContext,
    // Unresolved references
    UnresolvableContextSpecifier,
    // Term validity, local scope
    LocalTermEmpty,
    LocalTermSchemePrefix,
    LocalTermInvalid,
    LocalTermReserved,
    LocalTermDefinitionInvalidDtmi,
    LocalTermDefinitionInvalidUri,
    // Term validity, extension scope
    ExtensionTermEmpty,
    ExtensionTermSchemePrefix,
    ExtensionTermInvalid,
    ExtensionTermReserved,
    ExtensionTermDefinitionInvalidDtmi,
    ExtensionTermDefinitionInvalidUri,
    // Extension registration
    ExtensionContextReserved,
    DuplicateExtensionVersion,
    // JSON context front-end
    InvalidContextEntry,
    InvalidTermDefinition,
    // Element identifiers
    ReservedIdentifier,
}

impl ErrorKind {
    /// The camelCase validation identifier.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidContextSpecifier => "invalidContextSpecifier",
            ErrorKind::InvalidContextSpecifierForVersion => "invalidContextSpecifierForVersion",
            ErrorKind::NonDtmiContextSpecifier => "nonDtmiContextSpecifier",
            ErrorKind::MissingContextVersion => "missingContextVersion",
            ErrorKind::UnrecognizedContextVersion => "unrecognizedContextVersion",
            ErrorKind::DisallowedContextVersion => "disallowedContextVersion",
            ErrorKind::UnresolvableContextVersion => "unresolvableContextVersion",
            ErrorKind::LocalContextNotLast => "localContextNotLast",
            ErrorKind::DtdlContextFollowsAffiliate => "dtdlContextFollowsAffiliate",
            ErrorKind::MissingDtdlContext => "missingDtdlContext",
            ErrorKind::UnresolvableContextSpecifier => "unresolvableContextSpecifier",
            ErrorKind::LocalTermEmpty => "localTermEmpty",
            ErrorKind::LocalTermSchemePrefix => "localTermSchemePrefix",
            ErrorKind::LocalTermInvalid => "localTermInvalid",
            ErrorKind::LocalTermReserved => "localTermReserved",
            ErrorKind::LocalTermDefinitionInvalidDtmi => "localTermDefinitionInvalidDtmi",
            ErrorKind::LocalTermDefinitionInvalidUri => "localTermDefinitionInvalidUri",
            ErrorKind::ExtensionTermEmpty => "extensionTermEmpty",
            ErrorKind::ExtensionTermSchemePrefix => "extensionTermSchemePrefix",
            ErrorKind::ExtensionTermInvalid => "extensionTermInvalid",
            ErrorKind::ExtensionTermReserved => "extensionTermReserved",
            ErrorKind::ExtensionTermDefinitionInvalidDtmi => "extensionTermDefinitionInvalidDtmi",
            ErrorKind::ExtensionTermDefinitionInvalidUri => "extensionTermDefinitionInvalidUri",
            ErrorKind::ExtensionContextReserved => "extensionContextReserved",
            ErrorKind::DuplicateExtensionVersion => "duplicateExtensionVersion",
            ErrorKind::InvalidContextEntry => "invalidContextEntry",
            ErrorKind::InvalidTermDefinition => "invalidTermDefinition",
            ErrorKind::ReservedIdentifier => "reservedIdentifier",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Parsing error
// ---------------------------------------------------------------------------

/// A single reported problem, with the structured values that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {cause}")]
pub struct ParsingError {
    #[serde(rename = "validationId")]
    pub kind: ErrorKind,
    pub cause: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Document the error was found in, stamped by the collecting sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

impl ParsingError {
    pub fn new(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
            attributes: BTreeMap::new(),
            document: None,
        }
    }

    /// Attach a structured attribute (`contextSpecifier`, `term`, `version`, ...).
    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Abort marker
// ---------------------------------------------------------------------------

/// Returned once every error for the current unit has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unit of work aborted after reported errors")]
pub struct UnitAborted;

/// Outcome of a resolution or validation step.
pub type Resolution<T> = Result<T, UnitAborted>;

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of reported parsing errors.
pub trait ErrorSink {
    fn report(&mut self, error: ParsingError);
}

impl ErrorSink for Vec<ParsingError> {
    fn report(&mut self, error: ParsingError) {
        self.push(error);
    }
}

/// Report `error` and abort the current unit.
pub(crate) fn abort<T>(sink: &mut dyn ErrorSink, error: ParsingError) -> Resolution<T> {
    sink.report(error);
    Err(UnitAborted)
}

/// Session-wide error list; stamps the current document on each error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsingErrorCollection {
    errors: Vec<ParsingError>,
    #[serde(skip)]
    document: Option<String>,
}

impl ParsingErrorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document subsequent errors are attributed to.
    pub fn set_document(&mut self, document: Option<&str>) {
        self.document = document.map(String::from);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsingError> {
        self.errors.iter()
    }

    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn into_vec(self) -> Vec<ParsingError> {
        self.errors
    }
}

impl ErrorSink for ParsingErrorCollection {
    fn report(&mut self, mut error: ParsingError) {
        if error.document.is_none() {
            error.document = self.document.clone();
        }
        tracing::debug!(kind = %error.kind, cause = %error.cause, "parsing error reported");
        self.errors.push(error);
    }
}

impl<'a> IntoIterator for &'a ParsingErrorCollection {
    type Item = &'a ParsingError;
    type IntoIter = std::slice::Iter<'a, ParsingError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
