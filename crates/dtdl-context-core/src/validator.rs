use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::catalogs::{DTMI_PREFIX, DTMI_SCHEME};
use crate::dtmi::{Identifier, IdentifierValidator};
use crate::errors::{abort, ErrorKind, ErrorSink, ParsingError, Resolution, UnitAborted};
use crate::vocabulary::VocabularyHistory;

/// Permissible term names: no leading `@`, no `:`, `@` allowed after the first character.
static RE_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-][A-Za-z0-9_.\-@]*$").unwrap());

/// Where a term was declared; selects the `local*` or `extension*` error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermScope {
    Local,
    Extension,
}

impl TermScope {
    fn kind(self, local: ErrorKind, extension: ErrorKind) -> ErrorKind {
        match self {
            TermScope::Local => local,
            TermScope::Extension => extension,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            TermScope::Local => "local context",
            TermScope::Extension => "extension context",
        }
    }
}

/// Outcome of resolving one term definition.
#[derive(Debug, Clone, PartialEq)]
pub enum TermResolution {
    Identifier(Identifier),
    Prefix(String),
    /// `null` definition: the term is explicitly undefined.
    Absent,
}

/// Check a declared term name against the term grammar and the DTDL
/// reserved terms. Every independent violation is reported.
pub fn validate_term_name(
    term: &str,
    scope: TermScope,
    dtdl_history: &VocabularyHistory,
    sink: &mut dyn ErrorSink,
) -> Resolution<()> {
    if term.is_empty() {
        return abort(
            sink,
            ParsingError::new(
                scope.kind(ErrorKind::LocalTermEmpty, ErrorKind::ExtensionTermEmpty),
                format!("A term defined in a {} is an empty string.", scope.describe()),
            ),
        );
    }

    let mut failed = false;

    if term == DTMI_SCHEME {
        sink.report(
            ParsingError::new(
                scope.kind(
                    ErrorKind::LocalTermSchemePrefix,
                    ErrorKind::ExtensionTermSchemePrefix,
                ),
                format!(
                    "Term \"{term}\" defined in a {} is the identifier scheme prefix.",
                    scope.describe()
                ),
            )
            .with("term", term),
        );
        failed = true;
    }

    if !RE_TERM.is_match(term) {
        sink.report(
            ParsingError::new(
                scope.kind(ErrorKind::LocalTermInvalid, ErrorKind::ExtensionTermInvalid),
                format!(
                    "Term \"{term}\" defined in a {} contains characters not permitted in a term.",
                    scope.describe()
                ),
            )
            .with("term", term),
        );
        failed = true;
    }

    if dtdl_history.is_term_reserved(term) {
        sink.report(
            ParsingError::new(
                scope.kind(ErrorKind::LocalTermReserved, ErrorKind::ExtensionTermReserved),
                format!(
                    "Term \"{term}\" defined in a {} is reserved by the DTDL language context.",
                    scope.describe()
                ),
            )
            .with("term", term),
        );
        failed = true;
    }

    if failed {
        Err(UnitAborted)
    } else {
        Ok(())
    }
}

/// Classify and validate a raw term definition.
///
/// Suffix `:` or `/` means a prefix (stored verbatim, unchecked); a `dtmi:`
/// value must be a valid reference for `dtdl_version`; anything else must
/// be an absolute URI.
pub fn resolve_term_definition(
    term: &str,
    definition: Option<&str>,
    dtdl_version: u32,
    scope: TermScope,
    identifiers: &dyn IdentifierValidator,
    sink: &mut dyn ErrorSink,
) -> Resolution<TermResolution> {
    let Some(definition) = definition else {
        return Ok(TermResolution::Absent);
    };

    if definition.ends_with(':') || definition.ends_with('/') {
        return Ok(TermResolution::Prefix(definition.to_string()));
    }

    if definition.starts_with(DTMI_PREFIX) {
        let dtmi = identifiers
            .parse(definition)
            .filter(|_| identifiers.is_reference_valid(definition, dtdl_version));
        return match dtmi {
            Some(dtmi) => Ok(TermResolution::Identifier(Identifier::Dtmi(dtmi))),
            None => abort(
                sink,
                ParsingError::new(
                    scope.kind(
                        ErrorKind::LocalTermDefinitionInvalidDtmi,
                        ErrorKind::ExtensionTermDefinitionInvalidDtmi,
                    ),
                    format!(
                        "Term \"{term}\" is defined as \"{definition}\", which is not a valid DTMI for DTDL version {dtdl_version}."
                    ),
                )
                .with("term", term)
                .with("definition", definition)
                .with("version", dtdl_version),
            ),
        };
    }

    match Url::parse(definition) {
        Ok(url) => Ok(TermResolution::Identifier(Identifier::Uri(url))),
        Err(e) => abort(
            sink,
            ParsingError::new(
                scope.kind(
                    ErrorKind::LocalTermDefinitionInvalidUri,
                    ErrorKind::ExtensionTermDefinitionInvalidUri,
                ),
                format!(
                    "Term \"{term}\" is defined as \"{definition}\", which is not an absolute URI ({e})."
                ),
            )
            .with("term", term)
            .with("definition", definition),
        ),
    }
}
