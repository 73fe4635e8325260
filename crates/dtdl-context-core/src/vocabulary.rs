use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::dtmi::Identifier;
use crate::types::ScopedDefinitions;

// ---------------------------------------------------------------------------
// Version pair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionPair {
    pub major: u32,
    pub minor: u32,
}

impl VersionPair {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for VersionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

/// Render a version list the way error messages show it: `2, 3, 4`.
pub fn format_versions(versions: &[VersionPair]) -> String {
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VocabularyError {
    #[error("term \"{0}\" is defined as both a term and a prefix")]
    TermDefinedTwice(String),
    #[error("version {version} of \"{family}\" is already recorded")]
    DuplicateVersion { family: String, version: VersionPair },
}

// ---------------------------------------------------------------------------
// Versioned vocabulary
// ---------------------------------------------------------------------------

/// Term and prefix table of one version of one vocabulary family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionedVocabulary {
    major_version: u32,
    minor_version: u32,
    term_definitions: IndexMap<String, Identifier>,
    prefix_definitions: IndexMap<String, String>,
}

impl VersionedVocabulary {
    pub fn new(
        major_version: u32,
        minor_version: u32,
        term_definitions: IndexMap<String, Identifier>,
        prefix_definitions: IndexMap<String, String>,
    ) -> Result<Self, VocabularyError> {
        if let Some(term) = term_definitions
            .keys()
            .find(|t| prefix_definitions.contains_key(*t))
        {
            return Err(VocabularyError::TermDefinedTwice(term.clone()));
        }
        Ok(Self {
            major_version,
            minor_version,
            term_definitions,
            prefix_definitions,
        })
    }

    /// Build from the tables of a merged scope, which never share a name.
    pub(crate) fn from_scope(
        major_version: u32,
        minor_version: u32,
        scope: ScopedDefinitions,
    ) -> Self {
        Self {
            major_version,
            minor_version,
            term_definitions: scope.terms,
            prefix_definitions: scope.prefixes,
        }
    }

    pub fn major_version(&self) -> u32 {
        self.major_version
    }

    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    pub fn version(&self) -> VersionPair {
        VersionPair::new(self.major_version, self.minor_version)
    }

    pub fn term_definitions(&self) -> &IndexMap<String, Identifier> {
        &self.term_definitions
    }

    pub fn prefix_definitions(&self) -> &IndexMap<String, String> {
        &self.prefix_definitions
    }

    pub fn term(&self, name: &str) -> Option<&Identifier> {
        self.term_definitions.get(name)
    }

    pub fn prefix(&self, name: &str) -> Option<&str> {
        self.prefix_definitions.get(name).map(String::as_str)
    }

    pub fn defines(&self, name: &str) -> bool {
        self.term_definitions.contains_key(name) || self.prefix_definitions.contains_key(name)
    }
}

// ---------------------------------------------------------------------------
// Vocabulary history
// ---------------------------------------------------------------------------

/// All recorded versions of one vocabulary family.
///
/// Reservation queries span every version ever recorded, so a term or
/// identifier stays reserved after newer versions drop it.
#[derive(Debug, Clone)]
pub struct VocabularyHistory {
    name: String,
    versions: Vec<Arc<VersionedVocabulary>>,
    reserved_terms: HashSet<String>,
    reserved_identifiers: HashSet<String>,
    reserved_prefixes: Vec<String>,
}

impl VocabularyHistory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: Vec::new(),
            reserved_terms: HashSet::new(),
            reserved_identifiers: HashSet::new(),
            reserved_prefixes: Vec::new(),
        }
    }

    pub fn with_versions(
        name: impl Into<String>,
        versions: impl IntoIterator<Item = VersionedVocabulary>,
    ) -> Result<Self, VocabularyError> {
        let mut history = Self::new(name);
        for vocabulary in versions {
            history.add_version(vocabulary)?;
        }
        Ok(history)
    }

    /// Family name: the version-stripped context identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a version and return the stored copy. Recorded versions are
    /// never replaced.
    pub fn add_version(
        &mut self,
        vocabulary: VersionedVocabulary,
    ) -> Result<Arc<VersionedVocabulary>, VocabularyError> {
        let version = vocabulary.version();
        if self.versions.iter().any(|v| v.version() == version) {
            return Err(VocabularyError::DuplicateVersion {
                family: self.name.clone(),
                version,
            });
        }

        self.reserved_terms
            .extend(vocabulary.term_definitions.keys().cloned());
        self.reserved_terms
            .extend(vocabulary.prefix_definitions.keys().cloned());
        self.reserved_identifiers.extend(
            vocabulary
                .term_definitions
                .values()
                .map(|id| id.as_str().to_string()),
        );
        for prefix in vocabulary.prefix_definitions.values() {
            if !self.reserved_prefixes.contains(prefix) {
                self.reserved_prefixes.push(prefix.clone());
            }
        }

        let vocabulary = Arc::new(vocabulary);
        self.versions.push(Arc::clone(&vocabulary));
        Ok(vocabulary)
    }

    pub fn versions(&self) -> &[Arc<VersionedVocabulary>] {
        &self.versions
    }

    /// Exact (major, minor) match; no closest-version fallback.
    pub fn try_get_matching_version(
        &self,
        major: u32,
        minor: u32,
    ) -> Option<&Arc<VersionedVocabulary>> {
        self.versions
            .iter()
            .find(|v| v.major_version == major && v.minor_version == minor)
    }

    pub fn available_versions(&self) -> Vec<VersionPair> {
        self.versions.iter().map(|v| v.version()).collect()
    }

    pub fn is_term_reserved(&self, name: &str) -> bool {
        self.reserved_terms.contains(name)
    }

    /// Reverse lookup of a term by identifier; first match wins.
    pub fn lookup_term_for_identifier(&self, id: &str) -> Option<&str> {
        self.versions.iter().find_map(|v| {
            v.term_definitions
                .iter()
                .find(|(_, value)| value.as_str() == id)
                .map(|(term, _)| term.as_str())
        })
    }

    /// An identifier is reserved if some version maps a term to it, or it
    /// lies under one of the family's prefix expansions.
    pub fn is_identifier_reserved(&self, id: &str) -> bool {
        self.reserved_identifiers.contains(id)
            || self.reserved_prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtmi::Dtmi;

    fn id(s: &str) -> Identifier {
        Identifier::Dtmi(Dtmi::parse(s).unwrap())
    }

    fn vocab(major: u32, minor: u32, terms: &[(&str, &str)]) -> VersionedVocabulary {
        let terms = terms
            .iter()
            .map(|(t, v)| (t.to_string(), id(v)))
            .collect();
        VersionedVocabulary::new(major, minor, terms, IndexMap::new()).unwrap()
    }

    fn sample_history() -> VocabularyHistory {
        VocabularyHistory::with_versions(
            "dtmi:com:example:ext",
            [
                vocab(1, 0, &[("Legacy", "dtmi:com:example:Legacy;1")]),
                vocab(2, 0, &[("Current", "dtmi:com:example:Current;2")]),
                vocab(2, 1, &[("Current", "dtmi:com:example:Current;2")]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn matches_exact_versions_only() {
        let history = sample_history();
        for (major, minor) in [(1, 0), (2, 0), (2, 1)] {
            let v = history.try_get_matching_version(major, minor).unwrap();
            assert_eq!((v.major_version(), v.minor_version()), (major, minor));
        }
        assert!(history.try_get_matching_version(1, 1).is_none());
        assert!(history.try_get_matching_version(3, 0).is_none());
        assert!(history.try_get_matching_version(0, 0).is_none());
    }

    #[test]
    fn available_versions_in_insertion_order() {
        let history = sample_history();
        assert_eq!(
            history.available_versions(),
            vec![
                VersionPair::new(1, 0),
                VersionPair::new(2, 0),
                VersionPair::new(2, 1)
            ]
        );
        assert_eq!(format_versions(&history.available_versions()), "1, 2, 2.1");
    }

    #[test]
    fn reserved_terms_span_superseded_versions() {
        let history = sample_history();
        assert!(history.is_term_reserved("Legacy"));
        assert!(history.is_term_reserved("Current"));
        assert!(!history.is_term_reserved("Other"));
    }

    #[test]
    fn reservation_is_monotonic() {
        let mut history = VocabularyHistory::new("dtmi:com:example:ext");
        history
            .add_version(vocab(1, 0, &[("Alpha", "dtmi:com:example:Alpha;1")]))
            .unwrap();
        assert!(history.is_term_reserved("Alpha"));
        history
            .add_version(vocab(2, 0, &[("Beta", "dtmi:com:example:Beta;1")]))
            .unwrap();
        assert!(history.is_term_reserved("Alpha"));
        assert!(history.is_term_reserved("Beta"));
    }

    #[test]
    fn add_version_returns_stored_vocabulary() {
        let mut history = VocabularyHistory::new("dtmi:com:example:ext");
        let stored = history
            .add_version(vocab(1, 0, &[("Alpha", "dtmi:com:example:Alpha;1")]))
            .unwrap();
        assert!(Arc::ptr_eq(&stored, &history.versions()[0]));
        assert!(stored.term("Alpha").is_some());
    }

    #[test]
    fn from_scope_keeps_both_tables() {
        let mut scope = ScopedDefinitions::default();
        scope.terms.insert("Alpha".to_string(), id("dtmi:com:example:Alpha;1"));
        scope.prefixes.insert("ex".to_string(), "https://example.com/".to_string());
        scope.undefined.insert("gone".to_string());

        let vocabulary = VersionedVocabulary::from_scope(1, 2, scope);
        assert_eq!(vocabulary.version(), VersionPair::new(1, 2));
        assert!(vocabulary.term("Alpha").is_some());
        assert_eq!(vocabulary.prefix("ex"), Some("https://example.com/"));
        assert!(!vocabulary.defines("gone"));
    }

    #[test]
    fn duplicate_version_rejected() {
        let mut history = sample_history();
        let err = history.add_version(vocab(2, 0, &[])).unwrap_err();
        assert_eq!(
            err,
            VocabularyError::DuplicateVersion {
                family: "dtmi:com:example:ext".into(),
                version: VersionPair::new(2, 0)
            }
        );
        assert_eq!(history.versions().len(), 3);
    }

    #[test]
    fn term_and_prefix_tables_are_disjoint() {
        let mut terms = IndexMap::new();
        terms.insert("ex".to_string(), id("dtmi:com:example;1"));
        let mut prefixes = IndexMap::new();
        prefixes.insert("ex".to_string(), "dtmi:com:".to_string());
        let err = VersionedVocabulary::new(1, 0, terms, prefixes).unwrap_err();
        assert_eq!(err, VocabularyError::TermDefinedTwice("ex".into()));
    }

    #[test]
    fn reverse_lookup_first_match_wins() {
        let history = VocabularyHistory::with_versions(
            "dtmi:com:example:ext",
            [
                vocab(1, 0, &[("First", "dtmi:com:example:Shared;1")]),
                vocab(2, 0, &[("Second", "dtmi:com:example:Shared;1")]),
            ],
        )
        .unwrap();
        assert_eq!(
            history.lookup_term_for_identifier("dtmi:com:example:Shared;1"),
            Some("First")
        );
        assert_eq!(history.lookup_term_for_identifier("dtmi:other;1"), None);
    }

    #[test]
    fn identifiers_under_prefix_are_reserved() {
        let mut prefixes = IndexMap::new();
        prefixes.insert("ex".to_string(), "dtmi:com:example:".to_string());
        let mut history = VocabularyHistory::new("dtmi:com:example:ext");
        history
            .add_version(VersionedVocabulary::new(1, 0, IndexMap::new(), prefixes).unwrap())
            .unwrap();
        assert!(history.is_identifier_reserved("dtmi:com:example:Thing;1"));
        assert!(!history.is_identifier_reserved("dtmi:org:example:Thing;1"));
    }
}
