use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalogs::{
    is_dtdl_context_specifier, DTDL_CONTEXT_HISTORY, DTDL_CONTEXT_NAME, DTMI_PREFIX,
    ENDOGENOUS_CONTEXT_HISTORIES,
};
use crate::context::{ContextStack, ResolvedContext};
use crate::dtmi::{Dtmi, DtmiValidator, IdentifierValidator};
use crate::errors::{abort, ErrorKind, ErrorSink, ParsingError, Resolution, UnitAborted};
use crate::types::*;
use crate::validator::{resolve_term_definition, validate_term_name, TermResolution, TermScope};
use crate::vocabulary::{format_versions, VersionPair, VersionedVocabulary, VocabularyHistory};

/// Resolves context specifiers and term declarations for one parse session.
///
/// The DTDL and endogenous extension histories are shared, read-only state.
/// Extension contexts declared by parsed documents accumulate in a table
/// owned by this resolver and live as long as it does.
pub struct ContextResolver {
    dtdl_history: Arc<VocabularyHistory>,
    endogenous_histories: Arc<IndexMap<String, VocabularyHistory>>,
    exogenous_histories: IndexMap<String, VocabularyHistory>,
    identifiers: Box<dyn IdentifierValidator>,
    options: ResolverOptions,
}

impl ContextResolver {
    /// A resolver over the compiled-in vocabularies.
    pub fn new(options: ResolverOptions) -> Self {
        Self::with_histories(
            Arc::clone(&DTDL_CONTEXT_HISTORY),
            Arc::clone(&ENDOGENOUS_CONTEXT_HISTORIES),
            options,
        )
    }

    pub fn with_histories(
        dtdl_history: Arc<VocabularyHistory>,
        endogenous_histories: Arc<IndexMap<String, VocabularyHistory>>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            dtdl_history,
            endogenous_histories,
            exogenous_histories: IndexMap::new(),
            identifiers: Box::new(DtmiValidator),
            options,
        }
    }

    /// Replace the identifier syntax rules.
    pub fn with_identifier_validator(
        mut self,
        identifiers: Box<dyn IdentifierValidator>,
    ) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn dtdl_history(&self) -> &VocabularyHistory {
        &self.dtdl_history
    }

    pub fn endogenous_histories(&self) -> &IndexMap<String, VocabularyHistory> {
        &self.endogenous_histories
    }

    pub fn exogenous_histories(&self) -> &IndexMap<String, VocabularyHistory> {
        &self.exogenous_histories
    }

    // -----------------------------------------------------------------------
    // DTDL context
    // -----------------------------------------------------------------------

    /// Resolve a DTDL language context specifier such as `dtmi:dtdl:context;3`.
    pub fn resolve_core_context(
        &self,
        specifier: &str,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<Arc<VersionedVocabulary>> {
        let dtmi = self.parse_context_specifier(specifier, sink)?;

        if !dtmi.is_versioned() {
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::MissingContextVersion,
                    format!("Context specifier \"{specifier}\" does not specify a DTDL version."),
                )
                .with("contextSpecifier", specifier),
            );
        }

        let Some(vocabulary) = self
            .dtdl_history
            .try_get_matching_version(dtmi.major_version(), dtmi.minor_version())
        else {
            let available = format_versions(&self.dtdl_history.available_versions());
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::UnrecognizedContextVersion,
                    format!(
                        "Context specifier \"{specifier}\" names DTDL version {}, which is not recognized; available versions are {available}.",
                        dtmi.major_version()
                    ),
                )
                .with("contextSpecifier", specifier)
                .with("version", dtmi.major_version())
                .with("availableVersions", &available),
            );
        };

        let mut failed = false;

        if let Some(max) = self.options.max_dtdl_version {
            if dtmi.major_version() > max {
                sink.report(
                    ParsingError::new(
                        ErrorKind::DisallowedContextVersion,
                        format!(
                            "DTDL version {} is not allowed; the maximum permitted version is {max}.",
                            dtmi.major_version()
                        ),
                    )
                    .with("contextSpecifier", specifier)
                    .with("version", dtmi.major_version())
                    .with("maxVersion", max),
                );
                failed = true;
            }
        }

        if !self
            .identifiers
            .is_reference_valid(specifier, dtmi.major_version())
        {
            sink.report(invalid_for_version(specifier, dtmi.major_version()));
            failed = true;
        }

        if failed {
            return Err(UnitAborted);
        }

        tracing::debug!(specifier, version = %vocabulary.version(), "resolved DTDL context");
        Ok(Arc::clone(vocabulary))
    }

    // -----------------------------------------------------------------------
    // Affiliate contexts
    // -----------------------------------------------------------------------

    /// Resolve an entry that follows the DTDL context in a context stack.
    ///
    /// `Ok(None)` means the entry has nothing to resolve here (a final local
    /// block) or, with `allow_undefined`, names an unknown context.
    pub fn resolve_affiliate_context(
        &self,
        component: ContextComponent<'_>,
        dtdl_version: u32,
        allow_undefined: bool,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<Option<AffiliateContext>> {
        let specifier = match component.entry {
            ContextEntry::Local(_) if component.is_last => return Ok(None),
            ContextEntry::Local(_) => {
                return abort(
                    sink,
                    ParsingError::new(
                        ErrorKind::LocalContextNotLast,
                        format!(
                            "Local context definition at position {} is not the last entry of the context.",
                            component.index
                        ),
                    )
                    .with("index", component.index),
                );
            }
            ContextEntry::Remote(specifier) => specifier.as_str(),
        };

        if is_dtdl_context_specifier(specifier) {
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::DtdlContextFollowsAffiliate,
                    format!(
                        "DTDL context \"{specifier}\" must be the first entry of the context, not follow another context."
                    ),
                )
                .with("contextSpecifier", specifier)
                .with("index", component.index),
            );
        }

        if !specifier.starts_with(DTMI_PREFIX) {
            if allow_undefined {
                tracing::warn!(specifier, "skipping non-DTMI context specifier");
                return Ok(None);
            }
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::NonDtmiContextSpecifier,
                    format!("Context specifier \"{specifier}\" is not a DTMI."),
                )
                .with("contextSpecifier", specifier),
            );
        }

        let dtmi = self.parse_context_specifier(specifier, sink)?;

        let mut failed = false;
        if !dtmi.is_versioned() {
            sink.report(
                ParsingError::new(
                    ErrorKind::MissingContextVersion,
                    format!("Context specifier \"{specifier}\" does not specify a version."),
                )
                .with("contextSpecifier", specifier),
            );
            failed = true;
        }
        if !self.identifiers.is_reference_valid(specifier, dtdl_version) {
            sink.report(invalid_for_version(specifier, dtdl_version));
            failed = true;
        }
        if failed {
            return Err(UnitAborted);
        }

        let name = dtmi.versionless();
        let Some(history) = self
            .endogenous_histories
            .get(name)
            .or_else(|| self.exogenous_histories.get(name))
        else {
            if allow_undefined {
                tracing::warn!(specifier, "skipping undefined extension context");
                return Ok(None);
            }
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::UnresolvableContextSpecifier,
                    format!("Context specifier \"{specifier}\" does not name a known context."),
                )
                .with("contextSpecifier", specifier),
            );
        };

        let Some(vocabulary) =
            history.try_get_matching_version(dtmi.major_version(), dtmi.minor_version())
        else {
            if allow_undefined {
                tracing::warn!(specifier, "skipping undefined extension context version");
                return Ok(None);
            }
            let available = format_versions(&history.available_versions());
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::UnresolvableContextVersion,
                    format!(
                        "Context \"{name}\" has no version {}.{}; available versions are {available}.",
                        dtmi.major_version(),
                        dtmi.minor_version()
                    ),
                )
                .with("contextSpecifier", specifier)
                .with("version", format!("{}.{}", dtmi.major_version(), dtmi.minor_version()))
                .with("availableVersions", &available),
            );
        };

        tracing::debug!(specifier, "resolved affiliate context");
        Ok(Some(AffiliateContext {
            name: name.to_string(),
            vocabulary: Arc::clone(vocabulary),
        }))
    }

    // -----------------------------------------------------------------------
    // Extension registration
    // -----------------------------------------------------------------------

    /// Record an extension context declared by a parsed document so later
    /// documents of this session can reference it.
    pub fn register_extension_context(
        &mut self,
        extension_id: &str,
        components: &ContextStack,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<RegisteredExtension> {
        let extension = self.parse_context_specifier(extension_id, sink)?;
        if !extension.is_versioned() {
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::MissingContextVersion,
                    format!("Extension context \"{extension_id}\" does not specify a version."),
                )
                .with("contextSpecifier", extension_id),
            );
        }

        let name = extension.versionless().to_string();
        if name == DTDL_CONTEXT_NAME
            || self.endogenous_histories.contains_key(&name)
            || self.is_identifier_reserved(extension_id)
        {
            return abort(
                sink,
                ParsingError::new(
                    ErrorKind::ExtensionContextReserved,
                    format!(
                        "Extension context \"{name}\" is built in or lies under a reserved identifier and cannot be defined by a document."
                    ),
                )
                .with("contextSpecifier", extension_id),
            );
        }

        let mut components_iter = components.components();
        let dtdl = match components_iter.next() {
            Some(ContextComponent {
                entry: ContextEntry::Remote(specifier),
                ..
            }) if is_dtdl_context_specifier(specifier) => {
                self.resolve_core_context(specifier, sink)?
            }
            _ => {
                return abort(
                    sink,
                    ParsingError::new(
                        ErrorKind::MissingDtdlContext,
                        format!(
                            "Extension context \"{extension_id}\" does not begin its context with a DTDL context specifier."
                        ),
                    )
                    .with("contextSpecifier", extension_id),
                );
            }
        };

        let mut failed = false;
        let mut definitions = ScopedDefinitions::default();
        for component in components_iter {
            match component.entry {
                ContextEntry::Local(local) if component.is_last => {
                    match self.merge_definitions(
                        local,
                        &ScopedDefinitions::default(),
                        dtdl.major_version(),
                        TermScope::Extension,
                        sink,
                    ) {
                        Ok(merged) => definitions = merged,
                        Err(UnitAborted) => failed = true,
                    }
                }
                _ => {
                    let allow = self.options.allow_undefined_extensions;
                    if self
                        .resolve_affiliate_context(component, dtdl.major_version(), allow, sink)
                        .is_err()
                    {
                        failed = true;
                    }
                }
            }
        }
        if failed {
            return Err(UnitAborted);
        }

        let version = VersionPair::new(extension.major_version(), extension.minor_version());
        let vocabulary =
            VersionedVocabulary::from_scope(version.major, version.minor, definitions);

        let history = self
            .exogenous_histories
            .entry(name.clone())
            .or_insert_with(|| VocabularyHistory::new(name.clone()));
        match history.add_version(vocabulary) {
            Ok(vocabulary) => {
                tracing::debug!(
                    extension = extension_id,
                    versions = history.versions().len(),
                    "registered extension context"
                );
                Ok(RegisteredExtension {
                    name,
                    dtdl_version: dtdl.major_version(),
                    vocabulary,
                })
            }
            Err(e) => abort(
                sink,
                ParsingError::new(
                    ErrorKind::DuplicateExtensionVersion,
                    format!("Extension context \"{extension_id}\" cannot be recorded: {e}."),
                )
                .with("contextSpecifier", extension_id)
                .with("version", version),
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Scope merge
    // -----------------------------------------------------------------------

    /// Layer a local context block over the enclosing scope's definitions.
    ///
    /// A local declaration replaces any inherited definition of the same
    /// name, whether it was a term or a prefix.
    pub fn merge_scope_definitions(
        &self,
        definitions: &LocalDefinitions,
        parent: &ScopedDefinitions,
        dtdl_version: u32,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<ScopedDefinitions> {
        self.merge_definitions(definitions, parent, dtdl_version, TermScope::Local, sink)
    }

    fn merge_definitions(
        &self,
        definitions: &LocalDefinitions,
        parent: &ScopedDefinitions,
        dtdl_version: u32,
        scope: TermScope,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<ScopedDefinitions> {
        let mut merged = parent.clone();
        let mut failed = false;

        for (term, definition) in &definitions.declarations {
            if validate_term_name(term, scope, &self.dtdl_history, sink).is_err() {
                failed = true;
                continue;
            }

            merged.remove(term);

            match resolve_term_definition(
                term,
                definition.as_deref(),
                dtdl_version,
                scope,
                self.identifiers.as_ref(),
                sink,
            ) {
                Ok(TermResolution::Identifier(id)) => {
                    merged.terms.insert(term.clone(), id);
                }
                Ok(TermResolution::Prefix(prefix)) => {
                    merged.prefixes.insert(term.clone(), prefix);
                }
                Ok(TermResolution::Absent) => {
                    merged.undefined.insert(term.clone());
                }
                Err(UnitAborted) => failed = true,
            }
        }

        tracing::trace!(
            terms = merged.terms.len(),
            prefixes = merged.prefixes.len(),
            failed,
            "merged scope definitions"
        );

        if failed {
            Err(UnitAborted)
        } else {
            Ok(merged)
        }
    }

    // -----------------------------------------------------------------------
    // Whole context
    // -----------------------------------------------------------------------

    /// Resolve a complete context stack: the DTDL context first, then any
    /// affiliates, then an optional final local block merged over `parent`.
    pub fn process_context(
        &self,
        stack: &ContextStack,
        parent: Option<&ScopedDefinitions>,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<ResolvedContext> {
        let mut components = stack.components();
        let dtdl = match components.next() {
            Some(ContextComponent {
                entry: ContextEntry::Remote(specifier),
                ..
            }) if is_dtdl_context_specifier(specifier) => {
                self.resolve_core_context(specifier, sink)?
            }
            first => {
                let mut error = ParsingError::new(
                    ErrorKind::MissingDtdlContext,
                    "The first entry of the context is not a DTDL context specifier.",
                );
                if let Some(ContextComponent {
                    entry: ContextEntry::Remote(specifier),
                    ..
                }) = first
                {
                    error = error.with("contextSpecifier", specifier);
                }
                return abort(sink, error);
            }
        };

        let dtdl_version = dtdl.major_version();
        let allow_undefined = self.options.allow_undefined_extensions;
        let mut affiliates = Vec::new();
        let mut scope = parent.cloned().unwrap_or_default();
        let mut failed = false;

        for component in components {
            match component.entry {
                ContextEntry::Local(local) if component.is_last => {
                    match self.merge_scope_definitions(local, &scope, dtdl_version, sink) {
                        Ok(merged) => scope = merged,
                        Err(UnitAborted) => failed = true,
                    }
                }
                _ => match self.resolve_affiliate_context(
                    component,
                    dtdl_version,
                    allow_undefined,
                    sink,
                ) {
                    Ok(Some(affiliate)) => affiliates.push(affiliate),
                    Ok(None) => {}
                    Err(UnitAborted) => failed = true,
                },
            }
        }

        if failed {
            return Err(UnitAborted);
        }

        Ok(ResolvedContext {
            dtdl,
            affiliates,
            scope,
        })
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Render an identifier as its short term when a compiled-in vocabulary
    /// defines one, otherwise as the identifier itself.
    pub fn term_or_identifier(&self, id: &str) -> String {
        std::iter::once(self.dtdl_history.as_ref())
            .chain(self.endogenous_histories.values())
            .find_map(|h| h.lookup_term_for_identifier(id))
            .unwrap_or(id)
            .to_string()
    }

    /// Whether user models are forbidden from defining `id`.
    pub fn is_identifier_reserved(&self, id: &str) -> bool {
        self.dtdl_history.is_identifier_reserved(id)
            || self
                .endogenous_histories
                .values()
                .any(|h| h.is_identifier_reserved(id))
    }

    fn parse_context_specifier(
        &self,
        specifier: &str,
        sink: &mut dyn ErrorSink,
    ) -> Resolution<Dtmi> {
        match self.identifiers.parse(specifier) {
            Some(dtmi) if dtmi.fragment().is_none() => Ok(dtmi),
            Some(_) => abort(
                sink,
                ParsingError::new(
                    ErrorKind::InvalidContextSpecifier,
                    format!("Context specifier \"{specifier}\" must not have a fragment."),
                )
                .with("contextSpecifier", specifier),
            ),
            None => abort(
                sink,
                ParsingError::new(
                    ErrorKind::InvalidContextSpecifier,
                    format!("Context specifier \"{specifier}\" is not a valid DTMI."),
                )
                .with("contextSpecifier", specifier),
            ),
        }
    }
}

impl Default for ContextResolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

fn invalid_for_version(specifier: &str, dtdl_version: u32) -> ParsingError {
    ParsingError::new(
        ErrorKind::InvalidContextSpecifierForVersion,
        format!(
            "Context specifier \"{specifier}\" is not a valid DTMI for DTDL version {dtdl_version}."
        ),
    )
    .with("contextSpecifier", specifier)
    .with("version", dtdl_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtmi::Identifier;

    fn vocabulary(major: u32, terms: &[(&str, &str)]) -> VersionedVocabulary {
        let terms = terms
            .iter()
            .map(|(t, id)| (t.to_string(), Identifier::Dtmi(Dtmi::parse(id).unwrap())))
            .collect();
        VersionedVocabulary::new(major, 0, terms, IndexMap::new()).unwrap()
    }

    fn custom_resolver() -> ContextResolver {
        let dtdl = VocabularyHistory::with_versions(
            "dtmi:dtdl:context",
            [vocabulary(5, &[("Widget", "dtmi:dtdl:class:Widget;5")])],
        )
        .unwrap();
        ContextResolver::with_histories(
            Arc::new(dtdl),
            Arc::new(IndexMap::new()),
            ResolverOptions::default(),
        )
    }

    /// Accepts every structurally valid DTMI.
    struct PermissiveValidator;

    impl IdentifierValidator for PermissiveValidator {
        fn parse(&self, text: &str) -> Option<Dtmi> {
            Dtmi::parse(text)
        }

        fn is_reference_valid(&self, text: &str, _dtdl_version: u32) -> bool {
            Dtmi::parse(text).is_some()
        }
    }

    #[test]
    fn custom_histories_replace_compiled_in_vocabularies() {
        let resolver = custom_resolver();
        let mut sink: Vec<ParsingError> = Vec::new();

        let v5 = resolver
            .resolve_core_context("dtmi:dtdl:context;5", &mut sink)
            .unwrap();
        assert!(v5.term("Widget").is_some());

        let result = resolver.resolve_core_context("dtmi:dtdl:context;3", &mut sink);
        assert_eq!(result, Err(UnitAborted));
        assert_eq!(sink[0].kind, ErrorKind::UnrecognizedContextVersion);
        assert_eq!(sink[0].attribute("availableVersions"), Some("5"));
    }

    #[test]
    fn custom_histories_drive_reservations() {
        let resolver = custom_resolver();
        let mut sink: Vec<ParsingError> = Vec::new();

        let local = LocalDefinitions::new()
            .declare("Widget", Some("https://example.com/w"))
            .declare("Interface", Some("https://example.com/i"));
        let result =
            resolver.merge_scope_definitions(&local, &ScopedDefinitions::default(), 5, &mut sink);
        assert_eq!(result, Err(UnitAborted));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].kind, ErrorKind::LocalTermReserved);
        assert_eq!(sink[0].attribute("term"), Some("Widget"));

        assert_eq!(resolver.term_or_identifier("dtmi:dtdl:class:Widget;5"), "Widget");
        assert!(!resolver.is_identifier_reserved("dtmi:dtdl:class:Interface;3"));
    }

    #[test]
    fn identifier_validator_is_pluggable() {
        let strict = ContextResolver::default();
        let permissive =
            ContextResolver::default().with_identifier_validator(Box::new(PermissiveValidator));
        let local = LocalDefinitions::new().declare("thing", Some("dtmi:com:example_;1"));

        let mut sink: Vec<ParsingError> = Vec::new();
        assert!(strict
            .merge_scope_definitions(&local, &ScopedDefinitions::default(), 3, &mut sink)
            .is_err());
        assert_eq!(sink[0].kind, ErrorKind::LocalTermDefinitionInvalidDtmi);

        let mut sink: Vec<ParsingError> = Vec::new();
        let scope = permissive
            .merge_scope_definitions(&local, &ScopedDefinitions::default(), 3, &mut sink)
            .unwrap();
        assert!(sink.is_empty());
        assert!(scope.terms.contains_key("thing"));
    }

    #[test]
    fn context_specifier_must_be_a_dtmi() {
        let resolver = ContextResolver::default();
        let mut sink: Vec<ParsingError> = Vec::new();
        let result = resolver.resolve_core_context("dtmi:dtdl::context;3", &mut sink);
        assert_eq!(result, Err(UnitAborted));
        assert_eq!(sink[0].kind, ErrorKind::InvalidContextSpecifier);
        assert_eq!(sink[0].attribute("contextSpecifier"), Some("dtmi:dtdl::context;3"));
    }

    #[test]
    fn extension_id_must_be_versioned() {
        let mut resolver = ContextResolver::default();
        let mut sink: Vec<ParsingError> = Vec::new();
        let stack = ContextStack::new(vec![ContextEntry::Remote("dtmi:dtdl:context;3".into())]);
        let result = resolver.register_extension_context("dtmi:com:example:ext", &stack, &mut sink);
        assert!(result.is_err());
        assert_eq!(sink[0].kind, ErrorKind::MissingContextVersion);
        assert!(resolver.exogenous_histories().is_empty());
    }

    #[test]
    fn extension_without_local_block_has_empty_vocabulary() {
        let mut resolver = ContextResolver::default();
        let mut sink: Vec<ParsingError> = Vec::new();
        let stack = ContextStack::new(vec![
            ContextEntry::Remote("dtmi:dtdl:context;3".into()),
            ContextEntry::Remote("dtmi:dtdl:extension:historization;1".into()),
        ]);
        let registered = resolver
            .register_extension_context("dtmi:com:example:ext;1", &stack, &mut sink)
            .unwrap();
        assert!(sink.is_empty());
        assert!(registered.vocabulary.term_definitions().is_empty());
        assert_eq!(resolver.exogenous_histories().len(), 1);
    }
}
