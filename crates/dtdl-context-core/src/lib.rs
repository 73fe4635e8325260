pub mod catalogs;
pub mod context;
pub mod document;
pub mod dtmi;
pub mod errors;
pub mod ffi;
pub mod resolver;
pub mod types;
pub mod validator;
pub mod vocabulary;

pub use catalogs::{DTDL_CONTEXT_HISTORY, ENDOGENOUS_CONTEXT_HISTORIES};
pub use context::{ContextStack, ResolvedContext};
pub use document::{process_documents, Document, ElementKind, ResolvedElement};
pub use dtmi::{Dtmi, DtmiValidator, Identifier, IdentifierValidator};
pub use errors::{ErrorKind, ErrorSink, ParsingError, ParsingErrorCollection, Resolution, UnitAborted};
pub use ffi::{process_documents_to_json, resolve_context_to_json};
pub use resolver::ContextResolver;
pub use types::*;
pub use validator::{resolve_term_definition, validate_term_name, TermResolution, TermScope};
pub use vocabulary::{VersionPair, VersionedVocabulary, VocabularyError, VocabularyHistory};
