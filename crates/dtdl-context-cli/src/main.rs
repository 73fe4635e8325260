mod reader;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dtdl_context_core::{
    process_documents, ContextResolver, ElementKind, ParsingErrorCollection, ResolvedElement,
    ResolverOptions, VersionedVocabulary, VocabularyHistory, DTDL_CONTEXT_HISTORY,
    ENDOGENOUS_CONTEXT_HISTORIES,
};
use reader::{read_documents, read_project_config, ProjectConfig};

const EXTENSION_NAME_PREFIX: &str = "dtmi:dtdl:extension:";

#[derive(Parser)]
#[command(
    name = "dtdl-context",
    version,
    about = "DTDL context resolver: resolve the @context declarations of DTDL model documents"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the contexts of DTDL documents and report errors
    Resolve {
        /// Input path (file or directory, defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format: human (default) or json
        #[arg(long, default_value = "human")]
        format: String,

        /// Reject DTDL versions above this major version
        #[arg(long)]
        max_dtdl_version: Option<u32>,

        /// Skip unknown extension contexts instead of reporting them
        #[arg(long)]
        allow_undefined_extensions: bool,
    },

    /// List the terms of a compiled-in vocabulary
    Terms {
        /// Vocabulary major version (defaults to the latest)
        #[arg(long)]
        version: Option<u32>,

        /// Extension name, e.g. `mqtt` or `dtmi:dtdl:extension:mqtt` (defaults to the DTDL language)
        #[arg(long)]
        extension: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Resolve {
            path,
            format,
            max_dtdl_version,
            allow_undefined_extensions,
        } => {
            let overrides = ResolverOptions {
                max_dtdl_version,
                allow_undefined_extensions,
            };
            match run_resolve(&path, &format, overrides) {
                Ok((output, error_count)) => {
                    println!("{output}");
                    if error_count > 0 {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Terms { version, extension } => {
            match run_terms(version, extension.as_deref()) {
                Ok(output) => {
                    println!("{output}");
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Command-line flags override the project config; the config fills the rest.
fn resolver_options(
    config: Option<&ProjectConfig>,
    overrides: ResolverOptions,
) -> ResolverOptions {
    let Some(config) = config else {
        return overrides;
    };
    ResolverOptions {
        max_dtdl_version: overrides.max_dtdl_version.or(config.max_dtdl_version),
        allow_undefined_extensions: overrides.allow_undefined_extensions
            || config.allow_undefined_extensions,
    }
}

fn run_resolve(
    input_path: &Path,
    format: &str,
    overrides: ResolverOptions,
) -> Result<(String, usize), String> {
    let config = if input_path.is_dir() {
        read_project_config(input_path)?
    } else {
        None
    };
    let documents = read_documents(input_path, config.as_ref())?;

    if documents.is_empty() {
        return Err(format!(
            "No DTDL documents (.json) found at: {}",
            input_path.display()
        ));
    }

    let options = resolver_options(config.as_ref(), overrides);
    tracing::debug!(?options, documents = documents.len(), "resolving documents");

    let mut resolver = ContextResolver::new(options);
    let mut errors = ParsingErrorCollection::new();
    let elements = process_documents(&mut resolver, &documents, &mut errors);

    let error_count = errors.len();
    let document_count = documents.len();

    if format == "json" {
        let output = serde_json::json!({
            "elements": elements,
            "errors": errors.iter().collect::<Vec<_>>(),
            "summary": {
                "elements": elements.len(),
                "errors": error_count,
                "documents": document_count,
            }
        });
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| format!("JSON serialization error: {e}"))?;
        return Ok((json, error_count));
    }

    // Human-readable format
    let mut lines: Vec<String> = elements.iter().map(|e| describe_element(e, &resolver)).collect();

    for e in &errors {
        lines.push(format!(
            "{} error[{}]: {}",
            e.document.as_deref().unwrap_or("<input>"),
            e.kind,
            e.cause
        ));
    }

    let element_word = if elements.len() == 1 { "element" } else { "elements" };
    let error_word = if error_count == 1 { "error" } else { "errors" };
    let document_word = if document_count == 1 { "document" } else { "documents" };
    lines.push(format!(
        "{} {element_word} resolved, {error_count} {error_word} in {document_count} {document_word}.",
        elements.len()
    ));

    Ok((lines.join("\n"), error_count))
}

fn describe_element(element: &ResolvedElement, resolver: &ContextResolver) -> String {
    let kind = match element.kind {
        ElementKind::ExtensionContext => "extension",
        ElementKind::Model => "model",
    };
    let mut line = format!(
        "{}[{}] {kind} {} (DTDL v{})",
        element.document,
        element.index,
        element.id.as_deref().unwrap_or("<anonymous>"),
        element.dtdl_version
    );
    if !element.types.is_empty() {
        let types: Vec<String> = element
            .types
            .iter()
            .map(|t| resolver.term_or_identifier(t))
            .collect();
        line.push_str(&format!(" types: {}", types.join(", ")));
    }
    if !element.affiliates.is_empty() {
        line.push_str(&format!(" affiliates: {}", element.affiliates.join(", ")));
    }
    if !element.scope.is_empty() {
        line.push_str(&format!(
            " local: {} terms, {} prefixes",
            element.scope.terms.len(),
            element.scope.prefixes.len()
        ));
    }
    line
}

fn run_terms(version: Option<u32>, extension: Option<&str>) -> Result<String, String> {
    let history: &VocabularyHistory = match extension {
        None => &**DTDL_CONTEXT_HISTORY,
        Some(name) => {
            let full_name = if name.starts_with("dtmi:") {
                name.to_string()
            } else {
                format!("{EXTENSION_NAME_PREFIX}{name}")
            };
            ENDOGENOUS_CONTEXT_HISTORIES
                .get(&full_name)
                .ok_or_else(|| format!("Unknown extension context: {full_name}"))?
        }
    };

    let vocabulary: &VersionedVocabulary = match version {
        Some(major) => history
            .versions()
            .iter()
            .find(|v| v.major_version() == major)
            .map(|v| &**v)
            .ok_or_else(|| {
                format!(
                    "{} has no version {major}; available versions are {}",
                    history.name(),
                    dtdl_context_core::vocabulary::format_versions(&history.available_versions())
                )
            })?,
        None => history
            .versions()
            .iter()
            .max_by_key(|v| v.version())
            .map(|v| &**v)
            .ok_or_else(|| format!("{} has no versions", history.name()))?,
    };

    let mut lines = vec![format!("{};{}", history.name(), vocabulary.version())];
    for (term, id) in vocabulary.term_definitions() {
        lines.push(format!("  {term} -> {id}"));
    }
    for (prefix, expansion) in vocabulary.prefix_definitions() {
        lines.push(format!("  {prefix}: -> {expansion}"));
    }
    Ok(lines.join("\n"))
}
