use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use dtdl_context_core::Document;

pub const CONFIG_FILE_NAME: &str = "dtdl-context.config.yaml";

/// Project configuration from dtdl-context.config.yaml.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub sources: Option<Vec<String>>,
    pub max_dtdl_version: Option<u32>,
    #[serde(default)]
    pub allow_undefined_extensions: bool,
}

/// Read DTDL documents from a path (file or directory), in path order.
/// For a directory, `config` supplies the source globs.
pub fn read_documents(
    input_path: &Path,
    config: Option<&ProjectConfig>,
) -> Result<Vec<Document>, String> {
    if !input_path.exists() {
        return Err(format!("Path does not exist: {}", input_path.display()));
    }

    if input_path.is_file() {
        return Ok(vec![read_document(input_path)?]);
    }

    if input_path.is_dir() {
        let paths = match config {
            Some(ProjectConfig {
                sources: Some(sources),
                ..
            }) if !sources.is_empty() => glob_sources(input_path, sources)?,
            _ => glob_sources(input_path, &["**/*.json".to_string()])?,
        };
        return paths.iter().map(|p| read_document(p)).collect();
    }

    Err(format!(
        "Path is neither a file nor a directory: {}",
        input_path.display()
    ))
}

/// Read dtdl-context.config.yaml from a directory if it exists.
pub fn read_project_config(dir_path: &Path) -> Result<Option<ProjectConfig>, String> {
    let config_path = dir_path.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read config: {}", e))?;
    let config =
        serde_yaml::from_str(&content).map_err(|e| format!("Invalid YAML config: {}", e))?;
    Ok(Some(config))
}

fn read_document(path: &Path) -> Result<Document, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let content = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))?;
    Ok(Document {
        source: path.to_string_lossy().replace('\\', "/"),
        content,
    })
}

/// Expand glob patterns relative to `base_dir`; each pattern's matches are
/// sorted, patterns keep their listed order, and duplicates are dropped.
fn glob_sources(base_dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
        let full_pattern = base_dir.join(pattern);
        let pattern_str = full_pattern.to_string_lossy().replace('\\', "/");
        let entries = glob::glob(&pattern_str)
            .map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))?;

        let mut matched: Vec<PathBuf> = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => {
                    if path.is_file() && seen.insert(path.clone()) {
                        matched.push(path);
                    }
                }
                Err(e) => return Err(format!("Glob error: {}", e)),
            }
        }
        matched.sort();
        paths.extend(matched);
    }

    Ok(paths)
}
