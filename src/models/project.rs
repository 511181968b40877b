use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend grouping entity for all debts under one workspace root. Implicit
/// and auto-created from the front-end's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub local_path: String,
    pub language: String,
}

/// Payload for creating the implicit project record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub local_path: String,
    pub language: String,
}

impl NewProject {
    /// Builds the implicit project for a workspace root, with best-effort
    /// language detection by probing for marker files.
    pub fn for_workspace(root: &str) -> NewProject {
        let name = Path::new(root)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "workspace".to_string());

        NewProject {
            name,
            local_path: root.to_string(),
            language: detect_workspace_language(root),
        }
    }
}

/// Probes the workspace root for well-known project marker files.
pub fn detect_workspace_language(root: &str) -> String {
    let root = Path::new(root);
    let has = |marker: &str| root.join(marker).exists();

    if has("Cargo.toml") {
        "rust".to_string()
    } else if has("go.mod") {
        "go".to_string()
    } else if has("tsconfig.json") {
        "typescript".to_string()
    } else if has("package.json") {
        "javascript".to_string()
    } else if has("pyproject.toml") || has("requirements.txt") {
        "python".to_string()
    } else if has("pom.xml") || has("build.gradle") || has("build.gradle.kts") {
        "java".to_string()
    } else {
        "unknown".to_string()
    }
}
