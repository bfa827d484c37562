//! Context assembly: the instruction text sent with every generator call.
//!
//! Built once at startup by [`assemble`] and shared read-only afterwards.
//! Reading the reference directory is best effort; a document that cannot be
//! read is logged and left out, it never stops the service from starting.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::prompt::REFERENCE_PLACEHOLDER;

/// Extensions picked up from the reference directory when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Immutable system instructions plus the documents they were built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    instructions: String,
    documents: Vec<PathBuf>,
}

impl PromptContext {
    /// A context with fixed instructions and no reference documents.
    pub fn from_instructions(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            documents: Vec::new(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Reference documents included, in concatenation order.
    pub fn documents(&self) -> &[PathBuf] {
        &self.documents
    }
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// Concatenate every readable document under `dir` whose extension is in
/// `extensions`. Files are visited in path order so the result is stable.
pub fn load_reference_text(dir: &Path, extensions: &[String]) -> (String, Vec<PathBuf>) {
    if !dir.is_dir() {
        tracing::info!(dir = %dir.display(), "Reference directory not found, continuing without it");
        return (String::new(), Vec::new());
    }

    let mut sections = Vec::new();
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry in reference directory");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !has_allowed_extension(path, extensions) {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let relative = path.strip_prefix(dir).unwrap_or(path);
                sections.push(format!("### {}\n{}", relative.display(), content.trim_end()));
                documents.push(path.to_path_buf());
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable reference document");
            }
        }
    }

    (sections.join("\n\n"), documents)
}

/// Put `reference` in place of the placeholder. Templates without a
/// placeholder get the reference text appended under its own heading.
pub fn substitute(template: &str, reference: &str) -> String {
    if template.contains(REFERENCE_PLACEHOLDER) {
        template.replace(REFERENCE_PLACEHOLDER, reference)
    } else if reference.is_empty() {
        template.to_string()
    } else {
        format!("{template}\n\n## Reference material\n{reference}")
    }
}

/// Build the process-wide prompt context.
pub fn assemble(template: &str, docs_dir: Option<&Path>, extensions: &[String]) -> PromptContext {
    let (reference, documents) = match docs_dir {
        Some(dir) => load_reference_text(dir, extensions),
        None => (String::new(), Vec::new()),
    };
    tracing::info!(documents = documents.len(), "Assembled instruction context");
    PromptContext {
        instructions: substitute(template, &reference),
        documents,
    }
}
