//! Knowledge-base loader.
//!
//! Walks the knowledge-base directory and reads every file whose path,
//! relative to the directory, matches one of the include globs. The
//! default globs (`*.yaml`, `*.yml`) only match files at the top level.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use scuba_rag_core::models::Document;

use crate::error::RagError;

/// Load all matching documents from `dir`, sorted by source for
/// deterministic ordering.
///
/// A directory without matching files yields an empty corpus.
pub fn load_corpus(dir: &Path, include_globs: &[String]) -> Result<Vec<Document>, RagError> {
    if !dir.is_dir() {
        return Err(RagError::corpus(dir, "not a readable directory"));
    }

    let include_set = build_globset(include_globs)?;
    let mut docs = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| RagError::corpus(dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        // Glob matching uses forward slashes on every platform.
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if !include_set.is_match(&rel_str) {
            continue;
        }

        let text = std::fs::read_to_string(path).map_err(|e| RagError::corpus(path, e))?;
        docs.push(Document::new(rel_str, text));
    }

    docs.sort_by(|a, b| a.source.cmp(&b.source));

    tracing::info!(dir = %dir.display(), documents = docs.len(), "knowledge base loaded");

    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, RagError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // `*` stays within one path segment; `**` crosses directories.
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn globs(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|s| s.to_string()).collect()
    }

    fn sample_kb() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("malpelo.yaml"), "sitio: Malpelo\nfauna: tiburones martillo\n").unwrap();
        fs::write(root.join("gorgona.yml"), "sitio: Gorgona\nfauna: ballenas\n").unwrap();
        fs::write(root.join("notes.txt"), "not part of the corpus").unwrap();
        fs::create_dir_all(root.join("archive")).unwrap();
        fs::write(root.join("archive/old.yaml"), "sitio: antiguo\n").unwrap();
        tmp
    }

    #[test]
    fn test_loads_matching_files_sorted() {
        let kb = sample_kb();
        let docs = load_corpus(kb.path(), &globs(&["*.yaml", "*.yml"])).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, ["gorgona.yml", "malpelo.yaml"]);
        assert!(docs[1].text.contains("tiburones martillo"));
    }

    #[test]
    fn test_recursive_glob_includes_subdirectories() {
        let kb = sample_kb();
        let docs = load_corpus(kb.path(), &globs(&["**/*.yaml"])).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, ["archive/old.yaml", "malpelo.yaml"]);
    }

    #[test]
    fn test_no_matches_is_empty_corpus() {
        let kb = sample_kb();
        let docs = load_corpus(kb.path(), &globs(&["*.md"])).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_missing_directory_is_corpus_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_corpus(&tmp.path().join("missing"), &globs(&["*.yaml"])).unwrap_err();
        assert!(matches!(err, RagError::CorpusLoad { .. }));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let kb = sample_kb();
        let err = load_corpus(kb.path(), &globs(&["[unclosed"])).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
