//! In-memory virtual source store.
//!
//! A build never touches the filesystem: the project to bundle is an
//! immutable mapping from normalized path to source text, created fresh per
//! invocation. Applying a patch produces a new store rather than mutating in
//! place.

use std::collections::BTreeMap;

/// A single source file, keyed by its forward-slash-normalized path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Immutable path → text mapping for one build.
///
/// Paths are kept in a `BTreeMap` so every iteration over the store is
/// deterministic (lexicographic path order), which makes entry-point
/// fallback and archive listings reproducible across identical inputs.
#[derive(Debug, Clone, Default)]
pub struct SourceStore {
    files: BTreeMap<String, String>,
}

/// Normalize a user-supplied path into a store key: forward slashes, no
/// leading `/` or `./`, no empty or `.` segments.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

impl SourceStore {
    pub fn from_files(files: impl IntoIterator<Item = (String, String)>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, content)| (normalize_path(&path), content))
            .filter(|(path, _)| !path.is_empty())
            .collect();
        SourceStore { files }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Deterministic iteration over `(path, content)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Sum of the UTF-8 byte lengths of every file's content.
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(|content| content.len()).sum()
    }

    /// Apply a patch (`Some` ⇒ upsert, `None` ⇒ delete) and return the
    /// resulting store. The receiver is left untouched.
    pub fn apply_patch(&self, patch: &BTreeMap<String, Option<String>>) -> SourceStore {
        let mut files = self.files.clone();
        for (path, change) in patch {
            let path = normalize_path(path);
            if path.is_empty() {
                continue;
            }
            match change {
                Some(content) => {
                    files.insert(path, content.clone());
                }
                None => {
                    files.remove(&path);
                }
            }
        }
        SourceStore { files }
    }
}
