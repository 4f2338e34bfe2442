//! Project model
//!
//! The host owns the files; the pipeline only ever reads a [`ProjectSnapshot`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::PreviewConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// FILE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    Markup,
    Stylesheet,
    Script,
    Data,
    Documentation,
    Other,
}

/// Extension of the last path segment, if it has one.
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

impl FileKind {
    pub fn of(path: &str, config: &PreviewConfig) -> Self {
        let Some(ext) = extension(path) else {
            return Self::Other;
        };
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Self::Markup,
            "css" => Self::Stylesheet,
            "ts" | "tsx" | "js" | "jsx" | "mjs" => Self::Script,
            "json" => Self::Data,
            "md" | "markdown" => Self::Documentation,
            _ if config.is_component_extension(ext) => Self::Script,
            _ => Self::Other,
        }
    }

    /// Files that get a module handle in application mode.
    pub fn is_loadable(self) -> bool {
        matches!(self, Self::Script | Self::Stylesheet)
    }
}

/// One file of a snapshot, borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
    pub kind: FileKind,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered map of root-relative path to full file content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectSnapshot {
    files: BTreeMap<String, String>,
}

/// A whole-file write, as produced by an editor or an assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub file_path: String,
    pub content: String,
}

fn normalize_key(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

impl ProjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: impl Into<String>) {
        self.files.insert(normalize_key(path), content.into());
    }

    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files
            .get(path.trim_start_matches('/'))
            .map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path.trim_start_matches('/'))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// All files in path order, with their kind resolved against `config`.
    pub fn files<'a>(
        &'a self,
        config: &'a PreviewConfig,
    ) -> impl Iterator<Item = ProjectFile<'a>> + 'a {
        self.files.iter().map(move |(path, content)| ProjectFile {
            path,
            content,
            kind: FileKind::of(path, config),
        })
    }

    /// Writes every change and returns the first path that was not part of the
    /// project before, which is the file a host would select next.
    pub fn apply_changes(&mut self, changes: &[FileChange]) -> Option<String> {
        let mut first_new = None;
        for change in changes {
            let key = normalize_key(&change.file_path);
            if key.is_empty() {
                continue;
            }
            if first_new.is_none() && !self.files.contains_key(&key) {
                first_new = Some(key.clone());
            }
            self.files.insert(key, change.content.clone());
        }
        first_new
    }

    /// SHA-256 over every path and content, in path order.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, content) in &self.files {
            hasher.update((path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update((content.len() as u64).to_le_bytes());
            hasher.update(content.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn tree(&self) -> FileSystemNode {
        let mut root = FileSystemNode::Directory {
            name: "root".to_string(),
            children: Vec::new(),
        };
        for path in self.files.keys() {
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            root.insert(&parts);
        }
        root.sort();
        root
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ProjectSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (path, content) in iter {
            snapshot.insert(path.as_ref(), content);
        }
        snapshot
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTORY TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileSystemNode {
    File {
        name: String,
    },
    Directory {
        name: String,
        children: Vec<FileSystemNode>,
    },
}

impl FileSystemNode {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name } | Self::Directory { name, .. } => name,
        }
    }

    fn insert(&mut self, parts: &[&str]) {
        let Self::Directory { children, .. } = self else {
            return;
        };
        match parts {
            [] => {}
            [file] => {
                if !children.iter().any(|c| c.name() == *file) {
                    children.push(Self::File {
                        name: file.to_string(),
                    });
                }
            }
            [dir, rest @ ..] => {
                let idx = match children
                    .iter()
                    .position(|c| matches!(c, Self::Directory { name, .. } if name.as_str() == *dir))
                {
                    Some(idx) => idx,
                    None => {
                        children.push(Self::Directory {
                            name: dir.to_string(),
                            children: Vec::new(),
                        });
                        children.len() - 1
                    }
                };
                children[idx].insert(rest);
            }
        }
    }

    /// Directories before files, then by name.
    fn sort(&mut self) {
        if let Self::Directory { children, .. } = self {
            children.sort_by(|a, b| {
                let a_dir = matches!(a, Self::Directory { .. });
                let b_dir = matches!(b, Self::Directory { .. });
                b_dir.cmp(&a_dir).then_with(|| a.name().cmp(b.name()))
            });
            for child in children.iter_mut() {
                child.sort();
            }
        }
    }
}
