// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Clone)]
struct MockNode {
    entry: MockEntry,
    modified: SystemTime,
}

/// In-memory filesystem with explicit modification times.
///
/// Entries added without a time are stamped with `UNIX_EPOCH`, i.e. they are
/// older than any scan cursor.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    nodes: Arc<Mutex<HashMap<PathBuf, MockNode>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.add_file_modified_at(path, content, SystemTime::UNIX_EPOCH);
    }

    pub fn add_file_modified_at(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        modified: SystemTime,
    ) {
        let path = path.as_ref();
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(parent) = parent_of(path) {
            ensure_dir(&mut nodes, parent);
            link_child(&mut nodes, parent, path);
        }
        nodes.insert(
            path.to_path_buf(),
            MockNode {
                entry: MockEntry::File(content.into()),
                modified,
            },
        );
    }

    /// Set the modification time of an existing entry.
    pub fn touch(&self, path: impl AsRef<Path>, modified: SystemTime) {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.get_mut(path.as_ref()) {
            node.modified = modified;
        }
    }
}

fn parent_of(path: &Path) -> Option<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Some(Path::new(".")),
        Some(parent) if parent != path => Some(parent),
        _ => None,
    }
}

fn ensure_dir(nodes: &mut HashMap<PathBuf, MockNode>, path: &Path) {
    if nodes.contains_key(path) {
        return;
    }
    nodes.insert(
        path.to_path_buf(),
        MockNode {
            entry: MockEntry::Dir(Vec::new()),
            modified: SystemTime::UNIX_EPOCH,
        },
    );
    if let Some(parent) = parent_of(path) {
        ensure_dir(nodes, parent);
        link_child(nodes, parent, path);
    }
}

fn link_child(nodes: &mut HashMap<PathBuf, MockNode>, parent: &Path, child: &Path) {
    let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if let Some(MockNode {
        entry: MockEntry::Dir(children),
        ..
    }) = nodes.get_mut(parent)
    {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path).map(|n| &n.entry) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        let nodes = self.nodes.lock().unwrap();
        matches!(nodes.get(path).map(|n| &n.entry), Some(MockEntry::Dir(_)))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let nodes = self.nodes.lock().unwrap();
        nodes
            .get(path)
            .map(|n| n.modified)
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path).map(|n| &n.entry) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn nested_file_creates_parent_dirs() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/pkg/main.go", "package main");

        assert!(fs.is_dir(Path::new("/proj")));
        assert!(fs.is_dir(Path::new("/proj/src/pkg")));
        assert_eq!(
            fs.read_dir(Path::new("/proj/src")).unwrap(),
            vec![PathBuf::from("/proj/src/pkg")]
        );
    }

    #[test]
    fn touch_updates_modification_time() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/a.go", "");
        assert_eq!(fs.modified(Path::new("/proj/a.go")).unwrap(), SystemTime::UNIX_EPOCH);

        let later = SystemTime::UNIX_EPOCH + Duration::from_secs(60);
        fs.touch("/proj/a.go", later);
        assert_eq!(fs.modified(Path::new("/proj/a.go")).unwrap(), later);
    }
}
