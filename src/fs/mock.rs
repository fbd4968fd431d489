// src/fs/mock.rs

//! In-memory [`FileSystem`] used by tests and by the in-memory store.

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
    /// Points at another path, which need not exist.
    Symlink(PathBuf),
}

/// Links followed before a lookup gives up, as `ELOOP` does.
const MAX_LINK_HOPS: usize = 40;

/// Paths are stored verbatim; children are found by prefix, so a `BTreeMap`
/// keeps `read_dir` output sorted.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        Self::ensure_parents(&mut entries, path);
        entries.insert(path.to_path_buf(), MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        Self::ensure_parents(&mut entries, path);
        entries.insert(path.to_path_buf(), MockEntry::Dir);
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        Self::ensure_parents(&mut entries, path);
        entries.insert(
            path.to_path_buf(),
            MockEntry::Symlink(target.as_ref().to_path_buf()),
        );
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Follow symlinks from `path` to a file or directory.
    fn resolve<'a>(
        entries: &'a BTreeMap<PathBuf, MockEntry>,
        path: &Path,
    ) -> Option<(PathBuf, &'a MockEntry)> {
        let mut current = path.to_path_buf();
        for _ in 0..MAX_LINK_HOPS {
            match entries.get(&current)? {
                MockEntry::Symlink(target) => current = target.clone(),
                entry => return Some((current, entry)),
            }
        }
        None
    }

    fn ensure_parents(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            entries
                .entry(ancestor.to_path_buf())
                .or_insert(MockEntry::Dir);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let entries = self.lock();
        match Self::resolve(&entries, path) {
            Some((_, MockEntry::File(content))) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(_) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut entries = self.lock();
        Self::ensure_parents(&mut entries, path);
        match entries
            .entry(path.to_path_buf())
            .or_insert_with(|| MockEntry::File(Vec::new()))
        {
            MockEntry::File(existing) => {
                existing.extend_from_slice(contents);
                Ok(())
            }
            MockEntry::Dir => Err(anyhow!("Is a directory: {:?}", path)),
            MockEntry::Symlink(_) => Err(anyhow!("Is a symlink: {:?}", path)),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut entries = self.lock();
        match entries.get(path) {
            Some(MockEntry::File(_) | MockEntry::Symlink(_)) => {
                entries.remove(path);
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let entries = self.lock();
        matches!(Self::resolve(&entries, path), Some((_, MockEntry::Dir)))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Symlink(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = self.lock();
        match Self::resolve(&entries, path) {
            // Children of a linked directory are listed under the link.
            Some((dir, MockEntry::Dir)) => Ok(entries
                .keys()
                .filter(|candidate| candidate.parent() == Some(dir.as_path()))
                .filter_map(|candidate| candidate.file_name())
                .map(|name| path.join(name))
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_dir_lists_direct_children_only() {
        let fs = MockFileSystem::new();
        fs.add_file("/root/a.txt", "a");
        fs.add_file("/root/sub/b.txt", "b");

        let children = fs.read_dir(Path::new("/root")).unwrap();
        assert_eq!(
            children,
            vec![PathBuf::from("/root/a.txt"), PathBuf::from("/root/sub")]
        );
        assert!(fs.is_dir(Path::new("/root/sub")));
    }

    #[test]
    fn symlinks_resolve_for_lookups_but_not_for_is_symlink() {
        let fs = MockFileSystem::new();
        fs.add_file("/real/a.txt", "a");
        fs.add_symlink("/link", "/real");
        fs.add_symlink("/loop", "/loop");

        assert!(fs.is_dir(Path::new("/link")));
        assert!(fs.is_symlink(Path::new("/link")));
        assert!(!fs.is_symlink(Path::new("/real")));
        assert_eq!(
            fs.read_dir(Path::new("/link")).unwrap(),
            vec![PathBuf::from("/link/a.txt")]
        );
        assert!(!fs.is_dir(Path::new("/loop")));
    }

    #[test]
    fn append_creates_then_extends() {
        let fs = MockFileSystem::new();
        let path = Path::new("/log/one.log");
        fs.append(path, b"first\n").unwrap();
        fs.append(path, b"second\n").unwrap();
        assert_eq!(fs.read_to_string(path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn remove_missing_file_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(fs.remove_file(Path::new("/nope")).is_err());
    }
}
