//! Disk helpers shared by the renderer, synchronizer and aggregator
//!
//! Every failure is reported as [`Error::Filesystem`] with the operation and
//! path that failed.

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::Builder;

use crate::error::{Error, Result};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A directory entry
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: OsString,
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Modification time of `path`, or `None` if it does not exist
pub fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(metadata) => metadata
            .modified()
            .map(Some)
            .map_err(|e| Error::filesystem("stat", path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::filesystem("stat", path, e)),
    }
}

/// Kind of the entry at `path` without following symlinks.
///
/// A symlink counts as a file.
pub fn entry_kind(path: &Path) -> Result<Option<EntryKind>> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(Some(EntryKind::Directory)),
        Ok(_) => Ok(Some(EntryKind::File)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::filesystem("stat", path, e)),
    }
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::filesystem("read", path, e))
}

/// Contents of `path`, or `None` if it does not exist
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::filesystem("read", path, e)),
    }
}

/// Replace `path` with `content` atomically.
///
/// The content goes to a temporary file in the same directory, which is then
/// renamed over `path`. Readers see either the old or the new file, never a
/// partial one. An existing file keeps its permissions; a new one gets
/// `0o666` masked by the process umask.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut temp = builder
        .tempfile_in(dir)
        .map_err(|e| Error::filesystem("create", dir, e))?;

    if let Ok(existing) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| Error::filesystem("set permissions", temp.path().to_path_buf(), e))?;
    }
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| Error::filesystem("write", temp.path().to_path_buf(), e))?;
    temp.persist(path)
        .map_err(|e| Error::filesystem("replace", path, e.error))?;
    Ok(())
}

/// Create `path` and its parents. Returns true if anything was created.
pub fn ensure_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path).map_err(|e| Error::filesystem("create directory", path, e))?;
    Ok(true)
}

/// Remove a file, symlink or directory tree
pub fn remove_entry(path: &Path) -> Result<()> {
    match entry_kind(path)? {
        Some(EntryKind::Directory) => {
            fs::remove_dir_all(path).map_err(|e| Error::filesystem("remove directory", path, e))
        }
        Some(EntryKind::File) => {
            fs::remove_file(path).map_err(|e| Error::filesystem("remove", path, e))
        }
        None => Ok(()),
    }
}

/// Entries of `dir` sorted by name.
///
/// Symlinks in the template tree are followed so a linked directory is
/// mirrored like a real one; pass `follow_links = false` for target trees.
pub fn list_entries(dir: &Path, follow_links: bool) -> Result<Vec<Entry>> {
    let read_dir = fs::read_dir(dir).map_err(|e| Error::filesystem("read directory", dir, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::filesystem("read directory", dir, e))?;
        let path = entry.path();
        let is_dir = if follow_links {
            fs::metadata(&path)
                .map_err(|e| Error::filesystem("stat", &path, e))?
                .is_dir()
        } else {
            entry
                .file_type()
                .map_err(|e| Error::filesystem("stat", &path, e))?
                .is_dir()
        };
        entries.push(Entry {
            name: entry.file_name(),
            path,
            kind: if is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_modified_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(modified(&temp_dir.path().join("nope")).unwrap().is_none());
        std::fs::write(temp_dir.path().join("yes"), "x").unwrap();
        assert!(modified(&temp_dir.path().join("yes")).unwrap().is_some());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.yaml");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        // No temporary files left behind
        let names: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_new_file_is_world_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kustomization.yaml");
        write_atomic(&path, b"resources: []\n").unwrap();

        // 0o666 under the usual 022 or 002 umask
        assert_eq!(mode(&path) & 0o644, 0o644, "mode {:o}", mode(&path));
        assert_eq!(mode(&path) & 0o111, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.sh");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o750)).unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(mode(&path), 0o750);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_atomic_missing_parent_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = write_atomic(&temp_dir.path().join("missing/out.yaml"), b"x").unwrap_err();
        assert!(matches!(err, Error::Filesystem { operation: "create", .. }));
    }

    #[test]
    fn test_ensure_dir_reports_creation() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a/b/c");
        assert!(ensure_dir(&dir).unwrap());
        assert!(!ensure_dir(&dir).unwrap());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_remove_entry_file_and_tree() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        let tree = temp_dir.path().join("tree");
        std::fs::write(&file, "x").unwrap();
        std::fs::create_dir_all(tree.join("nested")).unwrap();
        std::fs::write(tree.join("nested/inner"), "y").unwrap();

        remove_entry(&file).unwrap();
        remove_entry(&tree).unwrap();
        remove_entry(&temp_dir.path().join("never-existed")).unwrap();
        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn test_list_entries_sorted_with_kinds() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.yaml"), "").unwrap();
        std::fs::create_dir(temp_dir.path().join("a")).unwrap();
        std::fs::write(temp_dir.path().join("c.txt"), "").unwrap();

        let entries = list_entries(temp_dir.path(), false).unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|e| (e.name.to_string_lossy().to_string(), e.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), EntryKind::Directory),
                ("b.yaml".to_string(), EntryKind::File),
                ("c.txt".to_string(), EntryKind::File),
            ]
        );
    }

    #[test]
    fn test_read_optional() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f");
        assert!(read_optional(&path).unwrap().is_none());
        std::fs::write(&path, "data").unwrap();
        assert_eq!(read_optional(&path).unwrap().unwrap(), b"data");
    }
}
