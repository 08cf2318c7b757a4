use crate::errors::CoreError;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem abstraction boundary for the path and directory helpers.
///
/// Keeping this trait narrow makes it easy to write deterministic tests and
/// allows alternative backends (e.g. an in-memory fs) when callers need one.
pub trait FileSystem: Send + Sync {
    /// Returns true when path exists (follows symlinks).
    fn exists(&self, path: &Path) -> bool;

    /// Reads file metadata.
    fn metadata(&self, path: &Path) -> crate::Result<Metadata>;

    /// Reads symlink metadata.
    fn symlink_metadata(&self, path: &Path) -> crate::Result<Metadata>;

    /// Creates a directory and all missing parent directories.
    fn create_dir_all(&self, path: &Path) -> crate::Result<()>;

    /// Copies a regular file, returning the number of bytes written.
    fn copy_file(&self, from: &Path, to: &Path) -> crate::Result<u64>;

    /// Reads UTF-8 text.
    fn read_to_string(&self, path: &Path) -> crate::Result<String>;

    /// Reads the target of a symlink without following it.
    fn read_link(&self, path: &Path) -> crate::Result<PathBuf>;

    /// Creates `link` pointing at `original`.
    fn symlink(&self, original: &Path, link: &Path) -> crate::Result<()>;

    /// Removes a file or symlink.
    fn remove_file(&self, path: &Path) -> crate::Result<()>;

    /// Removes a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> crate::Result<()>;

    /// Lists directory children as concrete paths, sorted by name.
    fn list_dir(&self, path: &Path) -> crate::Result<Vec<PathBuf>>;

    /// Returns true when path is a directory (follows symlinks).
    fn is_dir(&self, path: &Path) -> bool {
        self.metadata(path).map(|meta| meta.is_dir()).unwrap_or(false)
    }

    /// Returns true when path is a regular file (follows symlinks).
    fn is_file(&self, path: &Path) -> bool {
        self.metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
    }
}

/// Default filesystem implementation backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn metadata(&self, path: &Path) -> crate::Result<Metadata> {
        fs::metadata(path).map_err(|err| CoreError::io(path, err))
    }

    fn symlink_metadata(&self, path: &Path) -> crate::Result<Metadata> {
        fs::symlink_metadata(path).map_err(|err| CoreError::io(path, err))
    }

    fn create_dir_all(&self, path: &Path) -> crate::Result<()> {
        fs::create_dir_all(path).map_err(|err| CoreError::io(path, err))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> crate::Result<u64> {
        fs::copy(from, to).map_err(|err| CoreError::io(from, err))
    }

    fn read_to_string(&self, path: &Path) -> crate::Result<String> {
        fs::read_to_string(path).map_err(|err| CoreError::io(path, err))
    }

    fn read_link(&self, path: &Path) -> crate::Result<PathBuf> {
        fs::read_link(path).map_err(|err| CoreError::io(path, err))
    }

    #[cfg(unix)]
    fn symlink(&self, original: &Path, link: &Path) -> crate::Result<()> {
        std::os::unix::fs::symlink(original, link).map_err(|err| CoreError::io(link, err))
    }

    #[cfg(windows)]
    fn symlink(&self, original: &Path, link: &Path) -> crate::Result<()> {
        // Relative targets resolve against the link's directory.
        let resolved = link.parent().map(|parent| parent.join(original));
        let created = match resolved {
            Some(resolved) if resolved.is_dir() => {
                std::os::windows::fs::symlink_dir(original, link)
            }
            _ => std::os::windows::fs::symlink_file(original, link),
        };
        created.map_err(|err| CoreError::io(link, err))
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _original: &Path, link: &Path) -> crate::Result<()> {
        Err(CoreError::io(
            link,
            io::Error::new(io::ErrorKind::Unsupported, "symlinks are not supported"),
        ))
    }

    fn remove_file(&self, path: &Path) -> crate::Result<()> {
        fs::remove_file(path).map_err(|err| CoreError::io(path, err))
    }

    fn remove_dir_all(&self, path: &Path) -> crate::Result<()> {
        fs::remove_dir_all(path).map_err(|err| CoreError::io(path, err))
    }

    fn list_dir(&self, path: &Path) -> crate::Result<Vec<PathBuf>> {
        let mut children = fs::read_dir(path)
            .map_err(|err| CoreError::io(path, err))?
            .map(|entry| entry.map(|v| v.path()))
            .collect::<Result<Vec<PathBuf>, io::Error>>()
            .map_err(|err| CoreError::io(path, err))?;
        children.sort();
        Ok(children)
    }
}
