//! Recursive directory copy, move and clean.

use crate::errors::{CoreError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::helpers::{canonical_or_relaxed, sanitize_user_path};
use crate::models::{CopyOptions, TransferSummary};
use crate::paths::PathValidator;
use std::path::{Path, PathBuf};

/// Directory helpers bound to a [`FileSystem`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryOps<F: FileSystem = RealFileSystem> {
    paths: PathValidator<F>,
}

impl<F: FileSystem> DirectoryOps<F> {
    pub fn new(fs: F) -> Self {
        Self {
            paths: PathValidator::new(fs),
        }
    }

    fn fs(&self) -> &F {
        self.paths.file_system()
    }

    /// Copies the tree under `source` into `target`.
    ///
    /// `target` must not exist unless `options.overwrite` is set, and must not
    /// live inside `source`. Symlinks are recreated as links, never followed.
    /// When the copy fails and `target` did not exist beforehand, the partial
    /// tree is removed again.
    pub fn copy_dir(
        &self,
        source: &Path,
        target: &Path,
        options: &CopyOptions,
    ) -> Result<TransferSummary> {
        self.paths.ensure_directory(source)?;
        if options.overwrite {
            if self.fs().exists(target) {
                self.paths.ensure_directory(target)?;
            }
        } else {
            self.paths.ensure_not_exists(target)?;
        }
        if is_nested(source, target) {
            return Err(CoreError::invalid_argument(format!(
                "cannot copy {} into itself ({})",
                sanitize_user_path(source),
                sanitize_user_path(target)
            )));
        }

        let created_target = !self.fs().exists(target);
        let summary = match self.copy_tree(source, target) {
            Ok(summary) => summary,
            Err(err) => {
                if created_target {
                    self.discard_partial(target);
                }
                return Err(err);
            }
        };
        tracing::debug!(
            source = %source.display(),
            destination = %target.display(),
            files = summary.files,
            directories = summary.directories,
            bytes = summary.bytes,
            "copied directory"
        );
        Ok(summary)
    }

    /// Copies `source` to `target`, then deletes `source`.
    pub fn move_dir(
        &self,
        source: &Path,
        target: &Path,
        options: &CopyOptions,
    ) -> Result<TransferSummary> {
        let summary = self.copy_dir(source, target, options)?;
        self.fs().remove_dir_all(source)?;
        tracing::debug!(
            source = %source.display(),
            destination = %target.display(),
            "moved directory"
        );
        Ok(summary)
    }

    /// Deletes every entry inside `path`, keeping `path` itself.
    ///
    /// Returns the number of immediate children removed.
    pub fn clean_dir(&self, path: &Path) -> Result<usize> {
        self.paths.ensure_directory(path)?;
        let children = self.fs().list_dir(path)?;
        for child in &children {
            let meta = self.fs().symlink_metadata(child)?;
            if meta.is_dir() {
                self.fs().remove_dir_all(child)?;
            } else {
                self.fs().remove_file(child)?;
            }
        }
        tracing::debug!(path = %path.display(), removed = children.len(), "cleaned directory");
        Ok(children.len())
    }

    fn copy_tree(&self, source: &Path, target: &Path) -> Result<TransferSummary> {
        let mut summary = TransferSummary::default();
        self.fs().create_dir_all(target)?;
        summary.directories += 1;

        for child in self.fs().list_dir(source)? {
            let Some(name) = child.file_name() else {
                continue;
            };
            let destination = target.join(name);
            let meta = self.fs().symlink_metadata(&child)?;
            if meta.file_type().is_symlink() {
                self.copy_link(&child, &destination)?;
                summary.links += 1;
            } else if meta.is_dir() {
                summary.merge(self.copy_tree(&child, &destination)?);
            } else {
                summary.bytes += self.fs().copy_file(&child, &destination)?;
                summary.files += 1;
                tracing::trace!(file = %child.display(), "copied file");
            }
        }
        Ok(summary)
    }

    /// Recreates the link at `source` under `destination` without following it.
    fn copy_link(&self, source: &Path, destination: &Path) -> Result<()> {
        let link_target = self.fs().read_link(source)?;
        if self.fs().symlink_metadata(destination).is_ok() {
            self.fs().remove_file(destination)?;
        }
        self.fs().symlink(&link_target, destination)?;
        tracing::trace!(
            link = %source.display(),
            points_to = %link_target.display(),
            "recreated symlink"
        );
        Ok(())
    }

    fn discard_partial(&self, target: &Path) {
        if let Err(err) = self.fs().remove_dir_all(target) {
            tracing::warn!(
                destination = %target.display(),
                error = %err,
                "failed to remove partially copied directory"
            );
        }
    }
}

fn absolute_target(target: &Path) -> PathBuf {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = canonical_or_relaxed(parent);
    match target.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    }
}

fn is_nested(source: &Path, target: &Path) -> bool {
    absolute_target(target).starts_with(canonical_or_relaxed(source))
}

pub fn copy_dir(source: &Path, target: &Path, options: &CopyOptions) -> Result<TransferSummary> {
    DirectoryOps::new(RealFileSystem).copy_dir(source, target, options)
}

pub fn move_dir(source: &Path, target: &Path, options: &CopyOptions) -> Result<TransferSummary> {
    DirectoryOps::new(RealFileSystem).move_dir(source, target, options)
}

pub fn clean_dir(path: &Path) -> Result<usize> {
    DirectoryOps::new(RealFileSystem).clean_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("top.txt"), "top").unwrap();
        fs::write(root.join("nested/mid.txt"), "middle").unwrap();
        fs::write(root.join("nested/deeper/leaf.txt"), "leaf!").unwrap();
    }

    #[test]
    fn copies_whole_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("target");
        sample_tree(&source);

        let summary = copy_dir(&source, &target, &CopyOptions::default()).unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.directories, 3);
        assert_eq!(summary.bytes, 14);
        assert_eq!(fs::read_to_string(target.join("nested/deeper/leaf.txt")).unwrap(), "leaf!");
        assert!(source.join("top.txt").exists());
    }

    #[test]
    fn copy_refuses_existing_target_without_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("target");
        sample_tree(&source);
        fs::create_dir(&target).unwrap();
        fs::write(target.join("top.txt"), "old").unwrap();

        let err = copy_dir(&source, &target, &CopyOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));

        copy_dir(&source, &target, &CopyOptions::overwriting()).unwrap();
        assert_eq!(fs::read_to_string(target.join("top.txt")).unwrap(), "top");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_recreated_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("target");
        sample_tree(&source);
        std::os::unix::fs::symlink("nested", source.join("to_nested")).unwrap();
        std::os::unix::fs::symlink("gone.txt", source.join("dangling")).unwrap();

        let summary = copy_dir(&source, &target, &CopyOptions::default()).unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.links, 2);
        assert_eq!(fs::read_link(target.join("to_nested")).unwrap(), Path::new("nested"));
        assert_eq!(fs::read_link(target.join("dangling")).unwrap(), Path::new("gone.txt"));
        assert_eq!(fs::read_to_string(target.join("to_nested/mid.txt")).unwrap(), "middle");

        copy_dir(&source, &target, &CopyOptions::overwriting()).unwrap();
        assert_eq!(fs::read_link(target.join("dangling")).unwrap(), Path::new("gone.txt"));

        let moved = tmp.path().join("moved");
        move_dir(&target, &moved, &CopyOptions::default()).unwrap();
        assert!(!target.exists());
        assert!(fs::symlink_metadata(moved.join("dangling")).unwrap().file_type().is_symlink());
    }

    /// Real filesystem whose file copies always fail.
    #[derive(Debug, Clone, Copy)]
    struct BrokenCopies;

    impl FileSystem for BrokenCopies {
        fn exists(&self, path: &Path) -> bool {
            RealFileSystem.exists(path)
        }

        fn metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
            RealFileSystem.metadata(path)
        }

        fn symlink_metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
            RealFileSystem.symlink_metadata(path)
        }

        fn create_dir_all(&self, path: &Path) -> Result<()> {
            RealFileSystem.create_dir_all(path)
        }

        fn copy_file(&self, from: &Path, _to: &Path) -> Result<u64> {
            Err(CoreError::io(
                from,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ))
        }

        fn read_to_string(&self, path: &Path) -> Result<String> {
            RealFileSystem.read_to_string(path)
        }

        fn read_link(&self, path: &Path) -> Result<PathBuf> {
            RealFileSystem.read_link(path)
        }

        fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
            RealFileSystem.symlink(original, link)
        }

        fn remove_file(&self, path: &Path) -> Result<()> {
            RealFileSystem.remove_file(path)
        }

        fn remove_dir_all(&self, path: &Path) -> Result<()> {
            RealFileSystem.remove_dir_all(path)
        }

        fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
            RealFileSystem.list_dir(path)
        }
    }

    #[test]
    fn failed_copy_leaves_no_partial_target() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("target");
        sample_tree(&source);
        let ops = DirectoryOps::new(BrokenCopies);

        let err = ops.copy_dir(&source, &target, &CopyOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::Io(..)));
        assert!(!target.exists());

        let err = ops.move_dir(&source, &target, &CopyOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::Io(..)));
        assert!(!target.exists());
        assert!(source.join("top.txt").is_file());
    }

    #[test]
    fn failed_overwrite_keeps_existing_target() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("target");
        sample_tree(&source);
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "mine").unwrap();

        let ops = DirectoryOps::new(BrokenCopies);
        assert!(ops.copy_dir(&source, &target, &CopyOptions::overwriting()).is_err());
        assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "mine");
    }

    #[test]
    fn copy_requires_directory_source() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            copy_dir(&file, &tmp.path().join("out"), &CopyOptions::default()),
            Err(CoreError::InvalidPath(_))
        ));
        assert!(matches!(
            copy_dir(&tmp.path().join("missing"), &tmp.path().join("out"), &CopyOptions::default()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn copy_into_itself_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        sample_tree(&source);

        let err =
            copy_dir(&source, &source.join("nested/copy"), &CopyOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn move_removes_source() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("moved");
        sample_tree(&source);

        let summary = move_dir(&source, &target, &CopyOptions::default()).unwrap();
        assert_eq!(summary.files, 3);
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(target.join("nested/mid.txt")).unwrap(), "middle");
    }

    #[test]
    fn clean_keeps_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("work");
        sample_tree(&root);

        assert_eq!(clean_dir(&root).unwrap(), 2);
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
        assert_eq!(clean_dir(&root).unwrap(), 0);
    }
}
