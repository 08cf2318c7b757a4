//! Guard clauses for paths handed in by callers.

use crate::errors::{CoreError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::helpers::{normalize_extension, sanitize_user_path};
use crate::models::PathKind;
use std::path::Path;

/// Path checks bound to a [`FileSystem`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PathValidator<F: FileSystem = RealFileSystem> {
    fs: F,
}

impl<F: FileSystem> PathValidator<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    /// Fails with [`CoreError::NotFound`] when `path` does not exist.
    pub fn ensure_exists(&self, path: &Path) -> Result<()> {
        if self.fs.exists(path) {
            Ok(())
        } else {
            Err(CoreError::NotFound(path.to_path_buf()))
        }
    }

    /// Fails with [`CoreError::AlreadyExists`] when `path` exists.
    pub fn ensure_not_exists(&self, path: &Path) -> Result<()> {
        if self.fs.exists(path) {
            Err(CoreError::AlreadyExists(path.to_path_buf()))
        } else {
            Ok(())
        }
    }

    /// Fails unless `path` exists and is of the given kind.
    pub fn ensure_kind(&self, path: &Path, kind: PathKind) -> Result<()> {
        self.ensure_exists(path)?;
        let matches = match kind {
            PathKind::File => self.fs.is_file(path),
            PathKind::Directory => self.fs.is_dir(path),
        };
        if matches {
            Ok(())
        } else {
            Err(CoreError::invalid_path(format!(
                "{} is not a {kind}",
                sanitize_user_path(path)
            )))
        }
    }

    pub fn ensure_file(&self, path: &Path) -> Result<()> {
        self.ensure_kind(path, PathKind::File)
    }

    pub fn ensure_directory(&self, path: &Path) -> Result<()> {
        self.ensure_kind(path, PathKind::Directory)
    }

    /// Checks that `path` is an existing file with one of the allowed extensions.
    pub fn validate_file(&self, path: &Path, extensions: &[&str]) -> Result<()> {
        self.ensure_file(path)?;
        ensure_extension(path, extensions)
    }
}

/// Fails unless the extension of `path` is one of `allowed`.
///
/// Comparison ignores case and a leading dot. An empty `allowed` list accepts
/// any path.
pub fn ensure_extension(path: &Path, allowed: &[&str]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    let actual = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .unwrap_or_default();
    if allowed.iter().any(|ext| normalize_extension(ext) == actual) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(|ext| format!(".{}", normalize_extension(ext)))
        .collect::<Vec<_>>()
        .join(", ");
    Err(CoreError::invalid_path(format!(
        "{} must have one of the extensions {expected}",
        sanitize_user_path(path)
    )))
}

pub fn ensure_exists(path: &Path) -> Result<()> {
    PathValidator::new(RealFileSystem).ensure_exists(path)
}

pub fn ensure_not_exists(path: &Path) -> Result<()> {
    PathValidator::new(RealFileSystem).ensure_not_exists(path)
}

pub fn ensure_file(path: &Path) -> Result<()> {
    PathValidator::new(RealFileSystem).ensure_file(path)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    PathValidator::new(RealFileSystem).ensure_directory(path)
}

pub fn validate_file(path: &Path, extensions: &[&str]) -> Result<()> {
    PathValidator::new(RealFileSystem).validate_file(path, extensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn existence_checks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.xml");
        fs::write(&file, "<a/>").unwrap();

        assert!(ensure_exists(&file).is_ok());
        assert!(matches!(
            ensure_exists(&dir.path().join("missing")),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(ensure_not_exists(&file), Err(CoreError::AlreadyExists(_))));
        assert!(ensure_not_exists(&dir.path().join("missing")).is_ok());
    }

    #[test]
    fn kind_checks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "x").unwrap();

        assert!(ensure_directory(dir.path()).is_ok());
        assert!(ensure_file(&file).is_ok());
        assert!(matches!(ensure_file(dir.path()), Err(CoreError::InvalidPath(_))));
        assert!(matches!(ensure_directory(&file), Err(CoreError::InvalidPath(_))));
        assert!(matches!(
            ensure_file(&dir.path().join("nope.txt")),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn extension_checks_ignore_case_and_dot() {
        assert!(ensure_extension(Path::new("schema.XSD"), &[".xsd"]).is_ok());
        assert!(ensure_extension(Path::new("doc.xml"), &["xsd", "xml"]).is_ok());
        assert!(ensure_extension(Path::new("anything"), &[]).is_ok());

        let err = ensure_extension(Path::new("doc.json"), &["xml"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid path: doc.json must have one of the extensions .xml"
        );
        assert!(ensure_extension(Path::new("no_extension"), &["xml"]).is_err());
    }

    #[test]
    fn validate_file_combines_checks() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("orders.xsd");
        let wrong = dir.path().join("orders.txt");
        fs::write(&schema, "<xs:schema/>").unwrap();
        fs::write(&wrong, "").unwrap();

        assert!(validate_file(&schema, &["xsd"]).is_ok());
        assert!(matches!(validate_file(&wrong, &["xsd"]), Err(CoreError::InvalidPath(_))));
        assert!(matches!(
            validate_file(&dir.path().join("gone.xsd"), &["xsd"]),
            Err(CoreError::NotFound(_))
        ));
    }
}
