use crate::helpers::format_size;
use serde::{Deserialize, Serialize};

/// Kind of filesystem entry a path is expected to be.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options shared by the directory copy and move helpers.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Allow copying into a target directory that already exists, replacing
    /// files with the same relative path.
    pub overwrite: bool,
}

impl CopyOptions {
    pub fn overwriting() -> Self {
        Self { overwrite: true }
    }
}

/// What a copy or move touched.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct TransferSummary {
    pub files: u64,
    pub directories: u64,
    /// Symlinks recreated as links rather than followed.
    pub links: u64,
    pub bytes: u64,
}

impl TransferSummary {
    pub(crate) fn merge(&mut self, other: TransferSummary) {
        self.files += other.files;
        self.directories += other.directories;
        self.links += other.links;
        self.bytes += other.bytes;
    }
}

impl std::fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} files, {} directories, ", self.files, self.directories)?;
        if self.links > 0 {
            write!(f, "{} links, ", self.links)?;
        }
        f.write_str(&format_size(self.bytes))
    }
}
