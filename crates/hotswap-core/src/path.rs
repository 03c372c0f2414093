//! Module path resolution
//!
//! Derives the on-disk location of the module image from the host-supplied
//! base directory. The file may not exist yet; existence is checked at load
//! time.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::element::MODULE_STEM;

/// Path resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Base directory is empty")]
    EmptyBaseDir,
}

/// Immutable location of the module image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// File name of the module, e.g. `logic.so`
    pub fn file_name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Platform file name of the module: `<stem>.<dll extension>`
pub fn module_file_name() -> String {
    format!("{}.{}", MODULE_STEM, std::env::consts::DLL_EXTENSION)
}

/// Resolve the module image path under `base_dir`
///
/// The base is joined as given; only an empty or whitespace-only base is
/// rejected.
pub fn resolve(base_dir: impl AsRef<Path>) -> Result<ResolvedPath, PathError> {
    let base = base_dir.as_ref();
    let blank = base.as_os_str().is_empty()
        || base.to_str().is_some_and(|s| s.trim().is_empty());
    if blank {
        return Err(PathError::EmptyBaseDir);
    }

    Ok(ResolvedPath(base.join(module_file_name())))
}
