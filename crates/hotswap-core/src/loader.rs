//! Module loader
//!
//! Handles loading, validating and unloading of module images from shared
//! libraries. The loader keeps no state between calls and never decides
//! *when* to reload; that belongs to the coordinator.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use libloading::Library;
use tracing::{debug, info, warn};

use crate::element::{ENTRY_SYMBOL, TransformFn};
use crate::image::{EntryPoint, ModuleImage};

/// Module load error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to open module {path:?}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    #[error("Symbol `{symbol}` not found in {path:?}: {reason}")]
    SymbolMissing {
        path: PathBuf,
        symbol: &'static str,
        reason: String,
    },
}

/// Module unload error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnloadError {
    #[error("Module image is not loaded")]
    NotLoaded,

    #[error("Failed to close module {path:?}: {reason}")]
    CloseFailed { path: PathBuf, reason: String },
}

/// Loader settings
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Parent directory for shadow copies; the system temp dir when unset
    pub shadow_dir: Option<PathBuf>,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shadow_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.shadow_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

/// Current modification time of `path`, `None` when it cannot be read
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether the file at `path` differs from the recorded modification time
///
/// A missing file is never stale: deploys that remove the old file before
/// writing the new one must not trigger a reload.
pub fn is_stale(path: &Path, recorded: Option<SystemTime>) -> bool {
    is_stale_at(modified_time(path), recorded)
}

pub(crate) fn is_stale_at(current: Option<SystemTime>, recorded: Option<SystemTime>) -> bool {
    match current {
        Some(current) => Some(current) != recorded,
        None => false,
    }
}

/// Loads and unloads module images
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    options: LoaderOptions,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Copy the module into a fresh private directory
    ///
    /// Dynamic linkers hand back the existing mapping when the same path is
    /// opened twice, and some platforms lock mapped files. Opening a private
    /// copy gives every load its own mapping and leaves the deploy path free.
    fn shadow_copy(&self, path: &Path) -> std::io::Result<(tempfile::TempDir, PathBuf)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hotswap-");
        let dir = match &self.options.shadow_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "module path has no file name")
        })?;
        let target = dir.path().join(file_name);
        std::fs::copy(path, &target)?;
        Ok((dir, target))
    }

    /// Load the module at `path` into a new, valid image
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ModuleImage, LoadError> {
        let path = path.as_ref();
        let not_found = |reason: String| LoadError::NotFound {
            path: path.to_path_buf(),
            reason,
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            warn!(path = ?path, error = %e, "Module file unavailable");
            not_found(e.to_string())
        })?;
        let last_modified = metadata.modified().ok();

        let (shadow, shadow_path) = self.shadow_copy(path).map_err(|e| {
            warn!(path = ?path, error = %e, "Failed to stage module copy");
            not_found(e.to_string())
        })?;

        debug!("Opening module copy: {:?}", shadow_path);

        let library = unsafe {
            Library::new(&shadow_path).map_err(|e| {
                warn!(path = ?path, error = %e, "Unable to load module");
                not_found(e.to_string())
            })?
        };

        let resolved: Result<TransformFn, _> =
            unsafe { library.get::<TransformFn>(ENTRY_SYMBOL.as_bytes()).map(|symbol| *symbol) };

        let func = match resolved {
            Ok(func) => func,
            Err(e) => {
                warn!(path = ?path, symbol = ENTRY_SYMBOL, error = %e, "Entry point missing");
                if let Err(close_err) = library.close() {
                    warn!(path = ?path, error = %close_err, "Failed to close rejected module");
                }
                return Err(LoadError::SymbolMissing {
                    path: path.to_path_buf(),
                    symbol: ENTRY_SYMBOL,
                    reason: e.to_string(),
                });
            }
        };

        info!("Loaded module from: {:?}", path);

        Ok(ModuleImage {
            entry_point: Some(EntryPoint::new(func)),
            library: Some(library),
            shadow: Some(shadow),
            source: path.to_path_buf(),
            last_modified,
            loaded_at: Instant::now(),
            is_valid: true,
        })
    }

    /// Close the image's handle and clear it
    ///
    /// Fails with `NotLoaded` on an image that is already invalid. A failed
    /// close is reported, but the image is left invalid either way.
    pub fn unload(&self, image: &mut ModuleImage) -> Result<(), UnloadError> {
        if !image.is_valid {
            return Err(UnloadError::NotLoaded);
        }

        image.is_valid = false;
        image.entry_point = None;
        image.last_modified = None;

        let closed = match image.library.take() {
            Some(library) => library.close().map_err(|e| UnloadError::CloseFailed {
                path: image.source.clone(),
                reason: e.to_string(),
            }),
            None => Ok(()),
        };

        if let Some(shadow) = image.shadow.take()
            && let Err(e) = shadow.close()
        {
            debug!(path = ?image.source, error = %e, "Failed to remove module copy");
        }

        match &closed {
            Ok(()) => debug!("Unloaded module: {:?}", image.source),
            Err(e) => warn!("Unable to unload module: {}", e),
        }

        closed
    }
}
