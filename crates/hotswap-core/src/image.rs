//! Loaded module image
//!
//! A [`ModuleImage`] owns one mapping of the module: the library handle, the
//! entry point resolved from it, the modification time of the file it was
//! loaded from and a validity flag.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use libloading::Library;
use tempfile::TempDir;

use crate::element::{TransformFn, Vec3};

/// Resolved entry point of a module
///
/// Only obtainable from a valid [`ModuleImage`] and never outlives it, so the
/// function pointer cannot dangle past an unload.
pub struct EntryPoint {
    func: TransformFn,
}

impl EntryPoint {
    pub(crate) fn new(func: TransformFn) -> Self {
        Self { func }
    }

    /// Invoke the module's `transform`
    pub fn call(&self, element: Vec3, weight: f32) -> Vec3 {
        // SAFETY: the pointer was resolved from a library the owning image
        // keeps open for as long as `self` is borrowed from it.
        unsafe { (self.func)(element, weight) }
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("func", &(self.func as *const ()))
            .finish()
    }
}

/// One loaded instance of the module
pub struct ModuleImage {
    // Field order is drop order: the pointer goes first, then the handle,
    // then the shadow directory the handle was opened from.
    pub(crate) entry_point: Option<EntryPoint>,
    pub(crate) library: Option<Library>,
    pub(crate) shadow: Option<TempDir>,
    pub(crate) source: PathBuf,
    pub(crate) last_modified: Option<SystemTime>,
    pub(crate) loaded_at: Instant,
    pub(crate) is_valid: bool,
}

impl ModuleImage {
    /// An image that holds no handle
    pub(crate) fn invalid(source: PathBuf) -> Self {
        Self {
            entry_point: None,
            library: None,
            shadow: None,
            source,
            last_modified: None,
            loaded_at: Instant::now(),
            is_valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// The entry point, present only while the image is valid
    pub fn entry_point(&self) -> Option<&EntryPoint> {
        if self.is_valid {
            self.entry_point.as_ref()
        } else {
            None
        }
    }

    /// Path of the module file this image was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path of the private copy the handle was opened from
    pub fn shadow_path(&self) -> Option<PathBuf> {
        let file_name = self.source.file_name()?;
        self.shadow.as_ref().map(|dir| dir.path().join(file_name))
    }

    /// Modification time recorded when the image was loaded
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }
}

impl fmt::Debug for ModuleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleImage")
            .field("source", &self.source)
            .field("last_modified", &self.last_modified)
            .field("is_valid", &self.is_valid)
            .field("has_handle", &self.library.is_some())
            .finish()
    }
}
