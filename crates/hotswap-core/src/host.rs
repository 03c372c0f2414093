//! Host-facing entry points
//!
//! The host configures the base directory once at startup, applies batches
//! for as long as it runs, and shuts the binding down on exit.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ConfigError, HostConfig};
use crate::coordinator::{DispatchError, ReloadCoordinator};
use crate::dispatcher::Dispatcher;
use crate::element::Vec3;
use crate::loader::{LoaderOptions, ModuleLoader};
use crate::path::{self, PathError};

/// Host error types
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A configured host binding
#[derive(Debug)]
pub struct Host {
    dispatcher: Dispatcher,
}

impl Host {
    /// Resolve the module path under `base_dir` and set up an empty binding
    ///
    /// Nothing is loaded yet; the first batch binds the module.
    pub fn configure_base_directory<P: AsRef<Path>>(base_dir: P) -> Result<Self, HostError> {
        Self::with_loader(base_dir, LoaderOptions::default())
    }

    pub fn from_config(config: &HostConfig) -> Result<Self, HostError> {
        Self::with_loader(&config.base_dir, config.loader_options())
    }

    fn with_loader<P: AsRef<Path>>(base_dir: P, options: LoaderOptions) -> Result<Self, HostError> {
        let resolved = path::resolve(base_dir)?;
        info!("Module path: {}", resolved);

        let coordinator = ReloadCoordinator::new(resolved, ModuleLoader::with_options(options));
        Ok(Self {
            dispatcher: Dispatcher::new(Arc::new(coordinator)),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn coordinator(&self) -> &Arc<ReloadCoordinator> {
        self.dispatcher.coordinator()
    }

    pub fn apply_batch(&self, elements: &[Vec3], weight: f32) -> Result<Vec<Vec3>, HostError> {
        Ok(self.dispatcher.apply_batch(elements, weight)?)
    }

    /// Tear down the binding
    ///
    /// Dispatchers cloned from this host keep the coordinator alive but
    /// find it empty; their next batch loads the module again.
    pub fn shutdown(self) {
        match self.coordinator().teardown() {
            Ok(()) => info!("Host shut down"),
            Err(e) => warn!("Host shut down with unload error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_empty_base_dir() {
        let err = Host::configure_base_directory("").unwrap_err();
        assert!(matches!(err, HostError::Path(PathError::EmptyBaseDir)));
    }

    #[test]
    fn test_from_config_resolves_path() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::from_config(&HostConfig::new(dir.path())).unwrap();
        assert!(host.coordinator().path().as_path().starts_with(dir.path()));
    }

    #[test]
    fn test_apply_before_module_exists() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::configure_base_directory(dir.path()).unwrap();
        let err = host.apply_batch(&[Vec3::new(1.0, 2.0, 3.0)], 1.0).unwrap_err();
        assert!(matches!(err, HostError::Dispatch(DispatchError::NoModuleAvailable { .. })));
        host.shutdown();
    }
}
