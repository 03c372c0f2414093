//! Hotswap Core
//!
//! Hot-swappable native transform modules for long-running hosts:
//! - Module path resolution per platform
//! - Loading, validating and unloading module images
//! - Staleness detection from file modification times
//! - Lock-scoped swapping with rollback to the last good build
//! - Batch dispatch that never spans two module versions

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod element;
pub mod events;
pub mod host;
pub mod image;
pub mod loader;
pub mod path;

pub use crate::config::{ConfigError, ConfigResult, FileFormat, HostConfig};
pub use coordinator::{
    ActiveImageRef, BindingState, DispatchError, RefreshOutcome, ReloadCoordinator, ReloadStats,
};
pub use dispatcher::Dispatcher;
pub use element::{ENTRY_SYMBOL, MODULE_STEM, TransformFn, Vec3};
pub use events::ReloadEvent;
pub use host::{Host, HostError};
pub use image::{EntryPoint, ModuleImage};
pub use loader::{LoadError, LoaderOptions, ModuleLoader, UnloadError, is_stale, modified_time};
pub use path::{PathError, ResolvedPath, module_file_name, resolve};
