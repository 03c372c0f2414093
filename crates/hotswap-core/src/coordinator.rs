//! Reload coordinator
//!
//! Owns the active module image and decides, on every dispatch request,
//! whether a newer build has to be bound.
//!
//! Locking:
//! - readers hold a shared lock on the active slot for a whole batch;
//! - a new build is loaded and validated outside the lock;
//! - the exclusive lock is held only to swap the slot, and acquiring it is
//!   what guarantees every reader of the previous image has finished;
//! - the previous image is unloaded after the lock is released.
//!
//! A reload gate serializes loads. A thread that finds a reload already
//! running keeps serving the bound image instead of waiting.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use crossbeam_channel::Receiver;
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::events::{EventBus, ReloadEvent};
use crate::image::ModuleImage;
use crate::loader::{self, LoadError, ModuleLoader, UnloadError};
use crate::path::ResolvedPath;

/// Dispatch error types
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No module available at {path:?}")]
    NoModuleAvailable {
        path: PathBuf,
        #[source]
        cause: Option<LoadError>,
    },
}

/// Lifecycle state of the active binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingState {
    /// No image has been bound yet, or the binding was torn down
    Empty,
    /// An image is bound and serving
    Loaded,
    /// A newer build is being loaded; the bound image keeps serving
    Reloading,
}

impl BindingState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => BindingState::Loaded,
            2 => BindingState::Reloading,
            _ => BindingState::Empty,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            BindingState::Empty => 0,
            BindingState::Loaded => 1,
            BindingState::Reloading => 2,
        }
    }
}

impl std::fmt::Display for BindingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingState::Empty => write!(f, "Empty"),
            BindingState::Loaded => write!(f, "Loaded"),
            BindingState::Reloading => write!(f, "Reloading"),
        }
    }
}

/// What `ensure_up_to_date` did before handing out the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The bound image was already current
    Current,
    /// The first image was bound
    Loaded,
    /// A newer build replaced the bound image
    Reloaded,
    /// The newer build failed to load; the previous image stays bound
    RolledBack(LoadError),
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadStats {
    /// Modification-time queries made by staleness checks
    pub stat_calls: u64,
    /// Successful loads, the first one included
    pub loads: u64,
    /// Successful swaps of a newer build
    pub reloads: u64,
    /// Failed load attempts
    pub failed_loads: u64,
    /// Images unloaded
    pub unloads: u64,
}

#[derive(Default)]
struct Counters {
    stat_calls: AtomicU64,
    loads: AtomicU64,
    reloads: AtomicU64,
    failed_loads: AtomicU64,
    unloads: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ReloadStats {
        ReloadStats {
            stat_calls: self.stat_calls.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            failed_loads: self.failed_loads.load(Ordering::Relaxed),
            unloads: self.unloads.load(Ordering::Relaxed),
        }
    }
}

/// Modification time of the last build that failed to load
///
/// Lets a build that keeps failing be reported loudly once and quietly on
/// every retry after that.
#[derive(Default)]
struct FailedBuild {
    modified: Mutex<Option<SystemTime>>,
}

impl FailedBuild {
    /// Record a failure; true when this build already failed before
    fn record(&self, modified: Option<SystemTime>) -> bool {
        match modified {
            Some(modified) => self.modified.lock().replace(modified) == Some(modified),
            None => false,
        }
    }

    fn clear(&self) {
        *self.modified.lock() = None;
    }
}

/// Shared read access to the bound image
///
/// Holding this keeps the image bound: a reload cannot swap it out until
/// every outstanding reference is dropped. Do not call back into the
/// coordinator while holding one.
pub struct ActiveImageRef<'a> {
    image: MappedRwLockReadGuard<'a, ModuleImage>,
    outcome: RefreshOutcome,
}

impl ActiveImageRef<'_> {
    pub fn outcome(&self) -> &RefreshOutcome {
        &self.outcome
    }
}

impl Deref for ActiveImageRef<'_> {
    type Target = ModuleImage;

    fn deref(&self) -> &ModuleImage {
        &self.image
    }
}

impl std::fmt::Debug for ActiveImageRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveImageRef")
            .field("image", &*self.image)
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// Owner of the process-wide active module binding
pub struct ReloadCoordinator {
    path: ResolvedPath,
    loader: ModuleLoader,
    active: RwLock<Option<ModuleImage>>,
    reload_gate: Mutex<()>,
    state: AtomicU8,
    counters: Counters,
    failed_build: FailedBuild,
    events: EventBus,
}

impl ReloadCoordinator {
    /// Create an empty coordinator for the module at `path`
    pub fn new(path: ResolvedPath, loader: ModuleLoader) -> Self {
        Self {
            path,
            loader,
            active: RwLock::new(None),
            reload_gate: Mutex::new(()),
            state: AtomicU8::new(BindingState::Empty.as_u8()),
            counters: Counters::default(),
            failed_build: FailedBuild::default(),
            events: EventBus::new(),
        }
    }

    pub fn path(&self) -> &ResolvedPath {
        &self.path
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn state(&self) -> BindingState {
        BindingState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BindingState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn stats(&self) -> ReloadStats {
        self.counters.snapshot()
    }

    /// Subscribe to reload lifecycle events
    pub fn subscribe(&self) -> Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Bind or refresh the image and return read access to it
    ///
    /// - `Empty`: attempts the first load; fails with `NoModuleAvailable`.
    /// - `Loaded`, file unchanged: returns the bound image after one stat.
    /// - `Loaded`, file changed: loads the new build beside the old one and
    ///   swaps it in. If that fails the old image keeps serving and the
    ///   failure is reported as [`RefreshOutcome::RolledBack`].
    pub fn ensure_up_to_date(&self) -> Result<ActiveImageRef<'_>, DispatchError> {
        let recorded = self.active.read().as_ref().map(ModuleImage::last_modified);

        let outcome = match recorded {
            None => self.bind_initial()?,
            Some(recorded) => self.refresh(recorded),
        };

        self.acquire(outcome)
    }

    fn acquire(&self, outcome: RefreshOutcome) -> Result<ActiveImageRef<'_>, DispatchError> {
        let guard = self.active.read();
        RwLockReadGuard::try_map(guard, |slot| slot.as_ref().filter(|image| image.is_valid()))
            .map(|image| ActiveImageRef { image, outcome })
            .map_err(|_| DispatchError::NoModuleAvailable {
                path: self.path.as_path().to_path_buf(),
                cause: None,
            })
    }

    fn bind_initial(&self) -> Result<RefreshOutcome, DispatchError> {
        let _gate = self.reload_gate.lock();
        if self.active.read().is_some() {
            return Ok(RefreshOutcome::Current);
        }

        match self.loader.load(&self.path) {
            Ok(image) => {
                let modified = image.last_modified();
                Counters::bump(&self.counters.loads);
                *self.active.write() = Some(image);
                self.set_state(BindingState::Loaded);

                info!("Bound module: {}", self.path);
                self.events.publish(ReloadEvent::Loaded {
                    path: self.path.as_path().to_path_buf(),
                    modified,
                });
                Ok(RefreshOutcome::Loaded)
            }
            Err(e) => {
                Counters::bump(&self.counters.failed_loads);
                warn!("No module available at {}: {}", self.path, e);
                self.events.publish(ReloadEvent::ReloadFailed {
                    path: self.path.as_path().to_path_buf(),
                    error: e.to_string(),
                });
                Err(DispatchError::NoModuleAvailable {
                    path: self.path.as_path().to_path_buf(),
                    cause: Some(e),
                })
            }
        }
    }

    fn refresh(&self, recorded: Option<SystemTime>) -> RefreshOutcome {
        Counters::bump(&self.counters.stat_calls);
        let current = loader::modified_time(self.path.as_path());
        if !loader::is_stale_at(current, recorded) {
            return RefreshOutcome::Current;
        }

        let Some(_gate) = self.reload_gate.try_lock() else {
            debug!("Reload already in progress, serving bound module");
            return RefreshOutcome::Current;
        };

        // Another thread may have bound this build since the slot was read.
        let bound = self.active.read().as_ref().map(ModuleImage::last_modified);
        match bound {
            Some(bound) if loader::is_stale_at(current, bound) => self.reload(current),
            _ => RefreshOutcome::Current,
        }
    }

    fn reload(&self, modified: Option<SystemTime>) -> RefreshOutcome {
        let path = self.path.as_path().to_path_buf();
        let start = Instant::now();

        self.set_state(BindingState::Reloading);
        debug!("Reloading module: {:?}", path);
        self.events.publish(ReloadEvent::ReloadStarted { path: path.clone() });

        let outcome = match self.loader.load(&path) {
            Ok(image) => {
                Counters::bump(&self.counters.loads);
                let previous = self.active.write().replace(image);
                if let Some(mut previous) = previous {
                    let _ = self.retire(&mut previous);
                }
                Counters::bump(&self.counters.reloads);
                self.failed_build.clear();

                let duration = start.elapsed();
                info!("Module {:?} reloaded in {:?}", path, duration);
                self.events.publish(ReloadEvent::ReloadCompleted { path, duration });
                RefreshOutcome::Reloaded
            }
            Err(e) => {
                Counters::bump(&self.counters.failed_loads);
                if self.failed_build.record(modified) {
                    debug!("Build still failing, keeping previous build: {}", e);
                } else {
                    error!("Failed to reload module, keeping previous build: {}", e);
                }
                self.events.publish(ReloadEvent::ReloadFailed {
                    path: path.clone(),
                    error: e.to_string(),
                });
                self.events.publish(ReloadEvent::RolledBack {
                    path,
                    reason: e.to_string(),
                });
                RefreshOutcome::RolledBack(e)
            }
        };

        self.set_state(BindingState::Loaded);
        outcome
    }

    fn retire(&self, image: &mut ModuleImage) -> Result<(), UnloadError> {
        let result = self.loader.unload(image);
        Counters::bump(&self.counters.unloads);
        if let Err(e) = &result {
            warn!("Previous module not released cleanly: {}", e);
        }
        result
    }

    /// Unload the bound image, if any
    ///
    /// Calling this on an empty coordinator is a no-op. Must not be called
    /// while the same thread holds an [`ActiveImageRef`].
    pub fn teardown(&self) -> Result<(), UnloadError> {
        let _gate = self.reload_gate.lock();
        let previous = self.active.write().take();
        self.set_state(BindingState::Empty);

        match previous {
            Some(mut image) => {
                let result = self.retire(&mut image);
                info!("Unloaded module: {}", self.path);
                self.events.publish(ReloadEvent::Unloaded {
                    path: self.path.as_path().to_path_buf(),
                });
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for ReloadCoordinator {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Teardown on drop failed: {}", e);
        }
    }
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
