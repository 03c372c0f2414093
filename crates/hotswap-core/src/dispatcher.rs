//! Per-element dispatch through the bound entry point

use std::sync::Arc;

use tracing::{debug, trace};

use crate::coordinator::{DispatchError, RefreshOutcome, ReloadCoordinator};
use crate::element::Vec3;
use crate::image::EntryPoint;

/// Applies the bound module's `transform` to batches of elements
///
/// Cheap to clone; every clone shares the same coordinator, so worker
/// threads can each hold one.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    coordinator: Arc<ReloadCoordinator>,
}

impl Dispatcher {
    pub fn new(coordinator: Arc<ReloadCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<ReloadCoordinator> {
        &self.coordinator
    }

    /// Run `f` with the entry point of an up-to-date image
    ///
    /// Staleness is checked once per batch. The read access obtained here
    /// is held until `f` returns, so one batch never spans two builds.
    fn with_entry_point<R>(&self, f: impl FnOnce(&EntryPoint) -> R) -> Result<R, DispatchError> {
        let image = self.coordinator.ensure_up_to_date()?;
        if let RefreshOutcome::RolledBack(e) = image.outcome() {
            debug!("Dispatching with previous module after failed reload: {}", e);
        }

        let entry = image
            .entry_point()
            .ok_or_else(|| DispatchError::NoModuleAvailable {
                path: image.source().to_path_buf(),
                cause: None,
            })?;

        Ok(f(entry))
    }

    /// Transform every element, preserving input order
    pub fn apply_batch(&self, elements: &[Vec3], weight: f32) -> Result<Vec<Vec3>, DispatchError> {
        let results = self.with_entry_point(|entry| {
            elements
                .iter()
                .map(|&element| entry.call(element, weight))
                .collect::<Vec<_>>()
        })?;
        trace!(count = results.len(), weight, "Applied batch");
        Ok(results)
    }

    /// Transform every element and write the result back
    ///
    /// On failure the elements are left untouched.
    pub fn apply_in_place(&self, elements: &mut [Vec3], weight: f32) -> Result<(), DispatchError> {
        self.with_entry_point(|entry| {
            for element in elements.iter_mut() {
                *element = entry.call(*element, weight);
            }
        })?;
        trace!(count = elements.len(), weight, "Applied batch in place");
        Ok(())
    }
}
