//! `hotswap watch` command implementation
//!
//! Runs one batch per tick until Ctrl-C or the iteration limit. Each batch
//! is split into partitions dispatched on the blocking pool; rebuilds of
//! the module are picked up between batches.

use std::time::Duration;

use crate::CliError;
use crate::output::{BatchReport, OutputFormat};
use crossbeam_channel::Receiver;
use hotswap_core::{Dispatcher, Host, HostConfig, ReloadEvent, Vec3};
use tracing::{debug, error, info, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Points used when none are given on the command line
const SAMPLE_POINTS: [Vec3; 4] = [
    Vec3::new(1.0, 2.0, 3.0),
    Vec3::new(-1.0, 0.5, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(10.0, -10.0, 0.25),
];

/// Execute the `watch` command
pub async fn run(
    config: &HostConfig,
    points: &[Vec3],
    iterations: Option<u64>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let points = if points.is_empty() {
        SAMPLE_POINTS.to_vec()
    } else {
        points.to_vec()
    };

    let host = Host::from_config(config)?;
    let events = host.coordinator().subscribe();
    let dispatcher = host.dispatcher().clone();

    info!(
        "Watching {} every {}ms ({} partitions)",
        host.coordinator().path(),
        config.poll_interval_ms,
        config.partitions.max(1)
    );

    let period = config.poll_interval().max(MIN_POLL_INTERVAL);
    let mut interval = tokio::time::interval(period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut iteration: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                iteration += 1;
                match dispatch_partitions(&dispatcher, &points, config.partitions, config.weight).await {
                    Ok(transformed) => {
                        let report = BatchReport {
                            iteration: Some(iteration),
                            weight: config.weight,
                            points: &transformed,
                            stats: dispatcher.coordinator().stats(),
                        };
                        println!("{}", report.render(format)?);
                    }
                    // No module yet or a broken first build: keep polling
                    Err(CliError::Dispatch(e)) => warn!("Batch {} skipped: {}", iteration, e),
                    Err(e) => return Err(e),
                }
                drain_events(&events);

                if iterations.is_some_and(|limit| iteration >= limit) {
                    info!("Reached {} iterations", iteration);
                    break;
                }
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    drop(dispatcher);
    host.shutdown();
    drain_events(&events);
    Ok(())
}

/// Split `points` into up to `partitions` chunks and transform them concurrently
///
/// Every chunk sees a single module version; different chunks of the same
/// batch may see different versions if a rebuild lands in between.
pub async fn dispatch_partitions(
    dispatcher: &Dispatcher,
    points: &[Vec3],
    partitions: usize,
    weight: f32,
) -> Result<Vec<Vec3>, CliError> {
    if points.is_empty() {
        return Ok(dispatcher.apply_batch(points, weight)?);
    }

    let chunk_size = points.len().div_ceil(partitions.max(1));
    let handles: Vec<_> = points
        .chunks(chunk_size)
        .map(|chunk| {
            let dispatcher = dispatcher.clone();
            let chunk = chunk.to_vec();
            tokio::task::spawn_blocking(move || dispatcher.apply_batch(&chunk, weight))
        })
        .collect();

    let mut transformed = Vec::with_capacity(points.len());
    for handle in handles {
        let chunk = handle
            .await
            .map_err(|e| CliError::Worker(e.to_string()))??;
        transformed.extend(chunk);
    }
    Ok(transformed)
}

fn drain_events(events: &Receiver<ReloadEvent>) {
    for event in events.try_iter() {
        match event {
            ReloadEvent::Loaded { path, .. } => info!("Loaded {}", path.display()),
            ReloadEvent::ReloadStarted { path } => debug!("Reloading {}", path.display()),
            ReloadEvent::ReloadCompleted { path, duration } => {
                info!("Reloaded {} in {:?}", path.display(), duration)
            }
            ReloadEvent::ReloadFailed { path, error } => {
                warn!("Load of {} failed: {}", path.display(), error)
            }
            ReloadEvent::RolledBack { path, reason } => {
                warn!("Kept previous image of {}: {}", path.display(), reason)
            }
            ReloadEvent::Unloaded { path } => info!("Unloaded {}", path.display()),
        }
    }
}
