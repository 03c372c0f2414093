//! Reload lifecycle notifications

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// Lifecycle events published by the reload coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadEvent {
    /// First image bound to an empty coordinator
    Loaded {
        path: PathBuf,
        modified: Option<SystemTime>,
    },
    /// A newer build was detected and is being loaded
    ReloadStarted { path: PathBuf },
    /// The new build replaced the previous image
    ReloadCompleted { path: PathBuf, duration: Duration },
    /// A load attempt failed
    ReloadFailed { path: PathBuf, error: String },
    /// The previous image stays bound after a failed reload
    RolledBack { path: PathBuf, reason: String },
    /// The bound image was torn down
    Unloaded { path: PathBuf },
}

const SUBSCRIBER_CAPACITY: usize = 256;

/// Fan-out of reload events to any number of subscribers
///
/// Publishing never blocks: a full subscriber misses the event, a
/// disconnected one is dropped.
#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<ReloadEvent>>>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&self) -> Receiver<ReloadEvent> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: ReloadEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(ReloadEvent::ReloadStarted {
            path: PathBuf::from("logic.so"),
        });

        assert!(matches!(a.try_recv(), Ok(ReloadEvent::ReloadStarted { .. })));
        assert!(matches!(b.try_recv(), Ok(ReloadEvent::ReloadStarted { .. })));
    }

    #[test]
    fn test_disconnected_subscribers_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(ReloadEvent::Unloaded {
            path: PathBuf::from("logic.so"),
        });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_full_subscriber_does_not_block() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        for _ in 0..SUBSCRIBER_CAPACITY + 10 {
            bus.publish(ReloadEvent::Unloaded {
                path: PathBuf::from("logic.so"),
            });
        }
        assert_eq!(rx.len(), SUBSCRIBER_CAPACITY);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
