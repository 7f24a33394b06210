//! The unit store contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tuition_recon::reconcile::ResolutionWrite;
use tuition_recon::{Unit, UnitDataset};

/// Receives the full unit list on every change.
pub type SnapshotCallback = Box<dyn FnMut(Vec<Unit>) + Send>;

/// Receives subscription failures. The subscription stops after reporting.
pub type ErrorCallback = Box<dyn FnMut(StoreError) + Send>;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Could not reach the store
    Connect(String),
    /// Rejected credentials (401/403)
    Auth(String),
    /// Non-success HTTP status
    Http(u16, String),
    /// Persisting a change failed
    Write(String),
    /// Stored data could not be decoded
    Parse(String),
    /// Unit id not present
    UnknownUnit(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connect(msg) => write!(f, "Store connection failed: {}", msg),
            StoreError::Auth(msg) => write!(f, "Store rejected credentials: {}", msg),
            StoreError::Http(code, msg) => write!(f, "Store HTTP {}: {}", code, msg),
            StoreError::Write(msg) => write!(f, "Store write failed: {}", msg),
            StoreError::Parse(msg) => write!(f, "Store data unreadable: {}", msg),
            StoreError::UnknownUnit(id) => write!(f, "Unknown unit: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistent home of every unit.
///
/// Dataset writes replace name, timestamp and records, add registry entries
/// and never touch resolutions. Resolution writes set exactly one leaf.
pub trait UnitStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Current units, in key order.
    fn load_units(&self) -> Result<Vec<Unit>, StoreError>;

    fn write_unit_dataset(&self, dataset: &UnitDataset) -> Result<(), StoreError>;

    fn write_resolution(&self, write: &ResolutionWrite) -> Result<(), StoreError>;

    fn delete_unit(&self, unit_id: &str) -> Result<(), StoreError>;

    /// Deliver the current snapshot, then a fresh one after every change,
    /// on a background thread until the returned handle is dropped.
    fn subscribe(
        &self,
        on_snapshot: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError>;
}

/// Live subscription. Dropping it stops delivery.
pub struct Subscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(stop: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Block until the worker exits (error, stream end, or stop).
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The worker may be parked in a blocking read; it exits on its next
        // wake-up instead of being joined here.
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_sets_stop_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            while !worker_stop.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        });
        let sub = Subscription::new(stop.clone(), handle);
        assert!(!stop.load(Ordering::SeqCst));
        drop(sub);
        assert!(stop.load(Ordering::SeqCst));
    }

    #[test]
    fn error_display() {
        assert_eq!(StoreError::Http(503, "busy".into()).to_string(), "Store HTTP 503: busy");
        assert!(StoreError::Auth("Permission denied".into()).to_string().contains("credentials"));
    }
}
