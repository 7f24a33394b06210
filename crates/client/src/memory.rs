//! In-process store. Nothing persists past the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tuition_recon::model::units_from_map;
use tuition_recon::reconcile::ResolutionWrite;
use tuition_recon::{Unit, UnitDataset};

use crate::store::{ErrorCallback, SnapshotCallback, StoreError, Subscription, UnitStore};

const WAKE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Inner {
    units: BTreeMap<String, Unit>,
    listeners: Vec<Sender<Vec<Unit>>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing units (keyed by `unit.id`).
    pub fn with_units(units: Vec<Unit>) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.units = units.into_iter().map(|u| (u.id.clone(), u)).collect();
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Write("memory store lock poisoned".into()))
    }

    fn snapshot(inner: &Inner) -> Vec<Unit> {
        units_from_map(inner.units.clone())
    }

    /// Push the current snapshot to live listeners, dropping closed ones.
    fn notify(inner: &mut Inner) {
        let snapshot = Self::snapshot(inner);
        inner
            .listeners
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

impl UnitStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn load_units(&self) -> Result<Vec<Unit>, StoreError> {
        Ok(Self::snapshot(&*self.lock()?))
    }

    fn write_unit_dataset(&self, dataset: &UnitDataset) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let unit = inner.units.entry(dataset.unit_id.clone()).or_default();
        dataset.apply_to(unit);
        Self::notify(&mut inner);
        Ok(())
    }

    fn write_resolution(&self, write: &ResolutionWrite) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        // A leaf write under a missing unit creates it, as a keyed store would.
        let unit = inner.units.entry(write.unit_id.clone()).or_default();
        write.apply(unit);
        Self::notify(&mut inner);
        Ok(())
    }

    fn delete_unit(&self, unit_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.units.remove(unit_id);
        Self::notify(&mut inner);
        Ok(())
    }

    fn subscribe(
        &self,
        mut on_snapshot: SnapshotCallback,
        _on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel();
        {
            let mut inner = self.lock()?;
            tx.send(Self::snapshot(&inner))
                .map_err(|e| StoreError::Connect(e.to_string()))?;
            inner.listeners.push(tx);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let handle = std::thread::spawn(move || loop {
            if worker_stop.load(Ordering::SeqCst) {
                break;
            }
            match rx.recv_timeout(WAKE_INTERVAL) {
                Ok(units) => {
                    if !worker_stop.load(Ordering::SeqCst) {
                        on_snapshot(units);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Ok(Subscription::new(stop, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tuition_recon::transform::CONTRACT_WIDTH;
    use tuition_recon::{prepare_upload, CellValue, ErrorKind};

    fn dataset(name: &str, students: &[&str]) -> UnitDataset {
        let mut grid = vec![vec![CellValue::text("h"); CONTRACT_WIDTH]];
        for s in students {
            let mut r = vec![CellValue::Empty; CONTRACT_WIDTH];
            r[2] = CellValue::text(*s);
            r[14] = CellValue::Number(2000.0);
            grid.push(r);
        }
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        prepare_upload(None, name, &grid, now)
    }

    #[test]
    fn dataset_write_preserves_resolutions() {
        let store = MemoryStore::new();
        store.write_unit_dataset(&dataset("Centro", &["Ana"])).unwrap();

        let units = store.load_units().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let write = tuition_recon::reconcile::resolve(&units[0], "Ana", "ok", ErrorKind::Date, at).unwrap();
        store.write_resolution(&write).unwrap();

        let units = store.load_units().unwrap();
        let again = prepare_upload(Some(&units[0]), "Centro", &[vec![CellValue::Empty; CONTRACT_WIDTH]], at);
        store.write_unit_dataset(&again).unwrap();

        let units = store.load_units().unwrap();
        assert!(units[0].records.is_empty());
        assert_eq!(units[0].resolutions.len(), 1);
        assert_eq!(units[0].students.len(), 1);
    }

    #[test]
    fn subscription_sees_writes() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::channel();
        let sub = store
            .subscribe(
                Box::new(move |units| {
                    let _ = tx.send(units.len());
                }),
                Box::new(|_| {}),
            )
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 0);
        store.write_unit_dataset(&dataset("Centro", &["Ana"])).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 1);
        store.write_unit_dataset(&dataset("Norte", &["Bia"])).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 2);

        drop(sub);
        std::thread::sleep(WAKE_INTERVAL * 3);
        store.delete_unit("centro").unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
