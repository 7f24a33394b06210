//! Local JSON file store.
//!
//! Layout mirrors the hosted database: `{"units": {"<unit_id>": {...}}}`.
//! Writes are read-modify-write of the whole document, written to a temp
//! file and renamed into place. Subscriptions poll the file's mtime.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tuition_recon::model::units_from_map;
use tuition_recon::reconcile::ResolutionWrite;
use tuition_recon::{Unit, UnitDataset};

use crate::store::{ErrorCallback, SnapshotCallback, StoreError, Subscription, UnitStore};

const DEFAULT_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    units: BTreeMap<String, Unit>,
}

pub struct FileStore {
    path: PathBuf,
    poll_interval: Duration,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: DEFAULT_POLL,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, Unit>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Write("file store lock poisoned".into()))?;
        let mut doc = read_document(&self.path)?;
        change(&mut doc.units);
        write_document(&self.path, &doc)
    }
}

/// Missing file reads as an empty store.
fn read_document(path: &Path) -> Result<Document, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::default()),
        Err(e) => return Err(StoreError::Connect(format!("{}: {}", path.display(), e))),
    };
    if contents.trim().is_empty() {
        return Ok(Document::default());
    }
    serde_json::from_str(&contents)
        .map_err(|e| StoreError::Parse(format!("{}: {}", path.display(), e)))
}

fn write_document(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let io_err = |e: std::io::Error| StoreError::Write(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(doc).map_err(|e| StoreError::Write(e.to_string()))?;

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&temp_path, path).map_err(io_err)?;

    log::debug!("Wrote {} unit(s) to {}", doc.units.len(), path.display());
    Ok(())
}

/// Change marker for polling: (mtime, length). None when the file is absent.
fn fingerprint(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

impl UnitStore for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn load_units(&self) -> Result<Vec<Unit>, StoreError> {
        Ok(units_from_map(read_document(&self.path)?.units))
    }

    fn write_unit_dataset(&self, dataset: &UnitDataset) -> Result<(), StoreError> {
        self.update(|units| {
            let unit = units.entry(dataset.unit_id.clone()).or_default();
            dataset.apply_to(unit);
        })
    }

    fn write_resolution(&self, write: &ResolutionWrite) -> Result<(), StoreError> {
        self.update(|units| {
            let unit = units.entry(write.unit_id.clone()).or_default();
            write.apply(unit);
        })
    }

    fn delete_unit(&self, unit_id: &str) -> Result<(), StoreError> {
        self.update(|units| {
            units.remove(unit_id);
        })
    }

    fn subscribe(
        &self,
        mut on_snapshot: SnapshotCallback,
        mut on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError> {
        let path = self.path.clone();
        let interval = self.poll_interval;

        let initial = units_from_map(read_document(&path)?.units);
        let mut last_seen = fingerprint(&path);

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            on_snapshot(initial);
            while !worker_stop.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if worker_stop.load(Ordering::SeqCst) {
                    break;
                }
                let current = fingerprint(&path);
                if current == last_seen {
                    continue;
                }
                last_seen = current;
                match read_document(&path) {
                    Ok(doc) => on_snapshot(units_from_map(doc.units)),
                    Err(e) => {
                        log::warn!("File store watch stopped: {}", e);
                        on_error(e);
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(stop, handle))
    }
}
