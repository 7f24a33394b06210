//! Firebase Realtime Database over its REST API.
//!
//! Everything lives under `units/`. Reads are a single `GET units.json`;
//! dataset writes are one multi-path `PATCH` at the root so `resolutions`
//! is never part of the payload; a resolution is one `PUT` on its leaf.
//! Subscriptions use the database's server-sent event stream.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tuition_recon::model::units_from_map;
use tuition_recon::reconcile::ResolutionWrite;
use tuition_recon::{Unit, UnitDataset};

use crate::store::{ErrorCallback, SnapshotCallback, StoreError, Subscription, UnitStore};
use crate::USER_AGENT;

const UNITS_PATH: &str = "units";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FirebaseStore {
    http: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl FirebaseStore {
    /// `database_url` is the instance root, e.g.
    /// `https://<project>-default-rtdb.firebaseio.com`.
    pub fn new(database_url: &str, token: Option<String>) -> Result<Self, StoreError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        Ok(Self {
            http,
            base_url: database_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/.json", self.base_url)
        } else {
            format!("{}/{}.json", self.base_url, path)
        }
    }

    fn auth_query(&self) -> Vec<(&'static str, String)> {
        self.token.iter().map(|t| ("auth", t.clone())).collect()
    }

    fn fetch_units(&self) -> Result<Vec<Unit>, StoreError> {
        fetch_units(&self.http, &self.url(UNITS_PATH), &self.auth_query())
    }

    /// Send a write and map failures. Auth stays `Auth`; everything else
    /// becomes `Write`.
    fn send_write(&self, request: reqwest::blocking::RequestBuilder) -> Result<(), StoreError> {
        let response = request
            .query(&self.auth_query())
            .send()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        match check_status(response) {
            Ok(_) => Ok(()),
            Err(StoreError::Http(code, msg)) => {
                Err(StoreError::Write(format!("HTTP {}: {}", code, msg)))
            }
            Err(e) => Err(e),
        }
    }
}

/// Body of the multi-path update for a dataset write. Keys are relative to
/// the database root.
pub(crate) fn dataset_patch(dataset: &UnitDataset) -> Result<Value, StoreError> {
    let prefix = format!("{}/{}", UNITS_PATH, dataset.unit_id);
    let mut updates = Map::new();

    updates.insert(format!("{}/name", prefix), json!(dataset.name));
    updates.insert(format!("{}/lastUpdated", prefix), json!(dataset.last_updated));
    updates.insert(
        format!("{}/data", prefix),
        serde_json::to_value(&dataset.records).map_err(|e| StoreError::Write(e.to_string()))?,
    );
    // Registry entries are written individually so ids issued by another
    // session are never overwritten wholesale.
    for (id, name) in dataset.students.iter() {
        updates.insert(format!("{}/students/{}", prefix, id), json!(name));
    }

    Ok(Value::Object(updates))
}

/// Path of the single leaf a resolution write sets.
pub(crate) fn resolution_path(write: &ResolutionWrite) -> String {
    format!(
        "{}/{}/resolutions/{}/{}",
        UNITS_PATH, write.unit_id, write.student_id, write.kind
    )
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, StoreError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let msg = error_message(&response.text().unwrap_or_default());
    if status == 401 || status == 403 {
        return Err(StoreError::Auth(msg));
    }
    Err(StoreError::Http(status, msg))
}

fn fetch_units(
    http: &reqwest::blocking::Client,
    url: &str,
    query: &[(&'static str, String)],
) -> Result<Vec<Unit>, StoreError> {
    let response = http
        .get(url)
        .query(query)
        .send()
        .map_err(|e| StoreError::Connect(e.to_string()))?;
    let body: Value = check_status(response)?
        .json()
        .map_err(|e| StoreError::Parse(e.to_string()))?;
    units_from_value(body)
}

/// `null` means no units yet.
fn units_from_value(value: Value) -> Result<Vec<Unit>, StoreError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let map = serde_json::from_value(value).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok(units_from_map(map))
}

/// What to do with one server-sent event.
#[derive(Debug, PartialEq)]
enum StreamAction {
    /// Full snapshot carried in the event itself
    Snapshot(Vec<Unit>),
    /// Partial change; fetch the whole tree again
    Refetch,
    Ignore,
    Stop(StoreError),
}

fn classify_event(event: &str, data: &str) -> StreamAction {
    match event {
        "put" | "patch" => {
            let payload: Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => return StreamAction::Stop(StoreError::Parse(e.to_string())),
            };
            if event == "put" && payload["path"].as_str() == Some("/") {
                match units_from_value(payload["data"].clone()) {
                    Ok(units) => StreamAction::Snapshot(units),
                    Err(e) => StreamAction::Stop(e),
                }
            } else {
                StreamAction::Refetch
            }
        }
        "keep-alive" => StreamAction::Ignore,
        "cancel" => StreamAction::Stop(StoreError::Auth(format!(
            "stream cancelled by server: {}",
            data.trim()
        ))),
        "auth_revoked" => StreamAction::Stop(StoreError::Auth("credential expired".into())),
        other => {
            log::debug!("Ignoring stream event '{}'", other);
            StreamAction::Ignore
        }
    }
}

impl UnitStore for FirebaseStore {
    fn backend_name(&self) -> &'static str {
        "firebase"
    }

    fn load_units(&self) -> Result<Vec<Unit>, StoreError> {
        self.fetch_units()
    }

    fn write_unit_dataset(&self, dataset: &UnitDataset) -> Result<(), StoreError> {
        let body = dataset_patch(dataset)?;
        log::info!(
            "Writing {} record(s) to unit '{}'",
            dataset.records.len(),
            dataset.unit_id
        );
        self.send_write(self.http.patch(self.url("")).json(&body))
    }

    fn write_resolution(&self, write: &ResolutionWrite) -> Result<(), StoreError> {
        let body = serde_json::to_value(&write.resolution)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        self.send_write(self.http.put(self.url(&resolution_path(write))).json(&body))
    }

    fn delete_unit(&self, unit_id: &str) -> Result<(), StoreError> {
        let path = format!("{}/{}", UNITS_PATH, unit_id);
        self.send_write(self.http.delete(self.url(&path)))
    }

    fn subscribe(
        &self,
        mut on_snapshot: SnapshotCallback,
        mut on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError> {
        // The stream stays open indefinitely; no request timeout.
        let stream_http = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let url = self.url(UNITS_PATH);
        let query = self.auth_query();
        let response = stream_http
            .get(&url)
            .query(&query)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        let response = check_status(response)?;

        let fetch_http = self.http.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();

        let handle = std::thread::spawn(move || {
            let reader = BufReader::new(response);
            let mut event = String::new();
            let mut data = String::new();

            for line in reader.lines() {
                if worker_stop.load(Ordering::SeqCst) {
                    return;
                }
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        on_error(StoreError::Connect(e.to_string()));
                        return;
                    }
                };

                if let Some(rest) = line.strip_prefix("event:") {
                    event = rest.trim().to_string();
                    continue;
                }
                if let Some(rest) = line.strip_prefix("data:") {
                    if !data.is_empty() {
                        data.push('\n');
                    }
                    data.push_str(rest.trim_start());
                    continue;
                }
                if !line.is_empty() {
                    continue;
                }

                // Blank line ends the event
                let action = classify_event(&event, &data);
                event.clear();
                data.clear();
                match action {
                    StreamAction::Snapshot(units) => on_snapshot(units),
                    StreamAction::Refetch => match fetch_units(&fetch_http, &url, &query) {
                        Ok(units) => on_snapshot(units),
                        Err(e) => {
                            on_error(e);
                            return;
                        }
                    },
                    StreamAction::Ignore => {}
                    StreamAction::Stop(e) => {
                        log::warn!("Unit stream stopped: {}", e);
                        on_error(e);
                        return;
                    }
                }
            }

            if !worker_stop.load(Ordering::SeqCst) {
                on_error(StoreError::Connect("event stream closed".into()));
            }
        });

        Ok(Subscription::new(stop, handle))
    }
}
