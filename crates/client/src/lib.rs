//! Store and summarizer clients.
//!
//! The engine never talks to the network or disk; everything it reads or
//! persists goes through the traits here. All calls are blocking and return
//! `Result`; callers that want them off the main thread use the spawn
//! helpers or a subscription thread.

mod file_store;
mod firebase;
mod gemini;
mod memory;
mod store;
mod summarizer;

pub use file_store::FileStore;
pub use firebase::FirebaseStore;
pub use gemini::GeminiSummarizer;
pub use memory::MemoryStore;
pub use store::{ErrorCallback, SnapshotCallback, StoreError, Subscription, UnitStore};
pub use summarizer::{
    spawn_summary, sample_records, DisabledSummarizer, Insight, InsightSample, SummarizeError,
    Summarizer, SAMPLE_SIZE,
};

/// User agent for outbound requests.
pub(crate) const USER_AGENT: &str = concat!("tuition/", env!("CARGO_PKG_VERSION"));
