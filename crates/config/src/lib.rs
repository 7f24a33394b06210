// Configuration loading

pub mod ai;
pub mod secrets;
pub mod settings;

pub use ai::{AIConfigStatus, AIDiagnostics, ResolvedAIConfig};
pub use secrets::{get_secret, KeyLookup, KeySource};
pub use settings::{AIProvider, AISettings, Settings, StoreBackend, StoreSettings};
