// Insight provider configuration, resolved once from settings and secrets

use serde_json::{json, Value};

use crate::secrets::{env_var_name, get_secret, keychain_available, KeySource};
use crate::settings::{AIProvider, AISettings};

/// What the insight commands should use: provider, model, endpoint and key.
#[derive(Debug, Clone)]
pub struct ResolvedAIConfig {
    pub provider: AIProvider,
    /// Model from settings, else the provider default
    pub model: String,
    /// API base without trailing slash
    pub endpoint: String,
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub status: AIConfigStatus,
    /// Why the summarizer cannot run
    pub blocking_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AIConfigStatus {
    /// `ai.provider` is "none"
    Disabled,
    Ready,
    /// No key in the keychain or the environment
    MissingKey,
    /// Keychain lookup failed and the environment had no key either
    Error,
}

impl AIConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
            Self::Error => "error",
        }
    }

    pub fn usable(&self) -> bool {
        *self == Self::Ready
    }
}

impl ResolvedAIConfig {
    fn disabled(provider: AIProvider) -> Self {
        Self {
            provider,
            model: String::new(),
            endpoint: String::new(),
            api_key: None,
            key_source: KeySource::None,
            status: AIConfigStatus::Disabled,
            blocking_reason: None,
        }
    }

    /// Resolve against the keychain/environment. A disabled provider never
    /// touches the keychain.
    pub fn resolve(settings: &AISettings) -> Self {
        let provider = settings.provider;
        if !provider.is_enabled() {
            return Self::disabled(provider);
        }

        let secret = provider.name();
        let lookup = get_secret(secret);
        let (status, blocking_reason) = if lookup.key.is_some() {
            (AIConfigStatus::Ready, None)
        } else if let Some(err) = &lookup.keychain_error {
            (
                AIConfigStatus::Error,
                Some(format!("keychain lookup failed ({err}); export {} instead", env_var_name(secret))),
            )
        } else {
            (
                AIConfigStatus::MissingKey,
                Some(format!(
                    "no {} API key; store one in the keychain or export {}",
                    provider.name(),
                    env_var_name(secret)
                )),
            )
        };

        Self {
            provider,
            model: settings.effective_model().to_string(),
            endpoint: settings.effective_endpoint().trim_end_matches('/').to_string(),
            api_key: lookup.key,
            key_source: lookup.source,
            status,
            blocking_reason,
        }
    }

    /// Read settings.json and resolve.
    pub fn load() -> Self {
        Self::resolve(&crate::settings::Settings::load().ai)
    }
}

// ============================================================================
// `tuition ai doctor`
// ============================================================================

/// Snapshot of the insight configuration for `ai doctor`. Never holds the key.
#[derive(Debug)]
pub struct AIDiagnostics {
    pub provider: &'static str,
    pub model: String,
    pub endpoint: String,
    pub status: AIConfigStatus,
    pub key_present: bool,
    pub key_source: KeySource,
    pub keychain_available: bool,
    pub blocking_reason: Option<String>,
}

impl AIDiagnostics {
    pub fn from_resolved(config: &ResolvedAIConfig) -> Self {
        Self {
            provider: config.provider.name(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            status: config.status,
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            keychain_available: keychain_available(),
            blocking_reason: config.blocking_reason.clone(),
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let yes_no = |b: bool| (if b { "yes" } else { "no" }).to_string();
        let mut rows = vec![
            ("Insight provider", self.provider.to_string()),
            ("Status", self.status.as_str().to_string()),
        ];
        if !self.model.is_empty() {
            rows.push(("Model", self.model.clone()));
        }
        if !self.endpoint.is_empty() {
            rows.push(("Endpoint", self.endpoint.clone()));
        }
        rows.push(("API key", yes_no(self.key_present)));
        rows.push(("Key source", self.key_source.as_str().to_string()));
        rows.push(("Keychain", yes_no(self.keychain_available)));
        if let Some(reason) = &self.blocking_reason {
            rows.push(("Problem", reason.clone()));
        }
        rows
    }

    /// JSON document printed by `ai doctor --json`.
    pub fn to_json(&self, settings_path: &str) -> Value {
        json!({
            "schema_version": 1,
            "status": self.status.as_str(),
            "blocking_reason": self.blocking_reason,
            "provider": self.provider,
            "model": self.model,
            "endpoint": self.endpoint,
            "key": if self.key_present { "present" } else { "missing" },
            "key_source": self.key_source.as_str(),
            "keychain": if self.keychain_available { "ok" } else { "unavailable" },
            "settings": settings_path,
        })
    }
}

impl std::fmt::Display for AIDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.rows();
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 2;
        for (label, value) in rows {
            writeln!(f, "{:<width$}{}", format!("{label}:"), value, width = width)?;
        }
        Ok(())
    }
}
