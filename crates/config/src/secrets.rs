// Firebase token and Gemini key lookup: keychain first, then
// TUITION_<NAME>_KEY. settings.json never holds secrets.

use std::env;

/// Service name for keychain storage
#[cfg_attr(not(feature = "keychain"), allow(dead_code))]
const KEYCHAIN_SERVICE: &str = "tuition-recon";

/// Source of a secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Retrieved from system keychain
    Keychain,
    /// Retrieved from environment variable
    Environment,
    /// Not found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of a secret lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
    /// Keychain failure other than "no such entry"
    pub keychain_error: Option<String>,
}

/// Environment variable for a named secret: `TUITION_<NAME>_KEY`
pub fn env_var_name(name: &str) -> String {
    format!("TUITION_{}_KEY", name.to_uppercase())
}

/// Keychain account for a named secret
#[cfg_attr(not(feature = "keychain"), allow(dead_code))]
fn keychain_account(name: &str) -> String {
    format!("secret/{}", name.to_lowercase())
}

#[cfg(feature = "keychain")]
fn keychain_lookup(name: &str) -> Result<Option<String>, String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(name)).map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(not(feature = "keychain"))]
fn keychain_lookup(_name: &str) -> Result<Option<String>, String> {
    Ok(None)
}

/// Look up a secret by name ("gemini", "firebase"). A keychain failure is
/// reported alongside whatever the environment provides.
pub fn get_secret(name: &str) -> KeyLookup {
    let keychain_error = match keychain_lookup(name) {
        Ok(Some(key)) => {
            return KeyLookup { key: Some(key), source: KeySource::Keychain, keychain_error: None }
        }
        Ok(None) => None,
        Err(e) => {
            log::debug!("Keychain lookup for '{}' failed: {}", name, e);
            Some(e)
        }
    };

    match env::var(env_var_name(name)) {
        Ok(key) if !key.is_empty() => KeyLookup {
            key: Some(key),
            source: KeySource::Environment,
            keychain_error,
        },
        _ => KeyLookup { key: None, source: KeySource::None, keychain_error },
    }
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "probe").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}
