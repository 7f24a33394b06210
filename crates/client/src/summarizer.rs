//! Narrative summaries of billing data.
//!
//! The summary is advisory. Nothing in the report depends on it, and callers
//! run it on a worker thread so a slow or failing provider never holds up
//! the rest of the output.

use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tuition_recon::BillingRecord;

/// Records sent to the provider per request, taken from the front.
pub const SAMPLE_SIZE: usize = 50;

/// Structured summary returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub anomalies: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub financial_trend: String,
}

impl Insight {
    /// Fixed payload used when no provider is configured.
    pub fn disabled() -> Self {
        Self {
            summary: "AI analysis is disabled.".to_string(),
            anomalies: Vec::new(),
            recommendations: vec![
                "Configure an AI provider in settings.json to enable summaries.".to_string(),
            ],
            financial_trend: String::new(),
        }
    }
}

/// One record as shown to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightSample {
    pub name: String,
    pub billed: f64,
    pub min: f64,
    pub diff: f64,
}

pub fn sample_records(records: &[BillingRecord]) -> Vec<InsightSample> {
    records
        .iter()
        .take(SAMPLE_SIZE)
        .map(|r| InsightSample {
            name: r.student_name.clone(),
            billed: r.billed,
            min: r.minimum,
            diff: r.diff_abs,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeError {
    /// No provider configured
    Disabled,
    /// Provider configured without an API key
    MissingKey,
    /// Could not reach the provider
    Network(String),
    /// Provider answered with an error status
    Api { status: u16, message: String },
    /// Response did not contain a usable insight
    Parse(String),
}

impl std::fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummarizeError::Disabled => write!(f, "AI summaries are disabled"),
            SummarizeError::MissingKey => write!(f, "API key not configured"),
            SummarizeError::Network(msg) => write!(f, "Network error: {}", msg),
            SummarizeError::Api { status, message } => {
                write!(f, "API error ({}): {}", status, message)
            }
            SummarizeError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
        }
    }
}

impl std::error::Error for SummarizeError {}

pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blocking. Run via [`spawn_summary`] to keep it off the caller's thread.
    fn summarize(&self, records: &[BillingRecord]) -> Result<Insight, SummarizeError>;
}

/// Stand-in when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSummarizer;

impl Summarizer for DisabledSummarizer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn summarize(&self, _records: &[BillingRecord]) -> Result<Insight, SummarizeError> {
        Ok(Insight::disabled())
    }
}

/// Run `summarizer` on its own thread.
pub fn spawn_summary(
    summarizer: Arc<dyn Summarizer>,
    records: Vec<BillingRecord>,
) -> JoinHandle<Result<Insight, SummarizeError>> {
    std::thread::spawn(move || {
        log::debug!(
            "Requesting {} summary for {} record(s)",
            summarizer.name(),
            records.len()
        );
        summarizer.summarize(&records)
    })
}
