// insight: AI narrative summary

use std::sync::Arc;

use tuition_client::{spawn_summary, DisabledSummarizer, GeminiSummarizer, SummarizeError, Summarizer};
use tuition_config::{AIConfigStatus, AIProvider, ResolvedAIConfig, Settings};

use crate::exit_codes::{EXIT_AI_DISABLED, EXIT_AI_KEYCHAIN_ERR, EXIT_AI_MISSING_KEY, EXIT_AI_REQUEST};
use crate::report::print_insight;
use crate::store::{load_dashboard, open_store, SelectionArgs, StoreArgs};
use crate::{print_json, CliError};

/// Build the configured summarizer, failing with the AI exit codes when it
/// cannot be used.
pub fn summarizer_from_config(config: &ResolvedAIConfig) -> Result<Arc<dyn Summarizer>, CliError> {
    match config.status {
        AIConfigStatus::Disabled => {
            return Err(CliError {
                code: EXIT_AI_DISABLED,
                message: "AI is disabled".to_string(),
                hint: Some(format!(
                    "set ai.provider in {}",
                    Settings::config_path_display()
                )),
            })
        }
        AIConfigStatus::MissingKey => {
            return Err(CliError {
                code: EXIT_AI_MISSING_KEY,
                message: config
                    .blocking_reason
                    .clone()
                    .unwrap_or_else(|| "missing API key".to_string()),
                hint: None,
            })
        }
        AIConfigStatus::Error => {
            return Err(CliError {
                code: EXIT_AI_KEYCHAIN_ERR,
                message: config
                    .blocking_reason
                    .clone()
                    .unwrap_or_else(|| "keychain error".to_string()),
                hint: None,
            })
        }
        AIConfigStatus::Ready => {}
    }

    let api_key = config.api_key.clone().unwrap_or_default();
    match config.provider {
        AIProvider::Gemini => {
            let client = GeminiSummarizer::with_base_url(api_key, config.model.clone(), config.endpoint.clone())
                .map_err(summarize_error)?;
            Ok(Arc::new(client))
        }
        AIProvider::None => Ok(Arc::new(DisabledSummarizer)),
    }
}

/// The configured summarizer, or the disabled stub when AI is not usable.
pub fn summarizer_or_disabled() -> Arc<dyn Summarizer> {
    let config = ResolvedAIConfig::load();
    match summarizer_from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            log::info!("AI summary unavailable: {}", e.message);
            Arc::new(DisabledSummarizer)
        }
    }
}

fn summarize_error(err: SummarizeError) -> CliError {
    let code = match err {
        SummarizeError::Disabled => EXIT_AI_DISABLED,
        SummarizeError::MissingKey => EXIT_AI_MISSING_KEY,
        SummarizeError::Network(_) | SummarizeError::Api { .. } | SummarizeError::Parse(_) => {
            EXIT_AI_REQUEST
        }
    };
    CliError { code, message: err.to_string(), hint: None }
}

pub fn cmd_insight(store_args: &StoreArgs, selection: SelectionArgs, json: bool) -> Result<(), CliError> {
    let summarizer = summarizer_from_config(&ResolvedAIConfig::load())?;

    let settings = Settings::load();
    let store = open_store(store_args, &settings)?;
    let dash = load_dashboard(store.as_ref(), Default::default(), &selection)?;
    let records: Vec<_> = dash.selected_records().into_iter().cloned().collect();
    if records.is_empty() {
        return Err(CliError::general("no records to analyze in the selected units"));
    }

    if !json {
        eprintln!("Analyzing {} record(s) with {}...", records.len(), summarizer.name());
    }
    let insight = spawn_summary(summarizer, records)
        .join()
        .map_err(|_| CliError::general("summary worker panicked"))?
        .map_err(summarize_error)?;

    if json {
        print_json(&insight)
    } else {
        print_insight(&insight);
        Ok(())
    }
}
