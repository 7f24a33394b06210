// Gemini summarizer
//
// Sends a sample of the records to the generateContent endpoint and asks for
// a JSON answer constrained by a response schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tuition_recon::BillingRecord;

use crate::summarizer::{sample_records, Insight, SummarizeError, Summarizer};
use crate::USER_AGENT;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

pub struct GeminiSummarizer {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

// ============================================================================
// Gemini API types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn insight_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING", "description": "Resumo da saúde financeira." },
            "anomalies": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Lista de anomalias encontradas."
            },
            "recommendations": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Recomendações estratégicas."
            },
            "financialTrend": { "type": "STRING", "description": "Tendência financeira observada." }
        },
        "required": ["summary", "anomalies", "recommendations", "financialTrend"]
    })
}

fn build_prompt(records: &[BillingRecord]) -> Result<String, SummarizeError> {
    let sample = serde_json::to_string(&sample_records(records))
        .map_err(|e| SummarizeError::Parse(e.to_string()))?;

    Ok(format!(
        "Analyze the following student billing data from an educational institution.\n\
         Each sample has the student name, the billed amount (with scholarships), \
         the minimum required amount and the difference.\n\
         \n\
         Total students analyzed: {}\n\
         Samples: {}\n\
         \n\
         Write a professional financial analysis in Portuguese covering:\n\
         1. The overall financial health regarding scholarships.\n\
         2. Suspicious anomalies, such as very large differences or negative values.\n\
         3. Actionable recommendations for the finance department.\n\
         4. A short comment on the trend of scholarship impact.",
        records.len(),
        sample
    ))
}

/// Parse the model's text. Accepts a bare object or one wrapped in extra text.
fn parse_insight(text: &str) -> Result<Insight, SummarizeError> {
    match serde_json::from_str(text) {
        Ok(insight) => Ok(insight),
        Err(e) => {
            let start = text.find('{');
            let end = text.rfind('}');
            match (start, end) {
                (Some(s), Some(e2)) if s < e2 => {
                    log::debug!("Insight response had text around the JSON object");
                    serde_json::from_str(&text[s..=e2]).map_err(|_| {
                        SummarizeError::Parse(format!("{}. Raw: {}", e, text))
                    })
                }
                _ => Err(SummarizeError::Parse(format!("Response is not JSON: {}. Raw: {}", e, text))),
            }
        }
    }
}

impl GeminiSummarizer {
    pub fn new(api_key: String, model: String) -> Result<Self, SummarizeError> {
        Self::with_base_url(api_key, model, GEMINI_API_BASE.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, SummarizeError> {
        if api_key.is_empty() {
            return Err(SummarizeError::MissingKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SummarizeError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: if model.is_empty() { DEFAULT_MODEL.to_string() } else { model },
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn summarize(&self, records: &[BillingRecord]) -> Result<Insight, SummarizeError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(build_prompt(records)?),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: insight_schema(),
            },
        };

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| SummarizeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(SummarizeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| SummarizeError::Parse(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(SummarizeError::Parse("No candidates in response".to_string()));
        }

        parse_insight(&text)
    }
}
