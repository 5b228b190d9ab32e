use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ports::LlmService, DomainError};
use crate::infrastructure::config::GeminiConfig;

pub struct GeminiLlm {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiLlm {
    pub fn new(config: &GeminiConfig) -> Result<Self, DomainError> {
        if config.api_key.is_empty() {
            warn!("GEMINI_API_KEY is not set; chat requests will be rejected upstream");
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DomainError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request(&self, request: GenerateRequest<'_>) -> Result<String, DomainError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(map_provider_error(status, &detail));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("invalid Gemini response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(DomainError::upstream(
                "empty response from Gemini model".to_string(),
            ));
        }

        debug!(model = %self.model, response_chars = text.len(), "completion generated");
        Ok(text)
    }
}

#[async_trait]
impl LlmService for GeminiLlm {
    async fn generate(&self, prompt: &str) -> Result<String, DomainError> {
        self.request(GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: None,
        })
        .await
    }

    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, DomainError> {
        self.request(GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: Some(SystemInstruction {
                parts: vec![Part { text: system }],
            }),
        })
        .await
    }
}

fn map_transport_error(e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::timeout(format!("Gemini request timed out: {e}"))
    } else {
        DomainError::upstream(format!("Gemini API unreachable: {e}"))
    }
}

fn map_provider_error(status: reqwest::StatusCode, detail: &str) -> DomainError {
    use reqwest::StatusCode;
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DomainError::upstream(format!(
            "Gemini API rejected credentials ({status}): {detail}"
        )),
        StatusCode::TOO_MANY_REQUESTS => DomainError::upstream(format!(
            "Gemini API rate limit hit ({status}): {detail}"
        )),
        _ => DomainError::upstream(format!("Gemini API error ({status}): {detail}")),
    }
}
