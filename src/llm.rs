use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Binary image attached inline to a prompt.
#[derive(Debug, Clone, Copy)]
pub struct InlineImage<'a> {
    pub mime_type: &'a str,
    pub data: &'a [u8],
}

/// One system instruction plus a single user turn of text and image.
#[derive(Debug, Clone, Copy)]
pub struct MultimodalPrompt<'a> {
    pub system_instruction: &'a str,
    pub user_text: &'a str,
    pub image: InlineImage<'a>,
}

/// A hosted model that accepts mixed text and image input and answers with text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &MultimodalPrompt<'_>) -> Result<String>;
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

fn build_request(prompt: &MultimodalPrompt<'_>) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: SystemInstruction {
            parts: vec![TextPart {
                text: prompt.system_instruction.to_string(),
            }],
        },
        contents: vec![Content {
            role: "user".into(),
            parts: vec![
                Part::Text {
                    text: prompt.user_text.to_string(),
                },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: prompt.image.mime_type.to_string(),
                        data: STANDARD.encode(prompt.image.data),
                    },
                },
            ],
        }],
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = block_reason.unwrap_or_else(|| "no candidates returned".to_string());
        return Err(AppError::LlmError(format!("Model returned no answer ({})", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(AppError::LlmError(format!(
            "Model returned an empty answer (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}

fn describe_api_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(code) => format!("{} ({}): {}", status, code, parsed.error.message),
            None => format!("{}: {}", status, parsed.error.message),
        },
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            api_base: api_base.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.google_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_api_base.clone(),
        )
    }

    /// Resolves the configured model with the configured key. Any failure is
    /// a configuration error: startup must stop.
    pub async fn verify_model(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.api_base, self.model);
        let res = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ConfigError(format!("Cannot reach Gemini API: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::ConfigError(format!(
                "Failed to load Gemini model '{}'. Check that the API key is valid. {}",
                self.model,
                describe_api_error(status, &body)
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &MultimodalPrompt<'_>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let body = build_request(prompt);

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LlmError(e.to_string()))?;

        let status = res.status();
        let raw = res
            .text()
            .await
            .map_err(|e| AppError::LlmError(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::LlmError(describe_api_error(status, &raw)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&raw)
            .map_err(|e| AppError::LlmError(format!("Invalid response format from LLM: {}", e)))?;

        extract_text(parsed)
    }
}
