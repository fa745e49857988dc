//! OpenAI vision client for photo condition analysis
//!
//! One call: submit a downsized JPEG of the upload and get back a
//! structured verdict (black-and-white? faces? damage severity?) that
//! steers which restoration strategy runs. The model is asked for JSON
//! and anything it returns that does not parse falls back to a safe
//! default verdict, because a wrong guess here only picks a different
//! filter chain.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const USER_AGENT: &str = "PhotoRestore/0.1.0";
const ANALYSIS_MODEL: &str = "gpt-4o";
const MAX_RESPONSE_TOKENS: u32 = 800;

const SYSTEM_PROMPT: &str =
    "You are an expert photo restoration AI. You analyze old photographs and respond only with JSON.";

const ANALYSIS_PROMPT: &str = "Analyze this old photograph. Respond with a JSON object containing: \
    isBlackAndWhite (boolean), hasFaces (boolean), damageLevel (one of \"low\", \"medium\", \"high\"), \
    recommendedEnhancements (array of short strings), colorPalette (short description of the dominant tones).";

/// OpenAI client errors
#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Damage severity reported by the analysis model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageLevel {
    Low,
    Medium,
    High,
}

/// Structured verdict about a photo's condition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestorationAnalysis {
    /// Monochrome or sepia source, a candidate for colorization
    pub is_black_and_white: bool,
    /// People present, a candidate for face restoration
    pub has_faces: bool,
    /// Overall damage severity
    pub damage_level: DamageLevel,
    /// Free-form suggestions from the model
    pub recommended_enhancements: Vec<String>,
    /// Dominant tones, when the model reports them
    pub color_palette: Option<String>,
}

impl Default for RestorationAnalysis {
    fn default() -> Self {
        Self {
            is_black_and_white: false,
            has_faces: false,
            damage_level: DamageLevel::Medium,
            recommended_enhancements: vec!["general enhancement".to_string()],
            color_palette: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// OpenAI chat-completions API client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self, OpenAiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| OpenAiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }

    /// Ask the vision model for a condition verdict on the given JPEG.
    ///
    /// The caller is expected to pass a small proxy (the orchestrator sends
    /// ≤512 px); there is no point paying vision-token prices for full
    /// resolution.
    pub async fn analyze_restoration(&self, jpeg: &[u8]) -> Result<RestorationAnalysis, OpenAiError> {
        let data_uri = format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg));

        let body = json!({
            "model": ANALYSIS_MODEL,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": ANALYSIS_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_uri } }
                    ]
                }
            ],
            "response_format": { "type": "json_object" },
            "max_tokens": MAX_RESPONSE_TOKENS,
        });

        tracing::debug!(bytes = jpeg.len(), model = ANALYSIS_MODEL, "requesting photo analysis");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", OPENAI_BASE_URL))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OpenAiError::Network(e.to_string()))?;

        let status = response.status();

        if status == 429 {
            return Err(OpenAiError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OpenAiError::Api(status.as_u16(), error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OpenAiError::Parse(e.to_string()))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        let analysis = parse_analysis(content);

        tracing::info!(
            damage_level = ?analysis.damage_level,
            black_and_white = analysis.is_black_and_white,
            has_faces = analysis.has_faces,
            "photo analysis complete"
        );

        Ok(analysis)
    }
}

/// Parse the model's JSON verdict, falling back to the default verdict
/// when the content is missing fields or is not JSON at all.
fn parse_analysis(content: &str) -> RestorationAnalysis {
    serde_json::from_str(content).unwrap_or_default()
}
