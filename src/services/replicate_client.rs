//! Replicate predictions client for hosted image-to-image restoration
//!
//! Create-and-poll workflow: `POST /predictions` starts a model run,
//! `GET /predictions/{id}` is polled until it reaches a terminal status,
//! and the first output URL is downloaded as the result image. Model
//! versions are pinned so a model author pushing a new build cannot
//! change this service's output.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::restoration::RestorationMode;

const REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";
const USER_AGENT: &str = "PhotoRestore/0.1.0";

/// Poll cadence while a prediction runs
const POLL_INTERVAL_MS: u64 = 2000;

/// Give up on a prediction after this long
const POLL_TIMEOUT_SECS: u64 = 120;

/// Upscale factor for the general enhancement pass
const DEFAULT_SCALE: u32 = 4;

/// Ceiling the upscale factor is capped at
const MAX_SCALE: u32 = 8;

struct ModelSpec {
    name: &'static str,
    version: &'static str,
}

const REAL_ESRGAN: ModelSpec = ModelSpec {
    name: "nightmareai/real-esrgan",
    version: "42fed1c4974146d4d2414e2be2c5277c7fcf05fcc3a73abf41610695738c1d7b",
};

const CODEFORMER: ModelSpec = ModelSpec {
    name: "sczhou/codeformer",
    version: "7de2b26c81e908ba9841a956fe2ab1e0a4e936cc8394d4c64b2cab85b1f7b8f0",
};

const DEOLDIFY: ModelSpec = ModelSpec {
    name: "arielreplicate/deoldify_image",
    version: "4bdd09845c459c7bf2bb8c2726c9e6d0f1e10a6b88ff5b69a7fa4bf82b354088",
};

/// Replicate client errors
#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Prediction {0} failed: {1}")]
    PredictionFailed(String, String),

    #[error("Prediction {0} produced no output")]
    NoOutput(String),

    #[error("Prediction {0} still running after {1}s")]
    Timeout(String, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

/// Some models return a single URL, others a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    One(String),
    Many(Vec<String>),
}

impl PredictionOutput {
    fn first_url(&self) -> Option<&str> {
        match self {
            PredictionOutput::One(url) => Some(url.as_str()),
            PredictionOutput::Many(urls) => urls.first().map(|u| u.as_str()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    output: Option<PredictionOutput>,
    error: Option<String>,
}

/// Replicate API client
pub struct ReplicateClient {
    http_client: reqwest::Client,
    api_token: String,
}

impl ReplicateClient {
    pub fn new(api_token: String) -> Result<Self, ReplicateError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReplicateError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_token,
        })
    }

    /// Run the model behind `mode` over the given JPEG and return the
    /// result image bytes.
    pub async fn transform(&self, jpeg: &[u8], mode: RestorationMode) -> Result<Vec<u8>, ReplicateError> {
        let data_uri = format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg));
        let (model, input) = model_invocation(&data_uri, mode);

        let prediction = self.create_prediction(model, input).await?;
        let finished = self.wait_for_prediction(&prediction.id).await?;

        let url = finished
            .output
            .as_ref()
            .and_then(|o| o.first_url())
            .ok_or_else(|| ReplicateError::NoOutput(finished.id.clone()))?;

        tracing::info!(
            prediction_id = %finished.id,
            model = model.name,
            "prediction succeeded, downloading output"
        );

        self.download(url).await
    }

    async fn create_prediction(&self, model: &ModelSpec, input: Value) -> Result<Prediction, ReplicateError> {
        tracing::debug!(model = model.name, "creating prediction");

        let response = self
            .http_client
            .post(format!("{}/predictions", REPLICATE_BASE_URL))
            .header("Authorization", format!("Token {}", self.api_token))
            .json(&json!({ "version": model.version, "input": input }))
            .send()
            .await
            .map_err(|e| ReplicateError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReplicateError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ReplicateError::Parse(e.to_string()))
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, ReplicateError> {
        let response = self
            .http_client
            .get(format!("{}/predictions/{}", REPLICATE_BASE_URL, id))
            .header("Authorization", format!("Token {}", self.api_token))
            .send()
            .await
            .map_err(|e| ReplicateError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReplicateError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ReplicateError::Parse(e.to_string()))
    }

    async fn wait_for_prediction(&self, id: &str) -> Result<Prediction, ReplicateError> {
        let deadline = Instant::now() + Duration::from_secs(POLL_TIMEOUT_SECS);

        loop {
            let prediction = self.get_prediction(id).await?;
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction),
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    let detail = prediction.error.unwrap_or_else(|| "no detail".to_string());
                    return Err(ReplicateError::PredictionFailed(id.to_string(), detail));
                }
                PredictionStatus::Starting | PredictionStatus::Processing => {
                    if Instant::now() >= deadline {
                        return Err(ReplicateError::Timeout(id.to_string(), POLL_TIMEOUT_SECS));
                    }
                    tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ReplicateError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ReplicateError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplicateError::Api(status.as_u16(), url.to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReplicateError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Map a restoration mode to its pinned model and input payload.
fn model_invocation(data_uri: &str, mode: RestorationMode) -> (&'static ModelSpec, Value) {
    match mode {
        RestorationMode::FaceRestore => (
            &CODEFORMER,
            json!({
                "image": data_uri,
                "codeformer_fidelity": 0.7,
                "background_enhance": true,
                "face_upsample": true,
                "upscale": 2,
            }),
        ),
        RestorationMode::Upscale => (
            &REAL_ESRGAN,
            json!({
                "image": data_uri,
                "scale": MAX_SCALE,
                "face_enhance": true,
            }),
        ),
        RestorationMode::Colorize => (
            &DEOLDIFY,
            json!({
                "image": data_uri,
                "model_name": "stable",
                "render_factor": 35,
            }),
        ),
        RestorationMode::General => (
            &REAL_ESRGAN,
            json!({
                "image": data_uri,
                "scale": DEFAULT_SCALE,
                "face_enhance": true,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ReplicateClient::new("r8_test".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn face_restore_uses_codeformer() {
        let (model, input) = model_invocation("data:image/jpeg;base64,AAAA", RestorationMode::FaceRestore);
        assert_eq!(model.name, "sczhou/codeformer");
        assert_eq!(input["codeformer_fidelity"], 0.7);
        assert_eq!(input["upscale"], 2);
    }

    #[test]
    fn colorize_uses_conservative_deoldify() {
        let (model, input) = model_invocation("data:image/jpeg;base64,AAAA", RestorationMode::Colorize);
        assert_eq!(model.name, "arielreplicate/deoldify_image");
        assert_eq!(input["model_name"], "stable");
        assert_eq!(input["render_factor"], 35);
    }

    #[test]
    fn general_and_upscale_share_esrgan_with_different_scales() {
        let (general, general_input) = model_invocation("data:x", RestorationMode::General);
        let (upscale, upscale_input) = model_invocation("data:x", RestorationMode::Upscale);
        assert_eq!(general.name, "nightmareai/real-esrgan");
        assert_eq!(upscale.name, "nightmareai/real-esrgan");
        assert_eq!(general_input["scale"], 4);
        assert_eq!(upscale_input["scale"], 8);
        assert_eq!(general_input["face_enhance"], true);
    }

    #[test]
    fn prediction_parses_single_url_output() {
        let prediction: Prediction = serde_json::from_str(
            r#"{"id":"p1","status":"succeeded","output":"https://cdn.example.com/out.png","error":null}"#,
        )
        .unwrap();
        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert_eq!(
            prediction.output.unwrap().first_url(),
            Some("https://cdn.example.com/out.png")
        );
    }

    #[test]
    fn prediction_parses_url_list_output() {
        let prediction: Prediction = serde_json::from_str(
            r#"{"id":"p2","status":"succeeded","output":["https://cdn.example.com/a.png","https://cdn.example.com/b.png"]}"#,
        )
        .unwrap();
        assert_eq!(
            prediction.output.unwrap().first_url(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[test]
    fn prediction_parses_failure_detail() {
        let prediction: Prediction = serde_json::from_str(
            r#"{"id":"p3","status":"failed","error":"CUDA out of memory"}"#,
        )
        .unwrap();
        assert_eq!(prediction.status, PredictionStatus::Failed);
        assert_eq!(prediction.error.as_deref(), Some("CUDA out of memory"));
    }
}
