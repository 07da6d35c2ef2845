//! `OpenAiVisionClassifier`: scene analysis through any OpenAI-compatible
//! `/v1/chat/completions` endpoint that accepts inline images.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::camera::Frame;
use crate::config::VisionConfig;

use super::prompt::{SceneAnalysis, ANALYSIS_PROMPT};
use super::{Classification, ClassifierError, VisionClassifier};

pub struct OpenAiVisionClassifier {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiVisionClassifier {
    /// `None` when no API key is configured or set in `OPENAI_API_KEY`.
    pub fn from_config(config: &VisionConfig) -> Option<Self> {
        let api_key = config.resolved_api_key()?;
        let client = crate::ocr::timeout_client(
            std::time::Duration::from_secs(config.timeout_secs),
            "vision",
        );

        Some(Self {
            client,
            url: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key,
            model: config.model.clone(),
        })
    }

    async fn analyse(&self, frame: &Frame) -> Result<SceneAnalysis, ClassifierError> {
        let image_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(frame.jpeg()));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": ANALYSIS_PROMPT },
                    { "type": "image_url",
                      "image_url": { "url": image_url, "detail": "high" } }
                ]
            }],
            "max_tokens": 500,
            "temperature": 0.3
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail.trim()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;
        let reply = json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ClassifierError::EmptyResponse)?;

        log::debug!("vision: raw reply {reply:?}");
        SceneAnalysis::parse(reply)
    }
}

#[async_trait]
impl VisionClassifier for OpenAiVisionClassifier {
    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError> {
        log::info!("vision: analysing frame with {}", self.model);
        let analysis = self.analyse(frame).await?;
        let verdict = Classification::from(&analysis);

        if verdict.has_text {
            log::info!(
                "vision: text found (scene: {}, regions: {}, confidence: {})",
                analysis.scene_type,
                analysis.text_regions,
                analysis.confidence
            );
        } else {
            log::info!("vision: {}", verdict.instruction_or_reason);
        }
        Ok(verdict)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
