//! `HttpOcrClient`: `POST {base_url}{endpoint}` with a multipart body.
//!
//! Request parts:
//! * `file` - the frame as `image.jpg` (`image/jpeg`)
//! * `prompt` - the recognition instruction
//!
//! HTTP 200 answers `{"text": "..."}`; any other status answers
//! `{"error": "..."}` and is reported as [`OcrError::Protocol`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::camera::Frame;
use crate::config::OcrConfig;

use super::{OcrClient, OcrError};

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct OcrErrorResponse {
    error: Option<String>,
}

pub struct HttpOcrClient {
    client: reqwest::Client,
    url: String,
}

impl HttpOcrClient {
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &OcrConfig) -> Self {
        let client = super::timeout_client(config.timeout(), "ocr");

        Self {
            client,
            url: config.url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn recognize(&self, frame: &Frame, instruction: &str) -> Result<String, OcrError> {
        let file = Part::bytes(frame.jpeg().to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| OcrError::Unknown(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("prompt", instruction.to_string());

        log::info!("ocr: sending {} bytes to {}", frame.len(), self.url);
        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();

        if status == StatusCode::OK {
            let body: OcrResponse = response.json().await?;
            log::info!("ocr: recognized {} characters", body.text.chars().count());
            return Ok(body.text);
        }

        let message = response
            .json::<OcrErrorResponse>()
            .await
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| "unknown error".into());
        log::error!("ocr: service returned HTTP {}: {message}", status.as_u16());
        Err(OcrError::Protocol(format!("HTTP {}: {message}", status.as_u16())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::test_jpeg;
    use crate::test_support::{serve_once, silent_server, unused_port};

    fn client_for(base_url: String, timeout_secs: u64) -> HttpOcrClient {
        HttpOcrClient::from_config(&OcrConfig {
            base_url,
            timeout_secs,
            ..OcrConfig::default()
        })
    }

    fn frame() -> Frame {
        Frame::from_jpeg(test_jpeg()).unwrap()
    }

    #[test]
    fn url_joins_base_and_endpoint() {
        let client = client_for("http://10.0.0.5:5000/".into(), 30);
        assert_eq!(client.url(), "http://10.0.0.5:5000/ocr");
    }

    #[tokio::test]
    async fn ok_response_returns_text_and_sends_multipart() {
        let (base, request) = serve_once(200, r#"{"text": "Chapter One"}"#).await;
        let client = client_for(base, 5);

        let text = client.recognize(&frame(), "read the page").await.unwrap();
        assert_eq!(text, "Chapter One");

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /ocr "));
        assert!(request.contains("name=\"file\"; filename=\"image.jpg\""));
        assert!(request.contains("image/jpeg"));
        assert!(request.contains("name=\"prompt\""));
        assert!(request.contains("read the page"));
    }

    #[tokio::test]
    async fn missing_text_field_is_empty_string() {
        let (base, _request) = serve_once(200, "{}").await;
        let text = client_for(base, 5).recognize(&frame(), "x").await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn error_status_is_protocol_error_with_message() {
        let (base, _request) = serve_once(500, r#"{"error": "model not loaded"}"#).await;
        match client_for(base, 5).recognize(&frame(), "x").await {
            Err(OcrError::Protocol(msg)) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("model not loaded"));
            }
            other => panic!("expected Protocol, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_error() {
        let (base, _request) = serve_once(200, "not json").await;
        assert!(matches!(
            client_for(base, 5).recognize(&frame(), "x").await,
            Err(OcrError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (base, _guard) = silent_server().await;
        assert_eq!(
            client_for(base, 1).recognize(&frame(), "x").await,
            Err(OcrError::Timeout)
        );
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let base = format!("http://127.0.0.1:{}", unused_port());
        assert!(matches!(
            client_for(base, 5).recognize(&frame(), "x").await,
            Err(OcrError::Connection(_))
        ));
    }
}
