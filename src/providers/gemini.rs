//! Google Gemini `generateContent` vision client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    error_for_response, transport_error, ProviderKind, VisionExtraction, VisionProvider,
    VisionRequest,
};
use crate::error::ParseError;
use crate::pipeline::encode::EncodedPage;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, page: &EncodedPage, request: &VisionRequest<'_>) -> serde_json::Value {
        // Gemini takes the instructions and the image as sibling parts of a
        // single user turn; there is no separate system role for vision.
        json!({
            "contents": [
                {
                    "parts": [
                        { "text": request.prompt },
                        {
                            "inline_data": {
                                "mime_type": page.mime_type,
                                "data": page.base64,
                            },
                        },
                    ],
                },
            ],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: usize,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: usize,
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn extract_text(
        &self,
        page: &EncodedPage,
        request: &VisionRequest<'_>,
    ) -> Result<VisionExtraction, ParseError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(page, request))
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        if !response.status().is_success() {
            return Err(error_for_response(self.kind(), response).await);
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| ParseError::ApiError {
                provider: self.kind().as_str().to_string(),
                status: None,
                message: format!("invalid response body: {e}"),
            })?;

        // A candidate's answer may be split across several text parts.
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = parsed.usage_metadata.unwrap_or(UsageMetadata {
            prompt_token_count: 0,
            candidates_token_count: 0,
        });

        debug!(
            model = %self.model,
            input_tokens = usage.prompt_token_count,
            output_tokens = usage.candidates_token_count,
            "gemini vision response"
        );

        Ok(VisionExtraction {
            text,
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            model: self.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let provider = GeminiProvider::new(
            reqwest::Client::new(),
            "key".into(),
            "gemini-2.0-flash".into(),
        );
        let page = EncodedPage {
            base64: "aGVsbG8=".to_string(),
            mime_type: "image/png",
        };
        let request = VisionRequest {
            prompt: "extract",
            max_tokens: 2048,
            temperature: 0.0,
        };
        let body = provider.request_body(&page, &request);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "extract");
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn response_joins_text_parts() {
        let raw = r#"{
            "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world"}]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let joined: String = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        assert_eq!(joined, "Hello world");
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, 12);
    }
}
