//! OpenAI chat-completions vision client.
//!
//! Uses the `/v1/chat/completions` endpoint with the page image attached as
//! a base64 data-URI content part. `detail: "high"` matters here: it enables
//! the full image-tile budget so fine print and small table cells survive.
//! Token limits go through `max_completion_tokens` — the `gpt-4.1-nano` /
//! o-series family rejects the legacy `max_tokens` parameter.

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, page: &EncodedPage, request: &VisionRequest<'_>) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": request.temperature,
            "max_completion_tokens": request.max_tokens,
            "messages": [
                {
                    "role": "system",
                    "content": request.prompt,
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": page.data_uri(),
                                "detail": "high",
                            },
                        },
                    ],
                },
            ],
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn extract_text(
        &self,
        page: &EncodedPage,
        request: &VisionRequest<'_>,
    ) -> Result<VisionExtraction, ParseError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(page, request))
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        if !response.status().is_success() {
            return Err(error_for_response(self.kind(), response).await);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ParseError::ApiError {
            provider: self.kind().as_str().to_string(),
            status: None,
            message: format!("invalid response body: {e}"),
        })?;

        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let usage = parsed.usage.unwrap_or(ChatUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        debug!(
            model = %self.model,
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "openai vision response"
        );

        Ok(VisionExtraction {
            text,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> EncodedPage {
        EncodedPage {
            base64: "aGVsbG8=".to_string(),
            mime_type: "image/png",
        }
    }

    #[test]
    fn request_body_shape() {
        let provider = OpenAiProvider::new(
            reqwest::Client::new(),
            "sk-test".into(),
            "gpt-4.1-nano".into(),
        );
        let request = VisionRequest {
            prompt: "extract",
            max_tokens: 4096,
            temperature: 0.1,
        };
        let body = provider.request_body(&sample_page(), &request);

        assert_eq!(body["model"], "gpt-4.1-nano");
        assert_eq!(body["max_completion_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "system");
        let url = body["messages"][1]["content"][0]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(
            body["messages"][1]["content"][0]["image_url"]["detail"],
            "high"
        );
    }

    #[test]
    fn response_parses_with_missing_usage() {
        let raw = r#"{"choices":[{"message":{"content":"Page text"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Page text")
        );
        assert!(parsed.usage.is_none());
    }
}
