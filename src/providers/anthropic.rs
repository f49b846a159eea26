//! Anthropic Messages API vision client.

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

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
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
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.prompt,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": page.mime_type,
                                "data": page.base64,
                            },
                        },
                        {
                            "type": "text",
                            "text": "Extract the text from this page.",
                        },
                    ],
                },
            ],
        })
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn extract_text(
        &self,
        page: &EncodedPage,
        request: &VisionRequest<'_>,
    ) -> Result<VisionExtraction, ParseError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(page, request))
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        if !response.status().is_success() {
            return Err(error_for_response(self.kind(), response).await);
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| ParseError::ApiError {
                provider: self.kind().as_str().to_string(),
                status: None,
                message: format!("invalid response body: {e}"),
            })?;

        let text = parsed
            .content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        let usage = parsed.usage.unwrap_or(MessagesUsage {
            input_tokens: 0,
            output_tokens: 0,
        });

        debug!(
            model = %self.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "anthropic vision response"
        );

        Ok(VisionExtraction {
            text,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
