//! OpenAI-compatible chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use pipeline::{ChatMessage, CompletionRequest, LlmProvider, ProviderError, ResponseFormat};

use crate::LlmError;

/// Connection settings for [`OpenAiProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            api_key: api_key.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// [`LlmProvider`] over the OpenAI chat-completions HTTP API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiProvider {
    /// Builds the HTTP client. Fails when the API key is empty or not a valid
    /// header value.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingCredential);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| LlmError::InvalidCredential(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatParam>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatParam {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

fn request_body(request: &CompletionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: request.model.as_str(),
        messages: &request.messages,
        max_tokens: request.max_output_tokens.as_u64(),
        temperature: request.temperature,
        response_format: match request.response_format {
            ResponseFormat::Json => Some(ResponseFormatParam {
                kind: "json_object",
            }),
            ResponseFormat::Text => None,
        },
    }
}

/// Extracts the first choice's text. A choice with `null` content reads as empty.
fn completion_text(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
            message: e.to_string(),
        })?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ProviderError::MalformedResponse {
            message: "missing choices".to_owned(),
        })
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %request.model, format = %request.response_format))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let text = completion_text(&body)?;
        debug!(chars = text.chars().count(), "completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{Model, TokenCount};
    use serde_json::json;

    fn request(format: ResponseFormat, temperature: Option<f64>) -> CompletionRequest {
        CompletionRequest {
            model: Model::Gpt4o,
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
            max_output_tokens: TokenCount::new(600),
            temperature,
            response_format: format,
        }
    }

    #[test]
    fn json_mode_requests_json_object() {
        let req = request(ResponseFormat::Json, Some(0.2));
        let body = serde_json::to_value(request_body(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"}
                ],
                "max_tokens": 600,
                "temperature": 0.2,
                "response_format": {"type": "json_object"}
            })
        );
    }

    #[test]
    fn text_mode_omits_format_and_unset_temperature() {
        let req = request(ResponseFormat::Text, None);
        let body = serde_json::to_value(request_body(&req)).unwrap();
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn first_choice_content_is_returned() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" {\"y\":2} "}}]}"#;
        assert_eq!(completion_text(body).unwrap(), " {\"y\":2} ");
    }

    #[test]
    fn null_content_reads_as_empty() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(completion_text(body).unwrap(), "");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = completion_text(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
        let err = completion_text("not json").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut config = OpenAiConfig::new("key");
        config.base_url = "http://localhost:8080/v1/".into();
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn empty_credential_is_rejected() {
        assert!(matches!(
            OpenAiProvider::new(OpenAiConfig::new("  ")),
            Err(LlmError::MissingCredential)
        ));
    }
}
