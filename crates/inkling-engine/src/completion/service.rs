//! Completion service seam and its OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Completion service is disabled")]
    Disabled,
    #[error("{0} environment variable not set")]
    MissingApiKey(String),
    #[error("Completion request failed: {0}")]
    Request(String),
    #[error("Completion API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),
    #[error("Completion response had no choices")]
    NoChoices,
}

/// Text in, text out. Latency is unbounded apart from the implementation's
/// own timeout.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        max_tokens: u32,
    ) -> Result<String, ServiceError>;
}

/// Service used when completions are turned off
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledService;

#[async_trait]
impl CompletionService for DisabledService {
    async fn complete(&self, _: &str, _: &str, _: u32) -> Result<String, ServiceError> {
        Err(ServiceError::Disabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    pub model: String,
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Chat-completions client for OpenAI and compatible endpoints.
///
/// One request per call, no retries: a failed completion simply produces
/// no suggestion and the next typing pause asks again.
#[derive(Debug, Clone)]
pub struct OpenAiService {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiService {
    pub fn new(settings: OpenAiSettings) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ServiceError::Request(e.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Build from settings, reading the API key from `api_key_env`
    pub fn from_env(
        model: impl Into<String>,
        api_base: impl Into<String>,
        api_key_env: &str,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ServiceError::MissingApiKey(api_key_env.to_string()))?;

        Self::new(OpenAiSettings {
            model: model.into(),
            api_base: api_base.into(),
            api_key,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionService for OpenAiService {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        max_tokens: u32,
    ) -> Result<String, ServiceError> {
        let body = request_body(&self.settings.model, system_prompt, user_text, max_tokens);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        parse_chat_response(&json)
    }
}

pub(crate) fn request_body(
    model: &str,
    system_prompt: &str,
    user_text: &str,
    max_tokens: u32,
) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": user_text },
        ],
        "max_tokens": max_tokens,
        "response_format": { "type": "text" },
    })
}

/// `choices[0].message.content`; a null content is an empty completion
pub(crate) fn parse_chat_response(json: &serde_json::Value) -> Result<String, ServiceError> {
    let choices = json
        .get("choices")
        .and_then(|choices| choices.as_array())
        .ok_or_else(|| ServiceError::InvalidResponse("missing choices array".to_string()))?;

    let first = choices.first().ok_or(ServiceError::NoChoices)?;

    match first.pointer("/message/content") {
        Some(serde_json::Value::String(content)) => Ok(content.clone()),
        Some(serde_json::Value::Null) | None => Ok(String::new()),
        Some(other) => Err(ServiceError::InvalidResponse(format!(
            "message content is not a string: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let body = request_body("gpt-4o-mini", "system", "Text to complete: hi<cursor/>", 50);

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": "system" },
                    { "role": "user", "content": "Text to complete: hi<cursor/>" },
                ],
                "max_tokens": 50,
                "response_format": { "type": "text" },
            })
        );
    }

    #[test]
    fn test_parse_first_choice() {
        let json = json!({
            "choices": [
                { "message": { "role": "assistant", "content": " world" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });

        assert_eq!(parse_chat_response(&json), Ok(" world".to_string()));
    }

    #[test]
    fn test_parse_null_content_is_empty() {
        let json = json!({ "choices": [ { "message": { "content": null } } ] });
        assert_eq!(parse_chat_response(&json), Ok(String::new()));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_chat_response(&json!({ "choices": [] })),
            Err(ServiceError::NoChoices)
        );
        assert!(matches!(
            parse_chat_response(&json!({ "error": "boom" })),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_base() {
        let service = OpenAiService::new(OpenAiSettings {
            model: "m".to_string(),
            api_base: "http://localhost:8080/v1/".to_string(),
            api_key: "k".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        assert_eq!(service.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_from_env_requires_key() {
        let result = OpenAiService::from_env(
            "m",
            "http://localhost",
            "INKLING_TEST_KEY_THAT_IS_NEVER_SET",
            Duration::from_secs(1),
        );

        assert!(matches!(result, Err(ServiceError::MissingApiKey(var)) if var == "INKLING_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let result = DisabledService.complete("s", "u", 10).await;
        assert_eq!(result, Err(ServiceError::Disabled));
    }
}
