//! DeepSeek chat completion client (OpenAI-compatible wire format).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionApi, CompletionError, SYSTEM_PROMPT};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct DeepSeekClient {
    client: Client,
    base_url: String,
}

impl DeepSeekClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        DeepSeekClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionApi for DeepSeekClient {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Unknown(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &raw, model));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Unknown(format!("invalid response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Unknown("response contained no choices".to_string()))
    }
}

/// Map an HTTP failure onto the relay's error taxonomy. The service reports
/// an unknown model as a 400/404 whose message names the model field.
fn classify_failure(status: u16, raw_body: &str, model: &str) -> CompletionError {
    let message = serde_json::from_str::<ApiErrorResponse>(raw_body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| raw_body.to_string());

    match status {
        401 | 403 => CompletionError::Auth,
        400 | 404 if message.to_lowercase().contains("model") => {
            CompletionError::ModelUnavailable(model.to_string())
        }
        _ => CompletionError::Unknown(format!("[HTTP {}] {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_auth() {
        let err = classify_failure(
            401,
            r#"{"error":{"message":"Authentication Fails, Your api key is invalid"}}"#,
            "deepseek-chat",
        );
        assert_eq!(err, CompletionError::Auth);

        let err = classify_failure(403, "", "deepseek-chat");
        assert_eq!(err, CompletionError::Auth);
    }

    #[test]
    fn unknown_model_maps_to_model_unavailable() {
        let err = classify_failure(
            400,
            r#"{"error":{"message":"Model Not Exist"}}"#,
            "deepseek-r9",
        );
        assert_eq!(err, CompletionError::ModelUnavailable("deepseek-r9".to_string()));
    }

    #[test]
    fn other_failures_carry_status_and_detail() {
        let err = classify_failure(500, "internal error", "deepseek-chat");
        match err {
            CompletionError::Unknown(detail) => {
                assert!(detail.contains("500"));
                assert!(detail.contains("internal error"));
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn bad_request_without_model_detail_stays_unknown() {
        let err = classify_failure(
            400,
            r#"{"error":{"message":"messages must not be empty"}}"#,
            "deepseek-chat",
        );
        assert!(matches!(err, CompletionError::Unknown(_)));
    }
}
