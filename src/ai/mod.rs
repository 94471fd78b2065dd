pub mod deepseek;

pub use deepseek::DeepSeekClient;

use std::fmt;

use async_trait::async_trait;

use crate::error::RelayError;

/// System prompt sent with every completion request.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant";

/// Prompt used for the credential validation round-trip during setup.
pub const KEY_TEST_PROMPT: &str =
    "This is a test message from a Discord Bot. If you see this, reply with: \
     API Key Setup Successful. This message is from the DeepSeek API.";

/// Classified failure from the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The service rejected the credential.
    Auth,
    /// The requested model is not recognized by the service.
    ModelUnavailable(String),
    Unknown(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Auth => write!(f, "API key rejected"),
            CompletionError::ModelUnavailable(model) => {
                write!(f, "model not available: {}", model)
            }
            CompletionError::Unknown(detail) => write!(f, "{}", detail),
        }
    }
}

impl From<CompletionError> for RelayError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Auth => RelayError::Auth,
            CompletionError::ModelUnavailable(model) => RelayError::ModelUnavailable(model),
            CompletionError::Unknown(detail) => RelayError::Unknown(detail),
        }
    }
}

/// One outbound completion call: credential + model + prompt in, generated
/// text or a classified failure out. Exactly one attempt per invocation;
/// retry policy belongs to the caller (none is implemented).
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, CompletionError>;
}

/// Scripted completion client for tests. Records every call and replays
/// pre-configured responses in order.
#[cfg(test)]
pub struct MockCompletion {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, CompletionError>>>,
    calls: std::sync::Mutex<Vec<(String, String, String)>>,
}

#[cfg(test)]
impl MockCompletion {
    pub fn new(responses: Vec<Result<String, CompletionError>>) -> Self {
        MockCompletion {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every `(api_key, model, prompt)` triple this client has seen.
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl CompletionApi for MockCompletion {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push((
            api_key.to_string(),
            model.to_string(),
            prompt.to_string(),
        ));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("mock response".to_string()))
    }
}
