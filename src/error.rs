//! Error taxonomy for the relay.
//!
//! Every variant reaching a command handler is converted to a user-visible
//! reply at the dispatch boundary; nothing here ever tears down the process.

use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    /// No credential stored for the guild. User-correctable via /setup.
    SetupRequired,
    /// The completion service rejected the stored credential.
    Auth,
    /// The completion service does not recognize the requested model.
    ModelUnavailable(String),
    /// Persistence failure. Hard failure for the current request only.
    Storage(rusqlite::Error),
    Unknown(String),
}

impl RelayError {
    /// Remediation text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::SetupRequired => "Please run /setup first!".to_string(),
            RelayError::Auth => {
                "Your API key was rejected by DeepSeek. Run /apikey to set a new one.".to_string()
            }
            RelayError::ModelUnavailable(model) => format!(
                "DeepSeek does not recognize the model `{}`. Run /model to pick another one.",
                model
            ),
            RelayError::Storage(_) => {
                "Something went wrong saving your settings. Please try again.".to_string()
            }
            RelayError::Unknown(detail) => format!("Error: {}", detail),
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::SetupRequired => write!(f, "no API key configured"),
            RelayError::Auth => write!(f, "credential rejected by completion service"),
            RelayError::ModelUnavailable(model) => write!(f, "model not available: {}", model),
            RelayError::Storage(e) => write!(f, "storage error: {}", e),
            RelayError::Unknown(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<rusqlite::Error> for RelayError {
    fn from(e: rusqlite::Error) -> Self {
        RelayError::Storage(e)
    }
}
