//! Tagged inbound event model.
//!
//! Every gateway interaction is normalized into one of these variants plus an
//! explicit tenant/channel context before it reaches the router. No handler
//! state is captured in closures; dispatch is a single match.

/// Tenant and channel scope of one inbound event.
#[derive(Debug, Clone, Copy)]
pub struct EventContext {
    pub guild_id: u64,
    pub channel_id: u64,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// `/setup` — render onboarding UI reflecting credential presence.
    Setup,
    /// `/model` — render a fresh model selector (credential required).
    SelectModel,
    /// `/ask <message>` — relay a prompt to the completion service.
    Ask { text: String },
    /// `/apikey` or the setup button — present the credential entry form.
    ChangeCredential,
    /// Credential form submitted; validate against the service, then commit.
    SubmitCredential { credential: String },
    /// Selector button pressed.
    ChooseModel { model: String, message_id: u64 },
    /// The bot was mentioned directly; `text` is the body with all bot
    /// self-mentions already stripped.
    MentionTrigger { text: String },
}

impl InboundEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Setup => "setup",
            InboundEvent::SelectModel => "select_model",
            InboundEvent::Ask { .. } => "ask",
            InboundEvent::ChangeCredential => "change_credential",
            InboundEvent::SubmitCredential { .. } => "submit_credential",
            InboundEvent::ChooseModel { .. } => "choose_model",
            InboundEvent::MentionTrigger { .. } => "mention",
        }
    }
}
