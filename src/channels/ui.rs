//! Embed, button and modal builders for the Discord surface.

use serenity::all::{
    ButtonStyle, Colour, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
    CreateInputText, CreateModal, InputTextStyle,
};

/// Models offered by the selector: (model id, display label).
pub const MODELS: &[(&str, &str)] = &[
    ("deepseek-chat", "DeepSeek Chat (Normal)"),
    ("deepseek-r1", "DeepSeek R1 (Reasoning)"),
];

/// Component custom_id namespaces.
pub const SETUP_APIKEY_BUTTON: &str = "setup:apikey";
pub const SETUP_MODEL_BUTTON: &str = "setup:model";
pub const MODEL_BUTTON_PREFIX: &str = "model:";
pub const CREDENTIAL_MODAL: &str = "credential_modal";
pub const CREDENTIAL_INPUT: &str = "api_key";

pub fn setup_embed() -> CreateEmbed {
    CreateEmbed::new()
        .title("Welcome to the DeepSeek Discord Bot!")
        .description(
            "Available commands:\n\
             • /ask - Ask DeepSeek a question\n\
             • /model - Select which DeepSeek model to use\n\
             • /apikey - Change your API key\n\n\
             To get started, click 'Set API Key' below and enter your DeepSeek API key.",
        )
        .colour(Colour::BLUE)
}

pub fn setup_components(has_credential: bool) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(SETUP_APIKEY_BUTTON)
            .label("Set API Key")
            .style(ButtonStyle::Primary),
        CreateButton::new(SETUP_MODEL_BUTTON)
            .label("Select Model")
            .style(ButtonStyle::Secondary)
            .disabled(!has_credential),
    ])]
}

pub fn welcome_embed() -> CreateEmbed {
    CreateEmbed::new()
        .title("Welcome to the DeepSeek Discord Bot! 🎉")
        .description(
            "Thank you for adding me to your server!\n\n\
             To get started, please run the /setup command to configure:\n\
             • Your DeepSeek API Key\n\
             • Preferred AI Model\n\n\
             Once setup is complete, you can use:\n\
             • /ask - Ask questions\n\
             • /model - Switch AI models\n\
             • Or just mention me in any message!",
        )
        .colour(Colour::BLUE)
        .footer(CreateEmbedFooter::new("Powered by DeepSeek"))
}

pub fn selector_embed() -> CreateEmbed {
    CreateEmbed::new()
        .title("DeepSeek Model Selection")
        .description("Select which model you'd like to use:")
        .colour(Colour::BLUE)
}

/// One button per known model, the active one highlighted.
pub fn selector_components(current_model: &str) -> Vec<CreateActionRow> {
    let buttons = MODELS
        .iter()
        .map(|(id, label)| {
            let selected = *id == current_model;
            let text = if selected {
                format!("[SELECTED] {}", label)
            } else {
                label.to_string()
            };
            CreateButton::new(format!("{}{}", MODEL_BUTTON_PREFIX, id))
                .label(text)
                .style(if selected {
                    ButtonStyle::Success
                } else {
                    ButtonStyle::Secondary
                })
        })
        .collect();
    vec![CreateActionRow::Buttons(buttons)]
}

pub fn credential_modal() -> CreateModal {
    CreateModal::new(CREDENTIAL_MODAL, "Set DeepSeek API Key").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "API Key", CREDENTIAL_INPUT)
                .placeholder("Enter your DeepSeek API key here...")
                .required(true),
        ),
    ])
}
