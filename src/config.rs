use std::env;

pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Clone)]
pub struct Config {
    /// Discord gateway token. The process aborts at startup without it.
    pub discord_token: String,
    /// When set, slash commands register only to this guild (fast propagation
    /// during development). Otherwise registration is global.
    pub dev_guild_id: Option<u64>,
    pub database_url: String,
    /// Base URL of the DeepSeek-compatible completion API.
    pub completion_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            discord_token: env::var("DISCORD_TOKEN")
                .expect("DISCORD_TOKEN must be set (add DISCORD_TOKEN=your_token to .env)"),
            dev_guild_id: env::var("DEV_GUILD_ID")
                .ok()
                .map(|v| v.parse().expect("DEV_GUILD_ID must be a valid guild id")),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "./relay.db".to_string()),
            completion_base_url: env::var("DEEPSEEK_API_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
        }
    }
}
