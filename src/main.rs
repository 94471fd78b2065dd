use std::sync::Arc;

use dotenv::dotenv;

mod ai;
mod channels;
mod config;
mod db;
mod error;
mod router;

use ai::DeepSeekClient;
use config::Config;
use db::Database;
use router::Router;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    let completion = Arc::new(DeepSeekClient::new(&config.completion_base_url));

    let router = Arc::new(Router::new(db.clone(), completion));

    log::info!("Starting Discord listener");
    if let Err(e) = channels::discord::start_discord_listener(&config, db, router).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
