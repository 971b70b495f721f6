use std::fs;
use teloxide::{dptree::deps, prelude::*};

use crate::{
    config::{load_startup_config, watch_config_file, ConfigSource, ConfigStore},
    handlers::generate_bot_commands,
};

/// Environment variable the bot token is read from before falling back to the key file.
pub const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";

fn read_token() -> String {
    if let Ok(token) = std::env::var(TOKEN_VAR) {
        if !token.trim().is_empty() {
            return token.trim().to_string();
        }
    }

    fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!")
    .trim()
    .to_string()
}

/// # Panics
///
/// Panics if there's no bot token, or if the startup configuration can't be loaded.
pub async fn entry() {
    let bot = Bot::new(read_token());

    let (config, source) = match load_startup_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("{e}");
            panic!("Failed to load the configuration!");
        }
    };
    log::info!(
        "Loaded configuration from {source}: {} keywords, {} suspicious domains, {} allowed domains, {} allowed groups",
        config.promo_keywords().len(),
        config.suspicious_domains().len(),
        config.allowed_domains().len(),
        config.allowed_groups().count(),
    );

    let config_store = ConfigStore::new(config);

    if let ConfigSource::File(path) = source {
        tokio::spawn(watch_config_file(config_store.clone(), path));
    }

    if let Err(e) = bot.set_my_commands(generate_bot_commands()).await {
        log::warn!("Failed to set bot commands: {e}");
    }

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(crate::handlers::handle_message))
        .branch(Update::filter_edited_message().endpoint(crate::handlers::handle_message));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![config_store])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down.");
}
