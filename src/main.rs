use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::types::{MenuButton, WebAppInfo};
use teloxide::utils::command::BotCommands;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use property_bot::access::AccessStore;
use property_bot::bot::{self, BotContext, Command};
use property_bot::config::BotConfig;
use property_bot::dialogue::WizardState;
use property_bot::localization::{init_localization, t_lang};
use property_bot::submission::{build_http_client, HttpPropertyApi, TelegramMediaSource};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn register_bot_ui(bot: &Bot, config: &BotConfig) {
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => info!("Bot commands registered"),
        Err(e) => error!(error = %e, "Failed to set bot commands"),
    }

    let url = match reqwest::Url::parse(&config.app_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %config.app_url, error = %e, "App URL is not a valid URL, skipping menu button");
            return;
        }
    };
    let menu_button = MenuButton::WebApp {
        text: t_lang("menu-button", None),
        web_app: WebAppInfo { url },
    };
    match bot.set_chat_menu_button().menu_button(menu_button).await {
        Ok(_) => info!(url = %config.app_url, "Chat menu button updated"),
        Err(e) => error!(error = %e, "Failed to set chat menu button"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting property bot");

    init_localization().context("Failed to load localization resources")?;

    let config = BotConfig::from_env().context("Invalid bot configuration")?;

    let access = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database for access state persistence");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;
            AccessStore::with_database(config.admin_id, pool).await?
        }
        None => {
            info!("DATABASE_URL not set, access state is kept in memory only");
            AccessStore::in_memory(config.admin_id)
        }
    };

    let http_client = build_http_client(config.http_timeout).context("Failed to build HTTP client")?;
    let bot = Bot::new(config.bot_token.clone());

    register_bot_ui(&bot, &config).await;

    let context = Arc::new(BotContext {
        api: Arc::new(HttpPropertyApi::new(
            http_client.clone(),
            config.app_url.clone(),
            config.admin_key.clone(),
        )),
        media: Arc::new(TelegramMediaSource::new(bot.clone(), http_client)),
        access,
        config,
    });

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![context.clone(), InMemStorage::<WizardState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    context.access.flush().await;

    info!("Bot stopped");
    Ok(())
}
