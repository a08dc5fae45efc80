//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles commands, keyboard buttons, text and photos
//! - `callback_handler`: Handles the access request and decision buttons
//! - `ui_builder`: Creates keyboards, deep links and formats messages
//! - `dialogue_manager`: Drives the property wizard and its submission

use std::sync::Arc;

use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::access::AccessStore;
use crate::config::BotConfig;
use crate::dialogue::WizardState;
use crate::submission::{MediaSource, PropertyApi};

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::{command_handler, message_handler};

/// Commands registered with Telegram
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case")]
pub enum Command {
    #[command(description = "Запустить меню")]
    Start,
    #[command(description = "Показать ссылки")]
    Menu,
    #[command(description = "Добавить объект (админ)")]
    AddProperty,
    #[command(description = "Отменить создание объекта")]
    Cancel,
}

/// Everything the handlers share
pub struct BotContext {
    pub config: BotConfig,
    pub access: AccessStore,
    pub api: Arc<dyn PropertyApi>,
    pub media: Arc<dyn MediaSource>,
}

/// Dispatch tree: commands first, then any other message, then callbacks
pub fn schema() -> UpdateHandler<anyhow::Error> {
    let messages = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<WizardState>, WizardState>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(dptree::endpoint(message_handler));

    let callbacks = Update::filter_callback_query().endpoint(callback_handler);

    dptree::entry().branch(messages).branch(callbacks)
}
