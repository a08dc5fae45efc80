//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, User, UserId};
use tracing::{debug, info};

// Import localization
use crate::localization::{matches_any_language, t_args_lang, t_lang};

// Import dialogue types
use crate::access::ConsentOutcome;
use crate::dialogue::{WizardDialogue, WizardInput, WizardSession, WizardState};
use crate::property::MediaRef;

use super::dialogue_manager::handle_wizard_input;
use super::ui_builder::{
    admin_link, client_link, consent_keyboard, display_name, links_text, main_keyboard,
    property_block_template, request_access_keyboard,
};
use super::{BotContext, Command};

/// Handle the registered bot commands
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: WizardDialogue,
    ctx: Arc<BotContext>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let language_code = user.language_code.as_deref();
    let is_admin = ctx.config.is_admin(user.id);
    debug!(user_id = %user.id, command = ?cmd, "Received command");

    match cmd {
        Command::Start => handle_start(&bot, &msg, user, &ctx).await?,
        Command::Menu => {
            if !ctx.access.is_approved(user.id).await {
                bot.send_message(msg.chat.id, t_lang("access-not-approved", language_code))
                    .await?;
                return Ok(());
            }
            bot.send_message(msg.chat.id, links_text(&ctx.config, is_admin, language_code))
                .await?;
        }
        Command::AddProperty => {
            if !is_admin {
                bot.send_message(msg.chat.id, t_lang("admin-only-command", language_code))
                    .await?;
                return Ok(());
            }
            if !is_own_private_chat(msg.chat.id, user.id) {
                bot.send_message(msg.chat.id, t_lang("wizard-private-only", language_code))
                    .await?;
                return Ok(());
            }
            // A running session is replaced by a fresh one
            dialogue
                .update(WizardState::Collecting(WizardSession::new(Utc::now())))
                .await?;
            info!(user_id = %user.id, "Property wizard started");
            bot.send_message(msg.chat.id, property_block_template(language_code))
                .await?;
        }
        Command::Cancel => {
            if !is_admin {
                return Ok(());
            }
            if !is_own_private_chat(msg.chat.id, user.id) {
                bot.send_message(msg.chat.id, t_lang("wizard-private-only", language_code))
                    .await?;
                return Ok(());
            }
            dialogue.exit().await?;
            info!(user_id = %user.id, "Property wizard cancelled");
            bot.send_message(msg.chat.id, t_lang("wizard-cancelled", language_code))
                .await?;
        }
    }

    Ok(())
}

async fn handle_start(bot: &Bot, msg: &Message, user: &User, ctx: &BotContext) -> Result<()> {
    let language_code = user.language_code.as_deref();
    let hello = t_args_lang(
        "start-greeting",
        &[("name", display_name(user).as_str())],
        language_code,
    );

    if !ctx.access.is_approved(user.id).await {
        bot.send_message(
            msg.chat.id,
            format!("{hello}\n\n{}", t_lang("start-request-access", language_code)),
        )
        .reply_markup(request_access_keyboard(language_code))
        .await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        format!("{hello}\n\n{}", t_lang("start-consent-prompt", language_code)),
    )
    .reply_markup(consent_keyboard(language_code))
    .await?;
    Ok(())
}

/// Handle the reply keyboard buttons; returns whether `text` was one of them
async fn handle_keyboard_button(
    bot: &Bot,
    msg: &Message,
    user: &User,
    text: &str,
    ctx: &BotContext,
) -> Result<bool> {
    let language_code = user.language_code.as_deref();
    let is_admin = ctx.config.is_admin(user.id);
    let chat_id = msg.chat.id;

    if matches_any_language("button-consent", text) {
        match ctx.access.grant_consent(user.id).await {
            ConsentOutcome::NotApproved => {
                bot.send_message(chat_id, t_lang("access-not-approved", language_code))
                    .await?;
            }
            outcome => {
                debug!(user_id = %user.id, outcome = ?outcome, "Consent recorded");
                bot.send_message(chat_id, links_text(&ctx.config, is_admin, language_code))
                    .reply_markup(main_keyboard(&ctx.config, user, is_admin, language_code)?)
                    .await?;
                let url = client_link(&ctx.config, user)?;
                bot.send_message(
                    chat_id,
                    t_args_lang("open-client-link", &[("url", url.as_str())], language_code),
                )
                .await?;
            }
        }
        return Ok(true);
    }

    if matches_any_language("button-show-links", text) {
        let reply = if ctx.access.is_approved(user.id).await {
            links_text(&ctx.config, is_admin, language_code)
        } else {
            t_lang("access-not-approved", language_code)
        };
        bot.send_message(chat_id, reply).await?;
        return Ok(true);
    }

    if matches_any_language("button-open-client", text) {
        let reply = if !ctx.access.is_approved(user.id).await {
            t_lang("access-not-approved", language_code)
        } else if !ctx.access.has_consent(user.id).await {
            t_lang("consent-required", language_code)
        } else {
            let url = client_link(&ctx.config, user)?;
            t_args_lang("open-client-link", &[("url", url.as_str())], language_code)
        };
        bot.send_message(chat_id, reply).await?;
        return Ok(true);
    }

    if matches_any_language("button-open-admin", text) {
        let reply = if !ctx.access.is_approved(user.id).await {
            t_lang("access-not-approved", language_code)
        } else if !is_admin {
            t_lang("admin-only-panel", language_code)
        } else if !ctx.access.has_consent(user.id).await {
            t_lang("consent-required", language_code)
        } else {
            let url = admin_link(&ctx.config, user)?;
            t_args_lang("open-admin-link", &[("url", url.as_str())], language_code)
        };
        bot.send_message(chat_id, reply).await?;
        return Ok(true);
    }

    Ok(false)
}

/// Whether a chat is the private chat with `user`
///
/// Dialogue storage is keyed by chat, so restricting the wizard to this chat
/// keeps a single session per identity.
fn is_own_private_chat(chat_id: ChatId, user: UserId) -> bool {
    chat_id == ChatId::from(user)
}

fn wizard_input(msg: &Message) -> Option<WizardInput> {
    if let Some(text) = msg.text() {
        return Some(WizardInput::Text(text.to_string()));
    }
    msg.photo().map(|photos| {
        WizardInput::Photo(
            photos
                .iter()
                .map(|photo| MediaRef::new(photo.file.id.0.clone()))
                .collect(),
        )
    })
}

/// Handle every message that is not a registered command
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: WizardDialogue,
    ctx: Arc<BotContext>,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    if let Some(text) = msg.text() {
        if handle_keyboard_button(&bot, &msg, &user, text, &ctx).await? {
            return Ok(());
        }
        // Unknown commands are not wizard input
        if text.starts_with('/') {
            debug!(user_id = %user.id, "Ignoring unknown command");
            return Ok(());
        }
    }

    if !ctx.config.is_admin(user.id) {
        debug!(user_id = %user.id, "Ignoring message from non-admin user");
        return Ok(());
    }
    if !is_own_private_chat(msg.chat.id, user.id) {
        debug!(user_id = %user.id, chat_id = %msg.chat.id, "Ignoring admin message outside the private chat");
        return Ok(());
    }

    let Some(input) = wizard_input(&msg) else {
        debug!(user_id = %user.id, "Ignoring unsupported message type");
        return Ok(());
    };

    handle_wizard_input(&bot, msg.chat.id, dialogue, &ctx, input, user.language_code.as_deref())
        .await
}
