//! Dialogue Manager module for driving the property wizard

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use tracing::{debug, error, info};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{advance, Transition, WizardDialogue, WizardEffect, WizardInput, WizardSession, WizardState};
use crate::errors::SubmissionError;
use crate::submission::submit_session;

use super::ui_builder::wizard_reply_text;
use super::BotContext;

/// Feed one administrator message to the active wizard session
pub async fn handle_wizard_input(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: WizardDialogue,
    ctx: &BotContext,
    input: WizardInput,
    language_code: Option<&str>,
) -> Result<()> {
    let session = match dialogue.get().await? {
        Some(WizardState::Collecting(session)) => session,
        Some(WizardState::Idle) | None => {
            if matches!(input, WizardInput::Text(_)) {
                bot.send_message(chat_id, t_lang("wizard-none", language_code))
                    .await?;
            }
            return Ok(());
        }
    };

    let now = Utc::now();
    if session.is_expired(now, ctx.config.session_ttl) {
        info!(
            chat_id = %chat_id,
            last_activity = %session.updated_at,
            property_id = ?session.property_id,
            "Wizard session expired"
        );
        dialogue.exit().await?;
        bot.send_message(chat_id, expired_text(&session, language_code))
            .await?;
        return Ok(());
    }

    let step = session.step;
    let Transition { session, effect } = advance(session, input, now);
    debug!(chat_id = %chat_id, step = ?step, next_step = ?session.step, effect = ?effect, "Wizard input applied");

    match effect {
        WizardEffect::Reply(reply) => {
            dialogue.update(WizardState::Collecting(session)).await?;
            bot.send_message(chat_id, wizard_reply_text(&reply, language_code))
                .await?;
        }
        WizardEffect::Ignore => {
            dialogue.update(WizardState::Collecting(session)).await?;
        }
        WizardEffect::Submit => {
            submit_property(bot, chat_id, dialogue, ctx, session, language_code).await?;
        }
    }

    Ok(())
}

async fn submit_property(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: WizardDialogue,
    ctx: &BotContext,
    mut session: WizardSession,
    language_code: Option<&str>,
) -> Result<()> {
    info!(
        chat_id = %chat_id,
        kind = ?session.kind(),
        photos = session.draft.photo_refs.len(),
        "Submitting property"
    );

    match submit_session(&mut session, ctx.api.as_ref(), ctx.media.as_ref()).await {
        Ok(receipt) => {
            dialogue.exit().await?;
            let admin_url = format!("{}/properties/{}", ctx.config.admin_url(), receipt.property_id);
            let text = [
                t_lang("submit-created", language_code),
                t_args_lang("links-admin", &[("url", admin_url.as_str())], language_code),
                t_args_lang("links-client", &[("url", ctx.config.app_url.as_str())], language_code),
            ]
            .join("\n");
            bot.send_message(chat_id, text).await?;
        }
        Err(err) => {
            error!(chat_id = %chat_id, error = %err, "Property submission failed");
            // Keep the session so "done" can be sent again
            dialogue.update(WizardState::Collecting(session)).await?;
            bot.send_message(chat_id, submission_error_text(&err, language_code))
                .await?;
        }
    }

    Ok(())
}

// A property created before the photos failed outlives the session
fn expired_text(session: &WizardSession, language_code: Option<&str>) -> String {
    let expired = t_lang("wizard-expired", language_code);
    match &session.property_id {
        Some(id) => [
            expired,
            t_args_lang("wizard-expired-property", &[("id", id.as_str())], language_code),
        ]
        .join("\n"),
        None => expired,
    }
}

fn submission_error_text(err: &SubmissionError, language_code: Option<&str>) -> String {
    match err {
        SubmissionError::Create(source) => t_args_lang(
            "submit-create-failed",
            &[("reason", source.to_string().as_str())],
            language_code,
        ),
        SubmissionError::MediaFetch { property_id, source }
        | SubmissionError::PhotoAttach { property_id, source } => [
            t_args_lang(
                "submit-photos-failed",
                &[("reason", source.to_string().as_str())],
                language_code,
            ),
            t_args_lang("submit-property-id", &[("id", property_id.as_str())], language_code),
            t_lang("submit-retry-hint", language_code),
        ]
        .join("\n"),
    }
}
