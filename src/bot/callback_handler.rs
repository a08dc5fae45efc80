//! Callback Handler module for the access approval buttons

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::t_lang;

use crate::access::{AccessDecision, DecisionError, RequestOutcome};

use super::ui_builder::{
    access_request_text, decision_keyboard, decision_summary, requester_from, ACCESS_REQUEST_DATA,
};
use super::BotContext;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> Result<()> {
    let data = q.data.clone().unwrap_or_default();
    debug!(user_id = %q.from.id, data = %data, "Received callback query from user");

    if data == ACCESS_REQUEST_DATA {
        handle_access_request(&bot, &q, &ctx).await
    } else if AccessDecision::is_decision_data(&data) {
        handle_decision(&bot, &q, &data, &ctx).await
    } else {
        warn!(user_id = %q.from.id, data = %data, "Unknown callback data");
        bot.answer_callback_query(q.id.clone()).await?;
        Ok(())
    }
}

async fn answer(bot: &Bot, q: &CallbackQuery, text: String) -> Result<()> {
    bot.answer_callback_query(q.id.clone()).text(text).await?;
    Ok(())
}

async fn replace_message_text(bot: &Bot, q: &CallbackQuery, text: String) {
    let Some(message) = &q.message else {
        return;
    };
    if let Err(e) = bot.edit_message_text(message.chat().id, message.id(), text).await {
        error!(user_id = %q.from.id, error = %e, "Failed to edit callback message");
    }
}

async fn handle_access_request(bot: &Bot, q: &CallbackQuery, ctx: &BotContext) -> Result<()> {
    let language_code = q.from.language_code.as_deref();

    let request = match ctx.access.request(requester_from(&q.from)).await {
        RequestOutcome::AlreadyApproved => {
            return answer(bot, q, t_lang("access-already-approved", language_code)).await;
        }
        RequestOutcome::AlreadyPending => {
            return answer(bot, q, t_lang("access-already-pending", language_code)).await;
        }
        RequestOutcome::Created(request) => request,
    };
    info!(user_id = %request.user_id, role = request.role.as_str(), "Access requested");

    // The administrator reads the bot in the default language
    let admin_chat = ChatId::from(ctx.config.admin_id);
    if let Err(e) = bot
        .send_message(admin_chat, access_request_text(&request, None))
        .reply_markup(decision_keyboard(&request, None))
        .await
    {
        error!(user_id = %request.user_id, error = %e, "Failed to notify administrator about access request");
    }

    answer(bot, q, t_lang("access-request-sent", language_code)).await?;
    replace_message_text(bot, q, t_lang("access-request-sent-wait", language_code)).await;
    Ok(())
}

fn decision_error_key(err: DecisionError) -> &'static str {
    match err {
        DecisionError::NotAdmin => "access-only-admin-decides",
        DecisionError::InvalidFormat => "access-invalid-format",
        DecisionError::AlreadyProcessed => "access-already-processed",
    }
}

async fn handle_decision(bot: &Bot, q: &CallbackQuery, data: &str, ctx: &BotContext) -> Result<()> {
    let language_code = q.from.language_code.as_deref();

    if !ctx.config.is_admin(q.from.id) {
        warn!(user_id = %q.from.id, "Non-admin tried to decide an access request");
        return answer(bot, q, t_lang(decision_error_key(DecisionError::NotAdmin), language_code)).await;
    }

    let decided = match AccessDecision::from_callback_data(data) {
        Ok(decision) => ctx.access.decide(q.from.id, decision).await,
        Err(err) => Err(err),
    };
    let outcome = match decided {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!(data = %data, error = %err, "Access decision rejected");
            return answer(bot, q, t_lang(decision_error_key(err), language_code)).await;
        }
    };

    let target = outcome.decision.target();
    let (notice_key, ack_key) = match outcome.decision {
        AccessDecision::Approve(_) => ("access-approved-notice", "access-approved-ack"),
        AccessDecision::Deny(_) => ("access-denied-notice", "access-denied-ack"),
    };
    info!(target_id = %target, decision = ?outcome.decision, "Access decision applied");

    if let Err(e) = bot
        .send_message(ChatId::from(target), t_lang(notice_key, None))
        .await
    {
        error!(target_id = %target, error = %e, "Failed to notify user about access decision");
    }

    answer(bot, q, t_lang(ack_key, language_code)).await?;
    replace_message_text(
        bot,
        q,
        decision_summary(outcome.decision, &outcome.request, language_code),
    )
    .await;
    Ok(())
}
