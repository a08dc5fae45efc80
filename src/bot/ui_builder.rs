//! UI Builder module for creating keyboards and formatting messages

use anyhow::Result;
use reqwest::Url;
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, User,
    WebAppInfo,
};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::access::{AccessDecision, AccessRequest, Requester};
use crate::config::BotConfig;
use crate::dialogue::{WizardReply, WizardStep};

/// Callback data of the "request access" button
pub const ACCESS_REQUEST_DATA: &str = "access_request";

/// Name shown for a Telegram user: username, first name, then `user_{id}`
pub fn display_name(user: &User) -> String {
    [user.username.as_deref(), Some(user.first_name.as_str())]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("user_{}", user.id))
}

/// Identity as recorded in an access request
pub fn requester_from(user: &User) -> Requester {
    Requester {
        id: user.id,
        display_name: user.first_name.clone(),
        username: user.username.clone().unwrap_or_default(),
    }
}

fn with_identity(base: &str, user: &User) -> Result<Url> {
    let url = Url::parse_with_params(
        base,
        &[
            ("telegramUserId", user.id.to_string()),
            ("telegramUsername", display_name(user)),
        ],
    )?;
    Ok(url)
}

/// Client deep link carrying the user's identity
pub fn client_link(config: &BotConfig, user: &User) -> Result<Url> {
    with_identity(&format!("{}/", config.app_url), user)
}

/// Admin deep link carrying the user's identity
pub fn admin_link(config: &BotConfig, user: &User) -> Result<Url> {
    with_identity(&config.admin_url(), user)
}

/// Plain links for opening the web application in a browser
pub fn links_text(config: &BotConfig, is_admin: bool, language_code: Option<&str>) -> String {
    if is_admin {
        [
            t_lang("links-title-admin", language_code),
            t_args_lang("links-client", &[("url", config.app_url.as_str())], language_code),
            t_args_lang("links-admin", &[("url", config.admin_url().as_str())], language_code),
            String::new(),
            t_lang("links-admin-commands", language_code),
            t_lang("links-command-add", language_code),
            t_lang("links-command-cancel", language_code),
        ]
        .join("\n")
    } else {
        [
            t_lang("links-title-client", language_code),
            t_args_lang("links-client", &[("url", config.app_url.as_str())], language_code),
        ]
        .join("\n")
    }
}

fn web_app_button(text: String, url: Url) -> KeyboardButton {
    KeyboardButton::new(text).request(ButtonRequest::WebApp(WebAppInfo { url }))
}

/// Main reply keyboard; WebApp buttons are only possible over https
pub fn main_keyboard(
    config: &BotConfig,
    user: &User,
    is_admin: bool,
    language_code: Option<&str>,
) -> Result<KeyboardMarkup> {
    let client_text = t_lang("button-open-client", language_code);
    let admin_text = t_lang("button-open-admin", language_code);
    let links_row = vec![KeyboardButton::new(t_lang("button-show-links", language_code))];

    let client_url = client_link(config, user)?;
    let web_app = client_url.scheme() == "https";

    let mut first_row = Vec::new();
    if web_app {
        first_row.push(web_app_button(client_text, client_url));
        if is_admin {
            first_row.push(web_app_button(admin_text, admin_link(config, user)?));
        }
    } else {
        first_row.push(KeyboardButton::new(client_text));
        if is_admin {
            first_row.push(KeyboardButton::new(admin_text));
        }
    }

    Ok(KeyboardMarkup::new(vec![first_row, links_row]).resize_keyboard())
}

/// One-button keyboard asking for consent
pub fn consent_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(t_lang(
        "button-consent",
        language_code,
    ))]])
    .resize_keyboard()
}

/// Inline button sending an access request to the administrator
pub fn request_access_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t_lang("button-request-access", language_code),
        ACCESS_REQUEST_DATA,
    )]])
}

/// Approve / deny buttons attached to an access request
pub fn decision_keyboard(request: &AccessRequest, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            t_lang("button-approve", language_code),
            AccessDecision::Approve(request.user_id).to_callback_data(),
        ),
        InlineKeyboardButton::callback(
            t_lang("button-deny", language_code),
            AccessDecision::Deny(request.user_id).to_callback_data(),
        ),
    ]])
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Notification sent to the administrator for a new access request
pub fn access_request_text(request: &AccessRequest, language_code: Option<&str>) -> String {
    let username = if request.username.is_empty() {
        "-".to_string()
    } else {
        format!("@{}", request.username)
    };
    [
        t_lang("access-request-title", language_code),
        t_args_lang("access-request-id", &[("id", request.user_id.to_string().as_str())], language_code),
        t_args_lang("access-request-name", &[("name", or_dash(&request.display_name))], language_code),
        t_args_lang("access-request-username", &[("username", username.as_str())], language_code),
        t_args_lang("access-request-role", &[("role", request.role.as_str())], language_code),
    ]
    .join("\n")
}

/// Text replacing the access request once the administrator decided
pub fn decision_summary(
    decision: AccessDecision,
    request: &AccessRequest,
    language_code: Option<&str>,
) -> String {
    let verdict = match decision {
        AccessDecision::Approve(_) => t_lang("decision-approved", language_code),
        AccessDecision::Deny(_) => t_lang("decision-denied", language_code),
    };
    [
        verdict,
        t_args_lang("access-request-id", &[("id", request.user_id.to_string().as_str())], language_code),
        t_args_lang("access-request-name", &[("name", or_dash(&request.display_name))], language_code),
        t_args_lang("access-request-role", &[("role", request.role.as_str())], language_code),
    ]
    .join("\n")
}

/// Empty labelled block the administrator fills in and sends back
pub fn property_block_template(language_code: Option<&str>) -> String {
    [
        "label-city",
        "label-address",
        "label-area",
        "label-total",
        "label-rate",
        "label-service",
        "label-description",
    ]
    .iter()
    .map(|key| format!("{}: ", t_lang(key, language_code)))
    .collect::<Vec<_>>()
    .join("\n")
}

fn prompt_key(step: WizardStep) -> &'static str {
    match step {
        WizardStep::City => "prompt-city",
        WizardStep::Address => "prompt-address",
        WizardStep::AreaM2 => "prompt-area",
        WizardStep::MonthlyTotal => "prompt-total",
        WizardStep::RentRate => "prompt-rate",
        WizardStep::ServiceRate => "prompt-service",
        WizardStep::Description => "prompt-description",
        WizardStep::Photos => "prompt-photos",
    }
}

fn invalid_number_key(step: WizardStep) -> &'static str {
    match step {
        WizardStep::MonthlyTotal => "invalid-total",
        WizardStep::RentRate => "invalid-rate",
        WizardStep::ServiceRate => "invalid-service",
        _ => "invalid-area",
    }
}

/// Message answering a wizard transition
pub fn wizard_reply_text(reply: &WizardReply, language_code: Option<&str>) -> String {
    match reply {
        WizardReply::Prompt(step) => t_lang(prompt_key(*step), language_code),
        WizardReply::BlockRecognized => t_lang("block-recognized", language_code),
        WizardReply::WarehouseCityPrompt => t_lang("prompt-warehouse-city", language_code),
        WizardReply::NotANumber(step) => t_lang(invalid_number_key(*step), language_code),
        WizardReply::PhotoAccepted(count) => {
            t_args_lang("photo-accepted", &[("count", count.to_string().as_str())], language_code)
        }
    }
}
