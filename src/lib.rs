//! # Property CRM Telegram Bot
//!
//! A Telegram bot in front of a property catalog web application. Clients ask
//! the administrator for access and receive deep links into the catalog; the
//! administrator adds properties through a chat wizard that accepts either one
//! field per message or a single labelled block, followed by photos.

pub mod access;
pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod localization;
pub mod property;
pub mod submission;
pub mod text_processing;
