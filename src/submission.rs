//! Submission of a finished wizard session to the web application.
//!
//! The property is created first; its photos are then downloaded from Telegram
//! and attached in a single batch. A property created by an earlier attempt is
//! remembered in the session, so retrying after a failed upload only repeats
//! the photo step.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::{debug, error, info};

use crate::dialogue::WizardSession;
use crate::errors::{ApiError, SubmissionError};
use crate::property::{CreatePropertyRequest, CreatePropertyResponse, MediaRef, PhotoUpload};

const DEFAULT_PHOTO_MIME: &str = "image/jpeg";
const ERROR_BODY_LIMIT: usize = 250;

/// Property-Create and Photo-Attach contracts of the web application
#[async_trait]
pub trait PropertyApi: Send + Sync {
    /// Create a property and return its identifier
    async fn create_property(&self, request: &CreatePropertyRequest) -> Result<String, ApiError>;

    /// Attach photos to an existing property, in the given order
    async fn attach_photos(&self, property_id: &str, photos: Vec<PhotoUpload>) -> Result<(), ApiError>;
}

/// Raw media as downloaded from the messaging platform
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Media-Fetch contract: resolve a platform reference to bytes
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, ApiError>;
}

/// Outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub property_id: String,
    pub photo_count: usize,
}

/// Create the property described by `session` and attach its photos
///
/// On success the caller discards the session. On failure the session must be
/// kept: after a successful create it carries the property id, and the next
/// attempt skips straight to the photos.
pub async fn submit_session(
    session: &mut WizardSession,
    api: &dyn PropertyApi,
    media: &dyn MediaSource,
) -> Result<SubmissionReceipt, SubmissionError> {
    let property_id = match &session.property_id {
        Some(id) => {
            info!(property_id = %id, "Reusing property created by an earlier attempt");
            id.clone()
        }
        None => {
            let request = session.draft.to_create_request(session.kind());
            debug!(
                title = %request.title,
                area_m2 = request.area_m2,
                monthly_total = request.monthly_total,
                photos = session.draft.photo_refs.len(),
                "Sending property create request"
            );
            let id = api
                .create_property(&request)
                .await
                .map_err(SubmissionError::Create)?;
            info!(property_id = %id, "Property created");
            session.property_id = Some(id.clone());
            id
        }
    };

    let photo_refs = session.draft.photo_refs.clone();
    if !photo_refs.is_empty() {
        let mut uploads = Vec::with_capacity(photo_refs.len());
        for (index, media_ref) in photo_refs.iter().enumerate() {
            let fetched = media.fetch(media_ref).await.map_err(|source| {
                SubmissionError::MediaFetch {
                    property_id: property_id.clone(),
                    source,
                }
            })?;
            uploads.push(photo_upload(index, fetched));
        }

        api.attach_photos(&property_id, uploads)
            .await
            .map_err(|source| SubmissionError::PhotoAttach {
                property_id: property_id.clone(),
                source,
            })?;
        info!(property_id = %property_id, photos = photo_refs.len(), "Photos attached");
    }

    Ok(SubmissionReceipt {
        property_id,
        photo_count: photo_refs.len(),
    })
}

fn photo_upload(index: usize, fetched: FetchedMedia) -> PhotoUpload {
    let mime_type = fetched
        .content_type
        .filter(|value| value.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_PHOTO_MIME.to_string());
    PhotoUpload {
        file_name: format!("photo-{}.jpg", index + 1),
        mime_type,
        bytes: fetched.bytes,
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Status {
        status,
        body: truncate_body(&body),
    }
}

/// HTTP client for the admin API of the web application
#[derive(Clone)]
pub struct HttpPropertyApi {
    client: reqwest::Client,
    app_url: String,
    admin_key: String,
}

impl HttpPropertyApi {
    pub fn new(client: reqwest::Client, app_url: impl Into<String>, admin_key: impl Into<String>) -> Self {
        Self {
            client,
            app_url: app_url.into(),
            admin_key: admin_key.into(),
        }
    }

    fn properties_url(&self) -> String {
        format!("{}/api/admin/properties", self.app_url)
    }
}

#[async_trait]
impl PropertyApi for HttpPropertyApi {
    async fn create_property(&self, request: &CreatePropertyRequest) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.properties_url())
            .bearer_auth(&self.admin_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error(response).await;
            error!(error = ?err, "Property create request rejected");
            return Err(err);
        }

        let created: CreatePropertyResponse = response.json().await?;
        Ok(created.item.id)
    }

    async fn attach_photos(&self, property_id: &str, photos: Vec<PhotoUpload>) -> Result<(), ApiError> {
        let mut form = Form::new();
        for photo in photos {
            let part = Part::bytes(photo.bytes)
                .file_name(photo.file_name)
                .mime_str(&photo.mime_type)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(format!("{}/{}/photos", self.properties_url(), property_id))
            .bearer_auth(&self.admin_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error(response).await;
            error!(property_id = %property_id, error = ?err, "Photo upload rejected");
            return Err(err);
        }
        Ok(())
    }
}

/// Downloads photos through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramMediaSource {
    bot: Bot,
    client: reqwest::Client,
}

impl TelegramMediaSource {
    pub fn new(bot: Bot, client: reqwest::Client) -> Self {
        Self { bot, client }
    }
}

#[async_trait]
impl MediaSource for TelegramMediaSource {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, ApiError> {
        let file = self
            .bot
            .get_file(FileId(media.as_str().to_string()))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        debug!(file_id = %media.as_str(), size = bytes.len(), "Photo downloaded");

        Ok(FetchedMedia { bytes, content_type })
    }
}

/// Shared HTTP client with the configured request timeout
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_upload_naming_and_mime() {
        let upload = photo_upload(
            0,
            FetchedMedia {
                bytes: vec![1, 2, 3],
                content_type: Some("application/octet-stream".to_string()),
            },
        );
        assert_eq!(upload.file_name, "photo-1.jpg");
        assert_eq!(upload.mime_type, DEFAULT_PHOTO_MIME);

        let upload = photo_upload(
            4,
            FetchedMedia {
                bytes: Vec::new(),
                content_type: Some("image/png".to_string()),
            },
        );
        assert_eq!(upload.file_name, "photo-5.jpg");
        assert_eq!(upload.mime_type, "image/png");
    }

    #[test]
    fn test_truncate_body() {
        let body = "я".repeat(300);
        assert_eq!(truncate_body(&body).chars().count(), ERROR_BODY_LIMIT);
    }
}
