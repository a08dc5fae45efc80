use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use property_bot::dialogue::{WizardSession, WizardStep};
use property_bot::errors::{ApiError, SubmissionError};
use property_bot::property::{
    CreatePropertyRequest, MediaRef, PhotoUpload, PropertyKind, DEFAULT_CURRENCY, DEFAULT_TERM,
};
use property_bot::submission::{submit_session, FetchedMedia, MediaSource, PropertyApi};

/// In-memory stand-in for the web application's admin API
#[derive(Default)]
struct RecordingApi {
    created: Mutex<Vec<CreatePropertyRequest>>,
    attached: Mutex<Vec<(String, Vec<PhotoUpload>)>>,
    fail_create: bool,
    attach_failures_left: Mutex<usize>,
}

impl RecordingApi {
    fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl PropertyApi for RecordingApi {
    async fn create_property(&self, request: &CreatePropertyRequest) -> Result<String, ApiError> {
        if self.fail_create {
            return Err(ApiError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(format!("prop-{}", created.len()))
    }

    async fn attach_photos(&self, property_id: &str, photos: Vec<PhotoUpload>) -> Result<(), ApiError> {
        let mut failures = self.attach_failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ApiError::Status {
                status: 502,
                body: String::new(),
            });
        }
        self.attached
            .lock()
            .unwrap()
            .push((property_id.to_string(), photos));
        Ok(())
    }
}

/// Photo store keyed by media reference
struct StaticMedia {
    files: HashMap<String, FetchedMedia>,
}

#[async_trait]
impl MediaSource for StaticMedia {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, ApiError> {
        self.files
            .get(media.as_str())
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: media.as_str().to_string(),
            })
    }
}

fn media(entries: &[(&str, Option<&str>)]) -> StaticMedia {
    StaticMedia {
        files: entries
            .iter()
            .map(|(id, content_type)| {
                (
                    id.to_string(),
                    FetchedMedia {
                        bytes: id.as_bytes().to_vec(),
                        content_type: content_type.map(str::to_string),
                    },
                )
            })
            .collect(),
    }
}

fn finished_session(photos: &[&str]) -> WizardSession {
    let mut session = WizardSession::new(Utc::now());
    session.step = WizardStep::Photos;
    session.kind = Some(PropertyKind::Premise);
    session.draft.city = "Варшава".to_string();
    session.draft.address = "ул. Тестовая 1".to_string();
    session.draft.area_m2 = 100.0;
    session.draft.monthly_total = 2000.0;
    session.draft.rent_rate = 15.0;
    session.draft.service_rate = 5.0;
    session.draft.description = "тест".to_string();
    session.draft.photo_refs = photos.iter().map(|id| MediaRef::new(*id)).collect();
    session
}

#[tokio::test]
async fn test_submission_creates_property_and_attaches_photos() -> Result<()> {
    let api = RecordingApi::default();
    let media = media(&[("p1", Some("image/png")), ("p2", None)]);
    let mut session = finished_session(&["p1", "p2"]);

    let receipt = submit_session(&mut session, &api, &media).await?;
    assert_eq!(receipt.property_id, "prop-1");
    assert_eq!(receipt.photo_count, 2);

    let created = api.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let request = &created[0];
    assert_eq!(request.title, "Варшава — ул. Тестовая 1");
    assert_eq!(request.location, "Варшава, ул. Тестовая 1");
    assert_eq!(request.currency, DEFAULT_CURRENCY);
    assert_eq!(request.term, DEFAULT_TERM);
    assert!(request.visible_to_client);

    let attached = api.attached.lock().unwrap();
    assert_eq!(attached.len(), 1);
    let (property_id, photos) = &attached[0];
    assert_eq!(property_id, "prop-1");
    let names: Vec<&str> = photos.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(names, ["photo-1.jpg", "photo-2.jpg"]);
    assert_eq!(photos[0].mime_type, "image/png");
    assert_eq!(photos[1].mime_type, "image/jpeg");
    assert_eq!(photos[0].bytes, b"p1".to_vec());
    Ok(())
}

#[tokio::test]
async fn test_submission_without_photos_skips_attach() -> Result<()> {
    let api = RecordingApi::default();
    let mut session = finished_session(&[]);

    let receipt = submit_session(&mut session, &api, &media(&[])).await?;
    assert_eq!(receipt.photo_count, 0);
    assert_eq!(api.create_count(), 1);
    assert!(api.attached.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_failure_creates_nothing() -> Result<()> {
    let api = RecordingApi {
        fail_create: true,
        ..Default::default()
    };
    let mut session = finished_session(&["p1"]);

    let err = submit_session(&mut session, &api, &media(&[("p1", None)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Create(ApiError::Status { status: 500, .. })));
    assert_eq!(err.created_property_id(), None);
    assert_eq!(session.property_id, None);
    Ok(())
}

/// Create succeeds, attach fails: the retry reuses the created property
#[tokio::test]
async fn test_retry_after_attach_failure_does_not_create_twice() -> Result<()> {
    let api = RecordingApi {
        attach_failures_left: Mutex::new(1),
        ..Default::default()
    };
    let media = media(&[("p1", Some("image/jpeg"))]);
    let mut session = finished_session(&["p1"]);

    let err = submit_session(&mut session, &api, &media).await.unwrap_err();
    assert!(matches!(err, SubmissionError::PhotoAttach { .. }));
    assert_eq!(err.created_property_id(), Some("prop-1"));
    assert_eq!(session.property_id.as_deref(), Some("prop-1"));
    assert_eq!(api.create_count(), 1);

    let receipt = submit_session(&mut session, &api, &media).await?;
    assert_eq!(receipt.property_id, "prop-1");
    assert_eq!(api.create_count(), 1);
    assert_eq!(api.attached.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_media_fetch_failure_keeps_created_property() -> Result<()> {
    let api = RecordingApi::default();
    let mut session = finished_session(&["missing"]);

    let err = submit_session(&mut session, &api, &media(&[])).await.unwrap_err();
    assert!(matches!(err, SubmissionError::MediaFetch { .. }));
    assert_eq!(session.property_id.as_deref(), Some("prop-1"));
    assert!(api.attached.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_create_request_json_shape() -> Result<()> {
    let session = finished_session(&[]);
    let request = session.draft.to_create_request(PropertyKind::Warehouse);
    let json = serde_json::to_value(&request)?;

    assert_eq!(json["title"], "Склад — Варшава — ул. Тестовая 1");
    assert_eq!(json["areaM2"], 100.0);
    assert_eq!(json["monthlyTotal"], 2000.0);
    assert_eq!(json["rentRate"], 15.0);
    assert_eq!(json["serviceRate"], 5.0);
    assert_eq!(json["visibleToClient"], true);
    assert_eq!(json["currency"], "USD");
    Ok(())
}
