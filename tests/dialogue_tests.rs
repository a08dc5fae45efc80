use anyhow::Result;
use chrono::{TimeDelta, Utc};

use property_bot::dialogue::{
    advance, WizardEffect, WizardInput, WizardReply, WizardSession, WizardState, WizardStep,
};
use property_bot::property::{MediaRef, PropertyKind};

fn text(value: &str) -> WizardInput {
    WizardInput::Text(value.to_string())
}

fn photo(ids: &[&str]) -> WizardInput {
    WizardInput::Photo(ids.iter().map(|id| MediaRef::new(*id)).collect())
}

/// Walk a fresh session through every step one message at a time
#[tokio::test]
async fn test_step_machine_visits_every_step_in_order() -> Result<()> {
    let now = Utc::now();
    let mut session = WizardSession::new(now);
    let inputs = [
        ("Варшава", WizardStep::Address),
        ("ул. Тестовая 1", WizardStep::AreaM2),
        ("100", WizardStep::MonthlyTotal),
        ("2 000", WizardStep::RentRate),
        ("15,5", WizardStep::ServiceRate),
        ("5", WizardStep::Description),
        ("Светлое помещение", WizardStep::Photos),
    ];

    let mut visited = vec![session.step];
    for (input, expected) in inputs {
        let transition = advance(session, text(input), now);
        assert_eq!(transition.session.step, expected, "after {input:?}");
        assert_eq!(
            transition.effect,
            WizardEffect::Reply(WizardReply::Prompt(expected))
        );
        session = transition.session;
        visited.push(session.step);
    }

    assert_eq!(visited, WizardStep::ORDER);
    assert_eq!(session.draft.city, "Варшава");
    assert_eq!(session.draft.address, "ул. Тестовая 1");
    assert_eq!(session.draft.area_m2, 100.0);
    assert_eq!(session.draft.monthly_total, 2000.0);
    assert_eq!(session.draft.rent_rate, 15.5);
    assert_eq!(session.draft.service_rate, 5.0);
    assert_eq!(session.draft.description, "Светлое помещение");
    assert_eq!(session.kind(), PropertyKind::Premise);
    Ok(())
}

/// Invalid numbers keep the session on the same step
#[tokio::test]
async fn test_invalid_number_stays_on_step() -> Result<()> {
    let now = Utc::now();
    let mut session = WizardSession::new(now);
    session.step = WizardStep::AreaM2;

    let transition = advance(session, text("сто метров"), now);
    assert_eq!(transition.session.step, WizardStep::AreaM2);
    assert_eq!(
        transition.effect,
        WizardEffect::Reply(WizardReply::NotANumber(WizardStep::AreaM2))
    );
    assert_eq!(transition.session.draft.area_m2, 0.0);

    let transition = advance(transition.session, text("120"), now);
    assert_eq!(transition.session.step, WizardStep::MonthlyTotal);
    assert_eq!(transition.session.draft.area_m2, 120.0);
    Ok(())
}

/// A full block at the city step jumps straight to photos
#[tokio::test]
async fn test_block_fast_path() -> Result<()> {
    let now = Utc::now();
    let block = "Город: Варшава\nАдрес: ул. Тестовая 1\nМетраж: 100\nЦена: 2000\nЦена м2: 15\nСервис: 5\nОписание: тест";

    let transition = advance(WizardSession::new(now), text(block), now);
    assert_eq!(transition.effect, WizardEffect::Reply(WizardReply::BlockRecognized));

    let session = transition.session;
    assert_eq!(session.step, WizardStep::Photos);
    assert_eq!(session.draft.city, "Варшава");
    assert_eq!(session.draft.monthly_total, 2000.0);
    assert_eq!(session.draft.description, "тест");
    assert_eq!(session.kind(), PropertyKind::Premise);
    Ok(())
}

/// Warehouse keyword sets the kind once and is stripped from the city
#[tokio::test]
async fn test_warehouse_kind_detection() -> Result<()> {
    let now = Utc::now();

    let transition = advance(WizardSession::new(now), text("Склад: Лодзь"), now);
    assert_eq!(transition.session.kind, Some(PropertyKind::Warehouse));
    assert_eq!(transition.session.draft.city, "Лодзь");
    assert_eq!(transition.session.step, WizardStep::Address);

    // The keyword alone asks for the city again, still in warehouse mode
    let transition = advance(WizardSession::new(now), text("Склад"), now);
    assert_eq!(transition.effect, WizardEffect::Reply(WizardReply::WarehouseCityPrompt));
    assert_eq!(transition.session.step, WizardStep::City);

    // The kind is not re-derived from the follow-up message
    let transition = advance(transition.session, text("Лодзь"), now);
    assert_eq!(transition.session.kind(), PropertyKind::Warehouse);
    assert_eq!(transition.session.draft.city, "Лодзь");
    assert_eq!(
        transition.session.draft.title(transition.session.kind()),
        "Склад — Лодзь — "
    );
    Ok(())
}

/// Warehouse block keeps the warehouse title
#[tokio::test]
async fn test_warehouse_block() -> Result<()> {
    let now = Utc::now();
    let block = "Склад\nГород: Познань\nАдрес: Промышленная 7\nМетраж: 1500\nЦена: 9000\nЦена м2: 6\nСервис: 1";

    let transition = advance(WizardSession::new(now), text(block), now);
    let session = transition.session;
    assert_eq!(session.step, WizardStep::Photos);
    assert_eq!(session.kind(), PropertyKind::Warehouse);
    assert_eq!(session.draft.title(session.kind()), "Склад — Познань — Промышленная 7");
    Ok(())
}

/// Photos are collected in order, keeping the largest variant
#[tokio::test]
async fn test_photo_step_collects_largest_variants() -> Result<()> {
    let now = Utc::now();
    let mut session = WizardSession::new(now);
    session.step = WizardStep::Photos;

    let transition = advance(session, photo(&["a-small", "a-large"]), now);
    assert_eq!(transition.effect, WizardEffect::Reply(WizardReply::PhotoAccepted(1)));
    let transition = advance(transition.session, photo(&["b-small", "b-medium", "b-large"]), now);
    assert_eq!(transition.effect, WizardEffect::Reply(WizardReply::PhotoAccepted(2)));

    assert_eq!(
        transition.session.draft.photo_refs,
        vec![MediaRef::new("a-large"), MediaRef::new("b-large")]
    );

    let transition = advance(transition.session, photo(&[]), now);
    assert_eq!(transition.effect, WizardEffect::Ignore);
    assert_eq!(transition.session.draft.photo_refs.len(), 2);
    Ok(())
}

/// Only the done token submits; other text repeats the photo prompt
#[tokio::test]
async fn test_done_token_submits() -> Result<()> {
    let now = Utc::now();
    let mut session = WizardSession::new(now);
    session.step = WizardStep::Photos;

    let transition = advance(session, text("ещё минуту"), now);
    assert_eq!(
        transition.effect,
        WizardEffect::Reply(WizardReply::Prompt(WizardStep::Photos))
    );

    let transition = advance(transition.session, text("Готово"), now);
    assert_eq!(transition.effect, WizardEffect::Submit);
    assert_eq!(transition.session.step, WizardStep::Photos);
    Ok(())
}

/// Every transition refreshes the activity stamp used for expiry
#[tokio::test]
async fn test_activity_stamp_and_expiry() -> Result<()> {
    let start = Utc::now();
    let ttl = TimeDelta::hours(24);
    let session = WizardSession::new(start);

    let later = start + TimeDelta::hours(20);
    let transition = advance(session, text("Варшава"), later);
    assert_eq!(transition.session.updated_at, later);
    assert!(!transition.session.is_expired(start + TimeDelta::hours(30), ttl));
    assert!(transition.session.is_expired(later + TimeDelta::hours(25), ttl));
    Ok(())
}

/// Dialogue states survive a serde round trip
#[tokio::test]
async fn test_wizard_state_serialization() -> Result<()> {
    let now = Utc::now();
    let transition = advance(WizardSession::new(now), text("Склад Лодзь"), now);
    let state = WizardState::Collecting(transition.session.clone());

    let json = serde_json::to_string(&state)?;
    let restored: WizardState = serde_json::from_str(&json)?;
    match restored {
        WizardState::Collecting(session) => assert_eq!(session, transition.session),
        WizardState::Idle => panic!("expected a collecting state"),
    }
    Ok(())
}
