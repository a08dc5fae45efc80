//! Property creation wizard: conversation state and its transition function.
//!
//! The wizard walks the administrator through the fields of a property one
//! message at a time, or accepts every field at once as a labelled block. The
//! state lives in teloxide's dialogue storage; [`advance`] is a pure function so
//! the whole step machine can be exercised without a bot.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::property::{MediaRef, PropertyDraft, PropertyKind};
use crate::text_processing::{
    detect_kind_hint, is_done_token, parse_number, parse_property_block, strip_kind_prefix,
};

/// Steps of the wizard, in the order they are visited
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardStep {
    City,
    Address,
    AreaM2,
    MonthlyTotal,
    RentRate,
    ServiceRate,
    Description,
    Photos,
}

impl WizardStep {
    pub const ORDER: [WizardStep; 8] = [
        WizardStep::City,
        WizardStep::Address,
        WizardStep::AreaM2,
        WizardStep::MonthlyTotal,
        WizardStep::RentRate,
        WizardStep::ServiceRate,
        WizardStep::Description,
        WizardStep::Photos,
    ];

    /// The step after this one; `None` for the terminal photo step
    pub fn next(self) -> Option<WizardStep> {
        let position = Self::ORDER.iter().position(|step| *step == self)?;
        Self::ORDER.get(position + 1).copied()
    }

    /// How input at this step is interpreted and where it is stored
    fn slot(self) -> StepSlot {
        match self {
            WizardStep::City => StepSlot::City,
            WizardStep::Address => StepSlot::Text(|draft, value| draft.address = value),
            WizardStep::AreaM2 => StepSlot::Number(|draft, value| draft.area_m2 = value),
            WizardStep::MonthlyTotal => StepSlot::Number(|draft, value| draft.monthly_total = value),
            WizardStep::RentRate => StepSlot::Number(|draft, value| draft.rent_rate = value),
            WizardStep::ServiceRate => StepSlot::Number(|draft, value| draft.service_rate = value),
            WizardStep::Description => StepSlot::Text(|draft, value| draft.description = value),
            WizardStep::Photos => StepSlot::Photos,
        }
    }
}

enum StepSlot {
    City,
    Text(fn(&mut PropertyDraft, String)),
    Number(fn(&mut PropertyDraft, f64)),
    Photos,
}

/// One wizard run for the administrator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub step: WizardStep,
    /// Set from the first message of the session and never re-derived
    pub kind: Option<PropertyKind>,
    pub draft: PropertyDraft,
    /// Property already created by an earlier "done" whose photo upload failed
    pub property_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WizardSession {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            step: WizardStep::City,
            kind: None,
            draft: PropertyDraft::default(),
            property_id: None,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind.unwrap_or_default()
    }

    /// Whether the session has been idle for longer than `ttl`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.updated_at > ttl
    }

    fn advance_to_next(&mut self) -> WizardReply {
        match self.step.next() {
            Some(next) => {
                self.step = next;
                WizardReply::Prompt(next)
            }
            None => WizardReply::Prompt(self.step),
        }
    }
}

/// Conversation state stored per chat
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum WizardState {
    #[default]
    Idle,
    Collecting(WizardSession),
}

/// Type alias for the wizard dialogue
pub type WizardDialogue = Dialogue<WizardState, InMemStorage<WizardState>>;

/// Message received while a session is active
#[derive(Clone, Debug, PartialEq)]
pub enum WizardInput {
    Text(String),
    /// Photo variants ordered by resolution, smallest first
    Photo(Vec<MediaRef>),
}

/// What the bot should answer after a transition
#[derive(Clone, Debug, PartialEq)]
pub enum WizardReply {
    /// Ask for the value of the given step
    Prompt(WizardStep),
    /// Every field was read from one message; photos are next
    BlockRecognized,
    /// Warehouse mode was detected but no city followed the keyword
    WarehouseCityPrompt,
    /// The value for a numeric step was not a number
    NotANumber(WizardStep),
    /// A photo was stored; carries the number of photos so far
    PhotoAccepted(usize),
}

/// Side effect requested by a transition
#[derive(Clone, Debug, PartialEq)]
pub enum WizardEffect {
    Reply(WizardReply),
    /// The administrator finished the photo step; create the property
    Submit,
    /// Input that has no meaning at the current step
    Ignore,
}

/// Result of feeding one input to a session
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub session: WizardSession,
    pub effect: WizardEffect,
}

/// Apply one input to a session
///
/// Invalid input leaves the session untouched apart from its activity stamp;
/// valid input stores the value and moves to the next step.
pub fn advance(mut session: WizardSession, input: WizardInput, now: DateTime<Utc>) -> Transition {
    session.updated_at = now;

    let effect = match (session.step.slot(), input) {
        (StepSlot::Photos, WizardInput::Photo(variants)) => match variants.last() {
            Some(largest) => {
                session.draft.photo_refs.push(largest.clone());
                WizardEffect::Reply(WizardReply::PhotoAccepted(session.draft.photo_refs.len()))
            }
            None => WizardEffect::Ignore,
        },
        (_, WizardInput::Photo(_)) => WizardEffect::Ignore,
        (StepSlot::Photos, WizardInput::Text(text)) => {
            if is_done_token(&text) {
                WizardEffect::Submit
            } else {
                WizardEffect::Reply(WizardReply::Prompt(WizardStep::Photos))
            }
        }
        (StepSlot::City, WizardInput::Text(text)) => WizardEffect::Reply(accept_city(&mut session, text.trim())),
        (StepSlot::Text(store), WizardInput::Text(text)) => {
            store(&mut session.draft, text.trim().to_string());
            WizardEffect::Reply(session.advance_to_next())
        }
        (StepSlot::Number(store), WizardInput::Text(text)) => match parse_number(&text) {
            Some(value) => {
                store(&mut session.draft, value);
                WizardEffect::Reply(session.advance_to_next())
            }
            None => WizardEffect::Reply(WizardReply::NotANumber(session.step)),
        },
    };

    Transition { session, effect }
}

fn accept_city(session: &mut WizardSession, text: &str) -> WizardReply {
    let kind = *session.kind.get_or_insert_with(|| detect_kind_hint(text));

    if let Some(block) = parse_property_block(text) {
        session.draft.apply_block(block);
        session.step = WizardStep::Photos;
        return WizardReply::BlockRecognized;
    }

    let city = match kind {
        PropertyKind::Warehouse => strip_kind_prefix(text),
        PropertyKind::Premise => text.to_string(),
    };
    if city.is_empty() {
        return match kind {
            PropertyKind::Warehouse => WizardReply::WarehouseCityPrompt,
            PropertyKind::Premise => WizardReply::Prompt(WizardStep::City),
        };
    }

    session.draft.city = city;
    session.advance_to_next()
}
