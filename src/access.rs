//! Access approval for the bot.
//!
//! Every identity starts unknown. It may ask the administrator for access, which
//! leaves a pending request until the administrator approves or denies it.
//! Approved identities may additionally give consent to share their Telegram
//! name with the web application. The administrator is always approved.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use teloxide::types::UserId;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info};

use crate::db;

const APPROVE_PREFIX: &str = "access_approve_";
const DENY_PREFIX: &str = "access_deny_";

/// Role recorded with an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Admin,
    Client,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRole::Admin => "admin",
            AccessRole::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(AccessRole::Admin),
            "client" => Some(AccessRole::Client),
            _ => None,
        }
    }
}

/// The identity asking for access, as seen by the messaging platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub display_name: String,
    pub username: String,
}

/// A pending request for access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub user_id: UserId,
    pub display_name: String,
    pub username: String,
    pub requested_at: DateTime<Utc>,
    pub role: AccessRole,
}

/// Where an identity stands in the approval flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Unknown,
    Pending,
    Approved,
    Denied,
}

/// Result of an access request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new request was filed; the administrator must be notified
    Created(AccessRequest),
    AlreadyApproved,
    /// A request is already waiting; it was left untouched
    AlreadyPending,
}

/// Decision taken by the administrator, carried in callback data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Approve(UserId),
    Deny(UserId),
}

impl AccessDecision {
    pub fn target(&self) -> UserId {
        match self {
            AccessDecision::Approve(user) | AccessDecision::Deny(user) => *user,
        }
    }

    pub fn to_callback_data(&self) -> String {
        match self {
            AccessDecision::Approve(user) => format!("{APPROVE_PREFIX}{}", user.0),
            AccessDecision::Deny(user) => format!("{DENY_PREFIX}{}", user.0),
        }
    }

    /// Decode callback data produced by [`AccessDecision::to_callback_data`]
    pub fn from_callback_data(data: &str) -> Result<Self, DecisionError> {
        let (constructor, raw_id): (fn(UserId) -> Self, &str) =
            if let Some(rest) = data.strip_prefix(APPROVE_PREFIX) {
                (AccessDecision::Approve, rest)
            } else if let Some(rest) = data.strip_prefix(DENY_PREFIX) {
                (AccessDecision::Deny, rest)
            } else {
                return Err(DecisionError::InvalidFormat);
            };

        if raw_id.is_empty() || !raw_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecisionError::InvalidFormat);
        }
        raw_id
            .parse::<u64>()
            .map(|id| constructor(UserId(id)))
            .map_err(|_| DecisionError::InvalidFormat)
    }

    /// Whether callback data looks like a decision at all
    pub fn is_decision_data(data: &str) -> bool {
        data.starts_with(APPROVE_PREFIX) || data.starts_with(DENY_PREFIX)
    }
}

/// Reasons a decision is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionError {
    /// Only the administrator may decide
    NotAdmin,
    /// The decision payload could not be decoded
    InvalidFormat,
    /// No pending request exists for the target
    AlreadyProcessed,
}

impl std::fmt::Display for DecisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionError::NotAdmin => write!(f, "only the administrator may decide"),
            DecisionError::InvalidFormat => write!(f, "invalid decision format"),
            DecisionError::AlreadyProcessed => write!(f, "request already processed"),
        }
    }
}

impl std::error::Error for DecisionError {}

/// A decision that was applied, with the request it resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub decision: AccessDecision,
    pub request: AccessRequest,
}

/// Result of a consent acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Granted,
    AlreadyGranted,
    NotApproved,
}

/// Persisted approval state, loaded at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSnapshot {
    pub approved: Vec<UserId>,
    pub consented: Vec<UserId>,
    pub denied: Vec<UserId>,
    pub pending: Vec<AccessRequest>,
}

/// The approval state machine
#[derive(Debug, Clone)]
pub struct AccessControl {
    admin_id: UserId,
    approved: HashSet<UserId>,
    consented: HashSet<UserId>,
    denied: HashSet<UserId>,
    pending: HashMap<UserId, AccessRequest>,
}

impl AccessControl {
    pub fn new(admin_id: UserId) -> Self {
        Self {
            admin_id,
            approved: HashSet::from([admin_id]),
            consented: HashSet::new(),
            denied: HashSet::new(),
            pending: HashMap::new(),
        }
    }

    pub fn from_snapshot(admin_id: UserId, snapshot: AccessSnapshot) -> Self {
        let mut control = Self::new(admin_id);
        control.approved.extend(snapshot.approved);
        control.consented.extend(snapshot.consented);
        control.denied.extend(snapshot.denied);
        control.pending.extend(
            snapshot
                .pending
                .into_iter()
                .map(|request| (request.user_id, request)),
        );
        control
    }

    pub fn admin_id(&self) -> UserId {
        self.admin_id
    }

    pub fn status(&self, user: UserId) -> AccessStatus {
        if self.is_approved(user) {
            AccessStatus::Approved
        } else if self.pending.contains_key(&user) {
            AccessStatus::Pending
        } else if self.denied.contains(&user) {
            AccessStatus::Denied
        } else {
            AccessStatus::Unknown
        }
    }

    pub fn is_approved(&self, user: UserId) -> bool {
        user == self.admin_id || self.approved.contains(&user)
    }

    pub fn has_consent(&self, user: UserId) -> bool {
        self.consented.contains(&user)
    }

    pub fn pending_request(&self, user: UserId) -> Option<&AccessRequest> {
        self.pending.get(&user)
    }

    /// File an access request
    ///
    /// An existing request is never overwritten, so the original timestamp and
    /// role survive repeated clicks.
    pub fn request(&mut self, requester: Requester, now: DateTime<Utc>) -> RequestOutcome {
        if self.is_approved(requester.id) {
            return RequestOutcome::AlreadyApproved;
        }
        if self.pending.contains_key(&requester.id) {
            return RequestOutcome::AlreadyPending;
        }

        let role = if requester.id == self.admin_id {
            AccessRole::Admin
        } else {
            AccessRole::Client
        };
        let request = AccessRequest {
            user_id: requester.id,
            display_name: requester.display_name,
            username: requester.username,
            requested_at: now,
            role,
        };
        self.denied.remove(&requester.id);
        self.pending.insert(requester.id, request.clone());
        RequestOutcome::Created(request)
    }

    /// Apply the administrator's decision on a pending request
    pub fn decide(
        &mut self,
        decider: UserId,
        decision: AccessDecision,
    ) -> Result<DecisionOutcome, DecisionError> {
        if decider != self.admin_id {
            return Err(DecisionError::NotAdmin);
        }
        let target = decision.target();
        let request = self
            .pending
            .remove(&target)
            .ok_or(DecisionError::AlreadyProcessed)?;

        match decision {
            AccessDecision::Approve(_) => {
                self.approved.insert(target);
                self.denied.remove(&target);
            }
            AccessDecision::Deny(_) => {
                if target != self.admin_id {
                    self.approved.remove(&target);
                    self.consented.remove(&target);
                    self.denied.insert(target);
                }
            }
        }

        Ok(DecisionOutcome { decision, request })
    }

    /// Record consent to share the Telegram name with the web application
    pub fn grant_consent(&mut self, user: UserId) -> ConsentOutcome {
        if !self.is_approved(user) {
            return ConsentOutcome::NotApproved;
        }
        if self.consented.insert(user) {
            ConsentOutcome::Granted
        } else {
            ConsentOutcome::AlreadyGranted
        }
    }
}

// A write waiting for the persistence worker
#[derive(Debug)]
enum PersistJob {
    Request(AccessRequest),
    Decision(DecisionOutcome),
    Consent(UserId),
    Flush(oneshot::Sender<()>),
}

// Applies writes one at a time, in the order the mutations happened
async fn persist_worker(pool: PgPool, mut jobs: mpsc::UnboundedReceiver<PersistJob>) {
    while let Some(job) = jobs.recv().await {
        let (user_id, result) = match job {
            PersistJob::Request(request) => {
                (request.user_id, db::save_access_request(&pool, &request).await)
            }
            PersistJob::Decision(outcome) => {
                (outcome.decision.target(), db::save_decision(&pool, &outcome).await)
            }
            PersistJob::Consent(user) => (user, db::save_consent(&pool, user).await),
            PersistJob::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        if let Err(e) = result {
            error!(user_id = %user_id, error = %e, "Failed to persist access state");
        }
    }
    debug!("Access persistence worker stopped");
}

/// Shared approval state with optional PostgreSQL write-through
///
/// Writes are queued while the state lock is held and applied by a single
/// worker task, so the database sees them in mutation order and the lock is
/// never held across a database round trip.
pub struct AccessStore {
    control: Mutex<AccessControl>,
    writer: Option<mpsc::UnboundedSender<PersistJob>>,
}

impl AccessStore {
    /// Approval state kept only in memory
    pub fn in_memory(admin_id: UserId) -> Self {
        Self {
            control: Mutex::new(AccessControl::new(admin_id)),
            writer: None,
        }
    }

    /// Approval state backed by PostgreSQL, restored from the database
    pub async fn with_database(admin_id: UserId, pool: PgPool) -> Result<Self> {
        db::init_database_schema(&pool).await?;
        let snapshot = db::load_access_snapshot(&pool).await?;
        info!(
            approved = snapshot.approved.len(),
            pending = snapshot.pending.len(),
            "Access state restored from database"
        );
        let (writer, jobs) = mpsc::unbounded_channel();
        tokio::spawn(persist_worker(pool, jobs));
        Ok(Self {
            control: Mutex::new(AccessControl::from_snapshot(admin_id, snapshot)),
            writer: Some(writer),
        })
    }

    fn persist(&self, job: PersistJob) {
        if let Some(writer) = &self.writer {
            if writer.send(job).is_err() {
                error!("Access persistence worker is gone, write dropped");
            }
        }
    }

    /// Wait until every queued write has been applied
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done, applied) = oneshot::channel();
        if writer.send(PersistJob::Flush(done)).is_ok() {
            let _ = applied.await;
        }
    }

    pub async fn status(&self, user: UserId) -> AccessStatus {
        self.control.lock().await.status(user)
    }

    pub async fn is_approved(&self, user: UserId) -> bool {
        self.control.lock().await.is_approved(user)
    }

    pub async fn has_consent(&self, user: UserId) -> bool {
        self.control.lock().await.has_consent(user)
    }

    pub async fn request(&self, requester: Requester) -> RequestOutcome {
        let mut control = self.control.lock().await;
        let outcome = control.request(requester, Utc::now());
        if let RequestOutcome::Created(request) = &outcome {
            self.persist(PersistJob::Request(request.clone()));
        }
        outcome
    }

    pub async fn decide(
        &self,
        decider: UserId,
        decision: AccessDecision,
    ) -> Result<DecisionOutcome, DecisionError> {
        let mut control = self.control.lock().await;
        let outcome = control.decide(decider, decision)?;
        self.persist(PersistJob::Decision(outcome.clone()));
        Ok(outcome)
    }

    pub async fn grant_consent(&self, user: UserId) -> ConsentOutcome {
        let mut control = self.control.lock().await;
        let outcome = control.grant_consent(user);
        if outcome == ConsentOutcome::Granted {
            self.persist(PersistJob::Consent(user));
        }
        outcome
    }
}
