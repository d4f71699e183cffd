//! Event types for the marketplace audit log.
//!
//! Events are what the UI renders status and notifications from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{ConfirmOutcome, SessionStatus, SideRole};
use crate::types::{Id, Identity};

/// Event type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SkillPosted,
    TaggingSkipped,
    SessionCreated,
    CompletionConfirmed,
    SessionCompleted,
    CredentialRequested,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkillPosted => "SKILL_POSTED",
            Self::TaggingSkipped => "TAGGING_SKIPPED",
            Self::SessionCreated => "SESSION_CREATED",
            Self::CompletionConfirmed => "COMPLETION_CONFIRMED",
            Self::SessionCompleted => "SESSION_COMPLETED",
            Self::CredentialRequested => "CREDENTIAL_REQUESTED",
        }
    }
}

/// Payload for SKILL_POSTED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillPostedPayload {
    pub listing_id: Id,
    pub title: String,
    pub tags: Vec<String>,
}

/// Payload for TAGGING_SKIPPED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggingSkippedPayload {
    pub listing_id: Id,
    pub reason: String,
}

/// Payload for SESSION_CREATED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreatedPayload {
    pub session_id: Id,
    pub status: SessionStatus,
    pub participants: Vec<Identity>,
}

/// Payload for COMPLETION_CONFIRMED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfirmedPayload {
    pub session_id: Id,
    pub side: SideRole,
    pub identity: Identity,
    pub outcome: ConfirmOutcome,
    pub progress: u8,
}

/// Payload for SESSION_COMPLETED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCompletedPayload {
    pub session_id: Id,
    pub completed_at: DateTime<Utc>,
}

/// Payload for CREDENTIAL_REQUESTED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRequestedPayload {
    pub session_id: Id,
    pub recipients: Vec<Identity>,
}

/// Union type for all event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    SkillPosted(SkillPostedPayload),
    TaggingSkipped(TaggingSkippedPayload),
    SessionCreated(SessionCreatedPayload),
    CompletionConfirmed(CompletionConfirmedPayload),
    SessionCompleted(SessionCompletedPayload),
    CredentialRequested(CredentialRequestedPayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::SkillPosted(_) => EventType::SkillPosted,
            Self::TaggingSkipped(_) => EventType::TaggingSkipped,
            Self::SessionCreated(_) => EventType::SessionCreated,
            Self::CompletionConfirmed(_) => EventType::CompletionConfirmed,
            Self::SessionCompleted(_) => EventType::SessionCompleted,
            Self::CredentialRequested(_) => EventType::CredentialRequested,
        }
    }

    /// Session this event belongs to, if any.
    pub fn session_id(&self) -> Option<&Id> {
        match self {
            Self::SkillPosted(_) | Self::TaggingSkipped(_) => None,
            Self::SessionCreated(p) => Some(&p.session_id),
            Self::CompletionConfirmed(p) => Some(&p.session_id),
            Self::SessionCompleted(p) => Some(&p.session_id),
            Self::CredentialRequested(p) => Some(&p.session_id),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An event in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Id,
    /// Associated session (optional).
    pub session_id: Option<Id>,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// JSON payload with event-specific data.
    pub payload_json: String,
}

impl Event {
    pub fn record(
        payload: &EventPayload,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Id::new(),
            session_id: payload.session_id().cloned(),
            event_type: payload.event_type(),
            timestamp,
            payload_json: payload.to_json()?,
        })
    }
}
