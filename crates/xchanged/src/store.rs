//! In-memory store for listings, sessions, and the event log.
//!
//! Each session sits behind its own mutex, which is the single mutation
//! point for that session id. Readers get cloned snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use xchange_core::events::{Event, EventPayload};
use xchange_core::{ExchangeSession, Id, SkillListing};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("listing not found: {0}")]
    ListingNotFound(String),
    #[error("listing already exists: {0}")]
    DuplicateListing(String),
    #[error("session already exists: {0}")]
    DuplicateSession(String),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Shared handle to one session's mutation point.
pub type SessionHandle = Arc<Mutex<ExchangeSession>>;

#[derive(Debug, Default)]
pub struct Store {
    listings: RwLock<Vec<SkillListing>>,
    sessions: RwLock<HashMap<Id, SessionHandle>>,
    events: RwLock<Vec<Event>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Listings ---

    /// Append a listing. Insertion order is the engine's input order.
    pub async fn insert_listing(&self, listing: SkillListing) -> Result<()> {
        let mut listings = self.listings.write().await;
        if listings.iter().any(|l| l.id == listing.id) {
            return Err(StoreError::DuplicateListing(listing.id.to_string()));
        }
        listings.push(listing);
        Ok(())
    }

    pub async fn list_listings(&self) -> Vec<SkillListing> {
        self.listings.read().await.clone()
    }

    pub async fn get_listing(&self, id: &Id) -> Result<SkillListing> {
        self.listings
            .read()
            .await
            .iter()
            .find(|l| &l.id == id)
            .cloned()
            .ok_or_else(|| StoreError::ListingNotFound(id.to_string()))
    }

    // --- Sessions ---

    pub async fn insert_session(&self, session: ExchangeSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            return Err(StoreError::DuplicateSession(session.id().to_string()));
        }
        sessions.insert(session.id().clone(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    /// The mutex guarding a session. Lock it to mutate.
    pub async fn session_handle(&self, id: &Id) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(Arc::clone)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    pub async fn get_session(&self, id: &Id) -> Result<ExchangeSession> {
        let handle = self.session_handle(id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Snapshot of all sessions, oldest first.
    pub async fn list_sessions(&self) -> Vec<ExchangeSession> {
        let handles: Vec<SessionHandle> =
            self.sessions.read().await.values().map(Arc::clone).collect();
        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(handle.lock().await.clone());
        }
        sessions.sort_by_key(ExchangeSession::created_at);
        sessions
    }

    // --- Events ---

    pub async fn append_event(&self, payload: &EventPayload) -> Result<Event> {
        let event = Event::record(payload, Utc::now())?;
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    /// Events in append order, optionally restricted to one session.
    pub async fn list_events(&self, session_id: Option<&Id>) -> Vec<Event> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| session_id.is_none() || e.session_id.as_ref() == session_id)
            .cloned()
            .collect()
    }
}
