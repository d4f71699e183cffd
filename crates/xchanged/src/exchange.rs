//! Exchange service: the daemon's single entry point for state changes.
//!
//! Wraps the pure discovery engine and session state machine with the store,
//! the event log, and the external collaborators. Confirmations run under the
//! session's own mutex; credential issuance is dispatched after the outcome
//! is known and is never awaited by the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use xchange_core::discovery;
use xchange_core::events::{
    CompletionConfirmedPayload, CredentialRequestedPayload, Event, EventPayload,
    SessionCompletedPayload, SessionCreatedPayload, SkillPostedPayload, TaggingSkippedPayload,
};
use xchange_core::posting::{SkillForm, ValidationError};
use xchange_core::session::SessionParams;
use xchange_core::tagging::{normalize_tags, TagOutcome, TagRequest, TaggingError};
use xchange_core::{
    Config, ConfirmOutcome, ExchangeSession, Id, Identity, Query, SessionError, SkillListing,
    SortMode, UserSummary,
};

use crate::collaborators::{CredentialIssuer, CredentialRequest, Tagger};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Service-level knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_sort: SortMode,
    /// 0 = unlimited.
    pub page_size: usize,
    pub tagging_enabled: bool,
    pub tagging_timeout: Duration,
    pub max_tags: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            default_sort: config.default_sort,
            page_size: config.page_size,
            tagging_enabled: config.tagging_enabled,
            tagging_timeout: Duration::from_millis(config.tagging_timeout_ms),
            max_tags: config.max_tags,
        }
    }
}

/// Result of posting a skill. The listing is stored whatever `tagging` says.
#[derive(Debug, Clone, Serialize)]
pub struct PostOutcome {
    pub listing: SkillListing,
    pub tags: Vec<String>,
    pub tagging: TagOutcome,
}

/// Result of a completion attestation.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub outcome: ConfirmOutcome,
    pub session: ExchangeSession,
}

pub struct ExchangeService {
    store: Arc<Store>,
    tagger: Arc<dyn Tagger>,
    issuer: Arc<dyn CredentialIssuer>,
    config: ServiceConfig,
}

impl ExchangeService {
    pub fn new(
        store: Arc<Store>,
        tagger: Arc<dyn Tagger>,
        issuer: Arc<dyn CredentialIssuer>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            tagger,
            issuer,
            config,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn default_sort(&self) -> SortMode {
        self.config.default_sort
    }

    // --- Discovery ---

    /// Filtered, ordered view of the current listings.
    pub async fn explore(&self, query: &Query) -> Vec<SkillListing> {
        let listings = self.store.list_listings().await;
        let mut results = discovery::apply(&listings, query);
        if self.config.page_size > 0 {
            results.truncate(self.config.page_size);
        }
        results
    }

    // --- Posting ---

    /// Validate and store a listing, then try to enrich it with tags.
    pub async fn post_skill(&self, form: &SkillForm, owner: UserSummary) -> Result<PostOutcome> {
        let validated = form.validate()?;
        let submitted_tags = validated.tags.clone();
        let listing = validated.into_listing(Id::new(), owner, Utc::now())?;
        self.store.insert_listing(listing.clone()).await?;
        info!("posted listing: {} ({})", listing.title, listing.id);

        let tagging = if self.config.tagging_enabled {
            match self.request_tags(&TagRequest::from(&listing)).await {
                Ok(tags) => TagOutcome::Tagged {
                    tags: normalize_tags(tags, self.config.max_tags),
                },
                Err(e) => {
                    warn!("tagging skipped for listing {}: {}", listing.id, e);
                    self.record(&EventPayload::TaggingSkipped(TaggingSkippedPayload {
                        listing_id: listing.id.clone(),
                        reason: e.to_string(),
                    }))
                    .await;
                    TagOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            debug!("tagging disabled, listing {} keeps its own tags", listing.id);
            TagOutcome::Skipped {
                reason: "disabled".to_string(),
            }
        };

        // User tags first; the cap applies to the merged list.
        let tags = normalize_tags(
            submitted_tags.iter().chain(tagging.tags()),
            self.config.max_tags,
        );
        self.record(&EventPayload::SkillPosted(SkillPostedPayload {
            listing_id: listing.id.clone(),
            title: listing.title.clone(),
            tags: tags.clone(),
        }))
        .await;

        Ok(PostOutcome {
            listing,
            tags,
            tagging,
        })
    }

    async fn request_tags(
        &self,
        request: &TagRequest,
    ) -> std::result::Result<Vec<String>, TaggingError> {
        let timeout_ms =
            u64::try_from(self.config.tagging_timeout.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.config.tagging_timeout, self.tagger.tag(request)).await {
            Ok(result) => result,
            Err(_) => Err(TaggingError::TimedOut { timeout_ms }),
        }
    }

    // --- Sessions ---

    /// Register a session produced by the matching process.
    pub async fn open_session(&self, params: SessionParams) -> Result<ExchangeSession> {
        let session = ExchangeSession::open(params)?;
        self.store.insert_session(session.clone()).await?;
        self.record(&EventPayload::SessionCreated(SessionCreatedPayload {
            session_id: session.id().clone(),
            status: session.status(),
            participants: session.participants().into_iter().cloned().collect(),
        }))
        .await;
        info!("opened session {}", session.id());
        Ok(session)
    }

    pub async fn listing(&self, id: &Id) -> Result<SkillListing> {
        Ok(self.store.get_listing(id).await?)
    }

    pub async fn sessions(&self) -> Vec<ExchangeSession> {
        self.store.list_sessions().await
    }

    pub async fn session(&self, id: &Id) -> Result<ExchangeSession> {
        Ok(self.store.get_session(id).await?)
    }

    pub async fn session_events(&self, id: &Id) -> Vec<Event> {
        self.store.list_events(Some(id)).await
    }

    /// Apply `actor`'s completion attestation to session `id`.
    ///
    /// Events are appended while the session lock is held so the log order
    /// matches the order attestations were applied.
    pub async fn confirm(&self, id: &Id, actor: &Identity) -> Result<Confirmation> {
        let handle = self.store.session_handle(id).await?;
        let mut session = handle.lock().await;

        let outcome = match session.confirm_completion(actor, Utc::now()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("rejected confirmation on session {}: {}", id, e);
                return Err(e.into());
            }
        };

        if outcome.changed_state() {
            if let Some(side) = session.side_of(actor) {
                self.record(&EventPayload::CompletionConfirmed(CompletionConfirmedPayload {
                    session_id: id.clone(),
                    side,
                    identity: actor.clone(),
                    outcome,
                    progress: session.progress_percentage(),
                }))
                .await;
            }
            info!(
                "session {} confirmed by {} ({}%)",
                id,
                actor,
                session.progress_percentage()
            );
        }

        let credential = if outcome.triggers_credential() {
            CredentialRequest::for_session(&session)
        } else {
            None
        };
        if let Some(request) = &credential {
            self.record(&EventPayload::SessionCompleted(SessionCompletedPayload {
                session_id: id.clone(),
                completed_at: request.completed_at,
            }))
            .await;
            self.record(&EventPayload::CredentialRequested(CredentialRequestedPayload {
                session_id: id.clone(),
                recipients: request.recipients.clone(),
            }))
            .await;
            info!("session {} completed", id);
        }

        let snapshot = session.clone();
        drop(session);

        if let Some(request) = credential {
            self.dispatch_credential(request);
        }

        Ok(Confirmation {
            outcome,
            session: snapshot,
        })
    }

    fn dispatch_credential(&self, request: CredentialRequest) {
        let issuer = Arc::clone(&self.issuer);
        tokio::spawn(async move {
            if let Err(e) = issuer.issue(&request).await {
                error!(
                    "credential issuance failed for session {}: {}",
                    request.session_id, e
                );
            }
        });
    }

    /// Append to the event log. The log is best effort: a payload that fails
    /// to encode is reported and dropped.
    async fn record(&self, payload: &EventPayload) {
        if let Err(e) = self.store.append_event(payload).await {
            error!(
                "failed to record {} event: {}",
                payload.event_type().as_str(),
                e
            );
        }
    }
}
