//! External collaborators: tagging and reputation credential issuance.
//!
//! Both are capability traits so the daemon can run against offline
//! stand-ins. Neither is allowed to block or undo the state change that
//! triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use xchange_core::tagging::{TagRequest, TaggingError};
use xchange_core::{ExchangeSession, Id, Identity};

/// Produces canonical tags for a listing.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, request: &TagRequest) -> Result<Vec<String>, TaggingError>;
}

/// Keyword table for the offline tagger: `(needle, tags)`.
const KEYWORD_TAGS: &[(&str, &[&str])] = &[
    ("react", &["react", "frontend", "javascript"]),
    ("typescript", &["typescript", "javascript"]),
    ("frontend", &["frontend"]),
    ("figma", &["figma", "prototyping", "design"]),
    ("design", &["design", "ux"]),
    ("spring", &["java", "spring-boot", "backend"]),
    ("backend", &["backend"]),
    ("rust", &["rust", "systems"]),
    ("python", &["python"]),
    ("machine learning", &["machine-learning", "data-science"]),
    ("devops", &["devops", "infrastructure"]),
    ("security", &["cybersecurity"]),
];

/// Deterministic offline tagger that matches a fixed keyword table against
/// the title, category, and description.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordTagger;

impl KeywordTagger {
    fn derive(request: &TagRequest) -> Vec<String> {
        let haystack = format!(
            "{} {} {}",
            request.title, request.category, request.description
        )
        .to_lowercase();

        let mut tags: Vec<String> = KEYWORD_TAGS
            .iter()
            .filter(|(needle, _)| haystack.contains(needle))
            .flat_map(|(_, tags)| tags.iter().map(|t| (*t).to_string()))
            .collect();

        if tags.is_empty() {
            let category = request.category.trim().to_lowercase().replace(' ', "-");
            if !category.is_empty() {
                tags.push(category);
            }
        }
        tags
    }
}

#[async_trait]
impl Tagger for KeywordTagger {
    async fn tag(&self, request: &TagRequest) -> Result<Vec<String>, TaggingError> {
        Ok(Self::derive(request))
    }
}

/// Tagger that always fails, for running with tagging turned off upstream.
#[derive(Debug, Clone)]
pub struct UnavailableTagger {
    reason: String,
}

impl UnavailableTagger {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tagger for UnavailableTagger {
    async fn tag(&self, _request: &TagRequest) -> Result<Vec<String>, TaggingError> {
        Err(TaggingError::Unavailable(self.reason.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueError {
    #[error("credential issuer unavailable: {0}")]
    Unavailable(String),
}

/// Request to mint reputation credentials for a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRequest {
    pub session_id: Id,
    pub recipients: Vec<Identity>,
    pub skills: Vec<String>,
    pub contract_address: String,
    pub completed_at: DateTime<Utc>,
}

impl CredentialRequest {
    /// Build the request for a completed session; `None` while it is open.
    pub fn for_session(session: &ExchangeSession) -> Option<Self> {
        let completed_at = session.completed_at()?;
        Some(Self {
            session_id: session.id().clone(),
            recipients: session.participants().into_iter().cloned().collect(),
            skills: vec![
                session.side_a().skill_title.clone(),
                session.side_b().skill_title.clone(),
            ],
            contract_address: session.contract_address().to_string(),
            completed_at,
        })
    }
}

/// Issues reputation credentials once a session completes.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, request: &CredentialRequest) -> Result<(), IssueError>;
}

/// Issuer that only records the request in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCredentialIssuer;

#[async_trait]
impl CredentialIssuer for LogCredentialIssuer {
    async fn issue(&self, request: &CredentialRequest) -> Result<(), IssueError> {
        info!(
            session_id = %request.session_id,
            contract = %request.contract_address,
            recipients = request.recipients.len(),
            "reputation credential requested"
        );
        Ok(())
    }
}
