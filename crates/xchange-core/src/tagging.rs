//! Tag enrichment contract.
//!
//! Tagging is an external service. Its answer is either a tag list or a
//! failure, and a failure never undoes the posting it was attached to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SkillListing;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaggingError {
    #[error("tagging service unavailable: {0}")]
    Unavailable(String),
    #[error("tagging service timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
}

/// Input sent to the tagging service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequest {
    pub title: String,
    pub description: String,
    pub category: String,
}

impl From<&SkillListing> for TagRequest {
    fn from(listing: &SkillListing) -> Self {
        Self {
            title: listing.title.clone(),
            description: listing.description.clone(),
            category: listing.category.clone(),
        }
    }
}

/// What happened to the optional tagging step of a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TagOutcome {
    Tagged { tags: Vec<String> },
    Skipped { reason: String },
}

impl TagOutcome {
    pub fn tags(&self) -> &[String] {
        match self {
            Self::Tagged { tags } => tags,
            Self::Skipped { .. } => &[],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Lowercase, trim, and deduplicate tags, keeping first-seen order and at
/// most `max_tags` entries. `max_tags == 0` means unlimited.
pub fn normalize_tags<I, S>(tags: I, max_tags: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        if max_tags != 0 && out.len() >= max_tags {
            break;
        }
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dedupes_case_insensitively() {
        let tags = normalize_tags(["React", " react ", "Frontend", "", "JavaScript"], 0);
        assert_eq!(tags, ["react", "frontend", "javascript"]);
    }

    #[test]
    fn normalize_caps_length() {
        let tags = normalize_tags(["a", "b", "c", "d"], 2);
        assert_eq!(tags, ["a", "b"]);
    }

    #[test]
    fn skipped_outcome_has_no_tags() {
        let outcome = TagOutcome::Skipped {
            reason: "tagging service unavailable: offline".to_string(),
        };
        assert!(outcome.is_skipped());
        assert!(outcome.tags().is_empty());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = TagOutcome::Tagged {
            tags: vec!["react".to_string()],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "tagged");
        assert_eq!(json["tags"][0], "react");
    }
}
