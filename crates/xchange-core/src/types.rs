//! Core types for the skill exchange marketplace.
//!
//! Listings, discovery queries, and the identities that own session sides.
//! Session types live in [`crate::session`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for listings, sessions, and events.
/// Uses `UUIDv7` for time-ordered lexicographic sorting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A connected account (wallet-style address). Compared for equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Returned when a wire spelling does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} '{value}', expected one of: {expected}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Declares `as_str` and `FromStr` for a fieldless enum from one spelling table.
macro_rules! wire_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        field: $field,
                        value: s.to_string(),
                        expected: concat!($($text, " "),+),
                    }),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// --- Listing enumerations ---

/// Proficiency level advertised by a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

wire_enum!(SkillLevel, "level", {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

/// Whether the owner offers to teach the skill or wants to learn it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    Teach,
    Learn,
}

wire_enum!(SkillType, "type", {
    Teach => "teach",
    Learn => "learn",
});

/// Where the exchange takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Location {
    Remote,
    InPerson,
}

wire_enum!(Location, "location", {
    Remote => "remote",
    InPerson => "in-person",
});

// --- Query enumerations ---

/// Type filter; `All` disables the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFilter {
    #[default]
    All,
    Teach,
    Learn,
}

wire_enum!(TypeFilter, "type filter", {
    All => "all",
    Teach => "teach",
    Learn => "learn",
});

impl TypeFilter {
    /// The listing type this filter selects, or `None` for `All`.
    pub fn selected(self) -> Option<SkillType> {
        match self {
            Self::All => None,
            Self::Teach => Some(SkillType::Teach),
            Self::Learn => Some(SkillType::Learn),
        }
    }
}

/// Location filter; `All` disables the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationFilter {
    #[default]
    All,
    Remote,
    InPerson,
}

wire_enum!(LocationFilter, "location filter", {
    All => "all",
    Remote => "remote",
    InPerson => "in-person",
});

impl LocationFilter {
    /// The location this filter selects, or `None` for `All`.
    pub fn selected(self) -> Option<Location> {
        match self {
            Self::All => None,
            Self::Remote => Some(Location::Remote),
            Self::InPerson => Some(Location::InPerson),
        }
    }
}

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Newest listings first.
    #[default]
    Recent,
    /// Highest owner reputation first.
    Reputation,
    /// Verified owners first.
    Verified,
}

wire_enum!(SortMode, "sort mode", {
    Recent => "recent",
    Reputation => "reputation",
    Verified => "verified",
});

// --- Core types ---

/// Summary of the account that owns a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    /// Average rating in `[0, 5]`.
    pub reputation: f64,
    pub verified: bool,
}

/// A posted skill offer (teach) or request (learn).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillListing {
    pub id: Id,
    pub title: String,
    pub category: String,
    pub level: SkillLevel,
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    pub location: Location,
    /// Free text, e.g. "2 hours".
    pub duration: String,
    pub description: String,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// Discovery query. Rebuilt by the caller on every parameter change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub search_term: String,
    pub type_filter: TypeFilter,
    pub location_filter: LocationFilter,
    pub sort_mode: SortMode,
}

impl Query {
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_type(mut self, filter: TypeFilter) -> Self {
        self.type_filter = filter;
        self
    }

    pub fn with_location(mut self, filter: LocationFilter) -> Self {
        self.location_filter = filter;
        self
    }

    pub fn with_sort(mut self, mode: SortMode) -> Self {
        self.sort_mode = mode;
        self
    }
}
