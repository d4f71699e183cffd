//! Skill posting form and validation.
//!
//! A form collects the fields of a new listing plus free-form tags. Enum
//! fields stay unset until the poster picks a value. Validation reports every
//! missing required field at once, in form order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Id, Location, SkillLevel, SkillListing, SkillType, UserSummary};

/// Categories offered by the posting form. Category is free text; this list
/// is a suggestion.
pub const CATEGORIES: &[&str] = &[
    "Frontend Development",
    "Backend Development",
    "UI/UX Design",
    "Mobile Development",
    "Data Science",
    "DevOps",
    "Machine Learning",
    "Cybersecurity",
    "Product Management",
    "Marketing",
    "Other",
];

/// Required form fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Title,
    Category,
    Level,
    Type,
    Location,
    Description,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Category => "category",
            Self::Level => "level",
            Self::Type => "type",
            Self::Location => "location",
            Self::Description => "description",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<FormField>),
    #[error("reputation must be between 0 and 5, got {0}")]
    ReputationOutOfRange(f64),
}

fn join_fields(fields: &[FormField]) -> String {
    fields
        .iter()
        .map(FormField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A skill posting as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillForm {
    pub title: String,
    pub category: String,
    pub level: Option<SkillLevel>,
    #[serde(rename = "type")]
    pub skill_type: Option<SkillType>,
    pub location: Option<Location>,
    pub duration: String,
    pub description: String,
    pub tags: Vec<String>,
    pub availability: String,
}

impl SkillForm {
    /// Add a tag after trimming. Blank and duplicate tags are ignored.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Remove a tag by exact value.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Check required fields and produce a listing-ready value.
    pub fn validate(&self) -> Result<ValidatedSkill, ValidationError> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push(FormField::Title);
        }
        if self.category.trim().is_empty() {
            missing.push(FormField::Category);
        }
        if self.level.is_none() {
            missing.push(FormField::Level);
        }
        if self.skill_type.is_none() {
            missing.push(FormField::Type);
        }
        if self.location.is_none() {
            missing.push(FormField::Location);
        }
        if self.description.trim().is_empty() {
            missing.push(FormField::Description);
        }

        let (Some(level), Some(skill_type), Some(location)) =
            (self.level, self.skill_type, self.location)
        else {
            return Err(ValidationError::MissingFields(missing));
        };
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let mut tags = Vec::new();
        for tag in &self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t: &String| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Ok(ValidatedSkill {
            title: self.title.trim().to_string(),
            category: self.category.trim().to_string(),
            level,
            skill_type,
            location,
            duration: self.duration.trim().to_string(),
            description: self.description.trim().to_string(),
            tags,
            availability: self.availability.trim().to_string(),
        })
    }
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSkill {
    pub title: String,
    pub category: String,
    pub level: SkillLevel,
    pub skill_type: SkillType,
    pub location: Location,
    pub duration: String,
    pub description: String,
    pub tags: Vec<String>,
    pub availability: String,
}

impl ValidatedSkill {
    pub fn into_listing(
        self,
        id: Id,
        owner: UserSummary,
        created_at: DateTime<Utc>,
    ) -> Result<SkillListing, ValidationError> {
        if !(0.0..=5.0).contains(&owner.reputation) {
            return Err(ValidationError::ReputationOutOfRange(owner.reputation));
        }
        Ok(SkillListing {
            id,
            title: self.title,
            category: self.category,
            level: self.level,
            skill_type: self.skill_type,
            location: self.location,
            duration: self.duration,
            description: self.description,
            user: owner,
            created_at,
        })
    }
}
