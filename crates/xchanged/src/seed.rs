//! Demonstration data loaded when `seed_demo_data` is on.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use xchange_core::events::{EventPayload, SessionCreatedPayload};
use xchange_core::session::{Outline, SessionParams, SessionStatus, Side};
use xchange_core::{
    ExchangeSession, Id, Identity, Location, SessionError, SkillLevel, SkillListing, SkillType,
    UserSummary,
};

use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid seed timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("invalid seed session: {0}")]
    Session(#[from] SessionError),
    #[error("failed to store seed data: {0}")]
    Store(#[from] StoreError),
}

fn at(rfc3339: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(rfc3339)?.with_timezone(&Utc))
}

fn listing(
    id: &str,
    title: &str,
    category: &str,
    level: SkillLevel,
    skill_type: SkillType,
    location: Location,
    duration: &str,
    description: &str,
    owner: (&str, f64, bool),
    created_at: &str,
) -> Result<SkillListing, chrono::ParseError> {
    Ok(SkillListing {
        id: Id::from_string(id),
        title: title.to_string(),
        category: category.to_string(),
        level,
        skill_type,
        location,
        duration: duration.to_string(),
        description: description.to_string(),
        user: UserSummary {
            name: owner.0.to_string(),
            reputation: owner.1,
            verified: owner.2,
        },
        created_at: at(created_at)?,
    })
}

/// The four listings shown on the explore page.
pub fn demo_listings() -> Result<Vec<SkillListing>, chrono::ParseError> {
    Ok(vec![
        listing(
            "1",
            "React Development",
            "Frontend",
            SkillLevel::Intermediate,
            SkillType::Teach,
            Location::Remote,
            "2 hours",
            "I can help you build modern React applications with hooks, state management, and best practices.",
            ("Sarah Chen", 4.8, true),
            "2024-01-15T00:00:00Z",
        )?,
        listing(
            "2",
            "UI/UX Design Feedback",
            "Design",
            SkillLevel::Advanced,
            SkillType::Teach,
            Location::Remote,
            "1.5 hours",
            "Get professional feedback on your designs and learn about user-centered design principles.",
            ("Alex Rodriguez", 4.9, true),
            "2024-01-14T00:00:00Z",
        )?,
        listing(
            "3",
            "Spring Boot Basics",
            "Backend",
            SkillLevel::Beginner,
            SkillType::Learn,
            Location::Remote,
            "3 hours",
            "Looking to learn Spring Boot fundamentals and build REST APIs.",
            ("Mike Johnson", 4.2, false),
            "2024-01-13T00:00:00Z",
        )?,
        listing(
            "4",
            "Figma Prototyping",
            "Design",
            SkillLevel::Intermediate,
            SkillType::Teach,
            Location::InPerson,
            "2 hours",
            "Learn advanced Figma techniques for creating interactive prototypes.",
            ("Emma Wilson", 4.7, true),
            "2024-01-12T00:00:00Z",
        )?,
    ])
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// The React-for-design exchange between the first two demo owners.
pub fn demo_session() -> Result<ExchangeSession, SeedError> {
    let session = ExchangeSession::open(SessionParams {
        id: Id::from_string("1"),
        side_a: Side::new(
            "React Development",
            "Sarah Chen",
            Identity::new("0x742d35Cc6634C0532925a3b8D4f"),
        ),
        side_b: Side::new(
            "UI/UX Design Feedback",
            "Alex Rodriguez",
            Identity::new("0x8ba1f109551bD432803012645Hb"),
        ),
        status: SessionStatus::InProgress,
        outline: Outline {
            objectives: lines(&[
                "Build a responsive React component library",
                "Implement modern state management patterns",
                "Create reusable UI components",
                "Provide comprehensive design feedback",
                "Establish design system principles",
                "Optimize user experience flow",
            ]),
            timeline: lines(&[
                "Week 1: Initial component setup and basic styling",
                "Week 2: Advanced React patterns and state management",
                "Week 3: Design review and feedback implementation",
                "Week 4: Final refinements and documentation",
            ]),
            deliverables: lines(&[
                "Complete React component library",
                "Design system documentation",
                "Code review and feedback",
                "UX improvement recommendations",
            ]),
        },
        contract_address: "0x1234567890123456789012345678901234567890".to_string(),
        created_at: at("2024-01-15T10:00:00Z")?,
    })?;
    Ok(session)
}

/// Load the demo listings and session into `store`.
pub async fn load(store: &Store) -> Result<(), SeedError> {
    let listings = demo_listings()?;
    let count = listings.len();
    for listing in listings {
        store.insert_listing(listing).await?;
    }

    let session = demo_session()?;
    store
        .append_event(&EventPayload::SessionCreated(SessionCreatedPayload {
            session_id: session.id().clone(),
            status: session.status(),
            participants: session.participants().into_iter().cloned().collect(),
        }))
        .await?;
    store.insert_session(session).await?;

    info!("seeded {} listings and 1 session", count);
    Ok(())
}
