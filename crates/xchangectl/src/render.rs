//! Output rendering for the xchangectl CLI.
//!
//! Formats listings and sessions for terminal display.

use xchange_core::session::{Side, SideRole};
use xchange_core::tagging::TagOutcome;
use xchange_core::{ExchangeSession, SkillListing};

use crate::client::{ConfirmResponse, PostSkillResponse, SessionView, StreamedEvent};

/// Print listings in tabular format, in the order given.
pub fn print_listings(listings: &[SkillListing]) {
    if listings.is_empty() {
        println!("No skills found matching your criteria.");
        return;
    }

    println!(
        "{:<28}  {:<6}  {:<10}  {:<18}  {:>6}  {:<10}",
        "TITLE", "TYPE", "LOCATION", "OWNER", "RATING", "POSTED"
    );
    println!("{}", "-".repeat(90));

    for listing in listings {
        let owner = if listing.user.verified {
            format!("{} ✓", listing.user.name)
        } else {
            listing.user.name.clone()
        };
        println!(
            "{:<28}  {:<6}  {:<10}  {:<18}  {:>6.1}  {:<10}",
            truncate(&listing.title, 28),
            listing.skill_type.as_str(),
            listing.location.as_str(),
            truncate(&owner, 18),
            listing.user.reputation,
            listing.created_at.format("%Y-%m-%d"),
        );
    }

    println!();
    println!("{} skill(s)", listings.len());
}

pub fn print_categories(categories: &[String]) {
    for category in categories {
        println!("{category}");
    }
}

/// Print confirmation after posting a listing.
pub fn print_posted(posted: &PostSkillResponse) {
    println!("Posted skill: {}", posted.listing.id);
    println!("  Title:    {}", posted.listing.title);
    println!("  Category: {}", posted.listing.category);
    if posted.tags.is_empty() {
        println!("  Tags:     -");
    } else {
        println!("  Tags:     {}", posted.tags.join(", "));
    }
    if let TagOutcome::Skipped { reason } = &posted.tagging {
        println!("  Note:     automatic tagging skipped ({reason})");
    }
}

/// Print a session with both sides and the caller's state.
pub fn print_session(view: &SessionView) {
    let session = &view.session;
    println!("Session: {}", session.id());
    println!();
    println!("  Status:    {}", session.status().as_str());
    println!("  Progress:  {}%", view.progress);
    println!("  Contract:  {}", session.contract_address());
    println!("  Created:   {}", format_time(&session.created_at()));
    if let Some(at) = session.completed_at() {
        println!("  Completed: {}", format_time(&at));
    }

    println!();
    print_side(SideRole::A, session.side_a());
    print_side(SideRole::B, session.side_b());

    if let Some(viewer) = &view.viewer {
        println!();
        if !viewer.participant {
            println!("  {} is not a participant in this session.", viewer.account);
        } else if view.complete {
            println!("  Session complete. Reputation credentials are being issued.");
        } else if viewer.confirmed {
            println!("  Waiting for the other participant to confirm completion.");
        } else {
            println!(
                "  Run `xchangectl session confirm {} --account {}` when your side is done.",
                session.id(),
                viewer.account
            );
        }
    }

    print_outline(session);
}

fn print_side(role: SideRole, side: &Side) {
    let mark = if side.is_completed() { "[x]" } else { "[ ]" };
    println!(
        "  {} Side {}: {} ({}, {})",
        mark,
        role.as_str().to_uppercase(),
        side.skill_title,
        side.owner_name,
        side.owner
    );
}

fn print_outline(session: &ExchangeSession) {
    let outline = session.outline();
    for (heading, items) in [
        ("Objectives", &outline.objectives),
        ("Timeline", &outline.timeline),
        ("Deliverables", &outline.deliverables),
    ] {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("  {heading}:");
        for item in items {
            println!("    - {item}");
        }
    }
}

/// Print the result of a completion attestation.
pub fn print_confirmation(response: &ConfirmResponse) {
    let message = match response.outcome {
        xchange_core::ConfirmOutcome::Confirmed => "Completion confirmed.",
        xchange_core::ConfirmOutcome::AlreadyConfirmed => "Already confirmed; nothing changed.",
        xchange_core::ConfirmOutcome::SessionCompleted => {
            "Session completed. Reputation credentials requested."
        }
    };
    println!("{message}");
    println!(
        "  Progress: {}% ({})",
        response.view.progress,
        response.view.session.status().as_str()
    );
}

/// Print one streamed session event as a log line.
pub fn print_event(event: &StreamedEvent) {
    let time = chrono::DateTime::from_timestamp_millis(event.timestamp)
        .map_or_else(|| "-".to_string(), |t| format_time(&t));
    println!("{}  {:<22}  {}", time, event.event_type, event.payload);
}

fn format_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
