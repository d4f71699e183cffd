//! Bilateral session state machine.
//!
//! An exchange session pairs two listings. Each participant owns one side and
//! attests completion independently; the session completes only once both
//! sides have attested. `locked` and `in-progress` are both open states and
//! are treated identically for completion gating. `completed` is terminal.
//!
//! Side flags are private and only ever set, never cleared, so the
//! monotonicity of attestations holds for every value of this type. Sessions
//! read from the wire go through the same checks as sessions built in code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Id, Identity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{identity} is not a participant in this session")]
    NotAParticipant { identity: Identity },
    #[error("{identity} cannot own both sides of a session")]
    DuplicateParticipant { identity: Identity },
    #[error("inconsistent session state: {0}")]
    InconsistentState(String),
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Open; prerequisite setup (such as an escrow lock) is pending upstream.
    Locked,
    /// Open; the exchange is underway.
    #[default]
    InProgress,
    /// Both sides attested. Terminal.
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Which half of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideRole {
    A,
    B,
}

impl SideRole {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// One participant's half of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Side {
    /// Title of the listing this side contributes.
    pub skill_title: String,
    pub owner_name: String,
    pub owner: Identity,
    completed: bool,
}

impl Side {
    /// A side that has not yet attested completion.
    pub fn new(
        skill_title: impl Into<String>,
        owner_name: impl Into<String>,
        owner: Identity,
    ) -> Self {
        Self {
            skill_title: skill_title.into(),
            owner_name: owner_name.into(),
            owner,
            completed: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// Plan produced by the external matching service. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    pub objectives: Vec<String>,
    pub timeline: Vec<String>,
    pub deliverables: Vec<String>,
}

/// Result of a completion attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// The caller's side is now attested; the other side is still pending.
    Confirmed,
    /// The caller's side was already attested. Nothing changed.
    AlreadyConfirmed,
    /// This attestation was the second one and closed the session.
    SessionCompleted,
}

impl ConfirmOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::AlreadyConfirmed => "already_confirmed",
            Self::SessionCompleted => "session_completed",
        }
    }

    /// True only on the completing edge, so credential issuance fires once.
    pub fn triggers_credential(&self) -> bool {
        matches!(self, Self::SessionCompleted)
    }

    /// Whether the attestation changed the session.
    pub fn changed_state(&self) -> bool {
        !matches!(self, Self::AlreadyConfirmed)
    }
}

/// Fields supplied by the matching process when it opens a session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub id: Id,
    pub side_a: Side,
    pub side_b: Side,
    /// Must be an open status.
    pub status: SessionStatus,
    pub outline: Outline,
    pub contract_address: String,
    pub created_at: DateTime<Utc>,
}

/// A two-party exchange under bilateral completion tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSession")]
pub struct ExchangeSession {
    id: Id,
    side_a: Side,
    side_b: Side,
    status: SessionStatus,
    outline: Outline,
    contract_address: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// Unchecked wire form; converted through [`ExchangeSession::try_from`].
#[derive(Deserialize)]
struct RawSession {
    id: Id,
    side_a: Side,
    side_b: Side,
    status: SessionStatus,
    #[serde(default)]
    outline: Outline,
    #[serde(default)]
    contract_address: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawSession> for ExchangeSession {
    type Error = SessionError;

    fn try_from(raw: RawSession) -> Result<Self, Self::Error> {
        check_distinct_owners(&raw.side_a, &raw.side_b)?;

        let both = raw.side_a.completed && raw.side_b.completed;
        match (both, raw.status) {
            (true, SessionStatus::Completed) => {
                if raw.completed_at.is_none() {
                    return Err(SessionError::InconsistentState(
                        "completed session has no completed_at".to_string(),
                    ));
                }
            }
            (true, status) => {
                return Err(SessionError::InconsistentState(format!(
                    "both sides completed but status is {}",
                    status.as_str()
                )));
            }
            (false, SessionStatus::Completed) => {
                return Err(SessionError::InconsistentState(
                    "status is completed but a side is still pending".to_string(),
                ));
            }
            (false, _) => {
                if raw.completed_at.is_some() {
                    return Err(SessionError::InconsistentState(
                        "open session has completed_at".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            id: raw.id,
            side_a: raw.side_a,
            side_b: raw.side_b,
            status: raw.status,
            outline: raw.outline,
            contract_address: raw.contract_address,
            created_at: raw.created_at,
            completed_at: raw.completed_at,
        })
    }
}

fn check_distinct_owners(a: &Side, b: &Side) -> Result<(), SessionError> {
    if a.owner == b.owner {
        return Err(SessionError::DuplicateParticipant {
            identity: a.owner.clone(),
        });
    }
    Ok(())
}

impl ExchangeSession {
    /// Open a session with both sides pending.
    pub fn open(params: SessionParams) -> Result<Self, SessionError> {
        if !params.status.is_open() {
            return Err(SessionError::InconsistentState(
                "a new session must start locked or in-progress".to_string(),
            ));
        }
        check_distinct_owners(&params.side_a, &params.side_b)?;

        let mut side_a = params.side_a;
        let mut side_b = params.side_b;
        side_a.completed = false;
        side_b.completed = false;

        Ok(Self {
            id: params.id,
            side_a,
            side_b,
            status: params.status,
            outline: params.outline,
            contract_address: params.contract_address,
            created_at: params.created_at,
            completed_at: None,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn side_a(&self) -> &Side {
        &self.side_a
    }

    pub fn side_b(&self) -> &Side {
        &self.side_b
    }

    pub fn side(&self, role: SideRole) -> &Side {
        match role {
            SideRole::A => &self.side_a,
            SideRole::B => &self.side_b,
        }
    }

    fn side_mut(&mut self, role: SideRole) -> &mut Side {
        match role {
            SideRole::A => &mut self.side_a,
            SideRole::B => &mut self.side_b,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Owners of side A and side B, in that order.
    pub fn participants(&self) -> [&Identity; 2] {
        [&self.side_a.owner, &self.side_b.owner]
    }

    /// The side `identity` owns, if it owns exactly one.
    pub fn side_of(&self, identity: &Identity) -> Option<SideRole> {
        match (self.side_a.owner == *identity, self.side_b.owner == *identity) {
            (true, false) => Some(SideRole::A),
            (false, true) => Some(SideRole::B),
            _ => None,
        }
    }

    /// Record that `actor` has finished their part of the exchange.
    ///
    /// Re-confirming an already attested side is a no-op, as is any call on a
    /// completed session by one of its participants. The session is left
    /// untouched when `actor` owns neither side.
    ///
    /// # Example
    /// ```
    /// use chrono::Utc;
    /// use xchange_core::session::{
    ///     ConfirmOutcome, ExchangeSession, SessionParams, SessionStatus, Side,
    /// };
    /// use xchange_core::{Id, Identity};
    ///
    /// let mut session = ExchangeSession::open(SessionParams {
    ///     id: Id::new(),
    ///     side_a: Side::new("React Development", "Sarah", Identity::from("0xA")),
    ///     side_b: Side::new("UI/UX Design Feedback", "Alex", Identity::from("0xB")),
    ///     status: SessionStatus::InProgress,
    ///     outline: Default::default(),
    ///     contract_address: String::new(),
    ///     created_at: Utc::now(),
    /// })
    /// .unwrap();
    ///
    /// let now = Utc::now();
    /// assert_eq!(session.confirm_completion(&"0xA".into(), now), Ok(ConfirmOutcome::Confirmed));
    /// let outcome = session.confirm_completion(&"0xB".into(), now);
    /// assert_eq!(outcome, Ok(ConfirmOutcome::SessionCompleted));
    /// assert!(session.is_complete());
    /// ```
    pub fn confirm_completion(
        &mut self,
        actor: &Identity,
        at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, SessionError> {
        let role = self
            .side_of(actor)
            .ok_or_else(|| SessionError::NotAParticipant {
                identity: actor.clone(),
            })?;

        if self.side(role).completed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }

        self.side_mut(role).completed = true;

        if self.side(role.other()).completed {
            self.status = SessionStatus::Completed;
            self.completed_at = Some(at);
            Ok(ConfirmOutcome::SessionCompleted)
        } else {
            Ok(ConfirmOutcome::Confirmed)
        }
    }

    /// Share of sides that have attested: 0, 50, or 100.
    pub fn progress_percentage(&self) -> u8 {
        let done = u8::from(self.side_a.completed) + u8::from(self.side_b.completed);
        done * 50
    }

    pub fn is_participant(&self, identity: &Identity) -> bool {
        self.side_of(identity).is_some()
    }

    /// Whether `identity` has attested. False for non-participants.
    pub fn has_confirmed(&self, identity: &Identity) -> bool {
        self.side_of(identity)
            .is_some_and(|role| self.side(role).completed)
    }

    pub fn is_complete(&self) -> bool {
        self.side_a.completed && self.side_b.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ident(s: &str) -> Identity {
        Identity::from(s)
    }

    fn params(status: SessionStatus) -> SessionParams {
        SessionParams {
            id: Id::from_string("session-1"),
            side_a: Side::new("React Development", "Sarah Chen", ident("0xA")),
            side_b: Side::new("UI/UX Design Feedback", "Alex Rodriguez", ident("0xB")),
            status,
            outline: Outline {
                objectives: vec!["Build a component library".to_string()],
                timeline: vec!["Week 1: setup".to_string()],
                deliverables: vec!["Design system docs".to_string()],
            },
            contract_address: "0x1234567890123456789012345678901234567890".to_string(),
            created_at: Utc::now(),
        }
    }

    fn session() -> ExchangeSession {
        ExchangeSession::open(params(SessionStatus::InProgress)).unwrap()
    }

    #[test]
    fn two_confirmations_complete_the_session() {
        let mut s = session();
        let now = Utc::now();

        assert_eq!(
            s.confirm_completion(&ident("0xA"), now),
            Ok(ConfirmOutcome::Confirmed)
        );
        assert!(s.side_a().is_completed());
        assert_eq!(s.status(), SessionStatus::InProgress);
        assert_eq!(s.progress_percentage(), 50);
        assert!(s.completed_at().is_none());

        assert_eq!(
            s.confirm_completion(&ident("0xB"), now),
            Ok(ConfirmOutcome::SessionCompleted)
        );
        assert!(s.side_b().is_completed());
        assert_eq!(s.status(), SessionStatus::Completed);
        assert_eq!(s.progress_percentage(), 100);
        assert_eq!(s.completed_at(), Some(now));
    }

    #[test]
    fn stranger_is_rejected_and_session_unchanged() {
        let mut s = session();
        let before = s.clone();

        let err = s.confirm_completion(&ident("0xC"), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            SessionError::NotAParticipant {
                identity: ident("0xC")
            }
        );
        assert_eq!(s, before);
    }

    #[test]
    fn reconfirmation_is_a_noop() {
        let mut s = session();
        s.confirm_completion(&ident("0xB"), Utc::now()).unwrap();
        let after_once = s.clone();

        assert_eq!(
            s.confirm_completion(&ident("0xB"), Utc::now()),
            Ok(ConfirmOutcome::AlreadyConfirmed)
        );
        assert_eq!(s, after_once);
    }

    #[test]
    fn completed_session_accepts_no_changes() {
        let mut s = session();
        let done_at = Utc::now();
        s.confirm_completion(&ident("0xA"), done_at).unwrap();
        s.confirm_completion(&ident("0xB"), done_at).unwrap();
        let terminal = s.clone();

        for who in ["0xA", "0xB"] {
            let outcome = s.confirm_completion(&ident(who), Utc::now()).unwrap();
            assert_eq!(outcome, ConfirmOutcome::AlreadyConfirmed);
            assert!(!outcome.triggers_credential());
        }
        assert_eq!(s, terminal);
    }

    #[test]
    fn locked_session_stays_locked_until_complete() {
        let mut s = ExchangeSession::open(params(SessionStatus::Locked)).unwrap();
        s.confirm_completion(&ident("0xA"), Utc::now()).unwrap();
        assert_eq!(s.status(), SessionStatus::Locked);

        let outcome = s.confirm_completion(&ident("0xB"), Utc::now()).unwrap();
        assert_eq!(outcome, ConfirmOutcome::SessionCompleted);
        assert_eq!(s.status(), SessionStatus::Completed);
    }

    #[test]
    fn derived_queries_track_each_side() {
        let mut s = session();
        assert!(s.is_participant(&ident("0xA")));
        assert!(!s.is_participant(&ident("0xC")));
        assert!(!s.has_confirmed(&ident("0xA")));
        assert!(!s.has_confirmed(&ident("0xC")));
        assert_eq!(s.side_of(&ident("0xB")), Some(SideRole::B));

        s.confirm_completion(&ident("0xA"), Utc::now()).unwrap();
        assert!(s.has_confirmed(&ident("0xA")));
        assert!(!s.has_confirmed(&ident("0xB")));
        assert!(!s.is_complete());
    }

    #[test]
    fn open_rejects_completed_status_and_shared_owner() {
        let err = ExchangeSession::open(params(SessionStatus::Completed)).unwrap_err();
        assert!(matches!(err, SessionError::InconsistentState(_)));

        let mut p = params(SessionStatus::InProgress);
        p.side_b.owner = ident("0xA");
        assert_eq!(
            ExchangeSession::open(p).unwrap_err(),
            SessionError::DuplicateParticipant {
                identity: ident("0xA")
            }
        );
    }

    #[test]
    fn serialized_session_reads_back() {
        let mut s = session();
        s.confirm_completion(&ident("0xA"), Utc::now()).unwrap();

        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"status\":\"in-progress\""));
        let back: ExchangeSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn inconsistent_wire_sessions_are_rejected() {
        let mut s = session();
        let at = Utc::now();
        s.confirm_completion(&ident("0xA"), at).unwrap();
        s.confirm_completion(&ident("0xB"), at).unwrap();

        let mut json = serde_json::to_value(&s).unwrap();
        json["status"] = serde_json::json!("in-progress");
        assert!(serde_json::from_value::<ExchangeSession>(json).is_err());

        let mut json = serde_json::to_value(session()).unwrap();
        json["status"] = serde_json::json!("completed");
        assert!(serde_json::from_value::<ExchangeSession>(json).is_err());

        let mut json = serde_json::to_value(session()).unwrap();
        json["side_b"]["owner"] = serde_json::json!("0xA");
        assert!(serde_json::from_value::<ExchangeSession>(json).is_err());
    }

    fn arb_actor() -> impl Strategy<Value = &'static str> {
        prop::sample::select(&["0xA", "0xB", "0xC"][..])
    }

    proptest! {
        #[test]
        fn confirming_twice_equals_confirming_once(
            prefix in prop::collection::vec(arb_actor(), 0..4),
            actor in arb_actor(),
        ) {
            let at = Utc::now();
            let mut s = session();
            for who in &prefix {
                let _ = s.confirm_completion(&ident(who), at);
            }
            let _ = s.confirm_completion(&ident(actor), at);
            let once = s.clone();
            let _ = s.confirm_completion(&ident(actor), at);
            prop_assert_eq!(s, once);
        }

        #[test]
        fn completion_tracks_both_attestations(
            actors in prop::collection::vec(arb_actor(), 0..8),
        ) {
            let mut s = session();
            let mut completions = 0;
            let mut seen_a = false;
            for who in &actors {
                let was_a = s.side_a().is_completed();
                let was_b = s.side_b().is_completed();
                match s.confirm_completion(&ident(who), Utc::now()) {
                    Ok(outcome) => {
                        if outcome.triggers_credential() {
                            completions += 1;
                        }
                    }
                    Err(e) => {
                        let stranger = matches!(e, SessionError::NotAParticipant { .. });
                        prop_assert!(stranger, "unexpected error: {}", e);
                    }
                }
                prop_assert!(!was_a || s.side_a().is_completed());
                prop_assert!(!was_b || s.side_b().is_completed());
                seen_a |= s.has_confirmed(&ident("0xA"));

                let both = s.has_confirmed(&ident("0xA")) && s.has_confirmed(&ident("0xB"));
                prop_assert_eq!(s.is_complete(), both);
                prop_assert_eq!(s.status() == SessionStatus::Completed, both);
            }
            prop_assert!(completions <= 1);
            prop_assert_eq!(seen_a, actors.contains(&"0xA"));
        }
    }
}
