pub mod config;
pub mod discovery;
pub mod events;
pub mod posting;
pub mod session;
pub mod tagging;
pub mod types;

pub use config::Config;
pub use session::{ConfirmOutcome, ExchangeSession, SessionError, SessionStatus};
pub use types::*;
