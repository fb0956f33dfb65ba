//! Room operation error taxonomy.
//!
//! Display strings double as the user-facing `room-error` message text, so
//! the wording matches what the browser client renders verbatim. Note the
//! not-found wording leaks room existence while the PIN wording does not;
//! this asymmetry is long-standing client-visible behavior and is kept.

use crate::protocol::RoomAction;
use thiserror::Error;

/// Recoverable failures of create/join requests. Reported synchronously to
/// the requesting connection only, never broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room \"{0}\" already exists. Please choose a different name.")]
    RoomExists(String),

    #[error("Please enter a valid 4-6 digit PIN.")]
    InvalidPin,

    #[error("Room \"{0}\" not found. Please check the room name.")]
    RoomNotFound(String),

    #[error("Incorrect PIN. Please check your credentials.")]
    BadPin,
}

impl RoomError {
    /// Which request kind this error is reported against.
    pub fn action(&self) -> RoomAction {
        match self {
            RoomError::RoomExists(_) | RoomError::InvalidPin => RoomAction::Create,
            RoomError::RoomNotFound(_) | RoomError::BadPin => RoomAction::Join,
        }
    }
}
