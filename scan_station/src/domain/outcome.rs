// Client-side result of a single check-in validation.

use crate::domain::attendee::Attendee;

/// Fallback text for failures that carry no message from the server.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error validating QR code";

/// Why a scan ended up as `Invalid`. Display only uses the message; the reason lets the host
/// react to an expired session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The service answered and did not match the payload to an attendee.
    Rejected,
    /// Network, timeout, 5xx or undecodable response.
    Transport,
    /// The bearer token was refused.
    AuthExpired,
}

/// Matched outcomes keep the server's message, shown alongside the attendee.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// First successful check-in for this attendee in this session.
    Registered {
        attendee: Attendee,
        message: Option<String>,
    },
    /// The attendee was already checked in when the code was scanned.
    AlreadyRegistered {
        attendee: Attendee,
        message: Option<String>,
    },
    Invalid {
        message: String,
        reason: InvalidReason,
    },
}

impl ValidationOutcome {
    pub fn invalid(message: impl Into<String>, reason: InvalidReason) -> Self {
        ValidationOutcome::Invalid {
            message: message.into(),
            reason,
        }
    }

    pub fn attendee(&self) -> Option<&Attendee> {
        match self {
            ValidationOutcome::Registered { attendee, .. }
            | ValidationOutcome::AlreadyRegistered { attendee, .. } => Some(attendee),
            ValidationOutcome::Invalid { .. } => None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            ValidationOutcome::Invalid {
                reason: InvalidReason::AuthExpired,
                ..
            }
        )
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationOutcome::Registered { .. } => "registered",
            ValidationOutcome::AlreadyRegistered { .. } => "already_registered",
            ValidationOutcome::Invalid { .. } => "invalid",
        }
    }
}
