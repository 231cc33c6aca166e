use crate::domain::{
    AuthToken, CheckInError, CheckInService, GENERIC_FAILURE_MESSAGE, InvalidReason, ScanPayload,
    ValidationOutcome, ValidationReply,
};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, warn};

const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";

/// Sends a scanned payload to the check-in service and classifies the answer.
///
/// The service stamps an attendee `checked-in` as soon as it accepts a scan, so the status in
/// the reply cannot tell a first scan from a repeat. A reply counts as a repeat when the
/// service flags it (`alreadyCheckedIn` or a 409 carrying the attendee), or when this client
/// already reported the same attendee as registered earlier in the session.
pub struct ValidationClient<S> {
    service: S,
    // Attendee ids reported as `Registered` by this client.
    registered: Mutex<HashSet<String>>,
}

impl<S> ValidationClient<S>
where
    S: CheckInService,
{
    pub fn new(service: S) -> Self {
        Self {
            service,
            registered: Mutex::new(HashSet::new()),
        }
    }

    /// Exactly one service call. Never fails: every error becomes an `Invalid` outcome.
    pub async fn validate(&self, payload: &ScanPayload, token: &AuthToken) -> ValidationOutcome {
        match self.service.validate(payload.as_str(), token).await {
            Ok(reply) => self.classify(reply),
            Err(err) => {
                warn!(error = %err, "check-in validation failed");
                outcome_for_error(err)
            }
        }
    }

    fn classify(&self, reply: ValidationReply) -> ValidationOutcome {
        let ValidationReply {
            valid,
            message,
            attendee,
            already_checked_in,
        } = reply;

        let attendee = match (valid, attendee) {
            (true, Some(attendee)) => attendee,
            (true, None) => {
                // A match without a record is unusable for the operator.
                debug!("check-in reply was valid but carried no attendee");
                return ValidationOutcome::invalid(
                    message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
                    InvalidReason::Rejected,
                );
            }
            (false, _) => {
                return ValidationOutcome::invalid(
                    message.unwrap_or_else(|| "Invalid QR code".to_string()),
                    InvalidReason::Rejected,
                );
            }
        };

        if already_checked_in {
            return ValidationOutcome::AlreadyRegistered { attendee, message };
        }

        if attendee.id.is_empty() {
            return ValidationOutcome::Registered { attendee, message };
        }

        let first_in_session = self
            .registered
            .lock()
            .map(|mut seen| seen.insert(attendee.id.clone()))
            .unwrap_or(true);
        if first_in_session {
            ValidationOutcome::Registered { attendee, message }
        } else {
            ValidationOutcome::AlreadyRegistered { attendee, message }
        }
    }
}

fn outcome_for_error(err: CheckInError) -> ValidationOutcome {
    match err {
        CheckInError::Unauthorized { message } => ValidationOutcome::invalid(
            message.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            InvalidReason::AuthExpired,
        ),
        CheckInError::Upstream { status, message } => {
            // 4xx answers are the service refusing the payload; 5xx is the service failing.
            let reason = if (400..500).contains(&status) {
                InvalidReason::Rejected
            } else {
                InvalidReason::Transport
            };
            ValidationOutcome::invalid(
                message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
                reason,
            )
        }
        CheckInError::Transport(_) | CheckInError::Timeout | CheckInError::Decode(_) => {
            ValidationOutcome::invalid(GENERIC_FAILURE_MESSAGE, InvalidReason::Transport)
        }
    }
}
