// Wire DTOs for the check-in service's validate endpoint.

use crate::domain::{Attendee, ValidationReply};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/attendees/validate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest<'a> {
    pub qr_code_data: &'a str,
}

/// Answer of `POST /api/attendees/validate`. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub attendee: Option<Attendee>,
    #[serde(default)]
    pub already_checked_in: bool,
}

impl From<ValidateResponse> for ValidationReply {
    fn from(response: ValidateResponse) -> Self {
        Self {
            valid: response.valid,
            message: response.message,
            attendee: response.attendee,
            already_checked_in: response.already_checked_in,
        }
    }
}

/// Error body the service sends with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}
