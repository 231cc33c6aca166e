// Maps validation outcomes to what the operator sees.

use crate::domain::{Attendee, ValidationOutcome};
use crate::use_cases::scanner::ScannerState;
use chrono::{DateTime, Local};
use serde_json::Value;

/// Shown for missing or empty values.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    /// Green.
    Success,
    /// Neutral.
    AlreadyRegistered,
    /// Red.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayField {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub title: String,
    pub message: Option<String>,
    pub fields: Vec<DisplayField>,
}

/// Builds the banner for an outcome. Roster columns are not known ahead of time, so every
/// entry in `attendee.data` is listed, followed by status and validation time.
pub fn banner_for(outcome: &ValidationOutcome) -> Banner {
    match outcome {
        ValidationOutcome::Registered { attendee, message } => Banner {
            kind: BannerKind::Success,
            title: "Registered".to_string(),
            message: message.clone(),
            fields: attendee_fields(attendee),
        },
        ValidationOutcome::AlreadyRegistered { attendee, message } => Banner {
            kind: BannerKind::AlreadyRegistered,
            title: "Already registered".to_string(),
            message: Some(
                message
                    .clone()
                    .unwrap_or_else(|| "This attendee has already been checked in".to_string()),
            ),
            fields: attendee_fields(attendee),
        },
        ValidationOutcome::Invalid { message, .. } => Banner {
            kind: BannerKind::Invalid,
            title: "Invalid QR code".to_string(),
            message: Some(message.clone()),
            fields: Vec::new(),
        },
    }
}

fn attendee_fields(attendee: &Attendee) -> Vec<DisplayField> {
    let mut fields: Vec<DisplayField> = attendee
        .data
        .iter()
        .map(|(key, value)| DisplayField {
            label: column_label(key),
            value: field_text(value),
        })
        .collect();

    fields.push(DisplayField {
        label: "Status".to_string(),
        value: attendee.status.to_string(),
    });
    fields.push(DisplayField {
        label: "Validation Time".to_string(),
        value: format_validation_time(attendee.validation_time.as_deref()),
    });
    fields
}

fn column_label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => PLACEHOLDER.to_string(),
    }
}

/// Renders a roster cell. Uploaded rosters carry numbers and booleans as often as strings.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::Null => PLACEHOLDER.to_string(),
        Value::String(text) if text.trim().is_empty() => PLACEHOLDER.to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

/// RFC 3339 timestamps are shown in local time; anything else is shown as sent.
pub fn format_validation_time(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return PLACEHOLDER.to_string();
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Everything the scan view shows, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub scanner: ScannerState,
    /// At most one outcome is visible at a time.
    pub banner: Option<Banner>,
    /// Bumped each time a new banner replaces the previous one.
    pub banner_seq: u64,
    pub camera_error: Option<String>,
    /// Set once the service refuses the token; the host must re-authenticate.
    pub auth_expired: bool,
    pub validations_sent: u64,
    pub decodes_dropped: u64,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            scanner: ScannerState::Idle,
            banner: None,
            banner_seq: 0,
            camera_error: None,
            auth_expired: false,
            validations_sent: 0,
            decodes_dropped: 0,
        }
    }
}

impl DisplayState {
    /// Replaces any visible banner with the one for `outcome`.
    pub fn show(&mut self, outcome: &ValidationOutcome) {
        self.banner = Some(banner_for(outcome));
        self.banner_seq += 1;
        if outcome.is_auth_expired() {
            self.auth_expired = true;
        }
    }

    /// Hides the banner. Returns false when nothing was visible, so repeated calls change
    /// nothing.
    pub fn dismiss(&mut self) -> bool {
        self.banner.take().is_some()
    }
}
