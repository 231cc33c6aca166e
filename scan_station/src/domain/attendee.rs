// Attendee records and QR payloads exchanged with the check-in service.
// Serde derives live here because the wire shape and the domain shape are the same record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Check-in status as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttendeeStatus {
    #[default]
    NotCheckedIn,
    CheckedIn,
    Cancelled,
    Pending,
    /// Any status string this client does not know about, kept verbatim.
    Other(String),
}

impl AttendeeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AttendeeStatus::NotCheckedIn => "not-checked-in",
            AttendeeStatus::CheckedIn => "checked-in",
            AttendeeStatus::Cancelled => "cancelled",
            AttendeeStatus::Pending => "pending",
            AttendeeStatus::Other(raw) => raw,
        }
    }

    pub fn is_checked_in(&self) -> bool {
        matches!(self, AttendeeStatus::CheckedIn)
    }
}

impl From<String> for AttendeeStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "not-checked-in" => AttendeeStatus::NotCheckedIn,
            "checked-in" => AttendeeStatus::CheckedIn,
            "cancelled" => AttendeeStatus::Cancelled,
            "pending" => AttendeeStatus::Pending,
            _ => AttendeeStatus::Other(raw),
        }
    }
}

impl From<AttendeeStatus> for String {
    fn from(status: AttendeeStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AttendeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-owned attendee record. The client only ever reflects the copy the server returns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(alias = "_id", default)]
    pub id: String,
    /// Roster columns. The set of keys depends on the uploaded roster.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub status: AttendeeStatus,
    #[serde(default)]
    pub validation_time: Option<String>,
}

/// Decoded QR content, trimmed and guaranteed non-empty. Carries attendee data, so `Debug`
/// prints only its length and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ScanPayload(String);

impl fmt::Debug for ScanPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScanPayload({} bytes)", self.0.len())
    }
}

/// Fields recovered from a payload that follows the `{eventId, data}` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadSummary {
    pub event_id: String,
    pub field_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QrContentRef<'a> {
    event_id: &'a str,
    data: &'a BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrContent {
    event_id: String,
    #[serde(default)]
    data: BTreeMap<String, Value>,
}

impl ScanPayload {
    /// Returns `None` for blank decodes so they never reach validation.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() == raw.len() {
            return Some(Self(raw));
        }
        Some(Self(trimmed.to_string()))
    }

    /// Builds the QR content handed out for an attendee of `event_id`.
    pub fn encode(
        event_id: &str,
        data: &BTreeMap<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        let text = serde_json::to_string(&QrContentRef { event_id, data })?;
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Best-effort look inside the payload for logging. The server stays the authority on
    /// whether the payload is valid, so a `None` here is not a rejection.
    pub fn peek(&self) -> Option<PayloadSummary> {
        let content = serde_json::from_str::<QrContent>(&self.0).ok()?;
        Some(PayloadSummary {
            event_id: content.event_id,
            field_count: content.data.len(),
        })
    }
}
