use async_trait::async_trait;

use crate::domain::attendee::Attendee;
use crate::domain::auth::AuthToken;
use crate::domain::errors::{CameraError, CheckInError};

/// What the check-in service said about one scanned payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReply {
    /// True when the payload matched an attendee of the event.
    pub valid: bool,
    pub message: Option<String>,
    pub attendee: Option<Attendee>,
    /// Set when the service reports that the attendee was checked in before this scan.
    pub already_checked_in: bool,
}

// Port for the remote check-in endpoint. One call per scan, no retries.
#[async_trait]
pub trait CheckInService: Send + Sync {
    async fn validate(
        &self,
        qr_code_data: &str,
        token: &AuthToken,
    ) -> Result<ValidationReply, CheckInError>;
}

// Port for the capture device. Acquiring hands out the device exclusively; dropping the
// returned feed releases it.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn DecodeFeed>, CameraError>;
}

/// Stream of decoded QR strings from an acquired device.
#[async_trait]
pub trait DecodeFeed: Send {
    /// Next decoded payload, or `None` once the device stops producing frames.
    async fn next_decode(&mut self) -> Option<String>;
}
