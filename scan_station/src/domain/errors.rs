// Domain-level errors for scanning and check-in calls.

use std::fmt;

/// The capture device could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraError {
    pub device: String,
    pub reason: String,
}

impl CameraError {
    pub fn new(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture device {} unavailable: {}", self.device, self.reason)
    }
}

impl std::error::Error for CameraError {}

/// Errors returned by scanner lifecycle calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Scanning cannot start. The rest of the station keeps working and `start` may be retried.
    CameraUnavailable(CameraError),
    /// The scanner task is gone (its handle outlived the runtime).
    Shutdown,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::CameraUnavailable(err) => write!(f, "camera unavailable: {err}"),
            ScanError::Shutdown => write!(f, "scanner has shut down"),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<CameraError> for ScanError {
    fn from(err: CameraError) -> Self {
        ScanError::CameraUnavailable(err)
    }
}

/// Failures talking to the check-in service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInError {
    /// Connection refused, reset, DNS failure and similar.
    Transport(String),
    Timeout,
    /// 401 from the service; the session token must be renewed.
    Unauthorized { message: Option<String> },
    /// Any other non-success status. Keeps the server message when one was sent.
    Upstream { status: u16, message: Option<String> },
    /// The service answered with a body this client cannot read.
    Decode(String),
}

impl fmt::Display for CheckInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckInError::Transport(err) => write!(f, "check-in transport error: {err}"),
            CheckInError::Timeout => write!(f, "check-in request timed out"),
            CheckInError::Unauthorized { message } => match message {
                Some(message) => write!(f, "check-in unauthorized: {message}"),
                None => write!(f, "check-in unauthorized"),
            },
            CheckInError::Upstream { status, message } => {
                if let Some(message) = message {
                    write!(f, "check-in upstream error {status}: {message}")
                } else {
                    write!(f, "check-in upstream error {status}")
                }
            }
            CheckInError::Decode(err) => write!(f, "check-in response decode error: {err}"),
        }
    }
}

impl std::error::Error for CheckInError {}
