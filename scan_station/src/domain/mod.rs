// Domain layer: check-in entities, outcomes and the ports the use cases depend on.

pub mod attendee;
pub mod auth;
pub mod errors;
pub mod outcome;
pub mod ports;

pub use attendee::{Attendee, AttendeeStatus, PayloadSummary, ScanPayload};
pub use auth::AuthToken;
pub use errors::{CameraError, CheckInError, ScanError};
pub use outcome::{GENERIC_FAILURE_MESSAGE, InvalidReason, ValidationOutcome};
pub use ports::{Camera, CheckInService, DecodeFeed, ValidationReply};
