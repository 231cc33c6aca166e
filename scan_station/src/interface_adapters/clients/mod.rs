// The clients defined here are reqwest clients for external services.

pub mod checkin;

pub use checkin::CheckInClient;
