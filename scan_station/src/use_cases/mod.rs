// Use cases layer: the scan loop, validation and what the operator sees.

pub mod display;
pub mod scanner;
pub mod session;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use display::{Banner, BannerKind, DisplayField, DisplayState, banner_for};
pub use scanner::{DecodeDecision, DropReason, ScannerController, ScannerState, Ticket};
pub use session::{ScannerHandle, SessionSettings, spawn_scanner};
pub use validation::ValidationClient;
