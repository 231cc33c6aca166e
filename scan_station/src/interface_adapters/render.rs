// Plain-text rendering of the scan view for terminals.

use crate::use_cases::{BannerKind, DisplayState, ScannerState};
use std::fmt::Write;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn scanner_label(state: ScannerState) -> &'static str {
    match state {
        ScannerState::Idle => "idle",
        ScannerState::AwaitingDecode => "scanning",
        ScannerState::Pending => "validating",
        ScannerState::Stopped => "stopped",
    }
}

/// Renders the whole scan view. `color` wraps banners in ANSI colours.
pub fn render(state: &DisplayState, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "scanner: {} | sent: {} | dropped frames: {}",
        scanner_label(state.scanner),
        state.validations_sent,
        state.decodes_dropped
    );

    if let Some(error) = &state.camera_error {
        let _ = writeln!(out, "camera error: {error}");
    }
    if state.auth_expired {
        let _ = writeln!(out, "session expired: sign in again to continue scanning");
    }

    let Some(banner) = &state.banner else {
        return out;
    };

    let (marker, paint) = match banner.kind {
        BannerKind::Success => ("[OK]", GREEN),
        BannerKind::AlreadyRegistered => ("[--]", ""),
        BannerKind::Invalid => ("[!!]", RED),
    };
    if color && !paint.is_empty() {
        let _ = writeln!(out, "{paint}{marker} {}{RESET}", banner.title);
    } else {
        let _ = writeln!(out, "{marker} {}", banner.title);
    }
    if let Some(message) = &banner.message {
        let _ = writeln!(out, "    {message}");
    }
    for field in &banner.fields {
        let _ = writeln!(out, "    {}: {}", field.label, field.value);
    }
    out
}
