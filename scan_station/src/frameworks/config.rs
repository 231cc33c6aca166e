use std::{env, time::Duration};
use url::Url;

// Runtime constants and environment-driven settings for the scan station.

pub const CHANNEL_CAPACITY: usize = 64;
// Delay between capture device acquisition attempts while the device is unavailable.
pub const CAMERA_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Base URL of the check-in service. Falls back to the default when the value does not
/// parse as an http(s) URL.
pub fn checkin_service_url() -> String {
    const DEFAULT: &str = "http://127.0.0.1:5000";
    let raw = env::var("CHECKIN_SERVICE_URL").unwrap_or_else(|_| DEFAULT.to_string());
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => raw,
        _ => {
            tracing::warn!(value = %raw, "invalid CHECKIN_SERVICE_URL; using default");
            DEFAULT.to_string()
        }
    }
}

pub fn checkin_timeout() -> Duration {
    let millis = env::var("CHECKIN_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(5000);
    Duration::from_millis(millis)
}

/// Raw auth token: `CHECKIN_AUTH_TOKEN`, else the contents of `CHECKIN_TOKEN_FILE`.
pub fn auth_token() -> Option<String> {
    if let Ok(token) = env::var("CHECKIN_AUTH_TOKEN") {
        return Some(token);
    }
    let path = env::var("CHECKIN_TOKEN_FILE").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(contents) => Some(contents),
        Err(err) => {
            tracing::error!(path = %path, error = %err, "failed to read token file");
            None
        }
    }
}

/// Capture device path; `-` reads decodes from stdin.
pub fn scanner_device() -> String {
    env::var("SCANNER_DEVICE").unwrap_or_else(|_| "-".to_string())
}

pub fn scanner_event_id() -> Option<String> {
    env::var("SCANNER_EVENT_ID")
        .ok()
        .filter(|value| !value.trim().is_empty())
}

// 0 or unset keeps banners until the next outcome replaces them.
pub fn banner_ttl() -> Option<Duration> {
    env::var("BANNER_TTL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
}

pub fn color_output() -> bool {
    env::var_os("NO_COLOR").is_none()
}
