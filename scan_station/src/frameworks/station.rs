// Framework bootstrap for a scan station process.

use crate::domain::{AuthToken, Camera, CheckInService, ScanError};
use crate::frameworks::config;
use crate::interface_adapters::capture::LineReaderCamera;
use crate::interface_adapters::clients::CheckInClient;
use crate::interface_adapters::render::render;
use crate::use_cases::{ScannerState, SessionSettings, ValidationClient, spawn_scanner};

use std::io::{Error, ErrorKind, Result, Write};
use std::sync::Arc;

/// Loads `.env` and installs the tracing subscriber and panic hook. Logs are written to stderr
/// because stdout carries the rendered scan view.
fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Runs one scan session until interrupted, the feed ends or the token is refused.
pub async fn run<S>(
    camera: Arc<dyn Camera>,
    service: S,
    token: AuthToken,
    settings: SessionSettings,
) -> Result<()>
where
    S: CheckInService + 'static,
{
    let color = config::color_output();
    let validator = Arc::new(ValidationClient::new(service));
    let handle = spawn_scanner(camera, validator, token, settings);
    let mut display = handle.subscribe();

    // The device may appear later (plugged in, permission granted); keep retrying.
    loop {
        match handle.start().await {
            Ok(()) => break,
            Err(ScanError::CameraUnavailable(err)) => {
                print_view(&render(&handle.display(), color));
                tracing::warn!(
                    error = %err,
                    retry_in_ms = config::CAMERA_RETRY_INTERVAL.as_millis(),
                    "capture device unavailable"
                );
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => return Ok(()),
                    _ = tokio::time::sleep(config::CAMERA_RETRY_INTERVAL) => {}
                }
            }
            Err(err @ ScanError::Shutdown) => return Err(Error::other(err)),
        }
    }

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received");
                break Ok(());
            }
            changed = display.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = display.borrow_and_update().clone();
                print_view(&render(&state, color));

                if state.auth_expired {
                    break Err(Error::new(
                        ErrorKind::PermissionDenied,
                        "check-in session expired; re-authentication required",
                    ));
                }
                if state.scanner == ScannerState::Stopped {
                    tracing::info!("capture feed finished");
                    break Ok(());
                }
            }
        }
    };

    handle.stop().await;
    result
}

fn print_view(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.flush();
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let token = config::auth_token()
        .and_then(|raw| AuthToken::new(&raw))
        .ok_or_else(|| {
            tracing::error!("CHECKIN_AUTH_TOKEN or CHECKIN_TOKEN_FILE must be set");
            Error::new(ErrorKind::InvalidInput, "missing check-in auth token")
        })?;

    let base_url = config::checkin_service_url();
    let timeout = config::checkin_timeout();
    let client = CheckInClient::new(base_url.clone(), timeout)
        .map_err(|e| Error::other(format!("failed to initialize check-in client: {e}")))?;
    tracing::debug!(
        checkin_base_url = %base_url,
        checkin_timeout_ms = timeout.as_millis(),
        "check-in client configured"
    );

    let device = config::scanner_device();
    tracing::info!(device = %device, "using capture device");
    let camera: Arc<dyn Camera> = Arc::new(LineReaderCamera::new(device));

    let settings = SessionSettings {
        channel_capacity: config::CHANNEL_CAPACITY,
        banner_ttl: config::banner_ttl(),
        expected_event_id: config::scanner_event_id(),
    };

    run(camera, client, token, settings).await.inspect_err(|e| {
        tracing::error!(error = %e, "scan station stopped with an error");
    })
}
