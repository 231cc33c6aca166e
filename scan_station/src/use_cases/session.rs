// Scan session task: owns the scanner state machine, the capture feed and the display state.
// Decodes, validation answers and lifecycle calls all arrive as messages on one task, so the
// single-flight guard needs no locking.

use crate::domain::{
    AuthToken, Camera, CheckInService, DecodeFeed, GENERIC_FAILURE_MESSAGE, InvalidReason,
    ScanError, ValidationOutcome,
};
use crate::use_cases::display::DisplayState;
use crate::use_cases::scanner::{
    DecodeDecision, DropReason, ScannerController, ScannerState, Ticket,
};
use crate::use_cases::validation::ValidationClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Settings for one scanner task.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity of the lifecycle and internal event channels.
    pub channel_capacity: usize,
    /// Hide a banner after this long. `None` keeps it until superseded or dismissed.
    pub banner_ttl: Option<Duration>,
    /// Event this station checks in for. Payloads for other events are still sent to the
    /// service (it decides), but are logged.
    pub expected_event_id: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            banner_ttl: None,
            expected_event_id: None,
        }
    }
}

enum Control {
    Start(oneshot::Sender<Result<(), ScanError>>),
    Stop(oneshot::Sender<()>),
    Dismiss,
}

enum Event {
    Decoded { generation: u64, raw: String },
    FeedEnded { generation: u64 },
    BannerExpired { seq: u64 },
}

/// Cloneable handle to a running scanner task. When the last handle is dropped the task
/// stops and releases the capture device.
#[derive(Clone)]
pub struct ScannerHandle {
    control_tx: mpsc::Sender<Control>,
    display_rx: watch::Receiver<DisplayState>,
}

impl ScannerHandle {
    /// Acquires the capture device and starts forwarding decodes. Calling it while already
    /// scanning does nothing. On `CameraUnavailable` the error is also published in the
    /// display state and the call may be retried.
    pub async fn start(&self) -> Result<(), ScanError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(Control::Start(reply_tx))
            .await
            .map_err(|_| ScanError::Shutdown)?;
        reply_rx.await.map_err(|_| ScanError::Shutdown)?
    }

    /// Releases the capture device and waits until the feed is dropped. Safe to call any
    /// number of times, including after the task has exited.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.control_tx.send(Control::Stop(reply_tx)).await.is_err() {
            return;
        }
        let _ = reply_rx.await;
    }

    /// Hides the current banner. Does not touch scanner state; repeated calls are no-ops.
    pub async fn dismiss(&self) {
        let _ = self.control_tx.send(Control::Dismiss).await;
    }

    pub fn display(&self) -> DisplayState {
        self.display_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display_rx.clone()
    }
}

/// Spawns the scanner task and returns its handle. The device is not acquired until
/// `start` is called.
pub fn spawn_scanner<S>(
    camera: Arc<dyn Camera>,
    validator: Arc<ValidationClient<S>>,
    token: AuthToken,
    settings: SessionSettings,
) -> ScannerHandle
where
    S: CheckInService + 'static,
{
    let capacity = settings.channel_capacity.max(1);
    let (control_tx, control_rx) = mpsc::channel(capacity);
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (display_tx, display_rx) = watch::channel(DisplayState::default());

    let task = ScannerTask {
        controller: ScannerController::new(),
        camera,
        validator,
        token,
        settings,
        display_tx,
        events_tx,
        validations: JoinSet::new(),
        in_flight: HashMap::new(),
        pump: None,
        generation: 0,
        feed_ended: false,
    };
    let span = info_span!("scan_session");
    tokio::spawn(task.run(control_rx, events_rx).instrument(span));

    ScannerHandle {
        control_tx,
        display_rx,
    }
}

struct Pump {
    generation: u64,
    handle: JoinHandle<()>,
}

struct ScannerTask<S> {
    controller: ScannerController,
    camera: Arc<dyn Camera>,
    validator: Arc<ValidationClient<S>>,
    token: AuthToken,
    settings: SessionSettings,
    display_tx: watch::Sender<DisplayState>,
    events_tx: mpsc::Sender<Event>,
    // Validation tasks are joined here rather than reporting over `events_tx`, so a finished
    // or unwound validation is always seen even while the decode pump keeps that channel full.
    validations: JoinSet<ValidationOutcome>,
    in_flight: HashMap<Id, Ticket>,
    pump: Option<Pump>,
    generation: u64,
    // The feed ended while a validation was outstanding; stop once it answers.
    feed_ended: bool,
}

impl<S> ScannerTask<S>
where
    S: CheckInService + 'static,
{
    async fn run(
        mut self,
        mut control_rx: mpsc::Receiver<Control>,
        mut events_rx: mpsc::Receiver<Event>,
    ) {
        loop {
            tokio::select! {
                control = control_rx.recv() => match control {
                    Some(Control::Start(reply)) => {
                        let result = self.start().await;
                        let _ = reply.send(result);
                    }
                    Some(Control::Stop(reply)) => {
                        self.stop().await;
                        let _ = reply.send(());
                    }
                    Some(Control::Dismiss) => self.dismiss(),
                    None => {
                        // Every handle is gone; release the device and exit.
                        self.stop().await;
                        break;
                    }
                },
                Some(event) = events_rx.recv() => self.handle_event(event),
                Some(joined) = self.validations.join_next_with_id(),
                    if !self.validations.is_empty() => self.on_joined(joined),
            }
        }
        debug!("scanner task exited");
    }

    async fn start(&mut self) -> Result<(), ScanError> {
        if self.controller.state().is_scanning() && !self.feed_ended {
            debug!("start ignored; already scanning");
            return Ok(());
        }

        let feed = match self.camera.acquire().await {
            Ok(feed) => feed,
            Err(err) => {
                error!(error = %err, "failed to acquire capture device");
                self.display_tx.send_modify(|display| {
                    display.camera_error = Some(err.to_string());
                });
                return Err(ScanError::CameraUnavailable(err));
            }
        };

        self.generation += 1;
        self.feed_ended = false;
        let generation = self.generation;
        let handle = tokio::spawn(
            pump_decodes(feed, generation, self.events_tx.clone()).in_current_span(),
        );
        self.pump = Some(Pump { generation, handle });
        self.controller.started();
        self.publish_state(|display| display.camera_error = None);
        info!(generation, "scanning started");
        Ok(())
    }

    async fn stop(&mut self) {
        self.feed_ended = false;
        let was_scanning = self.controller.stop();
        if let Some(pump) = self.pump.take() {
            // Wait for the pump to unwind so the feed (and the device) is dropped before the
            // caller is told the scanner stopped.
            pump.handle.abort();
            let _ = pump.handle.await;
        }
        self.publish_state(|_| {});
        if was_scanning {
            info!("scanning stopped; capture device released");
        }
    }

    fn dismiss(&mut self) {
        self.display_tx.send_if_modified(DisplayState::dismiss);
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Decoded { generation, raw } => {
                if !self.is_current(generation) {
                    return;
                }
                self.on_decode(raw);
            }
            Event::FeedEnded { generation } => {
                if !self.is_current(generation) {
                    return;
                }
                warn!(generation, "capture feed ended");
                self.pump = None;
                if self.controller.state() == ScannerState::Pending {
                    // Let the last scan finish; its answer is still shown.
                    self.feed_ended = true;
                    return;
                }
                self.finish_feed();
            }
            Event::BannerExpired { seq } => {
                self.display_tx.send_if_modified(|display| {
                    display.banner_seq == seq && display.dismiss()
                });
            }
        }
    }

    fn on_joined(&mut self, joined: Result<(Id, ValidationOutcome), JoinError>) {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(err) => {
                error!(error = %err, "validation task failed");
                (
                    err.id(),
                    ValidationOutcome::invalid(GENERIC_FAILURE_MESSAGE, InvalidReason::Transport),
                )
            }
        };
        let Some(ticket) = self.in_flight.remove(&id) else {
            return;
        };
        self.on_validated(ticket, outcome);
    }

    fn on_validated(&mut self, ticket: Ticket, outcome: ValidationOutcome) {
        if !self.controller.on_validated(ticket) {
            debug!(ticket = ticket.id(), "ignoring stale validation result");
            return;
        }
        info!(
            ticket = ticket.id(),
            outcome = outcome.kind(),
            attendee_id = outcome.attendee().map(|a| a.id.as_str()).unwrap_or(""),
            "validation finished"
        );
        if outcome.is_auth_expired() {
            error!("check-in service refused the session token; re-authentication required");
        }
        self.publish_state(|display| display.show(&outcome));
        self.schedule_banner_expiry();
        if self.feed_ended {
            self.finish_feed();
        }
    }

    fn finish_feed(&mut self) {
        self.feed_ended = false;
        self.controller.stop();
        self.publish_state(|display| {
            display.camera_error = Some("capture device disconnected".to_string());
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.pump
            .as_ref()
            .is_some_and(|pump| pump.generation == generation)
    }

    fn on_decode(&mut self, raw: String) {
        let (ticket, payload) = match self.controller.on_decode(raw) {
            DecodeDecision::Dispatch { ticket, payload } => (ticket, payload),
            DecodeDecision::Dropped(reason) => {
                if reason == DropReason::Pending {
                    debug!("decode dropped; validation pending");
                }
                self.display_tx
                    .send_modify(|display| display.decodes_dropped += 1);
                return;
            }
        };

        let summary = payload.peek();
        let event_id = summary.as_ref().map(|s| s.event_id.as_str());
        debug!(
            ticket = ticket.id(),
            payload_len = payload.as_str().len(),
            event_id,
            "dispatching validation"
        );
        if let (Some(expected), Some(scanned)) = (&self.settings.expected_event_id, event_id) {
            if expected != scanned {
                warn!(expected = %expected, scanned, "scanned code belongs to another event");
            }
        }

        self.publish_state(|display| display.validations_sent += 1);

        let validator = Arc::clone(&self.validator);
        let token = self.token.clone();
        let task = self.validations.spawn(
            async move { validator.validate(&payload, &token).await }.in_current_span(),
        );
        self.in_flight.insert(task.id(), ticket);
    }

    fn schedule_banner_expiry(&self) {
        let Some(ttl) = self.settings.banner_ttl else {
            return;
        };
        let seq = self.display_tx.borrow().banner_seq;
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = events_tx.send(Event::BannerExpired { seq }).await;
        });
    }

    // Applies `change` and refreshes the scanner state in one notification.
    fn publish_state(&self, change: impl FnOnce(&mut DisplayState)) {
        let scanner = self.controller.state();
        self.display_tx.send_modify(|display| {
            change(display);
            display.scanner = scanner;
        });
    }
}

async fn pump_decodes(mut feed: Box<dyn DecodeFeed>, generation: u64, events: mpsc::Sender<Event>) {
    while let Some(raw) = feed.next_decode().await {
        if events
            .send(Event::Decoded { generation, raw })
            .await
            .is_err()
        {
            return;
        }
    }
    // Release the device before reporting, so a stopped scanner never still holds it.
    drop(feed);
    let _ = events.send(Event::FeedEnded { generation }).await;
}
