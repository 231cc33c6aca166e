// Single-flight state machine for the scan loop. No IO: the session task feeds it events and
// acts on the decisions it returns.

use crate::domain::ScanPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    /// Created, device never acquired.
    Idle,
    /// Device held, waiting for the next decode.
    AwaitingDecode,
    /// One validation is outstanding; decodes are dropped.
    Pending,
    /// Device released.
    Stopped,
}

impl ScannerState {
    /// True while the capture device is held.
    pub fn is_scanning(self) -> bool {
        matches!(self, ScannerState::AwaitingDecode | ScannerState::Pending)
    }
}

/// Identifies one dispatched validation so late answers can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Blank,
    Pending,
    NotScanning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeDecision {
    /// Hand the payload to validation under this ticket.
    Dispatch { ticket: Ticket, payload: ScanPayload },
    Dropped(DropReason),
}

#[derive(Debug)]
pub struct ScannerController {
    state: ScannerState,
    next_ticket: u64,
    outstanding: Option<Ticket>,
}

impl Default for ScannerController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerController {
    pub fn new() -> Self {
        Self {
            state: ScannerState::Idle,
            next_ticket: 1,
            outstanding: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn outstanding(&self) -> Option<Ticket> {
        self.outstanding
    }

    /// Records a successful device acquisition. Returns false when already scanning.
    pub fn started(&mut self) -> bool {
        if self.state.is_scanning() {
            return false;
        }
        self.state = ScannerState::AwaitingDecode;
        true
    }

    pub fn on_decode(&mut self, raw: impl Into<String>) -> DecodeDecision {
        match self.state {
            ScannerState::Idle | ScannerState::Stopped => {
                return DecodeDecision::Dropped(DropReason::NotScanning);
            }
            ScannerState::Pending => return DecodeDecision::Dropped(DropReason::Pending),
            ScannerState::AwaitingDecode => {}
        }

        let Some(payload) = ScanPayload::new(raw) else {
            return DecodeDecision::Dropped(DropReason::Blank);
        };

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.outstanding = Some(ticket);
        self.state = ScannerState::Pending;
        DecodeDecision::Dispatch { ticket, payload }
    }

    /// Releases the pending guard if `ticket` is the outstanding validation. Answers for any
    /// other ticket (for example one dispatched before a stop) are ignored.
    pub fn on_validated(&mut self, ticket: Ticket) -> bool {
        if self.outstanding != Some(ticket) {
            return false;
        }
        self.outstanding = None;
        if self.state == ScannerState::Pending {
            self.state = ScannerState::AwaitingDecode;
        }
        true
    }

    /// Moves to `Stopped` from any state. Returns true if the device was held.
    pub fn stop(&mut self) -> bool {
        let was_scanning = self.state.is_scanning();
        self.state = ScannerState::Stopped;
        self.outstanding = None;
        was_scanning
    }
}
