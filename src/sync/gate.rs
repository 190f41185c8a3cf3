use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, warn};

use crate::storage::{ChangeOrigin, ChangeReceiver, StoreChange};

/// Notifications dropped while a [`ChangeGate`] was paused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Missed {
    pub total: usize,
    pub remote: usize,
}

/// Pause/resume switch in front of a store's change channel.
///
/// The underlying subscription stays open while paused; notifications that
/// fire during the pause are discarded, never replayed.
#[derive(Debug)]
pub struct ChangeGate {
    rx: ChangeReceiver,
    paused: bool,
    backlog: Vec<StoreChange>,
    missed: Missed,
    closed: bool,
}

impl ChangeGate {
    pub fn new(rx: ChangeReceiver) -> Self {
        Self {
            rx,
            paused: false,
            backlog: Vec::new(),
            missed: Missed::default(),
            closed: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop delivering. Returns false if already paused.
    ///
    /// Notifications that fired before the pause but were not polled yet
    /// are kept and still handed out by [`poll`](Self::poll).
    pub fn pause(&mut self) -> bool {
        if self.paused {
            return false;
        }
        let mut early = Vec::new();
        self.drain(|change| early.push(change));
        self.backlog.extend(early);
        self.paused = true;
        self.missed = Missed::default();
        debug!(backlog = self.backlog.len(), "change delivery paused");
        true
    }

    /// Start delivering again. Returns what was dropped during the pause,
    /// or `None` if the gate was not paused.
    pub fn resume(&mut self) -> Option<Missed> {
        if !self.paused {
            return None;
        }
        self.discard_pending();
        self.paused = false;
        let missed = std::mem::take(&mut self.missed);
        debug!(missed = missed.total, remote = missed.remote, "change delivery resumed");
        Some(missed)
    }

    /// Non-blocking drain of the channel.
    pub fn poll(&mut self) -> Vec<StoreChange> {
        let mut delivered = std::mem::take(&mut self.backlog);
        if self.paused {
            self.discard_pending();
        } else {
            self.drain(|change| delivered.push(change));
        }
        delivered
    }

    fn discard_pending(&mut self) {
        let mut missed = self.missed;
        self.drain(|change| {
            missed.total += 1;
            if change.origin == ChangeOrigin::Remote {
                missed.remote += 1;
            }
        });
        self.missed = missed;
    }

    fn drain(&mut self, mut sink: impl FnMut(StoreChange)) {
        if self.closed {
            return;
        }
        loop {
            match self.rx.try_recv() {
                Ok(change) => sink(change),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "change channel lagged");
                    // Whatever was skipped is unknown; treat it as one remote change.
                    sink(StoreChange {
                        seq: 0,
                        origin: ChangeOrigin::Remote,
                    });
                }
                Err(TryRecvError::Closed) => {
                    debug!("change channel closed");
                    self.closed = true;
                    break;
                }
            }
        }
    }
}
