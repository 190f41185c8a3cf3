//! Backing stores for board notes.
//!
//! Both backends implement [`NoteStore`] and announce every committed
//! mutation on a broadcast channel. Notifications carry no note data;
//! consumers re-`list()` to see the new state.

mod loro_store;
mod sqlite_store;

pub use loro_store::{LoroNoteStore, BOARD_DIR};
pub use sqlite_store::SqliteNoteStore;

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use crate::entity::{Note, NoteDraft, NoteId, NotePatch};
use crate::error::Result;

/// Capacity of the change channel before slow receivers start lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this store handle.
    Local,
    /// Merged in from another peer.
    Remote,
}

/// A "something changed" signal from a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub seq: u64,
    pub origin: ChangeOrigin,
}

pub type ChangeReceiver = broadcast::Receiver<StoreChange>;

/// Authoritative note collection.
pub trait NoteStore {
    /// All notes, ordered by `z_index` ascending.
    fn list(&self) -> Result<Vec<Note>>;

    fn create(&mut self, draft: NoteDraft) -> Result<Note>;

    fn update(&mut self, id: &NoteId, patch: NotePatch) -> Result<()>;

    fn delete(&mut self, id: &NoteId) -> Result<()>;

    /// A fresh receiver for change notifications.
    fn subscribe(&self) -> ChangeReceiver;
}

/// Fan-out half of the change channel, shared by the store backends.
#[derive(Debug)]
pub(crate) struct ChangeNotifier {
    tx: broadcast::Sender<StoreChange>,
    seq: AtomicU64,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> ChangeReceiver {
        self.tx.subscribe()
    }

    pub(crate) fn notify(&self, origin: ChangeOrigin) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        // No receivers is fine: nobody is watching this board yet.
        let receivers = self.tx.send(StoreChange { seq, origin }).unwrap_or(0);
        tracing::trace!(seq, ?origin, receivers, "store change published");
    }
}

/// Sort key shared by both backends: stacking order, then creation time.
pub(crate) fn sort_for_display(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        a.z_index
            .cmp(&b.z_index)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
