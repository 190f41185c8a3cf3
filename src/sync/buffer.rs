use std::collections::VecDeque;

use tracing::debug;

use crate::entity::{Note, NoteKey, NotePatch};
use crate::view::NoteList;

type Transform = Box<dyn FnOnce(NoteList) -> NoteList + Send>;

/// A pure "previous view → next view" step.
pub struct ViewUpdate {
    label: &'static str,
    apply: Transform,
}

impl ViewUpdate {
    pub fn new(label: &'static str, f: impl FnOnce(NoteList) -> NoteList + Send + 'static) -> Self {
        Self {
            label,
            apply: Box::new(f),
        }
    }

    /// Result of re-listing the store.
    pub fn sync_from_store(notes: Vec<Note>) -> Self {
        Self::new("sync_from_store", move |mut view| {
            view.sync_durable(notes);
            view
        })
    }

    pub fn insert(note: Note) -> Self {
        Self::new("insert", move |mut view| {
            view.upsert(note);
            view
        })
    }

    pub fn remove(key: NoteKey) -> Self {
        Self::new("remove", move |mut view| {
            view.remove(&key);
            view
        })
    }

    pub fn patch(key: NoteKey, patch: NotePatch) -> Self {
        Self::new("patch", move |mut view| {
            view.patch(&key, &patch);
            view
        })
    }

    /// A provisional note confirmed under its durable id.
    pub fn confirm(provisional: NoteKey, note: Note) -> Self {
        Self::new("confirm", move |mut view| {
            view.replace(&provisional, note);
            view
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn apply(self, view: NoteList) -> NoteList {
        (self.apply)(view)
    }
}

impl std::fmt::Debug for ViewUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewUpdate")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// What [`ReconciliationBuffer::offer`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    Queued { depth: usize },
}

/// Holds view updates back while an exclusive interaction owns the view.
#[derive(Debug, Default)]
pub struct ReconciliationBuffer {
    queue: VecDeque<ViewUpdate>,
}

impl ReconciliationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` now, or queue it if `exclusive_active`.
    pub fn offer(
        &mut self,
        exclusive_active: bool,
        view: &mut NoteList,
        update: ViewUpdate,
    ) -> Disposition {
        if exclusive_active {
            debug!(label = update.label(), depth = self.queue.len() + 1, "view update deferred");
            self.queue.push_back(update);
            Disposition::Queued {
                depth: self.queue.len(),
            }
        } else {
            apply(view, update);
            Disposition::Applied
        }
    }

    /// Apply every queued update in arrival order. Returns how many ran.
    pub fn flush(&mut self, view: &mut NoteList) -> usize {
        let count = self.queue.len();
        while let Some(update) = self.queue.pop_front() {
            apply(view, update);
        }
        if count > 0 {
            debug!(count, "deferred view updates flushed");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

fn apply(view: &mut NoteList, update: ViewUpdate) {
    let current = std::mem::take(view);
    *view = update.apply(current);
}
