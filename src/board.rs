//! The board coordinator: the only code that mutates the local view.
//!
//! A [`Board`] owns a [`NoteStore`], the locally visible [`NoteList`], a
//! [`ChangeGate`] on the store's notifications, a [`ReconciliationBuffer`]
//! and the [`InteractionController`]. While a drag is in progress every view
//! change except the drag's own transient position goes through the buffer
//! and lands, in arrival order, right after the drag's commit.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::compose::{ComposedContent, Composer, Notice};
use crate::config::BoardConfig;
use crate::entity::{
    next_z_index, Note, NoteDraft, NoteId, NoteKey, NoteKind, NotePatch, NoteStatus, NoteStyle,
    Point, ProvisionalId, Size,
};
use crate::error::{BoardError, Result};
use crate::interaction::{clamp_position, plan_bring_to_front, DragCommit, InteractionController};
use crate::services::{Classifier, ImageGenerator};
use crate::storage::NoteStore;
use crate::sync::{ChangeGate, Disposition, ReconciliationBuffer, ViewUpdate};
use crate::view::NoteList;

/// A note shown optimistically while its content is being composed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNote {
    pub id: ProvisionalId,
    pub text: String,
    pub position: Point,
    pub z_index: i64,
    pub style: NoteStyle,
}

impl PendingNote {
    pub fn key(&self) -> NoteKey {
        NoteKey::Provisional(self.id)
    }
}

/// Outcome of [`Board::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub note: Note,
    pub notice: Option<Notice>,
}

pub struct Board<S: NoteStore> {
    store: S,
    config: BoardConfig,
    surface: Size,
    view: NoteList,
    gate: ChangeGate,
    buffer: ReconciliationBuffer,
    interaction: InteractionController,
    rng: StdRng,
    next_provisional: u64,
    /// Provisional notes whose create has not been issued yet.
    open_drafts: HashSet<ProvisionalId>,
    /// Provisional notes created while their confirmation sat in the buffer.
    confirmed: HashMap<ProvisionalId, NoteId>,
    /// A store listing was queued during the drag and predates its commit.
    stale_listing: bool,
    /// Highest z_index handed out by bring-to-front while the view was held.
    raised: Option<(NoteKey, i64)>,
}

impl<S: NoteStore> Board<S> {
    pub fn new(store: S, config: BoardConfig) -> Result<Self> {
        let gate = ChangeGate::new(store.subscribe());
        let mut board = Self {
            store,
            surface: config.surface,
            interaction: InteractionController::new(config.margin),
            config,
            view: NoteList::new(),
            gate,
            buffer: ReconciliationBuffer::new(),
            rng: StdRng::from_entropy(),
            next_provisional: 1,
            open_drafts: HashSet::new(),
            confirmed: HashMap::new(),
            stale_listing: false,
            raised: None,
        };
        board.refresh()?;
        Ok(board)
    }

    /// Replace the random source used for spawn jitter and note colors.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn set_surface(&mut self, surface: Size) {
        self.surface = surface;
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// The committed view.
    pub fn notes(&self) -> &NoteList {
        &self.view
    }

    /// The dragged note and its transient position, if a drag is in progress.
    pub fn drag_preview(&self) -> Option<(NoteKey, Point)> {
        self.interaction.session().map(|s| (s.key, s.position))
    }

    pub fn is_dragging(&self) -> bool {
        self.interaction.is_dragging()
    }

    pub fn pending_updates(&self) -> usize {
        self.buffer.len()
    }

    pub fn gate_paused(&self) -> bool {
        self.gate.is_paused()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Find a note by durable id prefix or exact provisional key.
    pub fn resolve(&self, prefix: &str) -> Result<NoteKey> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(BoardError::NoteNotFound(prefix));
        }
        let matches: Vec<NoteKey> = self
            .view
            .iter()
            .map(|n| n.key)
            .filter(|key| match key {
                NoteKey::Durable(id) => id.to_string().starts_with(&prefix),
                NoteKey::Provisional(_) => key.to_string() == prefix,
            })
            .collect();
        match matches.as_slice() {
            [] => Err(BoardError::NoteNotFound(prefix)),
            [key] => Ok(*key),
            _ => Err(BoardError::AmbiguousNote(prefix)),
        }
    }

    // --- sync -------------------------------------------------------------

    /// Re-list the store and reconcile the view with it.
    pub fn refresh(&mut self) -> Result<()> {
        let notes = self.store.list()?;
        debug!(count = notes.len(), "store listed");
        if let Disposition::Queued { .. } = self.offer(ViewUpdate::sync_from_store(notes)) {
            self.stale_listing = true;
        }
        Ok(())
    }

    /// Handle pending store notifications. Returns how many were delivered.
    pub fn poll_changes(&mut self) -> Result<usize> {
        let changes = self.gate.poll();
        for change in &changes {
            debug!(seq = change.seq, origin = ?change.origin, "store change delivered");
            self.refresh()?;
        }
        Ok(changes.len())
    }

    /// Push an externally produced update through the buffer.
    pub fn apply_remote(&mut self, update: ViewUpdate) -> Disposition {
        self.offer(update)
    }

    // --- composition --------------------------------------------------------

    /// Show `text` as a provisional note right away.
    pub fn begin_compose(&mut self, text: &str) -> Result<PendingNote> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BoardError::EmptyNote);
        }

        let id = ProvisionalId::new(self.next_provisional);
        self.next_provisional += 1;

        let pending = PendingNote {
            id,
            text: text.to_string(),
            position: self.spawn_point(),
            z_index: next_z_index(self.view.iter()),
            style: self.config.palette.pick(NoteKind::Text, &mut self.rng),
        };
        let note = Note::from_draft(
            pending.key(),
            NoteDraft {
                kind: NoteKind::Text,
                content: pending.text.clone(),
                position: pending.position,
                z_index: pending.z_index,
                style: pending.style.clone(),
                status: None,
            },
        );

        self.open_drafts.insert(id);
        self.offer(ViewUpdate::insert(note));
        info!(note = %id, z_index = pending.z_index, "provisional note shown");
        Ok(pending)
    }

    /// Show the provisional note as an image placeholder.
    pub fn mark_generating(&mut self, pending: &PendingNote) {
        let neutral = NoteStyle::neutral(&self.config.palette.neutral_color);
        let key = pending.key();
        self.offer(ViewUpdate::new("mark_generating", move |mut view| {
            view.modify(&key, |note| {
                note.kind = NoteKind::Image;
                note.status = Some(NoteStatus::Pending);
                note.style = neutral;
            });
            view
        }));
    }

    /// Create the durable note for `pending` and swap it into its slot.
    pub fn finish_compose(&mut self, pending: PendingNote, content: ComposedContent) -> Result<Note> {
        let key = pending.key();
        if !self.open_drafts.remove(&pending.id) {
            info!(note = %pending.id, "provisional note was removed, skipping create");
            return Err(BoardError::ComposeDiscarded(key.to_string()));
        }

        let kind = content.kind();
        let (position, z_index) = self
            .view
            .get(&key)
            .map(|n| (n.position, n.z_index))
            .unwrap_or((pending.position, pending.z_index));
        let (style, status) = match kind {
            NoteKind::Image => (
                NoteStyle::neutral(&self.config.palette.neutral_color),
                Some(NoteStatus::Saved),
            ),
            NoteKind::Text => (pending.style, None),
        };
        let draft = NoteDraft {
            kind,
            content: content.into_content(),
            position,
            z_index,
            style,
            status,
        };

        match self.store.create(draft) {
            Ok(note) => {
                info!(provisional = %pending.id, note = %note.key, %kind, "note created");
                let disposition = self.offer(ViewUpdate::confirm(key, note.clone()));
                if let (Disposition::Queued { .. }, Some(id)) = (disposition, note.key.durable()) {
                    self.confirmed.insert(pending.id, *id);
                }
                Ok(note)
            }
            Err(e) => {
                warn!(note = %pending.id, error = %e, "create failed, removing provisional note");
                self.offer(ViewUpdate::remove(key));
                Err(BoardError::CreateRejected(e.to_string()))
            }
        }
    }

    /// Classify, render and save `text`.
    pub async fn submit<C, G>(&mut self, composer: &Composer<C, G>, text: &str) -> Result<Submitted>
    where
        C: Classifier,
        G: ImageGenerator,
    {
        let pending = self.begin_compose(text)?;
        let kind = composer.classify(&pending.text).await;
        self.complete(composer, pending, kind).await
    }

    /// Like [`submit`](Self::submit), with the kind chosen by the user.
    pub async fn submit_as<C, G>(
        &mut self,
        composer: &Composer<C, G>,
        text: &str,
        kind: NoteKind,
    ) -> Result<Submitted>
    where
        C: Classifier,
        G: ImageGenerator,
    {
        let pending = self.begin_compose(text)?;
        self.complete(composer, pending, kind).await
    }

    async fn complete<C, G>(
        &mut self,
        composer: &Composer<C, G>,
        pending: PendingNote,
        kind: NoteKind,
    ) -> Result<Submitted>
    where
        C: Classifier,
        G: ImageGenerator,
    {
        if kind == NoteKind::Image {
            self.mark_generating(&pending);
        }
        let text = pending.text.clone();
        let composition = composer.render(&text, kind).await;
        let note = self.finish_compose(pending, composition.content)?;
        Ok(Submitted {
            note,
            notice: composition.notice,
        })
    }

    // --- editing ----------------------------------------------------------

    /// Remove a note from the view, then from the store.
    pub fn delete(&mut self, key: &NoteKey) -> Result<()> {
        let durable = self.durable_id(key);
        let known = self.view.contains(key)
            || match key {
                NoteKey::Provisional(p) => {
                    self.open_drafts.contains(p) || self.confirmed.contains_key(p)
                }
                NoteKey::Durable(_) => false,
            };
        if !known {
            return Err(BoardError::NoteNotFound(key.to_string()));
        }

        if let NoteKey::Provisional(p) = key {
            self.open_drafts.remove(p);
        }
        self.offer(ViewUpdate::remove(*key));
        if key.is_provisional() {
            if let Some(id) = durable {
                self.offer(ViewUpdate::remove(NoteKey::Durable(id)));
            }
        }

        if let Some(id) = durable {
            match self.store.delete(&id) {
                Ok(()) => info!(note = %id, "note deleted"),
                Err(e) => warn!(note = %id, error = %e, "delete failed"),
            }
        }
        Ok(())
    }

    /// Raise a note above all others. Returns false if it already was on top.
    pub fn bring_to_front(&mut self, key: &NoteKey) -> Result<bool> {
        let planned = plan_bring_to_front(&self.view, key)?;
        // While dragging, the view lags behind z patches already queued.
        let z_index = match (planned, self.raised) {
            (_, Some((top, _))) if top == *key => return Ok(false),
            (Some(z), Some((_, held))) => z.max(held + 1),
            (None, Some((_, held))) => held + 1,
            (Some(z), None) => z,
            (None, None) => return Ok(false),
        };
        if let Disposition::Queued { .. } =
            self.offer(ViewUpdate::patch(*key, NotePatch::z_index(z_index)))
        {
            self.raised = Some((*key, z_index));
        }
        if let Some(id) = self.durable_id(key) {
            if let Err(e) = self.store.update(&id, NotePatch::z_index(z_index)) {
                warn!(note = %id, error = %e, "z_index update failed");
            }
        }
        debug!(note = %key, z_index, "brought to front");
        Ok(true)
    }

    // --- dragging -----------------------------------------------------------

    /// Start dragging `key`, grabbed at `pointer`, rendered at `size`.
    pub fn pick_up(&mut self, key: &NoteKey, pointer: Point, size: Size) -> Result<()> {
        if self.interaction.is_dragging() {
            return Err(BoardError::AlreadyDragging);
        }
        if !self.view.contains(key) {
            return Err(BoardError::NoteNotFound(key.to_string()));
        }

        self.gate.pause();
        if let Err(e) = self.bring_to_front(key) {
            self.gate.resume();
            return Err(e);
        }
        let note = self
            .view
            .get(key)
            .cloned()
            .ok_or_else(|| BoardError::NoteNotFound(key.to_string()))?;
        if let Err(e) = self.interaction.pick_up(&note, pointer, size) {
            self.gate.resume();
            return Err(e);
        }
        Ok(())
    }

    /// Follow the pointer. Returns the transient position, `None` while idle.
    pub fn drag_to(&mut self, pointer: Point) -> Option<Point> {
        self.interaction.move_to(pointer, self.surface)
    }

    /// Commit the drag. A no-op returning `None` while idle.
    pub fn release(&mut self) -> Result<Option<DragCommit>> {
        let Some(commit) = self.interaction.release() else {
            return Ok(None);
        };

        self.view
            .patch(&commit.key, &NotePatch::position(commit.position));
        if let Some(id) = self.durable_id(&commit.key) {
            if let Err(e) = self.store.update(&id, NotePatch::position(commit.position)) {
                warn!(note = %id, error = %e, "position update failed");
            }
        }

        self.settle()?;
        Ok(Some(commit))
    }

    /// Abandon the drag, keeping the note where it was. Returns false while idle.
    pub fn cancel_drag(&mut self) -> Result<bool> {
        if self.interaction.cancel().is_none() {
            return Ok(false);
        }
        self.settle()?;
        Ok(true)
    }

    /// Post-drag: reopen the gate, apply what was held back, and catch up
    /// with the store if a held listing is stale or remote changes were dropped.
    fn settle(&mut self) -> Result<()> {
        let missed = self.gate.resume();
        self.buffer.flush(&mut self.view);
        self.confirmed.clear();
        self.raised = None;
        let stale = std::mem::take(&mut self.stale_listing);
        if stale || missed.is_some_and(|m| m.remote > 0) {
            debug!(stale, "view behind the store after drag, refreshing");
            self.refresh()?;
        }
        Ok(())
    }

    fn offer(&mut self, update: ViewUpdate) -> Disposition {
        self.buffer
            .offer(self.interaction.is_dragging(), &mut self.view, update)
    }

    fn durable_id(&self, key: &NoteKey) -> Option<NoteId> {
        match key {
            NoteKey::Durable(id) => Some(*id),
            NoteKey::Provisional(p) => self.confirmed.get(p).copied(),
        }
    }

    fn spawn_point(&mut self) -> Point {
        let desired = Point::new(
            self.surface.width / 2.0 - 100.0 + self.rng.gen_range(-50.0_f64..50.0),
            self.surface.height / 3.0 + self.rng.gen_range(-50.0_f64..50.0),
        );
        clamp_position(
            desired,
            self.config.note_size,
            self.surface,
            self.config.margin,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ImagePayload;
    use crate::services::{FixedClassifier, NoImageGenerator, ServiceError, StaticImage};
    use crate::storage::{ChangeReceiver, LoroNoteStore, SqliteNoteStore};
    use async_trait::async_trait;

    const NOTE: Size = Size {
        width: 192.0,
        height: 192.0,
    };

    /// Loro store that can be told to reject writes.
    struct FlakyStore {
        inner: LoroNoteStore,
        fail_create: bool,
        fail_writes: bool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: LoroNoteStore::in_memory(),
                fail_create: false,
                fail_writes: false,
            }
        }
    }

    impl NoteStore for FlakyStore {
        fn list(&self) -> Result<Vec<Note>> {
            self.inner.list()
        }

        fn create(&mut self, draft: NoteDraft) -> Result<Note> {
            if self.fail_create {
                return Err(BoardError::Storage("insert rejected".to_string()));
            }
            self.inner.create(draft)
        }

        fn update(&mut self, id: &NoteId, patch: NotePatch) -> Result<()> {
            if self.fail_writes {
                return Err(BoardError::Storage("update rejected".to_string()));
            }
            self.inner.update(id, patch)
        }

        fn delete(&mut self, id: &NoteId) -> Result<()> {
            if self.fail_writes {
                return Err(BoardError::Storage("delete rejected".to_string()));
            }
            self.inner.delete(id)
        }

        fn subscribe(&self) -> ChangeReceiver {
            self.inner.subscribe()
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> std::result::Result<NoteKind, ServiceError> {
            Err(ServiceError::Malformed("not json".to_string()))
        }
    }

    fn draft(content: &str, z_index: i64) -> NoteDraft {
        NoteDraft {
            kind: NoteKind::Text,
            content: content.to_string(),
            position: Point::new(100.0, 100.0),
            z_index,
            style: NoteStyle::neutral("bg-white"),
            status: None,
        }
    }

    fn board() -> Board<LoroNoteStore> {
        Board::new(LoroNoteStore::in_memory(), BoardConfig::default())
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7))
    }

    /// Board holding A (z=3) and B (z=5).
    fn board_with_a_and_b() -> (Board<LoroNoteStore>, NoteKey, NoteKey) {
        let mut store = LoroNoteStore::in_memory();
        let a = store.create(draft("A", 3)).unwrap().key;
        let b = store.create(draft("B", 5)).unwrap().key;
        let board = Board::new(store, BoardConfig::default()).unwrap();
        (board, a, b)
    }

    fn keys(board: &Board<impl NoteStore>) -> Vec<NoteKey> {
        board.notes().iter().map(|n| n.key).collect()
    }

    fn stored(board: &Board<impl NoteStore>, key: &NoteKey) -> Note {
        board
            .store()
            .list()
            .unwrap()
            .into_iter()
            .find(|n| &n.key == key)
            .unwrap()
    }

    fn tag(marker: &'static str) -> ViewUpdate {
        ViewUpdate::new("tag", move |mut view| {
            let keys: Vec<NoteKey> = view.iter().map(|n| n.key).collect();
            for key in keys {
                view.modify(&key, |n| n.content.push_str(marker));
            }
            view
        })
    }

    #[test]
    fn test_new_board_loads_store() {
        let (board, a, b) = board_with_a_and_b();
        assert_eq!(keys(&board), vec![a, b]);
        assert!(!board.is_dragging());
        assert!(!board.gate_paused());
    }

    #[test]
    fn test_drag_brings_to_front_and_commits_position() {
        let (mut board, a, b) = board_with_a_and_b();

        board
            .pick_up(&a, Point::new(110.0, 120.0), NOTE)
            .unwrap();
        assert_eq!(keys(&board), vec![b, a]);
        assert_eq!(board.notes().get(&a).unwrap().z_index, 6);
        assert_eq!(stored(&board, &a).z_index, 6);
        assert!(board.gate_paused());

        assert_eq!(
            board.drag_to(Point::new(410.0, 320.0)),
            Some(Point::new(400.0, 300.0))
        );
        // Transient only.
        assert_eq!(
            board.notes().get(&a).unwrap().position,
            Point::new(100.0, 100.0)
        );
        assert_eq!(board.drag_preview(), Some((a, Point::new(400.0, 300.0))));

        let commit = board.release().unwrap().unwrap();
        assert_eq!(commit.position, Point::new(400.0, 300.0));
        assert_eq!(
            board.notes().get(&a).unwrap().position,
            Point::new(400.0, 300.0)
        );
        assert_eq!(stored(&board, &a).position, Point::new(400.0, 300.0));
        assert!(!board.is_dragging());
        assert!(!board.gate_paused());
        assert!(board.drag_preview().is_none());
    }

    #[test]
    fn test_drag_clamps_to_surface() {
        let (mut board, a, _) = board_with_a_and_b();
        board.set_surface(Size::new(800.0, 600.0));

        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        board.drag_to(Point::new(5000.0, 5000.0));
        let commit = board.release().unwrap().unwrap();
        assert_eq!(commit.position, Point::new(800.0 - 192.0 - 10.0, 600.0 - 192.0 - 10.0));

        board.pick_up(&a, Point::new(598.0, 398.0), NOTE).unwrap();
        board.drag_to(Point::new(-300.0, -300.0));
        let commit = board.release().unwrap().unwrap();
        assert_eq!(commit.position, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_bring_frontmost_to_front_is_noop() {
        let (mut board, _, b) = board_with_a_and_b();
        let before = board.notes().clone();
        let mut rx = board.store().subscribe();

        assert!(!board.bring_to_front(&b).unwrap());
        assert_eq!(board.notes(), &before);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remote_updates_during_drag_apply_after_commit() {
        let (mut board, a, b) = board_with_a_and_b();
        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        let during = board.notes().clone();

        for marker in ["1", "2", "3"] {
            assert!(matches!(
                board.apply_remote(tag(marker)),
                Disposition::Queued { .. }
            ));
        }
        assert_eq!(board.pending_updates(), 3);
        assert_eq!(board.notes(), &during);

        board.drag_to(Point::new(300.0, 300.0));
        board.release().unwrap();

        assert_eq!(board.pending_updates(), 0);
        let a_note = board.notes().get(&a).unwrap();
        assert_eq!(a_note.content, "A123");
        assert_eq!(a_note.position, Point::new(300.0, 300.0));
        assert_eq!(board.notes().get(&b).unwrap().content, "B123");
    }

    #[test]
    fn test_peer_merge_during_drag_is_caught_up_on_release() {
        let (mut board, a, _) = board_with_a_and_b();
        let mut peer = LoroNoteStore::in_memory();
        let remote = peer.create(draft("from peer", 9)).unwrap();
        let bytes = peer.export_snapshot().unwrap();

        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        board.store_mut().merge(&bytes).unwrap();
        board.poll_changes().unwrap();
        assert!(!board.notes().contains(&remote.key));

        board.release().unwrap();
        assert!(board.notes().contains(&remote.key));
        assert_eq!(board.notes().frontmost().unwrap().key, remote.key);
    }

    #[test]
    fn test_listing_queued_during_drag_does_not_undo_commit() {
        let (mut board, a, _) = board_with_a_and_b();
        let mut peer = LoroNoteStore::in_memory();
        let remote = peer.create(draft("from peer", 1)).unwrap();
        board
            .store_mut()
            .merge(&peer.export_snapshot().unwrap())
            .unwrap();

        // The merge notification is delivered during the drag.
        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        assert_eq!(board.poll_changes().unwrap(), 1);
        assert_eq!(board.pending_updates(), 1);

        board.drag_to(Point::new(400.0, 300.0));
        board.release().unwrap();
        board.poll_changes().unwrap();

        let shown = board.notes().get(&a).unwrap();
        assert_eq!(shown.position, Point::new(400.0, 300.0));
        assert_eq!(shown.position, stored(&board, &a).position);
        assert_eq!(shown.z_index, 6);
        assert!(board.notes().contains(&remote.key));
        assert_eq!(board.notes().as_slice(), board.store().list().unwrap().as_slice());
    }

    #[test]
    fn test_bring_to_front_during_drag_allocates_past_queued_raises() {
        let mut store = LoroNoteStore::in_memory();
        let a = store.create(draft("A", 5)).unwrap().key;
        let b = store.create(draft("B", 5)).unwrap().key;
        let c = store.create(draft("C", 4)).unwrap().key;
        let mut board = Board::new(store, BoardConfig::default()).unwrap();

        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        assert_eq!(stored(&board, &a).z_index, 6);

        assert!(board.bring_to_front(&b).unwrap());
        assert!(board.bring_to_front(&c).unwrap());
        assert!(!board.bring_to_front(&c).unwrap());
        assert_eq!(stored(&board, &b).z_index, 7);
        assert_eq!(stored(&board, &c).z_index, 8);

        assert!(board.bring_to_front(&a).unwrap());
        assert_eq!(stored(&board, &a).z_index, 9);

        board.release().unwrap();
        assert_eq!(keys(&board), vec![b, c, a]);
        assert!(!board.bring_to_front(&a).unwrap());
    }

    #[test]
    fn test_sqlite_board_persists_drag_and_catches_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.db");
        let mut store = SqliteNoteStore::open(&path).unwrap();
        let a = store.create(draft("A", 3)).unwrap().key;
        let b = store.create(draft("B", 5)).unwrap().key;
        let mut board = Board::new(store, BoardConfig::default()).unwrap();
        board.poll_changes().unwrap();

        // Written before the drag, listed during it.
        let late = board.store_mut().create(draft("late", 1)).unwrap().key;
        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        assert_eq!(board.poll_changes().unwrap(), 1);
        board.drag_to(Point::new(250.0, 150.0));
        board.release().unwrap();

        assert_eq!(keys(&board), vec![late, b, a]);
        assert_eq!(
            board.notes().get(&a).unwrap().position,
            Point::new(250.0, 150.0)
        );
        drop(board);

        let reopened = SqliteNoteStore::open(&path).unwrap();
        let notes = reopened.list().unwrap();
        let moved = notes.iter().find(|n| n.key == a).unwrap();
        assert_eq!(moved.position, Point::new(250.0, 150.0));
        assert_eq!(moved.z_index, 6);
        assert_eq!(notes.len(), 3);
    }

    #[test]
    fn test_poll_changes_refreshes_when_idle() {
        let mut board = board();
        let mut peer = LoroNoteStore::in_memory();
        let remote = peer.create(draft("hello", 1)).unwrap();
        let bytes = peer.export_snapshot().unwrap();

        board.store_mut().merge(&bytes).unwrap();
        assert_eq!(board.poll_changes().unwrap(), 1);
        assert!(board.notes().contains(&remote.key));
    }

    #[test]
    fn test_pick_up_twice_is_rejected() {
        let (mut board, a, b) = board_with_a_and_b();
        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        assert!(matches!(
            board.pick_up(&b, Point::new(100.0, 100.0), NOTE),
            Err(BoardError::AlreadyDragging)
        ));
        board.release().unwrap();
        assert!(!board.gate_paused());
    }

    #[test]
    fn test_pick_up_unknown_note_leaves_gate_open() {
        let mut board = board();
        let missing = NoteKey::Durable(NoteId::new());
        assert!(matches!(
            board.pick_up(&missing, Point::new(0.0, 0.0), NOTE),
            Err(BoardError::NoteNotFound(_))
        ));
        assert!(!board.gate_paused());
        assert!(!board.is_dragging());
    }

    #[test]
    fn test_release_and_cancel_while_idle_are_noops() {
        let (mut board, _, _) = board_with_a_and_b();
        let before = board.notes().clone();
        assert!(board.release().unwrap().is_none());
        assert!(!board.cancel_drag().unwrap());
        assert_eq!(board.notes(), &before);
    }

    #[test]
    fn test_cancel_keeps_position_and_flushes() {
        let (mut board, a, _) = board_with_a_and_b();
        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        board.drag_to(Point::new(500.0, 500.0));
        board.apply_remote(tag("!"));

        assert!(board.cancel_drag().unwrap());
        let note = board.notes().get(&a).unwrap();
        assert_eq!(note.position, Point::new(100.0, 100.0));
        assert_eq!(note.content, "A!");
        assert!(!board.gate_paused());
        assert_eq!(board.pending_updates(), 0);
    }

    #[test]
    fn test_failed_position_write_keeps_view() {
        let mut store = FlakyStore::new();
        let key = store.create(draft("A", 1)).unwrap().key;
        let mut board = Board::new(store, BoardConfig::default()).unwrap();

        board.store_mut().fail_writes = true;
        board.pick_up(&key, Point::new(100.0, 100.0), NOTE).unwrap();
        board.drag_to(Point::new(200.0, 200.0));
        board.release().unwrap();

        assert_eq!(
            board.notes().get(&key).unwrap().position,
            Point::new(200.0, 200.0)
        );
        assert_eq!(stored(&board, &key).position, Point::new(100.0, 100.0));
        assert!(!board.is_dragging());
    }

    #[test]
    fn test_begin_compose_shows_provisional_note_on_top() {
        let (mut board, _, b) = board_with_a_and_b();
        let pending = board.begin_compose("  buy milk ").unwrap();

        assert_eq!(pending.text, "buy milk");
        assert_eq!(pending.z_index, 6);
        let shown = board.notes().frontmost().unwrap();
        assert_eq!(shown.key, pending.key());
        assert_eq!(shown.kind, NoteKind::Text);
        assert_ne!(shown.key, b);

        let surface = board.surface();
        assert!(pending.position.x >= 10.0 && pending.position.x <= surface.width - 202.0);
        assert!(pending.position.y >= 10.0 && pending.position.y <= surface.height - 202.0);
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let mut board = board();
        assert!(matches!(board.begin_compose("   "), Err(BoardError::EmptyNote)));
        assert!(board.notes().is_empty());
    }

    #[test]
    fn test_provisional_ids_are_unique() {
        let mut board = board();
        let first = board.begin_compose("one").unwrap();
        let second = board.begin_compose("two").unwrap();
        assert_ne!(first.key(), second.key());
        assert_eq!(board.notes().provisional_count(), 2);
    }

    #[test]
    fn test_finish_compose_replaces_provisional_with_durable() {
        let mut board = board();
        let pending = board.begin_compose("buy milk").unwrap();
        let position = pending.position;

        let note = board
            .finish_compose(pending, ComposedContent::Text("buy milk".to_string()))
            .unwrap();

        assert!(note.key.durable().is_some());
        assert_eq!(note.position, position);
        assert_eq!(board.notes().len(), 1);
        assert_eq!(board.notes().provisional_count(), 0);
        assert_eq!(board.store().list().unwrap().len(), 1);
    }

    #[test]
    fn test_finish_after_delete_creates_nothing() {
        let mut board = board();
        let pending = board.begin_compose("gone").unwrap();
        board.delete(&pending.key()).unwrap();

        assert!(matches!(
            board.finish_compose(pending, ComposedContent::Text("gone".to_string())),
            Err(BoardError::ComposeDiscarded(_))
        ));
        assert!(board.notes().is_empty());
        assert!(board.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_create_failure_rolls_back() {
        let mut store = FlakyStore::new();
        store.fail_create = true;
        let mut board = Board::new(store, BoardConfig::default()).unwrap();

        let pending = board.begin_compose("doomed").unwrap();
        assert_eq!(board.notes().len(), 1);

        assert!(matches!(
            board.finish_compose(pending, ComposedContent::Text("doomed".to_string())),
            Err(BoardError::CreateRejected(_))
        ));
        assert!(board.notes().is_empty());
    }

    #[test]
    fn test_concurrent_creates_resolve_independently() {
        let mut board = board();
        let first = board.begin_compose("first").unwrap();
        let second = board.begin_compose("second").unwrap();
        assert_eq!(second.z_index, first.z_index + 1);

        let second_note = board
            .finish_compose(second, ComposedContent::Text("second".to_string()))
            .unwrap();
        assert_eq!(board.notes().provisional_count(), 1);

        let first_note = board
            .finish_compose(first, ComposedContent::Text("first".to_string()))
            .unwrap();
        assert_eq!(board.notes().provisional_count(), 0);
        assert_ne!(first_note.key, second_note.key);
        assert_eq!(board.notes().frontmost().unwrap().key, second_note.key);
    }

    #[test]
    fn test_confirm_during_drag_waits_for_release() {
        let (mut board, a, _) = board_with_a_and_b();
        let pending = board.begin_compose("later").unwrap();
        let temp = pending.key();

        board.pick_up(&a, Point::new(100.0, 100.0), NOTE).unwrap();
        let note = board
            .finish_compose(pending, ComposedContent::Text("later".to_string()))
            .unwrap();
        assert!(board.notes().contains(&temp));
        assert!(!board.notes().contains(&note.key));

        board.release().unwrap();
        assert!(!board.notes().contains(&temp));
        assert!(board.notes().contains(&note.key));
        assert_eq!(board.notes().len(), 3);
    }

    #[test]
    fn test_dragging_provisional_note_persists_after_confirmation() {
        let mut board = board();
        let pending = board.begin_compose("moving").unwrap();
        let temp = pending.key();

        board.pick_up(&temp, Point::new(pending.position.x, pending.position.y), NOTE).unwrap();
        let note = board
            .finish_compose(pending, ComposedContent::Text("moving".to_string()))
            .unwrap();
        board.drag_to(Point::new(50.0, 60.0));
        board.release().unwrap();

        let shown = board.notes().get(&note.key).unwrap();
        assert_eq!(shown.position, Point::new(50.0, 60.0));
        assert_eq!(stored(&board, &note.key).position, Point::new(50.0, 60.0));
    }

    #[test]
    fn test_delete_durable_note() {
        let (mut board, a, b) = board_with_a_and_b();
        board.delete(&a).unwrap();
        assert_eq!(keys(&board), vec![b]);
        assert_eq!(board.store().list().unwrap().len(), 1);

        assert!(matches!(
            board.delete(&a),
            Err(BoardError::NoteNotFound(_))
        ));
    }

    #[test]
    fn test_failed_delete_is_not_rolled_back() {
        let mut store = FlakyStore::new();
        let key = store.create(draft("stuck", 1)).unwrap().key;
        store.fail_writes = true;
        let mut board = Board::new(store, BoardConfig::default()).unwrap();

        board.delete(&key).unwrap();
        assert!(board.notes().is_empty());
        assert_eq!(board.store().list().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_by_prefix() {
        let (board, a, _) = board_with_a_and_b();
        let full = a.to_string();
        assert_eq!(board.resolve(&full[..8]).unwrap(), a);
        assert_eq!(board.resolve(&full.to_uppercase()).unwrap(), a);
        assert!(matches!(board.resolve("zzzz"), Err(BoardError::NoteNotFound(_))));
        assert!(matches!(board.resolve(""), Err(BoardError::NoteNotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_text() {
        let mut board = board();
        let composer = Composer::new(FixedClassifier(NoteKind::Text), NoImageGenerator);

        let submitted = board.submit(&composer, "buy milk").await.unwrap();
        assert_eq!(submitted.note.kind, NoteKind::Text);
        assert_eq!(submitted.note.content, "buy milk");
        assert!(submitted.notice.is_none());
        assert_eq!(board.notes().len(), 1);
    }

    #[tokio::test]
    async fn test_classification_failure_gives_one_text_note() {
        let mut board = board();
        let composer = Composer::new(FailingClassifier, NoImageGenerator);

        let submitted = board.submit(&composer, "cat").await.unwrap();
        assert_eq!(submitted.note.kind, NoteKind::Text);
        assert_eq!(submitted.note.content, "cat");
        assert_eq!(board.notes().len(), 1);
        assert_eq!(board.notes().provisional_count(), 0);
        assert_eq!(board.store().list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_image() {
        let mut board = board();
        let composer = Composer::new(
            FixedClassifier(NoteKind::Image),
            StaticImage(ImagePayload::png(vec![1, 2, 3])),
        );

        let submitted = board.submit(&composer, "cat").await.unwrap();
        let note = submitted.note;
        assert_eq!(note.kind, NoteKind::Image);
        assert_eq!(note.status, Some(NoteStatus::Saved));
        assert_eq!(note.style.rotation, "");
        assert_eq!(
            ImagePayload::from_data_url(&note.content),
            Some(ImagePayload::png(vec![1, 2, 3]))
        );
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back_to_text() {
        let mut board = board();
        let composer = Composer::new(FixedClassifier(NoteKind::Image), NoImageGenerator);

        let submitted = board.submit(&composer, "cat").await.unwrap();
        assert_eq!(submitted.note.kind, NoteKind::Text);
        assert_eq!(submitted.note.content, "cat");
        assert_eq!(submitted.note.status, None);
        assert!(matches!(
            submitted.notice,
            Some(Notice::GenerationFailed { .. })
        ));
        assert_eq!(board.notes().provisional_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_as_skips_classification() {
        let mut board = board();
        let composer = Composer::new(
            FailingClassifier,
            StaticImage(ImagePayload::png(vec![9])),
        );

        let submitted = board
            .submit_as(&composer, "cat", NoteKind::Image)
            .await
            .unwrap();
        assert_eq!(submitted.note.kind, NoteKind::Image);
    }

    #[test]
    fn test_mark_generating_shows_image_placeholder() {
        let mut board = board();
        let pending = board.begin_compose("cat").unwrap();
        board.mark_generating(&pending);

        let shown = board.notes().get(&pending.key()).unwrap();
        assert_eq!(shown.kind, NoteKind::Image);
        assert_eq!(shown.status, Some(NoteStatus::Pending));
        assert_eq!(shown.style.color, board.config().palette.neutral_color);
    }
}
