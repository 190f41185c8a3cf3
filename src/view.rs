//! The locally visible set of notes.

use crate::entity::{Note, NoteKey, NotePatch};

/// Notes as the user sees them, kept sorted by `z_index`.
///
/// Sorting is stable: notes that share a `z_index` keep their relative
/// order, and the last note in the list is drawn on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteList {
    notes: Vec<Note>,
}

impl NoteList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from arbitrary notes. A repeated key keeps its last value.
    pub fn from_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let mut list = Self::new();
        for note in notes {
            list.put(note);
        }
        list.sort();
        list
    }

    pub fn as_slice(&self) -> &[Note] {
        &self.notes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, key: &NoteKey) -> Option<&Note> {
        self.notes.iter().find(|n| &n.key == key)
    }

    pub fn contains(&self, key: &NoteKey) -> bool {
        self.get(key).is_some()
    }

    pub fn max_z(&self) -> Option<i64> {
        self.notes.iter().map(|n| n.z_index).max()
    }

    /// The note drawn on top of all others.
    pub fn frontmost(&self) -> Option<&Note> {
        self.notes.last()
    }

    pub fn provisional_count(&self) -> usize {
        self.notes.iter().filter(|n| n.key.is_provisional()).count()
    }

    /// Insert or replace by key, then restore ordering.
    pub fn upsert(&mut self, note: Note) {
        self.put(note);
        self.sort();
    }

    pub fn remove(&mut self, key: &NoteKey) -> Option<Note> {
        let idx = self.notes.iter().position(|n| &n.key == key)?;
        Some(self.notes.remove(idx))
    }

    /// Apply `patch` to the note with `key`. Returns false if it is absent.
    pub fn patch(&mut self, key: &NoteKey, patch: &NotePatch) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| &n.key == key) else {
            return false;
        };
        patch.apply_to(note);
        if patch.z_index.is_some() {
            self.sort();
        }
        true
    }

    /// Mutate the note with `key` in place. Returns false if it is absent.
    pub fn modify(&mut self, key: &NoteKey, f: impl FnOnce(&mut Note)) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| &n.key == key) else {
            return false;
        };
        f(note);
        self.sort();
        true
    }

    /// Swap the note under `old` for `note`, keeping the slot's current
    /// position and stacking order if the slot is still present.
    pub fn replace(&mut self, old: &NoteKey, mut note: Note) {
        if let Some(slot) = self.remove(old) {
            note.position = slot.position;
            note.z_index = slot.z_index;
        }
        self.upsert(note);
    }

    /// Take the store's notes as the truth for every durable key while
    /// keeping notes the store has not confirmed yet.
    pub fn sync_durable(&mut self, store_notes: Vec<Note>) {
        let provisional: Vec<Note> = self
            .notes
            .drain(..)
            .filter(|n| n.key.is_provisional())
            .collect();
        for note in store_notes.into_iter().chain(provisional) {
            self.put(note);
        }
        self.sort();
    }

    pub fn into_vec(self) -> Vec<Note> {
        self.notes
    }

    fn put(&mut self, note: Note) {
        match self.notes.iter_mut().find(|n| n.key == note.key) {
            Some(existing) => *existing = note,
            None => self.notes.push(note),
        }
    }

    fn sort(&mut self) {
        self.notes.sort_by_key(|n| n.z_index);
    }
}

impl<'a> IntoIterator for &'a NoteList {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter()
    }
}
