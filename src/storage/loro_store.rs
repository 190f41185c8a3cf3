use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use loro::{LoroDoc, LoroMap, LoroValue, ValueOrContainer};
use tracing::{debug, info};

use super::{sort_for_display, ChangeNotifier, ChangeOrigin, ChangeReceiver, NoteStore};
use crate::entity::{
    Note, NoteDraft, NoteId, NoteKey, NoteKind, NotePatch, NoteStatus, NoteStyle, Point,
};
use crate::error::{BoardError, Result};

pub const BOARD_DIR: &str = ".stickyboard";
const LORO_DB: &str = "board.loro";
const NOTES: &str = "notes";

/// Note store backed by a Loro CRDT document.
///
/// Peers converge by exchanging [`export_snapshot`](Self::export_snapshot)
/// bytes and feeding them to [`merge`](Self::merge).
pub struct LoroNoteStore {
    doc: LoroDoc,
    path: Option<PathBuf>,
    notifier: ChangeNotifier,
}

impl LoroNoteStore {
    /// A store that lives only in memory, e.g. one peer in a session.
    pub fn in_memory() -> Self {
        Self {
            doc: LoroDoc::new(),
            path: None,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Initialize a new board under `root`
    pub fn init(root: &Path) -> Result<Self> {
        let board_dir = root.join(BOARD_DIR);

        if board_dir.exists() {
            return Err(BoardError::AlreadyInitialized);
        }

        fs::create_dir_all(&board_dir)?;

        let store = Self {
            doc: LoroDoc::new(),
            path: Some(board_dir.join(LORO_DB)),
            notifier: ChangeNotifier::new(),
        };
        store.save()?;

        info!(path = %board_dir.display(), "board initialized");
        Ok(store)
    }

    /// Open an existing board under `root`
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(BOARD_DIR).join(LORO_DB);

        if !path.exists() {
            return Err(BoardError::NotInitialized);
        }

        let bytes = fs::read(&path)?;
        let doc = LoroDoc::new();
        doc.import(&bytes)?;

        Ok(Self {
            doc,
            path: Some(path),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Write the document to disk. In-memory stores have nothing to write.
    pub fn save(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            debug!("in-memory board, skipping save");
            return Ok(());
        };
        let bytes = self.export_snapshot()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Directory holding the board file, if this store is on disk.
    pub fn board_dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// Version vector rendering, changes whenever any peer's ops land.
    pub fn version_hash(&self) -> String {
        let vv = self.doc.oplog_vv();
        format!("{:?}", vv)
    }

    /// Full document state for handing to another peer.
    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.doc.export(loro::ExportMode::Snapshot)?)
    }

    /// Fold another peer's state into this one.
    pub fn merge(&mut self, bytes: &[u8]) -> Result<()> {
        self.doc.import(bytes)?;
        debug!(version = %self.version_hash(), "merged remote board state");
        self.notifier.notify(ChangeOrigin::Remote);
        Ok(())
    }

    fn note_map(&self, id: &NoteId) -> Result<LoroMap> {
        let notes_map = self.doc.get_map(NOTES);
        let id_str = id.to_string();
        match notes_map.get(&id_str) {
            Some(ValueOrContainer::Container(loro::Container::Map(map))) => Ok(map),
            _ => Err(BoardError::NoteNotFound(id_str)),
        }
    }

    fn parse_note_from_map(&self, map: &loro::LoroMapValue) -> Option<Note> {
        let id: NoteId = match map.get("id")? {
            LoroValue::String(s) => s.parse().ok()?,
            _ => return None,
        };
        let kind: NoteKind = match map.get("kind")? {
            LoroValue::String(s) => s.parse().ok()?,
            _ => return None,
        };
        let content = match map.get("content")? {
            LoroValue::String(s) => s.to_string(),
            _ => return None,
        };
        let x = number(map.get("x")?)?;
        let y = number(map.get("y")?)?;
        let z_index = z_index_value(map.get("z_index")?)?;
        let color = string(map.get("color"));
        let rotation = string(map.get("rotation"));
        let status = map.get("status").and_then(|v| match v {
            LoroValue::String(s) => s.parse::<NoteStatus>().ok(),
            _ => None,
        });
        let created_at = match map.get("created_at")? {
            LoroValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()?
                .with_timezone(&Utc),
            _ => return None,
        };
        let updated_at = match map.get("updated_at")? {
            LoroValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()?
                .with_timezone(&Utc),
            _ => return None,
        };

        Some(Note {
            key: NoteKey::Durable(id),
            kind,
            content,
            position: Point::new(x, y),
            z_index,
            style: NoteStyle { color, rotation },
            status,
            created_at,
            updated_at,
        })
    }
}

/// Peers may write `z_index` as a float. Fractions round to the nearest layer.
fn z_index_value(value: &LoroValue) -> Option<i64> {
    match value {
        LoroValue::I64(n) => Some(*n),
        LoroValue::Double(f) if f.is_finite() => Some(f.round() as i64),
        other => {
            debug!(value = ?other, "skipping note with unusable z_index");
            None
        }
    }
}

fn number(value: &LoroValue) -> Option<f64> {
    match value {
        LoroValue::Double(f) => Some(*f),
        LoroValue::I64(n) => Some(*n as f64),
        _ => None,
    }
}

fn string(value: Option<&LoroValue>) -> String {
    match value {
        Some(LoroValue::String(s)) => s.to_string(),
        _ => String::new(),
    }
}

impl NoteStore for LoroNoteStore {
    fn list(&self) -> Result<Vec<Note>> {
        let notes_map = self.doc.get_map(NOTES);
        let mut notes = Vec::new();

        let json = notes_map.get_deep_value();
        if let LoroValue::Map(map) = json {
            for (_, entity_value) in map.iter() {
                if let LoroValue::Map(entity_map) = entity_value {
                    if let Some(note) = self.parse_note_from_map(entity_map) {
                        notes.push(note);
                    }
                }
            }
        }

        sort_for_display(&mut notes);
        Ok(notes)
    }

    fn create(&mut self, draft: NoteDraft) -> Result<Note> {
        let id = NoteId::new();
        let note = Note::from_draft(NoteKey::Durable(id), draft);

        let notes_map = self.doc.get_map(NOTES);
        let id_str = id.to_string();
        let entity_map = notes_map.get_or_create_container(&id_str, LoroMap::new())?;

        entity_map.insert("id", id_str.clone())?;
        entity_map.insert("kind", note.kind.to_string())?;
        entity_map.insert("content", note.content.clone())?;
        entity_map.insert("x", note.position.x)?;
        entity_map.insert("y", note.position.y)?;
        entity_map.insert("z_index", note.z_index)?;
        entity_map.insert("color", note.style.color.clone())?;
        entity_map.insert("rotation", note.style.rotation.clone())?;
        entity_map.insert("created_at", note.created_at.to_rfc3339())?;
        entity_map.insert("updated_at", note.updated_at.to_rfc3339())?;

        if let Some(status) = note.status {
            entity_map.insert("status", status.to_string())?;
        }

        self.doc.commit();
        debug!(id = %id, kind = %note.kind, z_index = note.z_index, "note created");
        self.notifier.notify(ChangeOrigin::Local);
        Ok(note)
    }

    fn update(&mut self, id: &NoteId, patch: NotePatch) -> Result<()> {
        let entity_map = self.note_map(id)?;

        entity_map.insert("updated_at", Utc::now().to_rfc3339())?;

        if let Some(kind) = patch.kind {
            entity_map.insert("kind", kind.to_string())?;
        }

        if let Some(content) = patch.content {
            entity_map.insert("content", content)?;
        }

        if let Some(position) = patch.position {
            entity_map.insert("x", position.x)?;
            entity_map.insert("y", position.y)?;
        }

        if let Some(z_index) = patch.z_index {
            entity_map.insert("z_index", z_index)?;
        }

        match patch.status {
            Some(Some(status)) => entity_map.insert("status", status.to_string())?,
            Some(None) => entity_map.delete("status")?,
            None => {}
        }

        self.doc.commit();
        self.notifier.notify(ChangeOrigin::Local);
        Ok(())
    }

    fn delete(&mut self, id: &NoteId) -> Result<()> {
        let notes_map = self.doc.get_map(NOTES);
        let id_str = id.to_string();

        if notes_map.get(&id_str).is_none() {
            return Err(BoardError::NoteNotFound(id_str));
        }

        notes_map.delete(&id_str)?;
        self.doc.commit();
        self.notifier.notify(ChangeOrigin::Local);
        Ok(())
    }

    fn subscribe(&self) -> ChangeReceiver {
        self.notifier.subscribe()
    }
}
