use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ChangeNotifier, ChangeOrigin, ChangeReceiver, NoteStore};
use crate::entity::{
    Note, NoteDraft, NoteId, NoteKey, NoteKind, NotePatch, NoteStatus, NoteStyle, Point,
};
use crate::error::{BoardError, Result};

/// Relational note store.
///
/// Notifications are emitted for writes made through this handle only;
/// there is no cross-process change feed.
pub struct SqliteNoteStore {
    conn: Connection,
    notifier: ChangeNotifier,
}

impl SqliteNoteStore {
    /// Open or create the notes database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn,
            notifier: ChangeNotifier::new(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                z_index INTEGER NOT NULL,
                color TEXT NOT NULL,
                rotation TEXT NOT NULL,
                status TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notes_z_index ON notes(z_index)",
            [],
        )?;

        Ok(())
    }

    /// Get a single note by id
    pub fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, kind, content, x, y, z_index, color, rotation, status, created_at, updated_at
                 FROM notes WHERE id = ?1",
                [id.to_string()],
                row_to_note,
            )
            .optional()?;
        Ok(result)
    }

    fn exists(&self, id: &NoteId) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM notes WHERE id = ?1",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn row_to_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let status: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Note {
        key: NoteKey::Durable(id.parse::<NoteId>().map_err(text_error(0))?),
        kind: kind.parse::<NoteKind>().map_err(text_error(1))?,
        content: row.get(2)?,
        position: Point::new(row.get(3)?, row.get(4)?),
        z_index: row.get(5)?,
        style: NoteStyle {
            color: row.get(6)?,
            rotation: row.get(7)?,
        },
        status: status
            .map(|s| s.parse::<NoteStatus>())
            .transpose()
            .map_err(text_error(8))?,
        created_at: parse_timestamp(&created_at, 9)?,
        updated_at: parse_timestamp(&updated_at, 10)?,
    })
}

fn text_error(column: usize) -> impl Fn(String) -> rusqlite::Error {
    move |message| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            message.into(),
        )
    }
}

fn parse_timestamp(value: &str, column: usize) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_error(column)(e.to_string()))
}

impl NoteStore for SqliteNoteStore {
    fn list(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, content, x, y, z_index, color, rotation, status, created_at, updated_at
             FROM notes ORDER BY z_index ASC, created_at ASC",
        )?;
        let notes = stmt
            .query_map([], row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn create(&mut self, draft: NoteDraft) -> Result<Note> {
        let id = NoteId::new();
        let note = Note::from_draft(NoteKey::Durable(id), draft);

        self.conn.execute(
            "INSERT INTO notes
             (id, kind, content, x, y, z_index, color, rotation, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.to_string(),
                note.kind.to_string(),
                note.content,
                note.position.x,
                note.position.y,
                note.z_index,
                note.style.color,
                note.style.rotation,
                note.status.map(|s| s.to_string()),
                note.created_at.to_rfc3339(),
                note.updated_at.to_rfc3339(),
            ],
        )?;

        self.notifier.notify(ChangeOrigin::Local);
        Ok(note)
    }

    fn update(&mut self, id: &NoteId, patch: NotePatch) -> Result<()> {
        let mut note = self
            .get(id)?
            .ok_or_else(|| BoardError::NoteNotFound(id.to_string()))?;
        patch.apply_to(&mut note);

        self.conn.execute(
            "UPDATE notes SET kind = ?2, content = ?3, x = ?4, y = ?5, z_index = ?6,
             status = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                id.to_string(),
                note.kind.to_string(),
                note.content,
                note.position.x,
                note.position.y,
                note.z_index,
                note.status.map(|s| s.to_string()),
                note.updated_at.to_rfc3339(),
            ],
        )?;

        self.notifier.notify(ChangeOrigin::Local);
        Ok(())
    }

    fn delete(&mut self, id: &NoteId) -> Result<()> {
        if !self.exists(id)? {
            return Err(BoardError::NoteNotFound(id.to_string()));
        }
        self.conn
            .execute("DELETE FROM notes WHERE id = ?1", [id.to_string()])?;
        self.notifier.notify(ChangeOrigin::Local);
        Ok(())
    }

    fn subscribe(&self) -> ChangeReceiver {
        self.notifier.subscribe()
    }
}
