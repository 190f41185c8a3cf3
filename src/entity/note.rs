// src/entity/note.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NoteKey, NoteStyle, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    Text,
    Image,
}

impl std::fmt::Display for NoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteKind::Text => write!(f, "text"),
            NoteKind::Image => write!(f, "image"),
        }
    }
}

impl std::str::FromStr for NoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(NoteKind::Text),
            "image" => Ok(NoteKind::Image),
            _ => Err(format!("Invalid note kind: {}", s)),
        }
    }
}

/// Lifecycle flag for image notes awaiting generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Pending,
    Saved,
}

impl std::fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteStatus::Pending => write!(f, "pending"),
            NoteStatus::Saved => write!(f, "saved"),
        }
    }
}

impl std::str::FromStr for NoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(NoteStatus::Pending),
            "saved" => Ok(NoteStatus::Saved),
            _ => Err(format!("Invalid note status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    #[serde(rename = "id")]
    pub key: NoteKey,
    pub kind: NoteKind,
    pub content: String,
    pub position: Point,
    pub z_index: i64,
    pub style: NoteStyle,
    pub status: Option<NoteStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn from_draft(key: NoteKey, draft: NoteDraft) -> Self {
        let now = Utc::now();
        Self {
            key,
            kind: draft.kind,
            content: draft.content,
            position: draft.position,
            z_index: draft.z_index,
            style: draft.style,
            status: draft.status,
            created_at: now,
            updated_at: now,
        }
    }

    /// The fields a store needs to persist this note under a new id.
    pub fn to_draft(&self) -> NoteDraft {
        NoteDraft {
            kind: self.kind,
            content: self.content.clone(),
            position: self.position,
            z_index: self.z_index,
            style: self.style.clone(),
            status: self.status,
        }
    }
}

/// Everything a store needs to create a note. The caller computes `z_index`
/// against its own view, see [`next_z_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub kind: NoteKind,
    pub content: String,
    pub position: Point,
    pub z_index: i64,
    pub style: NoteStyle,
    pub status: Option<NoteStatus>,
}

/// Partial update for a stored note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub kind: Option<NoteKind>,
    pub content: Option<String>,
    pub position: Option<Point>,
    pub z_index: Option<i64>,
    pub status: Option<Option<NoteStatus>>, // Some(None) to clear
}

impl NotePatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn z_index(z_index: i64) -> Self {
        Self {
            z_index: Some(z_index),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.content.is_none()
            && self.position.is_none()
            && self.z_index.is_none()
            && self.status.is_none()
    }

    pub fn apply_to(&self, note: &mut Note) {
        if let Some(kind) = self.kind {
            note.kind = kind;
        }
        if let Some(ref content) = self.content {
            note.content = content.clone();
        }
        if let Some(position) = self.position {
            note.position = position;
        }
        if let Some(z_index) = self.z_index {
            note.z_index = z_index;
        }
        if let Some(status) = self.status {
            note.status = status;
        }
        note.updated_at = Utc::now();
    }
}

/// Stacking order for the next note placed on top of `notes`.
///
/// Missing or zero indices count as 1, so any non-empty board starts
/// new notes at 2 or higher. An empty board yields 1.
pub fn next_z_index<'a>(notes: impl IntoIterator<Item = &'a Note>) -> i64 {
    notes
        .into_iter()
        .map(|n| n.z_index.max(1))
        .max()
        .unwrap_or(0)
        + 1
}
