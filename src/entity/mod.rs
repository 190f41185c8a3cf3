mod content;
mod note;
mod style;

pub use content::ImagePayload;
pub use note::{next_z_index, Note, NoteDraft, NoteKind, NotePatch, NoteStatus};
pub use style::{NoteStyle, Palette};

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Identifier issued by the backing store once a note is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short form used in CLI output.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NoteId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid note id '{}': {}", s, e))
    }
}

/// Identifier issued locally for a note the store has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvisionalId(u64);

impl ProvisionalId {
    pub fn new(n: u64) -> Self {
        Self(n)
    }
}

impl std::fmt::Display for ProvisionalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "temp-{}", self.0)
    }
}

/// Which id space a note currently lives in.
///
/// Store writes only accept [`NoteId`], so a provisional note can never
/// reach `update` or `delete` on a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKey {
    Provisional(ProvisionalId),
    Durable(NoteId),
}

impl NoteKey {
    pub fn durable(&self) -> Option<&NoteId> {
        match self {
            NoteKey::Durable(id) => Some(id),
            NoteKey::Provisional(_) => None,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, NoteKey::Provisional(_))
    }
}

impl From<NoteId> for NoteKey {
    fn from(id: NoteId) -> Self {
        NoteKey::Durable(id)
    }
}

impl From<ProvisionalId> for NoteKey {
    fn from(id: ProvisionalId) -> Self {
        NoteKey::Provisional(id)
    }
}

impl std::fmt::Display for NoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteKey::Provisional(id) => write!(f, "{}", id),
            NoteKey::Durable(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for NoteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A location on the board surface, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered dimensions of a note or of the board surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}
