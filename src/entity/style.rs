use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::NoteKind;

/// Cosmetic look of a note. Assigned once when the note is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteStyle {
    pub color: String,
    pub rotation: String,
}

impl NoteStyle {
    /// Untilted style used for image notes.
    pub fn neutral(color: &str) -> Self {
        Self {
            color: color.to_string(),
            rotation: String::new(),
        }
    }
}

/// The fixed set of colors and tilts notes are drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub colors: Vec<String>,
    pub rotations: Vec<String>,
    pub neutral_color: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: [
                "bg-orange-200 dark:bg-orange-700",
                "bg-amber-200 dark:bg-amber-700",
                "bg-rose-200 dark:bg-rose-700",
                "bg-sky-200 dark:bg-sky-700",
                "bg-lime-200 dark:bg-lime-700",
                "bg-yellow-200 dark:bg-yellow-600",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            rotations: [
                "-rotate-2", "rotate-2", "-rotate-1", "rotate-1", "-rotate-3", "rotate-3",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            neutral_color: "bg-white dark:bg-gray-200".to_string(),
        }
    }
}

impl Palette {
    /// Uniform pick for text notes; image notes always get the neutral style.
    pub fn pick<R: Rng + ?Sized>(&self, kind: NoteKind, rng: &mut R) -> NoteStyle {
        match kind {
            NoteKind::Image => NoteStyle::neutral(&self.neutral_color),
            NoteKind::Text => NoteStyle {
                color: self
                    .colors
                    .choose(rng)
                    .cloned()
                    .unwrap_or_else(|| self.neutral_color.clone()),
                rotation: self.rotations.choose(rng).cloned().unwrap_or_default(),
            },
        }
    }
}
