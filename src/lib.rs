pub mod board;
pub mod cli;
pub mod compose;
pub mod config;
pub mod entity;
pub mod error;
pub mod interaction;
pub mod logging;
pub mod services;
pub mod storage;
pub mod sync;
pub mod view;

pub use board::{Board, PendingNote, Submitted};
pub use config::BoardConfig;
pub use error::{BoardError, Result};
pub use storage::{LoroNoteStore, NoteStore, SqliteNoteStore};
