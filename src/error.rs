use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Not in a stickyboard project. Run 'stickyboard init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .stickyboard/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Ambiguous note id '{0}': matches more than one note")]
    AmbiguousNote(String),

    #[error("Note text is empty")]
    EmptyNote,

    #[error("A drag is already in progress")]
    AlreadyDragging,

    #[error("Could not save note: {0}")]
    CreateRejected(String),

    #[error("Note {0} was removed before it could be saved")]
    ComposeDiscarded(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Loro error: {0}")]
    Loro(#[from] loro::LoroError),

    #[error("Loro encode error: {0}")]
    LoroEncode(#[from] loro::LoroEncodeError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, BoardError>;
