use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::board::{Board, Submitted};
use crate::compose::Composer;
use crate::config::BoardConfig;
use crate::entity::{ImagePayload, Note, NoteKey, NoteKind, Point};
use crate::error::{BoardError, Result};
use crate::services::{Classifier, FixedClassifier, ImageGenerator, NoImageGenerator, StaticImage};
use crate::storage::{LoroNoteStore, NoteStore, BOARD_DIR};

const SUMMARY_WIDTH: usize = 60;

/// Find the project root by looking for .stickyboard/ or .git/
fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(BOARD_DIR).exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

/// Log filter from the board's config, for use before a board is opened.
pub fn configured_log_filter() -> String {
    BoardConfig::load(&find_project_root().join(BOARD_DIR))
        .map(|config| config.log_filter)
        .unwrap_or_else(|_| "info".to_string())
}

fn open_board(root: &Path) -> Result<Board<LoroNoteStore>> {
    let store = LoroNoteStore::open(root)?;
    let config = BoardConfig::load(&root.join(BOARD_DIR))?;
    Board::new(store, config)
}

fn short_id(key: &NoteKey) -> String {
    match key {
        NoteKey::Durable(id) => id.short(),
        NoteKey::Provisional(id) => id.to_string(),
    }
}

fn summary(note: &Note) -> String {
    match note.kind {
        NoteKind::Image => match ImagePayload::from_data_url(&note.content) {
            Some(image) => format!("[image {}, {} bytes]", image.media_type, image.bytes.len()),
            None => "[image]".to_string(),
        },
        NoteKind::Text => {
            let line = note.content.lines().next().unwrap_or("");
            if line.chars().count() > SUMMARY_WIDTH {
                let cut: String = line.chars().take(SUMMARY_WIDTH - 3).collect();
                format!("{}...", cut)
            } else {
                line.to_string()
            }
        }
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    }
}

fn submit_blocking<C, G>(
    board: &mut Board<LoroNoteStore>,
    composer: Composer<C, G>,
    text: &str,
) -> Result<Submitted>
where
    C: Classifier,
    G: ImageGenerator,
{
    let composer = composer.with_timeouts(
        board.config().classify_timeout(),
        board.config().generate_timeout(),
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(board.submit(&composer, text))
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    let store = LoroNoteStore::init(&root)?;
    if let Some(dir) = store.board_dir() {
        BoardConfig::default().save(dir)?;
    }

    println!("Initialized stickyboard board in {}", root.display());
    Ok(())
}

pub fn handle_add(text: String, icon: Option<PathBuf>, json: bool) -> Result<()> {
    let root = find_project_root();
    let mut board = open_board(&root)?;

    let submitted = match icon {
        Some(path) => {
            let bytes = fs::read(&path)?;
            let image = ImagePayload::new(media_type_for(&path), bytes);
            debug!(path = %path.display(), media_type = %image.media_type, "using icon file");
            let composer = Composer::new(FixedClassifier(NoteKind::Image), StaticImage(image));
            submit_blocking(&mut board, composer, &text)?
        }
        None => {
            let composer = Composer::new(FixedClassifier(NoteKind::Text), NoImageGenerator);
            submit_blocking(&mut board, composer, &text)?
        }
    };

    board.store().save()?;

    if let Some(notice) = &submitted.notice {
        eprintln!("Warning: {}", notice);
    }

    let note = &submitted.note;
    if json {
        println!("{}", serde_json::to_string_pretty(note)?);
    } else {
        println!(
            "Created {} note {} at ({:.0}, {:.0}) - {}",
            note.kind,
            short_id(&note.key),
            note.position.x,
            note.position.y,
            summary(note)
        );
    }

    Ok(())
}

pub fn handle_list(json: bool) -> Result<()> {
    let root = find_project_root();
    let board = open_board(&root)?;
    let notes = board.notes();

    if json {
        println!("{}", serde_json::to_string_pretty(notes.as_slice())?);
    } else if notes.is_empty() {
        println!("No notes found.");
    } else {
        println!("Notes (back to front):\n");
        for note in notes {
            println!(
                "  {}  z={:<3} ({:>4.0}, {:>4.0})  {}",
                short_id(&note.key),
                note.z_index,
                note.position.x,
                note.position.y,
                summary(note)
            );
        }
    }

    Ok(())
}

pub fn handle_move(id: String, x: f64, y: f64) -> Result<()> {
    let root = find_project_root();
    let mut board = open_board(&root)?;

    let key = board.resolve(&id)?;
    let note = board
        .notes()
        .get(&key)
        .cloned()
        .ok_or_else(|| BoardError::NoteNotFound(id.clone()))?;
    let size = board.config().rendered_size(note.kind);

    // Grab the note by its top-left corner so the pointer is the target.
    board.pick_up(&key, note.position, size)?;
    board.drag_to(Point::new(x, y));
    let commit = board.release()?;

    board.store().save()?;

    match commit {
        Some(commit) => println!(
            "Moved note {} to ({:.0}, {:.0})",
            short_id(&key),
            commit.position.x,
            commit.position.y
        ),
        None => println!("Note {} was not moved", short_id(&key)),
    }

    Ok(())
}

pub fn handle_front(id: String) -> Result<()> {
    let root = find_project_root();
    let mut board = open_board(&root)?;

    let key = board.resolve(&id)?;
    if board.bring_to_front(&key)? {
        board.store().save()?;
        let z_index = board.notes().get(&key).map(|n| n.z_index).unwrap_or_default();
        println!("Brought note {} to front (z={})", short_id(&key), z_index);
    } else {
        println!("Note {} is already in front", short_id(&key));
    }

    Ok(())
}

pub fn handle_delete(id: String) -> Result<()> {
    let root = find_project_root();
    let mut board = open_board(&root)?;

    let key = board.resolve(&id)?;
    board.delete(&key)?;
    board.store().save()?;

    println!("Deleted note {}", short_id(&key));
    Ok(())
}

pub fn handle_merge(file: PathBuf) -> Result<()> {
    let root = find_project_root();
    let mut board = open_board(&root)?;
    let before = board.notes().len();

    let bytes = fs::read(&file)?;
    board.store_mut().merge(&bytes)?;
    board.poll_changes()?;
    board.store().save()?;

    println!(
        "Merged {}: {} notes (was {})",
        file.display(),
        board.notes().len(),
        before
    );
    Ok(())
}

pub fn handle_export(path: PathBuf) -> Result<()> {
    let root = find_project_root();
    let store = LoroNoteStore::open(&root)?;

    let bytes = store.export_snapshot()?;
    fs::write(&path, &bytes)?;

    println!(
        "Exported {} notes to {} ({} bytes)",
        store.list()?.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{NoteDraft, NoteStyle};

    fn text_note(content: &str) -> Note {
        Note::from_draft(
            NoteKey::Durable(crate::entity::NoteId::new()),
            NoteDraft {
                kind: NoteKind::Text,
                content: content.to_string(),
                position: Point::new(0.0, 0.0),
                z_index: 1,
                style: NoteStyle::neutral("bg-white"),
                status: None,
            },
        )
    }

    #[test]
    fn test_summary_truncates_long_text() {
        let long = "x".repeat(100);
        let shown = summary(&text_note(&long));
        assert_eq!(shown.chars().count(), SUMMARY_WIDTH);
        assert!(shown.ends_with("..."));
        assert_eq!(summary(&text_note("first\nsecond")), "first");
    }

    #[test]
    fn test_summary_describes_images() {
        let mut note = text_note("");
        note.kind = NoteKind::Image;
        note.content = ImagePayload::png(vec![1, 2, 3]).to_data_url();
        assert_eq!(summary(&note), "[image image/png, 3 bytes]");
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(media_type_for(Path::new("cat.PNG")), "image/png");
        assert_eq!(media_type_for(Path::new("cat.jpeg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("cat")), "image/png");
    }
}
