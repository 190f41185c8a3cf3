//! Pointer interactions that take exclusive ownership of the view.

use tracing::{debug, info};

use crate::entity::{Note, NoteKey, Point, Size};
use crate::error::{BoardError, Result};
use crate::view::NoteList;

/// An in-progress drag of a single note.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub key: NoteKey,
    /// Pointer position relative to the note's top-left corner at pick-up.
    pub grab_offset: Point,
    /// Rendered size of the note, used for clamping.
    pub size: Size,
    /// Where the note sat when it was picked up.
    pub origin: Point,
    /// Transient position shown while dragging. Never written to a store.
    pub position: Point,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Final position of a drag, to be written once to the view and the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragCommit {
    pub key: NoteKey,
    pub position: Point,
}

/// Owns the drag state machine. The "drag in progress" flag lives here and
/// nowhere else.
#[derive(Debug)]
pub struct InteractionController {
    state: InteractionState,
    margin: f64,
}

impl InteractionController {
    pub fn new(margin: f64) -> Self {
        Self {
            state: InteractionState::Idle,
            margin,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            InteractionState::Dragging(session) => Some(session),
            InteractionState::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, InteractionState::Dragging(_))
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Start dragging `note`, grabbed at `pointer`.
    pub fn pick_up(&mut self, note: &Note, pointer: Point, size: Size) -> Result<DragSession> {
        if self.is_dragging() {
            return Err(BoardError::AlreadyDragging);
        }
        let session = DragSession {
            key: note.key,
            grab_offset: Point::new(pointer.x - note.position.x, pointer.y - note.position.y),
            size,
            origin: note.position,
            position: note.position,
        };
        info!(note = %note.key, x = note.position.x, y = note.position.y, "note picked up");
        self.state = InteractionState::Dragging(session.clone());
        Ok(session)
    }

    /// Follow the pointer. Returns the clamped transient position, or
    /// `None` while idle.
    pub fn move_to(&mut self, pointer: Point, surface: Size) -> Option<Point> {
        let margin = self.margin;
        let InteractionState::Dragging(session) = &mut self.state else {
            return None;
        };
        let desired = Point::new(
            pointer.x - session.grab_offset.x,
            pointer.y - session.grab_offset.y,
        );
        session.position = clamp_position(desired, session.size, surface, margin);
        Some(session.position)
    }

    /// End the drag and hand back the commit. `None` while idle.
    pub fn release(&mut self) -> Option<DragCommit> {
        match std::mem::take(&mut self.state) {
            InteractionState::Dragging(session) => {
                info!(
                    note = %session.key,
                    x = session.position.x,
                    y = session.position.y,
                    "note released"
                );
                Some(DragCommit {
                    key: session.key,
                    position: session.position,
                })
            }
            InteractionState::Idle => None,
        }
    }

    /// End the drag without committing. Returns the key that was dragged.
    pub fn cancel(&mut self) -> Option<NoteKey> {
        match std::mem::take(&mut self.state) {
            InteractionState::Dragging(session) => {
                debug!(note = %session.key, "drag cancelled");
                Some(session.key)
            }
            InteractionState::Idle => None,
        }
    }
}

/// Clamp a note's top-left corner so the note stays `margin` away from every
/// edge of `surface`. On a surface too small for that, `margin` wins.
pub fn clamp_position(desired: Point, size: Size, surface: Size, margin: f64) -> Point {
    let clamp_axis = |value: f64, note: f64, bound: f64| value.min(bound - note - margin).max(margin);
    Point::new(
        clamp_axis(desired.x, size.width, surface.width),
        clamp_axis(desired.y, size.height, surface.height),
    )
}

/// The `z_index` that would bring `key` to the front of `view`, or `None`
/// if it already is the frontmost note.
pub fn plan_bring_to_front(view: &NoteList, key: &NoteKey) -> Result<Option<i64>> {
    if !view.contains(key) {
        return Err(BoardError::NoteNotFound(key.to_string()));
    }
    if view.frontmost().map(|n| &n.key) == Some(key) {
        return Ok(None);
    }
    Ok(view.max_z().map(|max| max + 1))
}
