//! Keeping the local view and the shared store in step while the user is
//! mid-interaction.

mod buffer;
mod gate;

pub use buffer::{Disposition, ReconciliationBuffer, ViewUpdate};
pub use gate::{ChangeGate, Missed};
