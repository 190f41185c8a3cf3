use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "stickyboard")]
#[command(version, about = "A collaborative sticky-note whiteboard")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new board in the current directory
    Init,

    /// Add a note to the board
    Add {
        /// Note text
        text: String,

        /// PNG (or other image) file to use as the note's icon
        #[arg(long, value_name = "FILE")]
        icon: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List notes, back to front
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drag a note so its top-left corner lands at (x, y)
    Move {
        /// Note ID (UUID prefix like "a1b2c")
        id: String,

        #[arg(allow_negative_numbers = true)]
        x: f64,

        #[arg(allow_negative_numbers = true)]
        y: f64,
    },

    /// Bring a note in front of all others
    Front {
        /// Note ID (UUID prefix like "a1b2c")
        id: String,
    },

    /// Delete a note
    Delete {
        /// Note ID (UUID prefix like "a1b2c")
        id: String,
    },

    /// Merge a peer's board snapshot into this board
    Merge {
        /// Path to a board.loro file exported by another peer
        file: PathBuf,
    },

    /// Export this board as a snapshot for another peer
    Export {
        /// Destination file
        path: PathBuf,
    },
}
