mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{
    configured_log_filter, handle_add, handle_delete, handle_export, handle_front, handle_init,
    handle_list, handle_merge, handle_move,
};
