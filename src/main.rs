use clap::Parser;
use stickyboard::cli::{
    configured_log_filter, handle_add, handle_delete, handle_export, handle_front, handle_init,
    handle_list, handle_merge, handle_move, Cli, Commands,
};
use stickyboard::logging::init_logging;

fn main() {
    let cli = Cli::parse();

    init_logging(&configured_log_filter());

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Add { text, icon, json } => handle_add(text, icon, json),
        Commands::List { json } => handle_list(json),
        Commands::Move { id, x, y } => handle_move(id, x, y),
        Commands::Front { id } => handle_front(id),
        Commands::Delete { id } => handle_delete(id),
        Commands::Merge { file } => handle_merge(file),
        Commands::Export { path } => handle_export(path),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
