// External crates
use clap::Parser;
use tracing::{debug, error};

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    if let Err(e) = lima_logging::init_with_defaults(default_filter) {
        eprintln!("Warning: {}", e);
    }
    debug!("running {:?}", args.command);

    // Execute the command and handle any top-level errors
    if let Err(e) = execute_command(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
