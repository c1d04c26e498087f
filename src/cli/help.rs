//! CLI help: command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string recorded on the command span (e.g. "gallery", "hash_password").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Serve { .. } => "serve",
        Commands::Gallery { .. } => "gallery",
        Commands::Tags { .. } => "tags",
        Commands::Upload { .. } => "upload",
        Commands::Analytics { .. } => "analytics",
        Commands::Login { .. } => "login",
        Commands::Logout => "logout",
        Commands::Whoami => "whoami",
        Commands::HashPassword => "hash_password",
        Commands::Config { .. } => "config",
    }
}

/// Whether the command needs a signed-in admin session.
pub fn requires_admin(command: &Commands) -> bool {
    matches!(command, Commands::Upload { .. } | Commands::Analytics { .. })
}
