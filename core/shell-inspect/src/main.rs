//! shell-inspect: operator CLI for the workspace shell runtime.
//!
//! Reads the same storage the shell writes, so it can show or reset a
//! persisted workspace session, preview the boot plan a scope would get, and
//! print the lifecycle throttle table.
//!
//! ## Subcommands
//!
//! - `session show|reset|keys`: inspect persisted workspace sessions
//! - `boot`: resolve the boot mode for a scope and print its plan
//! - `throttle`: print refresh intervals for every lifecycle state

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shell-inspect")]
#[command(about = "Inspect workspace shell sessions, boot plans and throttling")]
#[command(version)]
struct Cli {
    /// Storage root (defaults to ~/.workspace-shell)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Also write daily-rotated logs into this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect persisted workspace sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Resolve the boot mode for a scope and print its plan
    Boot {
        /// Session scope whose recency decides cold vs resume
        #[arg(long, default_value = "default")]
        scope: String,

        /// Collapse animated transitions to instant
        #[arg(long)]
        reduced_motion: bool,
    },

    /// Print refresh intervals for every lifecycle state
    Throttle {
        /// Base refresh interval in milliseconds
        #[arg(value_name = "BASE_MS")]
        base_ms: u64,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print the hydrated snapshot for a scope as JSON
    Show {
        #[arg(value_name = "SCOPE")]
        scope: String,
    },

    /// Delete the stored snapshot for a scope
    Reset {
        #[arg(value_name = "SCOPE")]
        scope: String,
    },

    /// List every stored record key
    Keys,
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.log_dir.as_deref());

    let context = match commands::Context::resolve(cli.root) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve storage root");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Session { action } => match action {
            SessionAction::Show { scope } => commands::session_show(&context, &scope),
            SessionAction::Reset { scope } => commands::session_reset(&context, &scope),
            SessionAction::Keys => commands::session_keys(&context),
        },
        Commands::Boot {
            scope,
            reduced_motion,
        } => commands::boot(&context, &scope, reduced_motion),
        Commands::Throttle { base_ms } => {
            commands::throttle(base_ms);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "shell-inspect failed");
        std::process::exit(1);
    }
}
