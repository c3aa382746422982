//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod server;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, ServerSubcommand};
use crate::error::SlimyError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), SlimyError> {
    match cli.command {
        Commands::Server(cmd) => match cmd.subcommand {
            ServerSubcommand::Run(args) => server::run(&args, cancel).await,
            ServerSubcommand::Validate(args) => server::validate(&args),
        },
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
