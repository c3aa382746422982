//! CLI argument definitions
//!
//! All Clap derive structs for `slimy` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Fight engine and presence backend for the Slimy game.
#[derive(Parser, Debug)]
#[command(name = "slimy", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "SLIMY_COLOR")]
    pub color: ColorChoice,

    /// Log line format.
    #[arg(long, default_value = "human", global = true, env = "SLIMY_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run or check the game backend.
    Server(ServerCommand),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Server Command
// ============================================================================

/// Server management commands.
#[derive(Args, Debug)]
pub struct ServerCommand {
    /// Server subcommand.
    #[command(subcommand)]
    pub subcommand: ServerSubcommand,
}

/// Server subcommands.
#[derive(Subcommand, Debug)]
pub enum ServerSubcommand {
    /// Start the HTTP backend.
    Run(ServerRunArgs),

    /// Validate configuration files without starting the server.
    Validate(ServerValidateArgs),
}

/// Arguments for `server run`.
#[derive(Args, Debug)]
pub struct ServerRunArgs {
    /// Path to YAML configuration file (defaults apply when omitted).
    #[arg(short, long, env = "SLIMY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the bind address (`[host]:port`).
    #[arg(long, env = "SLIMY_BIND")]
    pub bind: Option<String>,

    /// Expose Prometheus metrics on `127.0.0.1:<port>`.
    #[arg(long, env = "SLIMY_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `server validate`.
#[derive(Args, Debug)]
pub struct ServerValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Version
// ============================================================================

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(cli: Cli) -> ServerRunArgs {
        match cli.command {
            Commands::Server(ServerCommand {
                subcommand: ServerSubcommand::Run(args),
            }) => args,
            other => panic!("expected server run, got {other:?}"),
        }
    }

    #[test]
    fn test_server_run_without_config() {
        let cli = Cli::try_parse_from(["slimy", "server", "run"]);
        assert!(cli.is_ok(), "Failed to parse: {cli:?}");
    }

    #[test]
    fn test_server_run_overrides() {
        let cli = Cli::try_parse_from([
            "slimy",
            "server",
            "run",
            "--config",
            "slimy.yaml",
            "--bind",
            ":9000",
            "--metrics-port",
            "9100",
        ])
        .unwrap();
        let args = run_args(cli);
        assert_eq!(args.config, Some(PathBuf::from("slimy.yaml")));
        assert_eq!(args.bind.as_deref(), Some(":9000"));
        assert_eq!(args.metrics_port, Some(9100));
    }

    #[test]
    fn test_invalid_metrics_port() {
        let result = Cli::try_parse_from(["slimy", "server", "run", "--metrics-port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_output() {
        let err = Cli::try_parse_from(["slimy", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["slimy", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_server_validate_requires_files() {
        assert!(Cli::try_parse_from(["slimy", "server", "validate"]).is_err());
        assert!(Cli::try_parse_from(["slimy", "server", "validate", "a.yaml", "b.yaml"]).is_ok());
    }

    #[test]
    fn test_color_choices_parse() {
        for variant in ["auto", "always", "never"] {
            let cli = Cli::try_parse_from(["slimy", "--color", variant, "version"]);
            assert!(cli.is_ok(), "Failed to parse color={variant}");
        }
    }

    #[test]
    fn test_log_format_parse() {
        let cli = Cli::try_parse_from(["slimy", "--log-format", "json", "version"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_verbose_count() {
        let cli = Cli::try_parse_from(["slimy", "-vvv", "server", "run"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::try_parse_from(["slimy", "--quiet", "version"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_exit_code_mapping() {
        use crate::error::{ConfigError, ExitCode, SlimyError, StoreError, TransportError};

        let cases: Vec<(SlimyError, i32)> = vec![
            (
                ConfigError::MissingFile {
                    path: PathBuf::from("/x"),
                }
                .into(),
                ExitCode::CONFIG_ERROR,
            ),
            (
                TransportError::BindFailed("x".into()).into(),
                ExitCode::TRANSPORT_ERROR,
            ),
            (StoreError::Network("x".into()).into(), ExitCode::ERROR),
            (
                std::io::Error::new(std::io::ErrorKind::NotFound, "x").into(),
                ExitCode::IO_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.exit_code(), expected, "Wrong exit code for {err}");
        }
    }
}
