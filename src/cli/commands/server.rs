//! Server command handlers
//!
//! Implements `server run` and `server validate`.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{OutputFormat, ServerRunArgs, ServerValidateArgs};
use crate::config::loader::{ConfigLoader, LoadResult};
use crate::error::{ConfigError, Severity, SlimyError, ValidationIssue};
use crate::server::{AppState, Server, slime_catalog, user_store};
use crate::transport::HttpConfig;

/// Start the game backend and serve until `cancel` fires.
///
/// # Errors
///
/// Returns a config error if the configuration cannot be loaded, or a
/// transport error if the listener cannot be bound.
pub async fn run(args: &ServerRunArgs, cancel: CancellationToken) -> Result<(), SlimyError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    if let Some(ref path) = args.config {
        tracing::info!(config = %path.display(), "loading configuration");
    }
    let LoadResult { config, warnings } =
        ConfigLoader::default().load_or_default(args.config.as_ref())?;
    log_warnings(&warnings);

    let mut http_section = config.http.clone();
    if let Some(ref bind) = args.bind {
        http_section.bind.clone_from(bind);
    }
    let http = HttpConfig::from_section(&http_section)?;

    let users = user_store(&config.store)?;
    let catalog = Arc::new(slime_catalog(&config.catalog));
    tracing::info!(
        store = ?config.store.kind,
        wild_slimes = config.catalog.wild.len(),
        hunter_slimes = config.catalog.hunters.len(),
        "durable collaborators ready"
    );

    let state = Arc::new(AppState::new(&config, users, catalog));
    Server::new(&config, http, state, cancel).run().await
}

/// Validate configuration files without starting the server.
///
/// # Errors
///
/// Returns a config error for the first file that fails to load or
/// validate (including warnings under `--strict`).
pub fn validate(args: &ServerValidateArgs) -> Result<(), SlimyError> {
    let loader = ConfigLoader::default();
    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let result = loader.load(path)?;
        log_warnings(&result.warnings);

        if args.strict && !result.warnings.is_empty() {
            return Err(strict_failure(path, &result.warnings).into());
        }
        println!("{}", render_report(path, &result.warnings, args.format));
    }
    Ok(())
}

fn log_warnings(warnings: &[ValidationIssue]) {
    for warning in warnings {
        tracing::warn!(location = %warning.path, "{}", warning.message);
    }
}

/// Promotes warnings to errors for `--strict`.
fn strict_failure(path: &Path, warnings: &[ValidationIssue]) -> ConfigError {
    ConfigError::ValidationError {
        path: path.display().to_string(),
        errors: warnings
            .iter()
            .map(|w| ValidationIssue {
                severity: Severity::Error,
                ..w.clone()
            })
            .collect(),
    }
}

fn render_report(path: &Path, warnings: &[ValidationIssue], format: OutputFormat) -> String {
    match format {
        OutputFormat::Human if warnings.is_empty() => format!("{}: ok", path.display()),
        OutputFormat::Human => format!(
            "{}: ok ({} warning{})",
            path.display(),
            warnings.len(),
            if warnings.len() == 1 { "" } else { "s" }
        ),
        OutputFormat::Json => json!({
            "file": path.display().to_string(),
            "valid": true,
            "warnings": warnings
                .iter()
                .map(|w| json!({ "path": w.path, "message": w.message }))
                .collect::<Vec<_>>(),
        })
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn validate_args(files: Vec<PathBuf>, strict: bool) -> ServerValidateArgs {
        ServerValidateArgs {
            files,
            format: OutputFormat::Human,
            strict,
        }
    }

    #[test]
    fn validate_accepts_good_file() {
        let file = config_file("presence:\n  online_window: 20s\n");
        let args = validate_args(vec![file.path().to_path_buf()], false);
        assert!(validate(&args).is_ok());
    }

    #[test]
    fn validate_rejects_bad_file() {
        let file = config_file("fight:\n  catch_probability: 2.0\n");
        let args = validate_args(vec![file.path().to_path_buf()], false);
        assert!(matches!(
            validate(&args),
            Err(SlimyError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[test]
    fn validate_strict_promotes_warnings() {
        let file = config_file("fight:\n  catch_probability: 0.0\n");
        let lenient = validate_args(vec![file.path().to_path_buf()], false);
        assert!(validate(&lenient).is_ok());

        let strict = validate_args(vec![file.path().to_path_buf()], true);
        assert!(validate(&strict).is_err());
    }

    #[test]
    fn validate_missing_file() {
        let args = validate_args(vec![PathBuf::from("/nonexistent/slimy.yaml")], false);
        assert!(matches!(
            validate(&args),
            Err(SlimyError::Config(ConfigError::MissingFile { .. }))
        ));
    }

    #[test]
    fn report_formats() {
        let warning = ValidationIssue {
            path: "store.url".to_string(),
            message: "ignored".to_string(),
            severity: Severity::Warning,
        };
        let path = Path::new("slimy.yaml");
        assert_eq!(
            render_report(path, &[], OutputFormat::Human),
            "slimy.yaml: ok"
        );
        assert_eq!(
            render_report(path, std::slice::from_ref(&warning), OutputFormat::Human),
            "slimy.yaml: ok (1 warning)"
        );
        let value: serde_json::Value =
            serde_json::from_str(&render_report(path, &[warning], OutputFormat::Json)).unwrap();
        assert_eq!(value["warnings"][0]["path"], "store.url");
    }

    #[tokio::test]
    async fn run_rejects_bad_bind() {
        let args = ServerRunArgs {
            config: None,
            bind: Some("not-an-address".to_string()),
            metrics_port: None,
        };
        let result = run(&args, CancellationToken::new()).await;
        assert!(matches!(result, Err(SlimyError::Transport(_))));
    }
}
