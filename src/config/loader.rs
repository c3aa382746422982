//! Configuration loader
//!
//! Pipeline:
//! 1. Size check
//! 2. Environment variable expansion (on raw text)
//! 3. YAML parsing
//! 4. Validation
//! 5. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::{ServerConfig, StoreKind};
use crate::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Default maximum configuration file size.
pub const DEFAULT_MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<ServerConfig>,

    /// Non-fatal findings (unset variables, suspicious values).
    pub warnings: Vec<ValidationIssue>,
}

/// Configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    max_config_size: u64,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            max_config_size: env_or("SLIMY_MAX_CONFIG_SIZE", DEFAULT_MAX_CONFIG_SIZE),
        }
    }
}

impl ConfigLoader {
    /// Creates a loader with an explicit size limit.
    #[must_use]
    pub const fn new(max_config_size: u64) -> Self {
        Self { max_config_size }
    }

    /// Loads, validates and freezes a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, a required
    /// environment variable is unset, YAML parsing fails, or validation
    /// reports at least one error.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        if metadata.len() > self.max_config_size {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&raw, path)
    }

    /// Runs the pipeline on already-read text; `origin` is used in messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file checks.
    pub fn load_str(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut warnings = Vec::new();
        let expanded = expand_env(raw, origin, &mut warnings)?;

        // An empty file means "all defaults".
        let config: ServerConfig = if expanded.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let (errors, found_warnings): (Vec<_>, Vec<_>) = validate(&config)
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors,
            });
        }
        warnings.extend(found_warnings);

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }

    /// Loads `path` if given, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_or_default(&self, path: Option<&PathBuf>) -> Result<LoadResult, ConfigError> {
        match path {
            Some(path) => self.load(path),
            None => Ok(LoadResult {
                config: Arc::new(ServerConfig::default()),
                warnings: Vec::new(),
            }),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks cross-field rules and collects every issue found.
#[must_use]
pub fn validate(config: &ServerConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut error = |path: &str, message: String| {
        issues.push(ValidationIssue {
            path: path.to_string(),
            message,
            severity: Severity::Error,
        });
    };

    let fight = &config.fight;
    if !(0.0..=1.0).contains(&fight.catch_probability) {
        error(
            "fight.catch_probability",
            format!("must be within [0, 1], got {}", fight.catch_probability),
        );
    }
    if fight.buff_percent < 100 {
        error(
            "fight.buff_percent",
            format!("must be at least 100, got {}", fight.buff_percent),
        );
    }
    if fight.sweep_interval.is_zero() {
        error("fight.sweep_interval", "must be non-zero".to_string());
    }
    if fight.idle_timeout.is_zero() {
        error("fight.idle_timeout", "must be non-zero".to_string());
    }

    let presence = &config.presence;
    for (path, value) in [
        ("presence.online_window", presence.online_window),
        ("presence.retention", presence.retention),
        ("presence.sweep_interval", presence.sweep_interval),
        ("presence.mirror_timeout", presence.mirror_timeout),
    ] {
        if value.is_zero() {
            error(path, "must be non-zero".to_string());
        }
    }
    if presence.retention < presence.online_window {
        error(
            "presence.retention",
            "must not be shorter than presence.online_window".to_string(),
        );
    }
    if presence.mirror_attempts == 0 {
        error("presence.mirror_attempts", "must be at least 1".to_string());
    }

    if config.http.max_body_bytes == 0 {
        error("http.max_body_bytes", "must be non-zero".to_string());
    }

    if config.store.kind == StoreKind::Http && config.store.url.is_none() {
        error("store.url", "required when store.kind is http".to_string());
    }
    if config.store.timeout.is_zero() {
        error("store.timeout", "must be non-zero".to_string());
    }

    for (id, stats) in &config.catalog.wild {
        if stats.max_hp == 0 {
            error(&format!("catalog.wild.{id}.max_hp"), "must be non-zero".to_string());
        }
    }
    for (i, owned) in config.catalog.hunters.iter().enumerate() {
        if owned.stats.max_hp == 0 {
            error(
                &format!("catalog.hunters[{i}].stats.max_hp"),
                "must be non-zero".to_string(),
            );
        }
        if owned.hunter.is_empty() {
            error(&format!("catalog.hunters[{i}].hunter"), "must not be empty".to_string());
        }
    }

    if config.fight.catch_probability <= 0.0 {
        issues.push(ValidationIssue {
            path: "fight.catch_probability".to_string(),
            message: "catching is disabled".to_string(),
            severity: Severity::Warning,
        });
    }
    if config.store.kind == StoreKind::Memory && config.store.url.is_some() {
        issues.push(ValidationIssue {
            path: "store.url".to_string(),
            message: "ignored for the memory store".to_string(),
            severity: Severity::Warning,
        });
    }

    issues
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expands `${VAR}`, `${VAR:-default}` and `${VAR:?message}`; `$$` is a
/// literal `$`.
///
/// An unset variable without default expands to nothing and leaves a warning.
fn expand_env(
    raw: &str,
    origin: &Path,
    warnings: &mut Vec<ValidationIssue>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(spec) = tail.strip_prefix('{') {
            let close = spec.find('}').ok_or_else(|| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: format!(
                    "unclosed environment variable reference: ${{{}",
                    spec.lines().next().unwrap_or_default()
                ),
            })?;
            let body = &spec[..close];
            let (name, default, required) = if let Some((name, d)) = body.split_once(":-") {
                (name, Some(d), None)
            } else if let Some((name, msg)) = body.split_once(":?") {
                (name, None, Some(msg))
            } else {
                (body, None, None)
            };

            match (std::env::var(name), default, required) {
                (Ok(value), _, _) => out.push_str(&value),
                (Err(_), Some(default), _) => out.push_str(default),
                (Err(_), None, Some(message)) => {
                    return Err(ConfigError::EnvVarNotSet {
                        var: name.to_string(),
                        location: format!("{} ({message})", origin.display()),
                    });
                }
                (Err(_), None, None) => warnings.push(ValidationIssue {
                    path: origin.display().to_string(),
                    message: format!("environment variable '{name}' is not set, using empty string"),
                    severity: Severity::Warning,
                }),
            }
            rest = &spec[close + 1..];
        } else {
            out.push('$');
            rest = tail;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
