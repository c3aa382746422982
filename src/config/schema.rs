//! Configuration schema types
//!
//! Deserialized from a YAML file. Every field has a default, so an empty
//! mapping (or no file at all) yields a working in-memory server.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fight::{FightRules, SlimeFight};
use crate::presence::MirrorPolicy;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a `Slimy` server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listener settings
    pub http: HttpSection,

    /// Combat rules and fight retention
    pub fight: FightSection,

    /// Presence windows and mirror policy
    pub presence: PresenceSection,

    /// Durable user store
    pub store: StoreSection,

    /// Slimes served by the in-memory catalog
    pub catalog: CatalogSection,
}

// ============================================================================
// Sections
// ============================================================================

/// `http:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    /// Bind address (`host:port` or bare port)
    pub bind: String,

    /// Maximum request body size in bytes
    pub max_body_bytes: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// `fight:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FightSection {
    /// Attack multiplier applied by Buff, in percent
    pub buff_percent: u16,

    /// HP restored by Heal
    pub heal_amount: u8,

    /// Chance that Catch succeeds on a downed wild slime
    pub catch_probability: f64,

    /// Hold the fight in `WaitingOnTx` after each turn until acknowledged
    pub require_acknowledgment: bool,

    /// How long a finished fight stays readable
    #[serde(with = "duration_str")]
    pub terminal_grace: Duration,

    /// How long an unfinished fight may sit without a move before it is
    /// dropped and its wild slime freed
    #[serde(with = "duration_str")]
    pub idle_timeout: Duration,

    /// Interval of the finished-fight sweeper
    #[serde(with = "duration_str")]
    pub sweep_interval: Duration,
}

impl Default for FightSection {
    fn default() -> Self {
        let rules = FightRules::default();
        Self {
            buff_percent: rules.buff_percent,
            heal_amount: rules.heal_amount,
            catch_probability: rules.catch_probability,
            require_acknowledgment: rules.require_acknowledgment,
            terminal_grace: crate::fight::store::DEFAULT_TERMINAL_GRACE,
            idle_timeout: crate::fight::store::DEFAULT_IDLE_TIMEOUT,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl FightSection {
    /// Combat rules described by this section.
    #[must_use]
    pub const fn rules(&self) -> FightRules {
        FightRules {
            buff_percent: self.buff_percent,
            heal_amount: self.heal_amount,
            catch_probability: self.catch_probability,
            require_acknowledgment: self.require_acknowledgment,
        }
    }
}

/// `presence:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceSection {
    /// Staleness bound for "is online"
    #[serde(with = "duration_str")]
    pub online_window: Duration,

    /// Age at which an entry is swept and the user marked offline
    #[serde(with = "duration_str")]
    pub retention: Duration,

    /// Interval of the presence reaper
    #[serde(with = "duration_str")]
    pub sweep_interval: Duration,

    /// Per-attempt timeout of durable online-flag writes
    #[serde(with = "duration_str")]
    pub mirror_timeout: Duration,

    /// Attempts per durable online-flag write
    pub mirror_attempts: u32,

    /// Pause between attempts
    #[serde(with = "duration_str")]
    pub mirror_backoff: Duration,
}

impl Default for PresenceSection {
    fn default() -> Self {
        let mirror = MirrorPolicy::default();
        Self {
            online_window: crate::presence::DEFAULT_ONLINE_WINDOW,
            retention: crate::presence::DEFAULT_RETENTION,
            sweep_interval: crate::presence::DEFAULT_SWEEP_INTERVAL,
            mirror_timeout: mirror.timeout,
            mirror_attempts: mirror.max_attempts,
            mirror_backoff: mirror.backoff,
        }
    }
}

impl PresenceSection {
    /// Mirror write policy described by this section.
    #[must_use]
    pub const fn mirror_policy(&self) -> MirrorPolicy {
        MirrorPolicy {
            timeout: self.mirror_timeout,
            max_attempts: self.mirror_attempts,
            backoff: self.mirror_backoff,
        }
    }
}

/// Backend of the durable user store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Process-local tables
    #[default]
    Memory,
    /// Remote account service
    Http,
}

/// `store:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Store backend
    pub kind: StoreKind,

    /// Base URL of the account service (required for `http`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Per-request timeout
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            url: None,
            timeout: crate::durable::http::DEFAULT_TIMEOUT,
        }
    }
}

/// Combat stats of a catalog slime; it enters a fight at full HP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlimeStats {
    /// Attack stat
    pub attack: u8,
    /// Defense stat
    #[serde(rename = "def")]
    pub defense: u8,
    /// Maximum hit points
    pub max_hp: u8,
}

impl SlimeStats {
    /// Fight stats at full HP.
    #[must_use]
    pub const fn to_fight(self) -> SlimeFight {
        SlimeFight::new(self.attack, self.defense, self.max_hp)
    }
}

/// A slime owned by a hunter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HunterSlime {
    /// Owning hunter identity
    pub hunter: String,
    /// Slime identifier
    pub slime_id: u64,
    /// Combat stats
    pub stats: SlimeStats,
}

/// `catalog:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    /// Wild slimes by id
    pub wild: BTreeMap<u64, SlimeStats>,

    /// Hunter-owned slimes
    pub hunters: Vec<HunterSlime>,
}

// ============================================================================
// Duration Strings
// ============================================================================

/// Serde adapter for humantime durations (`"30s"`, `"5m"`, `"250ms"`).
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(|e| D::Error::custom(format!("{raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mapping_uses_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.http.max_body_bytes, 65_536);
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.fight.rules(), FightRules::default());
    }

    #[test]
    fn test_durations_parse_humantime() {
        let yaml = "
presence:
  online_window: 45s
  retention: 10m
  mirror_backoff: 250ms
fight:
  terminal_grace: 2m
  idle_timeout: 15m
";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.presence.online_window, Duration::from_secs(45));
        assert_eq!(config.presence.retention, Duration::from_secs(600));
        assert_eq!(config.presence.mirror_backoff, Duration::from_millis(250));
        assert_eq!(config.fight.terminal_grace, Duration::from_secs(120));
        assert_eq!(config.fight.idle_timeout, Duration::from_secs(900));
        // untouched fields keep defaults
        assert_eq!(config.presence.mirror_attempts, 3);
    }

    #[test]
    fn test_bad_duration_rejected() {
        let err = serde_yaml::from_str::<ServerConfig>("presence:\n  online_window: soon\n")
            .unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_yaml::from_str::<ServerConfig>("fight:\n  crit_chance: 0.5\n").is_err());
    }

    #[test]
    fn test_http_store_section() {
        let yaml = "
store:
  kind: http
  url: http://accounts.internal/api
  timeout: 1s
";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.store.kind, StoreKind::Http);
        assert_eq!(config.store.url.as_deref(), Some("http://accounts.internal/api"));
        assert_eq!(config.store.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_catalog_section() {
        let yaml = "
catalog:
  wild:
    7: { attack: 5, def: 3, max_hp: 15 }
  hunters:
    - hunter: alice
      slime_id: 1
      stats: { attack: 10, def: 2, max_hp: 20 }
";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        let wild = config.catalog.wild[&7].to_fight();
        assert_eq!(wild.current_hp, 15);
        assert_eq!(wild.defense, 3);
        assert_eq!(config.catalog.hunters[0].hunter, "alice");
        assert_eq!(config.catalog.hunters[0].stats.attack, 10);
    }

    #[test]
    fn test_serializes_back_to_humantime() {
        let yaml = serde_yaml::to_string(&ServerConfig::default()).unwrap();
        assert!(yaml.contains("online_window: 30s"));
        assert!(yaml.contains("retention: 5m"));
    }
}
