// Simulator configuration (environment variables)

use anyhow::{bail, Result};
use ticpass_core::domain::{
    AbortCurrentPolicy, ManagerConfig, PersistenceStrategy, ProcessorStartMode,
};

pub const DEFAULT_DB_PATH: &str = "~/.ticpass/queue.db";
pub const DEFAULT_QUEUE: &str = "nfc";

const ENV_DB_PATH: &str = "TICPASS_DB_PATH";
const ENV_PERSISTENCE: &str = "TICPASS_PERSISTENCE";
const ENV_START_MODE: &str = "TICPASS_START_MODE";
const ENV_ABORT_CURRENT: &str = "TICPASS_ABORT_CURRENT";
const ENV_LOG_FORMAT: &str = "TICPASS_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    Pretty,
    /// Production: JSON structured logging
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    pub db_path: String,
    pub manager: ManagerConfig,
    pub log_format: LogFormat,
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source (tests pass a map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = shellexpand::tilde(
            lookup(ENV_DB_PATH)
                .as_deref()
                .unwrap_or(DEFAULT_DB_PATH),
        )
        .into_owned();

        let persistence = match lookup(ENV_PERSISTENCE).as_deref() {
            None | Some("immediate") => PersistenceStrategy::Immediate,
            Some("background") => PersistenceStrategy::OnBackground,
            Some("never") => PersistenceStrategy::Never,
            Some(other) => {
                bail!("{ENV_PERSISTENCE}: expected immediate|background|never, got {other:?}")
            }
        };
        let start_mode = match lookup(ENV_START_MODE).as_deref() {
            None | Some("immediate") => ProcessorStartMode::Immediate,
            Some("confirmation") => ProcessorStartMode::Confirmation,
            Some(other) => {
                bail!("{ENV_START_MODE}: expected immediate|confirmation, got {other:?}")
            }
        };
        let abort_current = match lookup(ENV_ABORT_CURRENT).as_deref() {
            None | Some("cancel") => AbortCurrentPolicy::CancelInPlace,
            Some("remove") => AbortCurrentPolicy::Remove,
            Some(other) => bail!("{ENV_ABORT_CURRENT}: expected cancel|remove, got {other:?}"),
        };
        // Unknown formats fall back to pretty
        let log_format = match lookup(ENV_LOG_FORMAT).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path,
            manager: ManagerConfig::new(persistence, start_mode).with_abort_current(abort_current),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<SimulatorConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SimulatorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.manager, ManagerConfig::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.db_path.ends_with(".ticpass/queue.db"));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("TICPASS_DB_PATH", "/tmp/pos.db"),
            ("TICPASS_PERSISTENCE", "never"),
            ("TICPASS_START_MODE", "confirmation"),
            ("TICPASS_ABORT_CURRENT", "remove"),
            ("TICPASS_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.db_path, "/tmp/pos.db");
        assert_eq!(config.manager.persistence, PersistenceStrategy::Never);
        assert_eq!(config.manager.start_mode, ProcessorStartMode::Confirmation);
        assert_eq!(config.manager.abort_current, AbortCurrentPolicy::Remove);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_background_persistence() {
        let config = config(&[("TICPASS_PERSISTENCE", "background")]).unwrap();
        assert_eq!(config.manager.persistence, PersistenceStrategy::OnBackground);
        assert!(config.manager.persists());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config(&[("TICPASS_PERSISTENCE", "sometimes")]).unwrap_err();
        assert!(err.to_string().contains("TICPASS_PERSISTENCE"));
        assert!(config(&[("TICPASS_ABORT_CURRENT", "drop")]).is_err());
    }
}
