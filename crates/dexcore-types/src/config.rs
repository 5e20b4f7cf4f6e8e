//! Exchange configuration.

use serde::{Deserialize, Serialize};

use crate::{DexError, Result, constants};

/// Tunables for one exchange instance. The fee schedule is fixed and not
/// configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Committed events retained before the oldest are evicted.
    pub event_log_capacity: usize,
    /// Maximum number of simultaneously open orders per owner.
    pub max_open_orders_per_owner: usize,
    /// Maximum swap path length in tokens.
    pub max_path_len: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: constants::DEFAULT_EVENT_LOG_CAPACITY,
            max_open_orders_per_owner: constants::DEFAULT_MAX_OPEN_ORDERS_PER_OWNER,
            max_path_len: constants::DEFAULT_MAX_PATH_LEN,
        }
    }
}

impl ExchangeConfig {
    /// Parse from JSON, filling missing fields with defaults, then validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.event_log_capacity == 0 {
            return Err(DexError::Configuration(
                "event_log_capacity must be > 0".into(),
            ));
        }
        if self.max_open_orders_per_owner == 0 {
            return Err(DexError::Configuration(
                "max_open_orders_per_owner must be > 0".into(),
            ));
        }
        if self.max_path_len < constants::MIN_PATH_LEN {
            return Err(DexError::Configuration(format!(
                "max_path_len must be >= {}",
                constants::MIN_PATH_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ExchangeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_path_len, 4);
        assert_eq!(cfg.max_open_orders_per_owner, 200);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = ExchangeConfig::from_json(r#"{"max_path_len": 2}"#).unwrap();
        assert_eq!(cfg.max_path_len, 2);
        assert_eq!(
            cfg.event_log_capacity,
            constants::DEFAULT_EVENT_LOG_CAPACITY
        );
    }

    #[test]
    fn invalid_values_rejected() {
        let err = ExchangeConfig::from_json(r#"{"max_path_len": 1}"#).unwrap_err();
        assert!(matches!(err, DexError::Configuration(_)));

        let cfg = ExchangeConfig {
            event_log_capacity: 0,
            ..ExchangeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = ExchangeConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, DexError::Serialization(_)));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = ExchangeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ExchangeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
