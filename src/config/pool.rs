//! Pool configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::Tag;

/// Declarative pool configuration.
///
/// Named reservations are keyed by tag name; the generic overflow group is
/// configured separately since its tag has no name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Slots reserved for the generic overflow group.
    #[serde(default)]
    pub generic_slots: usize,
    /// Slots reserved per named tag.
    #[serde(default)]
    pub reservations: HashMap<String, usize>,
    /// Worker threads for the default executor. Defaults to the CPU count.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl PoolConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the configuration reserves no
    /// slots at all or requests a zero-thread executor.
    pub fn validate(&self) -> Result<(), String> {
        let total = self.generic_slots + self.reservations.values().sum::<usize>();
        if total == 0 {
            return Err("at least one slot must be reserved".into());
        }
        if self.worker_threads == Some(0) {
            return Err("worker_threads must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a pool configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reservation map in the form the pool constructor takes, generic
    /// entry included.
    #[must_use]
    pub fn reservation_map(&self) -> HashMap<Tag, usize> {
        let mut map: HashMap<Tag, usize> = self
            .reservations
            .iter()
            .map(|(name, slots)| (Tag::named(name), *slots))
            .collect();
        map.insert(Tag::Generic, self.generic_slots);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty() {
        let cfg = PoolConfig {
            generic_slots: 0,
            reservations: HashMap::new(),
            worker_threads: None,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let cfg = PoolConfig {
            generic_slots: 1,
            reservations: HashMap::new(),
            worker_threads: Some(0),
        };
        assert!(cfg.validate().unwrap_err().contains("worker_threads"));
    }

    #[test]
    fn test_from_json_str() {
        let cfg = PoolConfig::from_json_str(
            r#"{"generic_slots": 2, "reservations": {"gpu": 1, "io": 3}}"#,
        )
        .unwrap();
        assert_eq!(cfg.generic_slots, 2);
        assert_eq!(cfg.reservations["gpu"], 1);
        assert_eq!(cfg.worker_threads, None);

        let map = cfg.reservation_map();
        assert_eq!(map[&Tag::Generic], 2);
        assert_eq!(map[&Tag::named("io")], 3);
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        assert!(PoolConfig::from_json_str("{}").is_err());
        assert!(PoolConfig::from_json_str("not json").is_err());
    }
}
