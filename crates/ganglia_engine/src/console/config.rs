use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Millis;

pub const DEFAULT_SHIELD_ACTIVE_MS: Millis = 4_000;
pub const DEFAULT_SHIELD_CANCEL_COOLDOWN_MS: Millis = 2_000;
pub const DEFAULT_SHIELD_EXPIRY_COOLDOWN_MS: Millis = 6_000;
pub const DEFAULT_POLL_INTERVAL_MS: Millis = 1_000;
pub const DEFAULT_POLL_TIMEOUT_MS: Millis = 750;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldTimings {
    pub active_ms: Millis,
    /// Cooldown after the player lowers the shield early.
    pub cancel_cooldown_ms: Millis,
    /// Cooldown after the active window runs out.
    pub expiry_cooldown_ms: Millis,
}

impl Default for ShieldTimings {
    fn default() -> Self {
        Self {
            active_ms: DEFAULT_SHIELD_ACTIVE_MS,
            cancel_cooldown_ms: DEFAULT_SHIELD_CANCEL_COOLDOWN_MS,
            expiry_cooldown_ms: DEFAULT_SHIELD_EXPIRY_COOLDOWN_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: Millis,
    pub timeout_ms: Millis,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub shield: ShieldTimings,
    pub poll: PollConfig,
    /// Each color is a single physical wire that fits one port at a time.
    pub exclusive_wires: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("shield active window must be longer than 0 ms")]
    ShieldWindow,
    #[error(
        "shield cancel cooldown ({cancel_ms} ms) must be shorter than the expiry cooldown ({expiry_ms} ms)"
    )]
    ShieldCooldown { cancel_ms: Millis, expiry_ms: Millis },
    #[error("poll interval must be longer than 0 ms")]
    PollInterval,
    #[error("poll timeout ({timeout_ms} ms) must be shorter than the poll interval ({interval_ms} ms)")]
    PollTimeout {
        timeout_ms: Millis,
        interval_ms: Millis,
    },
}

impl ConsoleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shield.active_ms == 0 {
            return Err(ConfigError::ShieldWindow);
        }
        if self.shield.cancel_cooldown_ms >= self.shield.expiry_cooldown_ms {
            return Err(ConfigError::ShieldCooldown {
                cancel_ms: self.shield.cancel_cooldown_ms,
                expiry_ms: self.shield.expiry_cooldown_ms,
            });
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::PollInterval);
        }
        if self.poll.timeout_ms >= self.poll.interval_ms {
            return Err(ConfigError::PollTimeout {
                timeout_ms: self.poll.timeout_ms,
                interval_ms: self.poll.interval_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ConsoleConfig::default().validate(), Ok(()));
    }

    #[test]
    fn poll_timeout_must_be_shorter_than_interval() {
        let config = ConsoleConfig {
            poll: PollConfig {
                interval_ms: 1_000,
                timeout_ms: 1_500,
            },
            ..ConsoleConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::PollTimeout {
                timeout_ms: 1_500,
                interval_ms: 1_000
            })
        );
    }

    #[test]
    fn early_cancel_cooldown_must_be_the_shorter_one() {
        let config = ConsoleConfig {
            shield: ShieldTimings {
                cancel_cooldown_ms: 6_000,
                ..ShieldTimings::default()
            },
            ..ConsoleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ShieldCooldown { .. })
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ConsoleConfig =
            serde_json::from_str(r#"{"exclusive_wires":true,"poll":{"timeout_ms":500}}"#)
                .expect("config json");
        assert!(config.exclusive_wires);
        assert_eq!(config.poll.timeout_ms, 500);
        assert_eq!(config.poll.interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.shield, ShieldTimings::default());
    }
}
