//! Module parameters

use crate::error::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_GROUP_SIZE: u64 = 20;
pub const DEFAULT_MAX_DE_SIZE: u64 = 300;
pub const DEFAULT_ROUND_PERIOD_SECS: u64 = 60 * 60;
pub const DEFAULT_SIGNING_PERIOD_SECS: u64 = 60 * 60;
pub const DEFAULT_ACTIVE_DURATION_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_REWARD_PERCENTAGE: u64 = 50;
pub const DEFAULT_INACTIVE_PENALTY_DURATION_SECS: u64 = 10 * 60;
pub const DEFAULT_JAIL_PENALTY_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound on any duration parameter (100 years)
const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Tunable parameters, durations in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub max_group_size: u64,
    /// Capacity of each DE queue; one slot always stays free
    pub max_de_size: u64,
    pub round_period: u64,
    pub signing_period: u64,
    pub active_duration: u64,
    pub reward_percentage: u64,
    pub inactive_penalty_duration: u64,
    pub jail_penalty_duration: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            max_de_size: DEFAULT_MAX_DE_SIZE,
            round_period: DEFAULT_ROUND_PERIOD_SECS,
            signing_period: DEFAULT_SIGNING_PERIOD_SECS,
            active_duration: DEFAULT_ACTIVE_DURATION_SECS,
            reward_percentage: DEFAULT_REWARD_PERCENTAGE,
            inactive_penalty_duration: DEFAULT_INACTIVE_PENALTY_DURATION_SECS,
            jail_penalty_duration: DEFAULT_JAIL_PENALTY_DURATION_SECS,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.max_group_size == 0 {
            return Err(Error::InvalidParams("max group size must be positive".into()));
        }
        if self.max_de_size < 2 {
            return Err(Error::InvalidParams("max DE size must be at least 2".into()));
        }
        let durations = [
            ("round period", self.round_period),
            ("signing period", self.signing_period),
            ("active duration", self.active_duration),
            ("inactive penalty duration", self.inactive_penalty_duration),
            ("jail penalty duration", self.jail_penalty_duration),
        ];
        for (name, secs) in durations {
            if secs == 0 || secs > MAX_DURATION_SECS {
                return Err(Error::InvalidParams(format!(
                    "{name} must be between 1 and {MAX_DURATION_SECS} seconds"
                )));
            }
        }
        if self.reward_percentage > 100 {
            return Err(Error::InvalidParams(
                "reward percentage must not exceed 100".into(),
            ));
        }
        Ok(())
    }

    pub fn round_period(&self) -> Duration {
        secs(self.round_period)
    }

    pub fn signing_period(&self) -> Duration {
        secs(self.signing_period)
    }

    pub fn active_duration(&self) -> Duration {
        secs(self.active_duration)
    }

    pub fn inactive_penalty_duration(&self) -> Duration {
        secs(self.inactive_penalty_duration)
    }

    pub fn jail_penalty_duration(&self) -> Duration {
        secs(self.jail_penalty_duration)
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_DURATION_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_group_size, 20);
        assert_eq!(params.active_duration(), Duration::hours(24));
        assert_eq!(params.inactive_penalty_duration(), Duration::minutes(10));
        assert_eq!(params.jail_penalty_duration(), Duration::days(30));
        assert_eq!(params.reward_percentage, 50);
    }

    #[test]
    fn test_validate() {
        let mut params = Params::default();
        params.reward_percentage = 101;
        assert!(matches!(params.validate(), Err(Error::InvalidParams(_))));

        let mut params = Params::default();
        params.max_de_size = 1;
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.signing_period = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let params: Params = serde_json::from_str(r#"{"max_de_size": 5}"#).unwrap();
        assert_eq!(params.max_de_size, 5);
        assert_eq!(params.max_group_size, DEFAULT_MAX_GROUP_SIZE);
    }
}
