//! Configuration for the contract algebra

use crate::calendar::{BusinessCalendar, DateRollConvention, DEFAULT_DATE_FORMAT};
use serde::{Deserialize, Serialize};

/// Contract algebra configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Business calendar configuration
    pub calendar: CalendarConfig,

    /// Roll-out generation configuration
    pub roll_out: RollOutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "contract-core".to_string(),
            calendar: CalendarConfig::default(),
            roll_out: RollOutConfig::default(),
        }
    }
}

/// Business calendar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// chrono format used to parse dates
    pub date_format: String,

    /// Non-working days besides weekends, in `date_format`
    pub holidays: Vec<String>,

    /// Roll convention for period dates
    pub convention: DateRollConvention,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            holidays: Vec::new(),
            convention: DateRollConvention::Actual,
        }
    }
}

/// Roll-out generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollOutConfig {
    /// Upper bound on generated periods per roll-out
    pub max_periods: usize,
}

impl Default for RollOutConfig {
    fn default() -> Self {
        Self {
            max_periods: 1200, // 100 years of monthly periods
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(format) = std::env::var("CONTRACT_DATE_FORMAT") {
            config.calendar.date_format = format;
        }

        if let Ok(limit) = std::env::var("CONTRACT_MAX_ROLLOUT_PERIODS") {
            config.roll_out.max_periods = limit.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CONTRACT_MAX_ROLLOUT_PERIODS: {}", e))
            })?;
        }

        Ok(config)
    }

    /// Business calendar described by this configuration
    pub fn business_calendar(&self) -> crate::Result<BusinessCalendar> {
        BusinessCalendar::from_config(&self.calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "contract-core");
        assert_eq!(config.calendar.date_format, "%Y-%m-%d");
        assert_eq!(config.roll_out.max_periods, 1200);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
service_name = "contract-core-test"

[calendar]
holidays = ["2026-12-25"]
convention = "ModifiedFollowing"

[roll_out]
max_periods = 24
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.service_name, "contract-core-test");
        assert_eq!(config.calendar.date_format, "%Y-%m-%d");
        assert_eq!(config.calendar.convention, DateRollConvention::ModifiedFollowing);
        assert_eq!(config.roll_out.max_periods, 24);
        assert!(config.business_calendar().is_ok());
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service_name = ").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(crate::Error::Config(_))
        ));
    }
}
