//! Configuration for the verification engine

use serde::{Deserialize, Serialize};

/// Verification engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Reject transactions touching programs that are neither registered
    /// nor trusted; when false they are skipped with a warning
    pub reject_unknown_programs: bool,

    /// Contract algebra configuration (calendar, roll-out limits)
    #[serde(default)]
    pub contracts: contract_core::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "verification-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            reject_unknown_programs: true,
            contracts: contract_core::Config::default(),
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

        config.contracts = contract_core::Config::from_env()
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        if let Ok(reject) = std::env::var("VERIFIER_REJECT_UNKNOWN_PROGRAMS") {
            config.reject_unknown_programs = reject.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid VERIFIER_REJECT_UNKNOWN_PROGRAMS: {}", e))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "verification-engine");
        assert!(config.reject_unknown_programs);
        assert_eq!(config.contracts.roll_out.max_periods, 1200);
    }

    #[test]
    fn test_from_file_defaults_contract_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
service_name = "verifier-test"
service_version = "0.0.1"
reject_unknown_programs = false
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.service_name, "verifier-test");
        assert!(!config.reject_unknown_programs);
        assert_eq!(config.contracts.service_name, "contract-core");
    }
}
