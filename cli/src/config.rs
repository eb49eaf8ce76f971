//! CLI configuration

use anyhow::{Context, Result};
use profwire_shared::{ProfilerConfig, ProfilerState, WorkerId};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Worker id stamped on wrapped requests
    pub worker_id: WorkerId,

    /// Profiler configuration propagated to the callee
    pub profiler: ProfilerConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            worker_id: 0,
            profiler: ProfilerConfig::new(ProfilerState::Cpu),
        }
    }
}

impl CliConfig {
    /// Load from an optional TOML file, then apply `PROFWIRE_*` env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = var("PROFWIRE_WORKER_ID") {
            self.worker_id = raw
                .parse()
                .with_context(|| format!("Invalid PROFWIRE_WORKER_ID: {}", raw))?;
        }
        if let Some(raw) = var("PROFWIRE_PROFILER_STATE") {
            self.profiler.state = raw
                .parse()
                .with_context(|| format!("Invalid PROFWIRE_PROFILER_STATE: {}", raw))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_id < 0 {
            anyhow::bail!("Worker id must not be negative (got {})", self.worker_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config() {
        let config = CliConfig::from_toml(
            r#"
            worker_id = 3

            [profiler]
            state = "kineto"
            profile_memory = true
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_id, 3);
        assert_eq!(config.profiler.state, ProfilerState::Kineto);
        assert!(config.profiler.profile_memory);
        assert!(!config.profiler.with_stack);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CliConfig::default();
        config
            .apply_env(|key| match key {
                "PROFWIRE_WORKER_ID" => Some("12".to_string()),
                "PROFWIRE_PROFILER_STATE" => Some("cuda".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.worker_id, 12);
        assert_eq!(config.profiler.state, ProfilerState::Cuda);

        let mut bad = CliConfig::default();
        assert!(bad
            .apply_env(|key| (key == "PROFWIRE_WORKER_ID").then(|| "many".to_string()))
            .is_err());
    }

    #[test]
    fn test_config_validation() {
        let invalid = CliConfig {
            worker_id: -1,
            ..CliConfig::default()
        };
        assert!(invalid.validate().is_err());
        assert!(CliConfig::default().validate().is_ok());
    }
}
