mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            provider: ProviderKind::default(),
            providers: ProvidersConfig::default(),
            retry: RetryConfig::default(),
            provider_timeout_sec: default_provider_timeout_sec(),
            plan_timeout_sec: default_plan_timeout_sec(),
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            planner: PlannerConfig::default(),
            projects: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from a YAML file, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }

        // A provider call is retried at most once
        if !(1..=2).contains(&self.retry.max_attempts) {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: format!("must be 1 or 2, got {}", self.retry.max_attempts),
            });
        }

        if self.retry.backoff_base_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_base_ms",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.provider_timeout_sec == 0 {
            return Err(ConfigError::Invalid {
                field: "provider_timeout_sec",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.plan_timeout_sec == 0 {
            return Err(ConfigError::Invalid {
                field: "plan_timeout_sec",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.planner.max_tasks == 0 {
            return Err(ConfigError::Invalid {
                field: "planner.max_tasks",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_sec)
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_sec)
    }
}
