use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Which reasoning provider answers plan and agent requests
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeout for a single provider call
    #[serde(default = "default_provider_timeout_sec")]
    pub provider_timeout_sec: u64,

    /// Deadline for executing a whole plan
    #[serde(default = "default_plan_timeout_sec")]
    pub plan_timeout_sec: u64,

    /// Max agents running at once within a dependency level
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub planner: PlannerConfig,

    /// Known project metadata, keyed by project id
    #[serde(default)]
    pub projects: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    ClaudeCli,
    Offline,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::ClaudeCli => write!(f, "claude_cli"),
            ProviderKind::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub claude_cli: ClaudeCliConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ClaudeCliConfig {
    #[serde(default = "default_claude_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_claude_model")]
    pub model: String,

    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            binary: default_claude_binary(),
            model: default_claude_model(),
            permission_mode: default_permission_mode(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    /// Total attempts per provider call (1 or 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PlannerConfig {
    /// Candidate tasks beyond this count are truncated
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_tasks: default_max_tasks(),
        }
    }
}
