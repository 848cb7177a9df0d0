use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Reasoning provider unavailable: {0}")]
    Unavailable(String),

    #[error("Reasoning provider rate limited: {0}")]
    RateLimited(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Provider returned output that is not structured JSON: {0}")]
    MalformedOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether a single retry may help. Malformed output and hard process
    /// failures are treated as final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::RateLimited(_) | ProviderError::Timeout(_)
        )
    }
}

/// Structural problems in a candidate plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("candidate is not a task list: {0}")]
    Malformed(String),

    #[error("task '{0}' appears more than once")]
    DuplicateId(String),

    #[error("task '{0}' depends on itself")]
    SelfReference(String),

    #[error("task '{task}' depends on '{dependency}', which only appears later in the list")]
    ForwardReference { task: String, dependency: String },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    DanglingReference { task: String, dependency: String },

    #[error("dependency cycle through task '{0}'")]
    Cycle(String),
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Plan could not be repaired into a valid DAG after {attempts} attempts: {source}")]
    Invalid {
        attempts: u32,
        #[source]
        source: ValidationError,
    },

    #[error("Plan has no executable tasks ({dropped} candidate tasks dropped)")]
    Empty { dropped: usize },

    #[error("Provider error while planning: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Payload does not match the {domain} schema: {reason}")]
    Payload { domain: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Unknown viewer role '{0}'")]
    UnknownRole(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Map for message '{0}' was already written")]
    AlreadyStored(String),

    #[error("Failed to write map: {0}")]
    WriteMap(std::io::Error),

    #[error("Failed to read map '{path}': {source}")]
    ReadMap {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures that stop a pipeline run before a map is produced or kept
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
