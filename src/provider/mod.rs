//! Reasoning provider boundary.
//!
//! The core only depends on a request/response contract: a prompt kind, a
//! set of instructions and a JSON payload go in, a JSON value comes out.
//! Everything that comes back is untrusted and validated by the caller.

mod claude;
mod json;
mod offline;

pub use claude::ClaudeCliProvider;
pub use json::parse_structured;
pub use offline::OfflineProvider;

use crate::config::{Config, ProviderKind, RetryConfig};
use crate::error::ProviderError;
use crate::model::Domain;
use crate::runner::retry_with_backoff;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What a request asks the provider for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "domain", rename_all = "snake_case")]
pub enum PromptKind {
    Plan,
    Agent(Domain),
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptKind::Plan => write!(f, "plan"),
            PromptKind::Agent(domain) => write!(f, "agent:{}", domain),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalRequest {
    pub kind: PromptKind,
    /// Fixed guidance for this kind of request
    pub instructions: String,
    /// Structured context (message, purpose, upstream results)
    pub payload: Value,
}

#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn propose(&self, request: &ProposalRequest) -> Result<Value, ProviderError>;
}

/// Create the provider selected in the config
pub fn create_provider(config: &Config) -> Arc<dyn ReasoningProvider> {
    match config.provider {
        ProviderKind::ClaudeCli => Arc::new(ClaudeCliProvider {
            binary: config.providers.claude_cli.binary.clone(),
            model: config.providers.claude_cli.model.clone(),
            permission_mode: config.providers.claude_cli.permission_mode.clone(),
        }),
        ProviderKind::Offline => Arc::new(OfflineProvider),
    }
}

/// Calls a provider with a per-call timeout and at most one retry.
///
/// The policy is local to the caller: sibling tasks each hold their own
/// invoker clone and never coordinate retries.
#[derive(Clone)]
pub struct Invoker {
    provider: Arc<dyn ReasoningProvider>,
    retry: RetryConfig,
    timeout: Duration,
}

impl Invoker {
    pub fn new(provider: Arc<dyn ReasoningProvider>, retry: RetryConfig, timeout: Duration) -> Self {
        let retry = RetryConfig {
            max_attempts: retry.max_attempts.clamp(1, 2),
            backoff_base_ms: retry.backoff_base_ms.max(1),
        };
        Self {
            provider,
            retry,
            timeout,
        }
    }

    pub fn from_config(provider: Arc<dyn ReasoningProvider>, config: &Config) -> Self {
        Self::new(provider, config.retry.clone(), config.provider_timeout())
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn propose(&self, request: &ProposalRequest) -> Result<Value, ProviderError> {
        let provider = &self.provider;
        let timeout = self.timeout;

        debug!("Proposing {} via {}", request.kind, provider.name());

        retry_with_backoff(&self.retry, ProviderError::is_retryable, || async move {
            match tokio::time::timeout(timeout, provider.propose(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            }
        })
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;

    fn request(kind: PromptKind) -> ProposalRequest {
        ProposalRequest {
            kind,
            instructions: String::new(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn test_invoker_retries_rate_limit_once() {
        let provider = Arc::new(ScriptedProvider::new().on(PromptKind::Plan, |_| {
            Err(ProviderError::RateLimited("429".to_string()))
        }));
        let invoker = fast_invoker(provider.clone());

        let result = invoker.propose(&request(PromptKind::Plan)).await;
        assert!(matches!(result, Err(ProviderError::RateLimited(_))));
        assert_eq!(provider.calls(PromptKind::Plan), 2);
    }

    #[tokio::test]
    async fn test_invoker_does_not_retry_malformed_output() {
        let provider = Arc::new(ScriptedProvider::new().on(PromptKind::Plan, |_| {
            Err(ProviderError::MalformedOutput("not json".to_string()))
        }));
        let invoker = fast_invoker(provider.clone());

        let result = invoker.propose(&request(PromptKind::Plan)).await;
        assert!(result.is_err());
        assert_eq!(provider.calls(PromptKind::Plan), 1);
    }

    #[tokio::test]
    async fn test_invoker_clamps_attempts_to_two() {
        let provider = Arc::new(ScriptedProvider::new().on(PromptKind::Plan, |_| {
            Err(ProviderError::Unavailable("down".to_string()))
        }));
        let invoker = Invoker::new(
            provider.clone(),
            RetryConfig {
                max_attempts: 5,
                backoff_base_ms: 1,
            },
            Duration::from_secs(5),
        );

        let _ = invoker.propose(&request(PromptKind::Plan)).await;
        assert_eq!(provider.calls(PromptKind::Plan), 2);
    }

    #[test]
    fn test_prompt_kind_display() {
        assert_eq!(PromptKind::Plan.to_string(), "plan");
        assert_eq!(PromptKind::Agent(Domain::Qna).to_string(), "agent:qna");
    }
}
