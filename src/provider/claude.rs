use super::{parse_structured, ProposalRequest, ReasoningProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Shells out to the `claude` CLI in print mode
pub struct ClaudeCliProvider {
    pub binary: PathBuf,
    pub model: String,
    pub permission_mode: String,
}

impl ClaudeCliProvider {
    fn build_prompt(request: &ProposalRequest) -> String {
        let payload = serde_json::to_string_pretty(&request.payload)
            .unwrap_or_else(|_| request.payload.to_string());

        format!(
            "{}\n\n## Input\n```json\n{}\n```\n\nRespond with a single JSON value and nothing else.",
            request.instructions.trim_end(),
            payload
        )
    }
}

fn is_rate_limited(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("rate limit") || lower.contains("429") || lower.contains("overloaded")
}

#[async_trait]
impl ReasoningProvider for ClaudeCliProvider {
    fn name(&self) -> &'static str {
        "claude_cli"
    }

    async fn propose(&self, request: &ProposalRequest) -> Result<Value, ProviderError> {
        let prompt = Self::build_prompt(request);

        // Build command - use string for PATH lookup if not an absolute/relative path
        let binary_str = self.binary.to_string_lossy();
        let mut cmd = if binary_str.contains('/') || binary_str.contains('\\') {
            Command::new(&self.binary)
        } else {
            Command::new(binary_str.as_ref())
        };

        // Ensure subscription auth is used (not API key)
        cmd.env_remove("ANTHROPIC_API_KEY");

        // The invoker drops this future on timeout; the child must go with it
        cmd.kill_on_drop(true);

        cmd.arg("-p")
            .arg(&prompt)
            .arg("--model")
            .arg(&self.model)
            .arg("--output-format")
            .arg("json")
            .arg("--permission-mode")
            .arg(&self.permission_mode);

        let start = std::time::Instant::now();

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ProviderError::Unavailable(format!("'{}' not found", binary_str))
            }
            _ => ProviderError::Io(e),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        debug!(
            "{} finished in {:?} (exit {:?})",
            request.kind,
            start.elapsed(),
            output.status.code()
        );

        if !output.status.success() {
            if is_rate_limited(&stderr) || is_rate_limited(&stdout) {
                return Err(ProviderError::RateLimited(stderr.trim().to_string()));
            }
            return Err(ProviderError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        parse_structured(&stdout).ok_or_else(|| {
            let preview: String = stdout.chars().take(200).collect();
            ProviderError::MalformedOutput(preview)
        })
    }
}
