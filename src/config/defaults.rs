use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_concurrency() -> usize {
    4
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

pub fn default_provider_timeout_sec() -> u64 {
    120
}

pub fn default_plan_timeout_sec() -> u64 {
    600
}

pub fn default_claude_binary() -> PathBuf {
    // Check common install location first
    if let Some(home) = std::env::var_os("HOME") {
        let local_path = PathBuf::from(home).join(".claude/local/claude");
        if local_path.exists() {
            return local_path;
        }
    }
    // Fall back to PATH lookup
    PathBuf::from("claude")
}

pub fn default_claude_model() -> String {
    "sonnet".to_string()
}

pub fn default_permission_mode() -> String {
    "default".to_string()
}

pub fn default_max_attempts() -> u32 {
    2
}

pub fn default_backoff_base_ms() -> u64 {
    500
}

pub fn default_max_tasks() -> usize {
    10
}
