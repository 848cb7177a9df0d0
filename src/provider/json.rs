use regex::Regex;
use serde_json::Value;

/// Pull a JSON object or array out of raw provider output.
///
/// Handles the Claude CLI `{"result": "..."}` envelope, markdown fences and
/// prose surrounding a single object.
pub fn parse_structured(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(inner) = value.get("result").and_then(Value::as_str) {
            if let Some(unwrapped) = extract_json(inner) {
                return Some(unwrapped);
            }
        }
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    extract_json(raw)
}

fn extract_json(s: &str) -> Option<Value> {
    let trimmed = s.trim();

    // First try: the whole string is valid JSON
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
    }

    // Second try: extract from markdown code block
    let re = Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let Some(body) = cap.get(1) else { continue };
        if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
            return Some(value);
        }
    }

    // Third try: first balanced object, skipping braces inside strings
    let brace_start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[brace_start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &s[brace_start..brace_start + i + 1];
                    return serde_json::from_str::<Value>(candidate).ok();
                }
            }
            _ => {}
        }
    }

    None
}
