use crate::error::ValidationError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One task as proposed by the provider, before validation
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CandidateTask {
    #[serde(alias = "task_id", deserialize_with = "id_string")]
    pub id: String,

    #[serde(default, deserialize_with = "optional_tag")]
    pub domain: Option<String>,

    /// Explicit agent tag, takes precedence over `domain`
    #[serde(default, alias = "l3_agent", deserialize_with = "optional_tag")]
    pub agent: Option<String>,

    #[serde(default, deserialize_with = "optional_tag")]
    pub purpose: Option<String>,

    #[serde(default, deserialize_with = "optional_tag")]
    pub description: Option<String>,

    #[serde(
        default,
        alias = "dependencies",
        alias = "dependsOn",
        deserialize_with = "id_list"
    )]
    pub depends_on: Vec<String>,
}

/// Accept `{"tasks": [...]}` or a bare array
pub(crate) fn parse_candidates(proposal: &Value) -> Result<Vec<CandidateTask>, ValidationError> {
    let tasks = match proposal {
        Value::Array(_) => proposal,
        Value::Object(fields) => fields
            .get("tasks")
            .ok_or_else(|| ValidationError::Malformed("missing 'tasks' list".to_string()))?,
        other => {
            return Err(ValidationError::Malformed(format!(
                "expected an object with 'tasks', got {}",
                json_kind(other)
            )))
        }
    };

    Vec::<CandidateTask>::deserialize(tasks).map_err(|e| ValidationError::Malformed(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("task id must be a string or number, got {}", value)))
}

fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .iter()
        .map(|v| {
            id_from_value(v)
                .ok_or_else(|| D::Error::custom(format!("dependency must be a task id, got {}", v)))
        })
        .filter(|id| !matches!(id, Ok(s) if s.is_empty()))
        .collect()
}

fn optional_tag<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = json!({"tasks": [{"id": "T1", "domain": "qna"}]});
        let bare = json!([{"task_id": 1, "l3_agent": "qna", "dependsOn": null}]);

        let a = parse_candidates(&wrapped).unwrap();
        let b = parse_candidates(&bare).unwrap();

        assert_eq!(a[0].id, "T1");
        assert_eq!(b[0].id, "1");
        assert_eq!(b[0].agent.as_deref(), Some("qna"));
        assert!(b[0].depends_on.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_task_list() {
        assert!(matches!(
            parse_candidates(&json!({"steps": []})),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            parse_candidates(&json!("plan")),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            parse_candidates(&json!({"tasks": [{"domain": "qna"}]})),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_blank_fields_become_absent() {
        let tasks = parse_candidates(&json!({"tasks": [
            {"id": "T1", "domain": " ", "agent": "risk_extraction", "purpose": "", "depends_on": ["", "T0"]}
        ]}))
        .unwrap();

        assert!(tasks[0].domain.is_none());
        assert!(tasks[0].purpose.is_none());
        assert_eq!(tasks[0].depends_on, vec!["T0".to_string()]);
    }
}
