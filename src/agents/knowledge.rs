use super::{agent_request, parse_payload, Agent, Upstream};
use crate::error::ExtractionError;
use crate::model::{clean_text, Domain, KnowledgeSnapshot, KnowledgeSource, Message, TaskOutput};
use crate::provider::Invoker;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

const PROMPT: &str = include_str!("../../prompts/agents/knowledge.md");

/// Project id to key/value metadata
pub type ProjectCatalog = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Deserialize)]
struct ProposedFacts {
    #[serde(default, alias = "items")]
    facts: BTreeMap<String, Value>,
}

/// Read-only project context lookup: the configured catalog first, the
/// provider for projects the catalog does not know
pub struct KnowledgeAgent {
    invoker: Invoker,
    catalog: ProjectCatalog,
}

impl KnowledgeAgent {
    pub fn new(invoker: Invoker, catalog: ProjectCatalog) -> Self {
        Self { invoker, catalog }
    }
}

fn fact_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Agent for KnowledgeAgent {
    fn domain(&self) -> Domain {
        Domain::KnowledgeRetrieval
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let Some(project) = message.project.as_ref() else {
            return Ok(TaskOutput::Knowledge(KnowledgeSnapshot {
                project: None,
                source: KnowledgeSource::Unavailable,
                facts: BTreeMap::from([(
                    "note".to_string(),
                    "No project was given with the message".to_string(),
                )]),
            }));
        };

        if let Some(facts) = self.catalog.get(project) {
            debug!("Project {} found in catalog", project);
            return Ok(TaskOutput::Knowledge(KnowledgeSnapshot {
                project: Some(project.clone()),
                source: KnowledgeSource::Catalog,
                facts: facts.clone(),
            }));
        }

        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;
        let proposed: ProposedFacts = parse_payload(self.domain(), value)?;

        let facts = proposed
            .facts
            .iter()
            .filter_map(|(key, value)| Some((key.clone(), fact_text(value)?)))
            .collect();

        Ok(TaskOutput::Knowledge(KnowledgeSnapshot {
            project: Some(project.clone()),
            source: KnowledgeSource::Provider,
            facts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{fast_invoker, ScriptedProvider};
    use crate::provider::PromptKind;
    use crate::model::{Sender, Source};
    use serde_json::json;
    use std::sync::Arc;

    fn message(project: Option<&str>) -> Message {
        Message {
            id: "MSG-T".to_string(),
            source: Source::Email,
            sender: Sender::default(),
            content: "Status?".to_string(),
            project: project.map(str::to_string),
        }
    }

    fn provider() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new().reply(
            PromptKind::Agent(Domain::KnowledgeRetrieval),
            json!({"project": "PRJ-B", "items": {"days_remaining": 20, "tech_lead": "?", "status": "on track"}}),
        ))
    }

    #[tokio::test]
    async fn test_catalog_hit_skips_provider() {
        let provider = provider();
        let catalog = ProjectCatalog::from([(
            "PRJ-A".to_string(),
            BTreeMap::from([("release".to_string(), "2025-03-01".to_string())]),
        )]);
        let agent = KnowledgeAgent::new(fast_invoker(provider.clone()), catalog);

        let output = agent
            .extract("context", &message(Some("PRJ-A")), &Upstream::new())
            .await
            .unwrap();

        let TaskOutput::Knowledge(snapshot) = output else {
            panic!("expected knowledge");
        };
        assert_eq!(snapshot.source, KnowledgeSource::Catalog);
        assert_eq!(snapshot.facts["release"], "2025-03-01");
        assert_eq!(provider.calls(PromptKind::Agent(Domain::KnowledgeRetrieval)), 0);
    }

    #[tokio::test]
    async fn test_provider_facts_are_cleaned() {
        let agent = KnowledgeAgent::new(fast_invoker(provider()), ProjectCatalog::new());

        let TaskOutput::Knowledge(snapshot) = agent
            .extract("context", &message(Some("PRJ-B")), &Upstream::new())
            .await
            .unwrap()
        else {
            panic!("expected knowledge");
        };

        assert_eq!(snapshot.source, KnowledgeSource::Provider);
        assert_eq!(snapshot.facts["days_remaining"], "20");
        assert!(!snapshot.facts.contains_key("tech_lead"));
    }

    #[tokio::test]
    async fn test_no_project() {
        let provider = provider();
        let agent = KnowledgeAgent::new(fast_invoker(provider.clone()), ProjectCatalog::new());

        let TaskOutput::Knowledge(snapshot) = agent
            .extract("context", &message(None), &Upstream::new())
            .await
            .unwrap()
        else {
            panic!("expected knowledge");
        };

        assert_eq!(snapshot.source, KnowledgeSource::Unavailable);
        assert!(snapshot.project.is_none());
        assert_eq!(provider.calls(PromptKind::Agent(Domain::KnowledgeRetrieval)), 0);
    }
}
