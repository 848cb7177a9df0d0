use async_trait::async_trait;
use orchmap::config::{Config, ProviderKind};
use orchmap::engine::Engine;
use orchmap::error::{OutputError, PipelineError, PlanError, ProviderError};
use orchmap::model::{
    DecisionStatus, Domain, FailureReason, GapFlag, Level, Message, OrchestrationMap, QnaAnswer,
    TaskResult,
};
use orchmap::output::{load_map, render, FileMapStore};
use orchmap::planner::MAX_PLAN_ATTEMPTS;
use orchmap::provider::{OfflineProvider, PromptKind, ProposalRequest, ReasoningProvider};
use orchmap::view::{project, ViewerRole};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const MSG_001: &str = include_str!("../samples/msg-001.json");
const MSG_106: &str = include_str!("../samples/msg-106.json");

type Override = Box<dyn Fn() -> Result<Value, ProviderError> + Send + Sync>;

/// Offline provider with per-kind overrides and call counts
#[derive(Default)]
struct Overlay {
    overrides: HashMap<PromptKind, Override>,
    calls: Mutex<HashMap<PromptKind, usize>>,
}

impl Overlay {
    fn answer<F>(mut self, kind: PromptKind, reply: F) -> Self
    where
        F: Fn() -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.overrides.insert(kind, Box::new(reply));
        self
    }

    fn calls(&self, kind: PromptKind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    fn agent_calls(&self) -> usize {
        Domain::ALL
            .iter()
            .map(|domain| self.calls(PromptKind::Agent(*domain)))
            .sum()
    }
}

#[async_trait]
impl ReasoningProvider for Overlay {
    fn name(&self) -> &'static str {
        "overlay"
    }

    async fn propose(&self, request: &ProposalRequest) -> Result<Value, ProviderError> {
        *self.calls.lock().unwrap().entry(request.kind).or_insert(0) += 1;
        match self.overrides.get(&request.kind) {
            Some(reply) => reply(),
            None => OfflineProvider.propose(request).await,
        }
    }
}

fn offline_config() -> Config {
    Config {
        provider: ProviderKind::Offline,
        ..Config::default()
    }
}

fn sample(raw: &str) -> Message {
    serde_json::from_str(raw).unwrap()
}

async fn run_offline(raw: &str) -> OrchestrationMap {
    Engine::from_config(&offline_config())
        .process(sample(raw))
        .await
        .unwrap()
        .map
}

async fn run_with(overlay: &Arc<Overlay>, raw: &str) -> Result<OrchestrationMap, PipelineError> {
    let provider: Arc<dyn ReasoningProvider> = overlay.clone();
    Engine::with_provider(provider, &offline_config())
        .process(sample(raw))
        .await
        .map(|outcome| outcome.map)
}

fn result_for(map: &OrchestrationMap, domain: Domain) -> &TaskResult {
    let task = map
        .plan
        .tasks
        .iter()
        .find(|t| t.domain == domain)
        .unwrap_or_else(|| panic!("no {domain} task in plan"));
    map.result(&task.id).unwrap()
}

fn keys(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                out.push(key.clone());
                keys(inner, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| keys(item, out)),
        _ => {}
    }
}

#[tokio::test]
async fn test_msg_001_end_to_end() {
    let map = run_offline(MSG_001).await;

    assert_eq!(map.plan.len(), 7);
    assert_eq!(map.failed_count(), 0);

    let items = map.action_items();
    assert!(items.len() >= 2);
    for item in &items {
        assert!(item.flags.contains(&GapFlag::MissingOwner));
        assert!(item.flags.contains(&GapFlag::MissingDueDate));
    }

    let risks = map.risks();
    assert!(risks
        .iter()
        .any(|r| r.description.contains("timeline") && r.probability == Some(Level::High)));

    let decisions = map.decisions();
    assert_eq!(
        decisions
            .iter()
            .filter(|d| d.status == DecisionStatus::Pending)
            .count(),
        1
    );

    let answer = map.answer().unwrap();
    assert!(answer.text.contains(QnaAnswer::NEEDED_HEADER));
    assert!(map.evaluation().unwrap().is_approved());
    assert_eq!(map.delivery().unwrap().recipient, "Sarah Chen");
}

#[tokio::test]
async fn test_msg_106_ambiguous_input_still_plans() {
    let map = run_offline(MSG_106).await;

    assert!(!map.plan.is_empty());
    assert!(map.plan.tasks.iter().all(|t| t.domain != Domain::KnowledgeRetrieval));

    let answer = map.answer().unwrap();
    assert!(answer.has_gaps());
    assert!(answer.text.contains(QnaAnswer::NEEDED_HEADER));
    assert!(answer
        .needed
        .iter()
        .any(|n| n == "Which project this request belongs to"));
}

#[tokio::test]
async fn test_rendering_is_deterministic() {
    let first = run_offline(MSG_001).await;
    let second = run_offline(MSG_001).await;

    assert_eq!(render(&first), render(&first));
    assert_eq!(first.rendered_text, second.rendered_text);
    for task in &first.plan.tasks {
        assert_eq!(first.rendered_text.matches(&format!("[{}]", task.id)).count(), 1);
    }
}

#[tokio::test]
async fn test_customer_view_is_pure_and_scrubbed() {
    let map = run_offline(MSG_001).await;
    let before = map.clone();

    let first = project(&map, ViewerRole::Customer).unwrap();
    let second = project(&map, ViewerRole::Customer).unwrap();
    assert_eq!(first, second);
    assert_eq!(map, before);

    let json = serde_json::to_value(&first).unwrap();
    let mut found = Vec::new();
    keys(&json, &mut found);
    for forbidden in ["owner", "deadline", "task_id", "id", "rendered_map", "action_items"] {
        assert!(!found.iter().any(|k| k == forbidden), "customer view has {forbidden}");
    }

    let text = serde_json::to_string(&json).unwrap();
    let ids = Regex::new(r"\b(?:TASK|AI|RISK|DEC)-\d+").unwrap();
    assert!(!ids.is_match(&text), "customer view leaked an id: {text}");
    assert!(!text.contains(QnaAnswer::LOGGED_HEADER));
    assert!(first.final_response.unwrap().contains(QnaAnswer::NEEDED_HEADER));
}

#[tokio::test]
async fn test_role_views_follow_policy() {
    let map = run_offline(MSG_001).await;

    let pm = project(&map, ViewerRole::ProjectManager).unwrap();
    assert_eq!(pm.rendered_map.as_deref(), Some(map.rendered_text.as_str()));

    let engineer = project(&map, ViewerRole::Engineer).unwrap();
    assert_eq!(engineer.action_items.unwrap().len(), map.action_items().len());
    assert!(engineer.decisions.is_none());

    let vp = project(&map, ViewerRole::VpEngineering).unwrap();
    assert!(vp.action_items.is_none());
    assert_eq!(vp.decisions.unwrap().len(), 1);
    assert!(!vp.risks.unwrap().is_empty());

    assert!("intern".parse::<ViewerRole>().is_err());
}

#[tokio::test]
async fn test_failed_task_skips_dependents() {
    let overlay = Arc::new(Overlay::default().answer(
        PromptKind::Agent(Domain::RiskExtraction),
        || Err(ProviderError::MalformedOutput("not json".to_string())),
    ));

    let map = run_with(&overlay, MSG_001).await.unwrap();

    assert_eq!(
        result_for(&map, Domain::RiskExtraction).failure_reason(),
        Some(FailureReason::ProviderError)
    );
    for domain in [Domain::Qna, Domain::Evaluation, Domain::MessageDelivery] {
        assert_eq!(
            result_for(&map, domain).failure_reason(),
            Some(FailureReason::DependencyFailed)
        );
        assert_eq!(overlay.calls(PromptKind::Agent(domain)), 0);
    }

    // Siblings of the failed task are unaffected
    assert!(result_for(&map, Domain::ActionItemExtraction).output().is_some());
    assert!(result_for(&map, Domain::DecisionExtraction).output().is_some());
    assert_eq!(overlay.calls(PromptKind::Agent(Domain::RiskExtraction)), 1);
    assert!(map.rendered_text.contains("FAILED (PROVIDER_ERROR)"));
}

#[tokio::test]
async fn test_rejected_evaluation_blocks_delivery() {
    let overlay = Arc::new(Overlay::default().answer(
        PromptKind::Agent(Domain::Evaluation),
        || {
            Ok(json!({
                "relevance": "PASS",
                "accuracy": "FAIL",
                "tone": "PASS",
                "gaps_acknowledged": "PASS",
                "overall": "REJECTED",
                "feedback": "Numbers do not match",
            }))
        },
    ));

    let map = run_with(&overlay, MSG_001).await.unwrap();

    assert_eq!(
        result_for(&map, Domain::MessageDelivery).failure_reason(),
        Some(FailureReason::EvaluationRejected)
    );
    assert_eq!(overlay.calls(PromptKind::Agent(Domain::MessageDelivery)), 0);
    assert!(map.delivery().is_none());

    let customer = project(&map, ViewerRole::Customer).unwrap();
    assert!(customer.final_response.is_none());
}

#[tokio::test]
async fn test_cyclic_plan_is_rejected_after_retry() {
    let overlay = Arc::new(Overlay::default().answer(PromptKind::Plan, || {
        Ok(json!({"tasks": [
            {"id": "A", "domain": "risk_extraction", "depends_on": ["B"]},
            {"id": "B", "domain": "qna", "depends_on": ["A"]},
        ]}))
    }));

    let err = run_with(&overlay, MSG_001).await.unwrap_err();

    assert!(matches!(err, PipelineError::Plan(PlanError::Invalid { .. })));
    assert_eq!(overlay.calls(PromptKind::Plan), MAX_PLAN_ATTEMPTS as usize);
    assert_eq!(overlay.agent_calls(), 0);
}

#[tokio::test]
async fn test_dangling_reference_is_rejected() {
    let overlay = Arc::new(Overlay::default().answer(PromptKind::Plan, || {
        Ok(json!([
            {"id": "A", "domain": "risk_extraction"},
            {"id": "B", "domain": "qna", "depends_on": ["A", "GHOST"]},
        ]))
    }));

    let err = run_with(&overlay, MSG_106).await.unwrap_err();

    assert!(matches!(err, PipelineError::Plan(PlanError::Invalid { .. })));
    assert_eq!(overlay.agent_calls(), 0);
}

#[tokio::test]
async fn test_stored_map_round_trips_and_is_written_once() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::from_config(&offline_config()).with_store(FileMapStore::new(dir.path()));

    let outcome = engine.process(sample(MSG_001)).await.unwrap();
    let path = outcome.stored_at.unwrap();
    assert!(dir.path().join("MSG-001.txt").exists());

    let loaded = load_map(&path).unwrap();
    assert_eq!(loaded, outcome.map);
    assert_eq!(
        project(&loaded, ViewerRole::Customer).unwrap(),
        project(&outcome.map, ViewerRole::Customer).unwrap()
    );

    let err = engine.process(sample(MSG_001)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Output(OutputError::AlreadyStored(_))
    ));
}
