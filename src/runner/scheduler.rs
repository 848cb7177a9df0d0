use crate::agents::{AgentRegistry, Upstream};
use crate::config::Config;
use crate::model::{
    Domain, FailureReason, Message, OrchestrationMap, Plan, Task, TaskId, TaskOutput, TaskResult,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Walks a plan one dependency level at a time.
///
/// Tasks whose dependencies are all terminal form the next level and run
/// concurrently (bounded by the semaphore). Each task reads the message and
/// snapshots of its direct dependencies' outputs, and writes only its own
/// result slot. Failures are recorded per task and never abort the run.
pub struct Scheduler {
    registry: AgentRegistry,
    semaphore: Arc<Semaphore>,
    plan_timeout: Duration,
}

impl Scheduler {
    pub fn new(registry: AgentRegistry, concurrency: usize, plan_timeout: Duration) -> Self {
        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            plan_timeout,
        }
    }

    pub fn from_config(registry: AgentRegistry, config: &Config) -> Self {
        Self::new(registry, config.concurrency, config.plan_timeout())
    }

    pub async fn execute(&self, plan: Plan, message: Message) -> OrchestrationMap {
        let start = std::time::Instant::now();
        let deadline = Instant::now() + self.plan_timeout;
        let shared = Arc::new(message.clone());

        let mut results: BTreeMap<TaskId, TaskResult> = BTreeMap::new();
        let mut pending: Vec<&Task> = Vec::new();
        for task in &plan.tasks {
            if results.contains_key(&task.id) {
                warn!("Ignoring duplicate task id {}", task.id);
                continue;
            }
            results.insert(task.id.clone(), TaskResult::pending(task.id.clone()));
            pending.push(task);
        }

        // Plans from the builder never dangle; hand-built ones might
        let dangling: Vec<(TaskId, TaskId)> = pending
            .iter()
            .filter_map(|task| {
                let missing = task.depends_on.iter().find(|d| !results.contains_key(*d))?;
                Some((task.id.clone(), missing.clone()))
            })
            .collect();
        for (task_id, missing) in dangling {
            warn!("Task {} depends on unknown task {}", task_id, missing);
            let detail = format!("unknown dependency {}", missing);
            results.insert(
                task_id.clone(),
                TaskResult::failed(task_id, FailureReason::DependencyFailed, detail),
            );
        }
        pending.retain(|task| !is_terminal(&results, &task.id));

        info!(
            "Executing {} tasks for {} (concurrency {}, deadline {:?})",
            pending.len(),
            message.id,
            self.semaphore.available_permits(),
            self.plan_timeout
        );

        let mut level = 0;
        while !pending.is_empty() {
            let (ready, waiting): (Vec<&Task>, Vec<&Task>) = pending
                .into_iter()
                .partition(|task| task.depends_on.iter().all(|d| is_terminal(&results, d)));
            pending = waiting;

            if ready.is_empty() {
                warn!("Dependency cycle among {} remaining tasks", pending.len());
                for task in pending.drain(..) {
                    results.insert(
                        task.id.clone(),
                        TaskResult::failed(
                            task.id.clone(),
                            FailureReason::DependencyFailed,
                            "dependency cycle",
                        ),
                    );
                }
                break;
            }

            level += 1;
            debug!("Level {}: {} ready", level, ready.len());

            if Instant::now() >= deadline
                || !self.run_level(&ready, &shared, &mut results, deadline).await
            {
                warn!("Plan deadline of {:?} exceeded", self.plan_timeout);
                break;
            }
        }

        // Anything still pending was cut off by the deadline
        for result in results.values_mut() {
            if !result.is_terminal() {
                *result = TaskResult::failed(
                    result.task_id.clone(),
                    FailureReason::Timeout,
                    format!("plan deadline of {:?} exceeded", self.plan_timeout),
                );
            }
        }

        let failed = results.values().filter(|r| r.is_failed()).count();
        info!(
            "Executed {} tasks in {:?}: {} completed, {} failed",
            results.len(),
            start.elapsed(),
            results.len() - failed,
            failed
        );

        crate::output::assemble(message, plan, results)
    }

    /// Run one level. Returns false if the deadline fired first; tasks still
    /// in flight are detached and their results never recorded.
    async fn run_level(
        &self,
        ready: &[&Task],
        message: &Arc<Message>,
        results: &mut BTreeMap<TaskId, TaskResult>,
        deadline: Instant,
    ) -> bool {
        let mut futures = FuturesUnordered::new();

        for task in ready {
            if let Some(failed) = task
                .depends_on
                .iter()
                .find(|d| results.get(*d).is_some_and(TaskResult::is_failed))
            {
                debug!("Skipping {}: dependency {} failed", task.id, failed);
                let detail = format!("dependency {} failed", failed);
                results.insert(
                    task.id.clone(),
                    TaskResult::failed(task.id.clone(), FailureReason::DependencyFailed, detail),
                );
                continue;
            }

            let upstream: Upstream = task
                .depends_on
                .iter()
                .filter_map(|d| Some((d.clone(), results.get(d)?.output()?.clone())))
                .collect();

            if task.domain == Domain::MessageDelivery {
                if let Err(detail) = delivery_gate(&upstream) {
                    warn!("Not delivering {}: {}", task.id, detail);
                    results.insert(
                        task.id.clone(),
                        TaskResult::failed(
                            task.id.clone(),
                            FailureReason::EvaluationRejected,
                            detail,
                        ),
                    );
                    continue;
                }
            }

            let Some(agent) = self.registry.lookup(task.domain) else {
                warn!("No agent for domain {} ({})", task.domain, task.id);
                results.insert(
                    task.id.clone(),
                    TaskResult::failed(
                        task.id.clone(),
                        FailureReason::UnknownDomain,
                        format!("no agent registered for {}", task.domain),
                    ),
                );
                continue;
            };

            let semaphore = Arc::clone(&self.semaphore);
            let message = Arc::clone(message);
            let task_id = task.id.clone();
            let purpose = task.purpose.clone();

            futures.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await; // hold until done
                let outcome = agent.extract(&purpose, &message, &upstream).await;
                (task_id, outcome)
            }));
        }

        loop {
            match timeout_at(deadline, futures.next()).await {
                Ok(Some(Ok((task_id, Ok(output))))) => {
                    info!("Completed {} ({})", task_id, output.domain());
                    results.insert(task_id.clone(), TaskResult::completed(task_id, output));
                }
                Ok(Some(Ok((task_id, Err(e))))) => {
                    warn!("Task {} failed: {}", task_id, e);
                    results.insert(
                        task_id.clone(),
                        TaskResult::failed(task_id, FailureReason::ProviderError, e.to_string()),
                    );
                }
                Ok(Some(Err(e))) => {
                    warn!("Agent task panicked: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("{} tasks still in flight at the deadline", futures.len());
                    return false;
                }
            }
        }

        // A panicked task leaves its slot pending
        for task in ready {
            if !is_terminal(results, &task.id) {
                results.insert(
                    task.id.clone(),
                    TaskResult::failed(
                        task.id.clone(),
                        FailureReason::ProviderError,
                        "agent task panicked",
                    ),
                );
            }
        }

        true
    }
}

fn is_terminal(results: &BTreeMap<TaskId, TaskResult>, id: &TaskId) -> bool {
    results.get(id).is_some_and(TaskResult::is_terminal)
}

/// Delivery needs at least one direct upstream evaluation, and every one of
/// them approved
fn delivery_gate(upstream: &Upstream) -> Result<(), String> {
    let mut evaluated = false;
    for (task_id, output) in upstream {
        if let TaskOutput::Evaluation(evaluation) = output {
            if !evaluation.is_approved() {
                return Err(format!("evaluation {} returned {}", task_id, evaluation.overall));
            }
            evaluated = true;
        }
    }

    if evaluated {
        Ok(())
    } else {
        Err("no approved evaluation upstream".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::error::{ExtractionError, ProviderError};
    use crate::model::{Check, Evaluation, Sender, Source, TaskStatus, Verdict};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Reply = Box<dyn Fn(&Upstream) -> Result<TaskOutput, ExtractionError> + Send + Sync>;

    struct StubAgent {
        domain: Domain,
        delay: Duration,
        reply: Reply,
        calls: AtomicUsize,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl StubAgent {
        fn new<F>(domain: Domain, reply: F) -> Self
        where
            F: Fn(&Upstream) -> Result<TaskOutput, ExtractionError> + Send + Sync + 'static,
        {
            Self {
                domain,
                delay: Duration::ZERO,
                reply: Box::new(reply),
                calls: AtomicUsize::new(0),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn logging(mut self, log: &Arc<Mutex<Vec<String>>>) -> Self {
            self.log = Arc::clone(log);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn domain(&self) -> Domain {
            self.domain
        }

        async fn extract(
            &self,
            purpose: &str,
            _message: &Message,
            upstream: &Upstream,
        ) -> Result<TaskOutput, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(format!("start {}", purpose));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.log.lock().unwrap().push(format!("end {}", purpose));
            (self.reply)(upstream)
        }
    }

    fn empty_risks(_: &Upstream) -> Result<TaskOutput, ExtractionError> {
        Ok(TaskOutput::Risks { items: vec![] })
    }

    fn verdict(overall: Verdict) -> TaskOutput {
        TaskOutput::Evaluation(Evaluation {
            relevance: Check::Pass,
            accuracy: Check::Pass,
            tone: Check::Pass,
            gaps_acknowledged: Check::Pass,
            overall,
            feedback: None,
        })
    }

    fn delivered(_: &Upstream) -> Result<TaskOutput, ExtractionError> {
        Ok(TaskOutput::Delivery(crate::model::DeliveryRecord {
            channel: Source::Email,
            recipient: "Unknown".to_string(),
            cc: vec![],
            status: crate::model::DeliveryStatus::Sent,
        }))
    }

    fn message() -> Message {
        Message {
            id: "MSG-T".to_string(),
            source: Source::Email,
            sender: Sender::default(),
            content: "x".to_string(),
            project: None,
        }
    }

    fn task(id: &str, domain: Domain, deps: &[&str]) -> Task {
        Task {
            id: TaskId::from(id),
            domain,
            purpose: id.to_string(),
            depends_on: deps.iter().map(|d| TaskId::from(*d)).collect(),
        }
    }

    fn scheduler(agents: &[Arc<StubAgent>]) -> Scheduler {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(agent.clone());
        }
        Scheduler::new(registry, 4, Duration::from_secs(10))
    }

    fn reason(map: &OrchestrationMap, id: &str) -> Option<FailureReason> {
        map.result(&TaskId::from(id)).and_then(TaskResult::failure_reason)
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_agent_but_not_siblings() {
        let risks = Arc::new(StubAgent::new(Domain::RiskExtraction, |_| {
            Err(ExtractionError::Provider(ProviderError::RateLimited(
                "429".to_string(),
            )))
        }));
        let qna = Arc::new(StubAgent::new(Domain::Qna, empty_risks));
        let decisions = Arc::new(StubAgent::new(Domain::DecisionExtraction, |_| {
            Ok(TaskOutput::Decisions { items: vec![] })
        }));

        let plan = Plan::new(
            "MSG-T",
            vec![
                task("A", Domain::RiskExtraction, &[]),
                task("B", Domain::DecisionExtraction, &[]),
                task("C", Domain::Qna, &["A", "B"]),
            ],
        );
        let map = scheduler(&[risks, qna.clone(), decisions])
            .execute(plan, message())
            .await;

        assert_eq!(reason(&map, "A"), Some(FailureReason::ProviderError));
        assert!(matches!(
            map.result(&TaskId::from("B")).unwrap().status,
            TaskStatus::Completed { .. }
        ));
        assert_eq!(reason(&map, "C"), Some(FailureReason::DependencyFailed));
        assert_eq!(qna.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_propagates_transitively() {
        let risks = Arc::new(StubAgent::new(Domain::RiskExtraction, |_| {
            Err(ExtractionError::Payload {
                domain: "risk_extraction".to_string(),
                reason: "bad".to_string(),
            })
        }));
        let qna = Arc::new(StubAgent::new(Domain::Qna, empty_risks));
        let evaluation = Arc::new(StubAgent::new(Domain::Evaluation, |_| {
            Ok(verdict(Verdict::Approved))
        }));

        let plan = Plan::new(
            "MSG-T",
            vec![
                task("A", Domain::RiskExtraction, &[]),
                task("B", Domain::Qna, &["A"]),
                task("C", Domain::Evaluation, &["B"]),
            ],
        );
        let map = scheduler(&[risks, qna.clone(), evaluation.clone()])
            .execute(plan, message())
            .await;

        assert_eq!(reason(&map, "C"), Some(FailureReason::DependencyFailed));
        assert_eq!(qna.calls() + evaluation.calls(), 0);
    }

    #[tokio::test]
    async fn test_delivery_blocked_by_rejection() {
        let evaluation = Arc::new(StubAgent::new(Domain::Evaluation, |_| {
            Ok(verdict(Verdict::Rejected))
        }));
        let delivery = Arc::new(StubAgent::new(Domain::MessageDelivery, delivered));

        let plan = Plan::new(
            "MSG-T",
            vec![
                task("E", Domain::Evaluation, &[]),
                task("D", Domain::MessageDelivery, &["E"]),
            ],
        );
        let map = scheduler(&[evaluation, delivery.clone()])
            .execute(plan, message())
            .await;

        assert_eq!(reason(&map, "D"), Some(FailureReason::EvaluationRejected));
        assert_eq!(delivery.calls(), 0);
    }

    #[tokio::test]
    async fn test_delivery_runs_after_approval() {
        let evaluation = Arc::new(StubAgent::new(Domain::Evaluation, |_| {
            Ok(verdict(Verdict::Approved))
        }));
        let delivery = Arc::new(StubAgent::new(Domain::MessageDelivery, |upstream| {
            assert_eq!(upstream.len(), 1);
            delivered(upstream)
        }));

        let plan = Plan::new(
            "MSG-T",
            vec![
                task("E", Domain::Evaluation, &[]),
                task("D", Domain::MessageDelivery, &["E"]),
            ],
        );
        let map = scheduler(&[evaluation, delivery.clone()])
            .execute(plan, message())
            .await;

        assert!(map.delivery().is_some());
        assert_eq!(delivery.calls(), 1);
    }

    #[tokio::test]
    async fn test_delivery_without_evaluation_is_rejected() {
        let delivery = Arc::new(StubAgent::new(Domain::MessageDelivery, delivered));
        let plan = Plan::new("MSG-T", vec![task("D", Domain::MessageDelivery, &[])]);

        let map = scheduler(&[delivery.clone()]).execute(plan, message()).await;

        assert_eq!(reason(&map, "D"), Some(FailureReason::EvaluationRejected));
        assert_eq!(delivery.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_domain() {
        let plan = Plan::new("MSG-T", vec![task("A", Domain::Qna, &[])]);
        let map = scheduler(&[]).execute(plan, message()).await;
        assert_eq!(reason(&map, "A"), Some(FailureReason::UnknownDomain));
    }

    #[tokio::test]
    async fn test_hand_built_cycle_and_dangling_reference() {
        let qna = Arc::new(StubAgent::new(Domain::Qna, empty_risks));
        let plan = Plan::new(
            "MSG-T",
            vec![
                task("A", Domain::Qna, &["B"]),
                task("B", Domain::Qna, &["A"]),
                task("C", Domain::Qna, &["GHOST"]),
                task("D", Domain::Qna, &[]),
            ],
        );

        let map = scheduler(&[qna.clone()]).execute(plan, message()).await;

        assert_eq!(reason(&map, "A"), Some(FailureReason::DependencyFailed));
        assert_eq!(reason(&map, "B"), Some(FailureReason::DependencyFailed));
        assert_eq!(reason(&map, "C"), Some(FailureReason::DependencyFailed));
        assert_eq!(reason(&map, "D"), None);
        assert_eq!(qna.calls(), 1);
    }

    #[tokio::test]
    async fn test_dependencies_finish_before_dependents_start() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let risks = Arc::new(
            StubAgent::new(Domain::RiskExtraction, empty_risks)
                .delayed(Duration::from_millis(30))
                .logging(&log),
        );
        let qna = Arc::new(StubAgent::new(Domain::Qna, empty_risks).logging(&log));

        // Listed out of order on purpose
        let plan = Plan::new(
            "MSG-T",
            vec![
                task("late", Domain::Qna, &["slow", "fast"]),
                task("slow", Domain::RiskExtraction, &[]),
                task("fast", Domain::Qna, &[]),
            ],
        );
        let map = scheduler(&[risks, qna]).execute(plan, message()).await;

        let log = log.lock().unwrap().clone();
        let position = |entry: &str| log.iter().position(|e| e == entry).unwrap();
        assert!(position("end slow") < position("start late"));
        assert!(position("end fast") < position("start late"));
        assert_eq!(map.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_holds_only_completed_direct_dependencies() {
        let risks = Arc::new(StubAgent::new(Domain::RiskExtraction, empty_risks));
        let qna = Arc::new(StubAgent::new(Domain::Qna, |upstream| {
            assert_eq!(
                upstream.keys().cloned().collect::<Vec<_>>(),
                vec![TaskId::from("B")]
            );
            empty_risks(upstream)
        }));

        let plan = Plan::new(
            "MSG-T",
            vec![
                task("A", Domain::RiskExtraction, &[]),
                task("B", Domain::RiskExtraction, &["A"]),
                task("C", Domain::Qna, &["B"]),
            ],
        );
        let map = scheduler(&[risks, qna.clone()]).execute(plan, message()).await;

        assert_eq!(qna.calls(), 1);
        assert_eq!(map.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_plan_deadline_times_out_in_flight_and_pending() {
        let risks = Arc::new(
            StubAgent::new(Domain::RiskExtraction, empty_risks).delayed(Duration::from_secs(5)),
        );
        let qna = Arc::new(StubAgent::new(Domain::Qna, empty_risks));
        let mut registry = AgentRegistry::new();
        registry.register(risks);
        registry.register(qna.clone());
        let scheduler = Scheduler::new(registry, 2, Duration::from_millis(50));

        let plan = Plan::new(
            "MSG-T",
            vec![
                task("A", Domain::RiskExtraction, &[]),
                task("B", Domain::Qna, &["A"]),
            ],
        );
        let map = scheduler.execute(plan, message()).await;

        assert_eq!(reason(&map, "A"), Some(FailureReason::Timeout));
        assert_eq!(reason(&map, "B"), Some(FailureReason::Timeout));
        assert_eq!(qna.calls(), 0);
    }
}
