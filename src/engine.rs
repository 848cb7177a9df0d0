use crate::agents::AgentRegistry;
use crate::config::Config;
use crate::error::PipelineError;
use crate::model::{Message, OrchestrationMap};
use crate::output::MapStore;
use crate::planner::PlanBuilder;
use crate::provider::{create_provider, Invoker, ReasoningProvider};
use crate::runner::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Instrument};
use uuid::Uuid;

/// Result of one pipeline run
#[derive(Debug)]
pub struct RunOutcome {
    pub map: OrchestrationMap,
    /// Where the map was written, when the engine has a store
    pub stored_at: Option<PathBuf>,
}

/// Plan, execute and (optionally) persist one message at a time.
///
/// Holds no per-run state, so one engine can process many messages.
pub struct Engine {
    planner: PlanBuilder,
    scheduler: Scheduler,
    store: Option<Box<dyn MapStore>>,
}

impl Engine {
    pub fn new(planner: PlanBuilder, scheduler: Scheduler) -> Self {
        Self {
            planner,
            scheduler,
            store: None,
        }
    }

    /// Wire the standard agent set to the provider selected in the config
    pub fn from_config(config: &Config) -> Self {
        Self::with_provider(create_provider(config), config)
    }

    pub fn with_provider(provider: Arc<dyn ReasoningProvider>, config: &Config) -> Self {
        let invoker = Invoker::from_config(provider, config);
        let registry = AgentRegistry::standard(invoker.clone(), config.projects.clone());
        let planner = PlanBuilder::new(invoker, registry.domains(), config.planner.max_tasks);
        let scheduler = Scheduler::from_config(registry, config);
        Self::new(planner, scheduler)
    }

    pub fn with_store(mut self, store: impl MapStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Run the whole pipeline for one message.
    ///
    /// Only a plan that cannot be built or a failed write is an error; task
    /// failures are recorded in the returned map.
    pub async fn process(&self, message: Message) -> Result<RunOutcome, PipelineError> {
        let message = message.normalized();
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, message = %message.id);

        async move {
            info!("Planning message {}", message.id);
            let plan = self.planner.build(&message).await?;
            info!("Plan has {} tasks", plan.len());

            let map = self.scheduler.execute(plan, message).await;

            let stored_at = match &self.store {
                Some(store) => Some(store.store(&map)?),
                None => None,
            };

            Ok::<_, PipelineError>(RunOutcome { map, stored_at })
        }
        .instrument(span)
        .await
    }
}
