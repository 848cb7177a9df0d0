use crate::cli::{emit, parse_role, RunArgs};
use crate::config::{Config, ProviderKind};
use crate::engine::Engine;
use crate::model::Message;
use crate::output::FileMapStore;
use anyhow::Context;
use tracing::info;

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let role = parse_role(args.role.as_deref())?;

    info!("Loading config from {:?}", args.config);
    let mut config = Config::load_or_default(&args.config)?;

    // Apply CLI overrides
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if args.offline {
        config.provider = ProviderKind::Offline;
    }

    config.validate()?;

    let content = std::fs::read_to_string(&args.message)
        .with_context(|| format!("Failed to read message file {:?}", args.message))?;
    let message: Message = serde_json::from_str(&content)
        .with_context(|| format!("Invalid message JSON in {:?}", args.message))?;

    info!(
        "Processing {} with the {} provider",
        message.id, config.provider
    );
    let engine =
        Engine::from_config(&config).with_store(FileMapStore::new(config.output_dir.clone()));
    let outcome = engine.process(message).await?;

    if let Some(path) = &outcome.stored_at {
        info!("Map written to {}", path.display());
    }
    info!(
        "{} tasks, {} failed",
        outcome.map.plan.len(),
        outcome.map.failed_count()
    );

    emit(&outcome.map, role)
}
