use crate::cli::{emit, parse_role, DemoArgs, Sample};
use crate::config::{Config, ProviderKind};
use crate::engine::Engine;
use crate::model::Message;
use crate::output::FileMapStore;

const MSG_001: &str = include_str!("../../samples/msg-001.json");
const MSG_106: &str = include_str!("../../samples/msg-106.json");

impl Sample {
    pub fn message(self) -> anyhow::Result<Message> {
        let raw = match self {
            Sample::Msg001 => MSG_001,
            Sample::Msg106 => MSG_106,
        };
        Ok(serde_json::from_str(raw)?)
    }
}

/// Demo runs never leave the machine
pub async fn execute(args: DemoArgs) -> anyhow::Result<()> {
    let role = parse_role(args.role.as_deref())?;

    let config = Config {
        provider: ProviderKind::Offline,
        ..Config::default()
    };

    let mut engine = Engine::from_config(&config);
    if let Some(dir) = args.output_dir {
        engine = engine.with_store(FileMapStore::new(dir));
    }

    let outcome = engine.process(args.sample.message()?).await?;
    emit(&outcome.map, role)
}
