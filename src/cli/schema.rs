use crate::config::Config;
use schemars::schema_for;

/// Print the config schema, e.g. for editor validation of `orchmap.yaml`
pub fn execute() -> anyhow::Result<()> {
    let mut schema = schema_for!(Config);
    schema.schema.metadata().title = Some("orchmap configuration".to_string());
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
