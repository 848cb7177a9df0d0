pub mod demo;
pub mod project;
pub mod run;
pub mod schema;

use crate::model::OrchestrationMap;
use crate::view::{project, ViewerRole};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orchmap")]
#[command(
    author,
    version,
    about = "Turn an inbound message into an orchestration map and role-specific views"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and execute one message, then store the map
    Run(RunArgs),

    /// Run a bundled sample message through the offline provider
    Demo(DemoArgs),

    /// Project a stored map for a viewer role
    Project(ProjectArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Message JSON file
    #[arg(short, long)]
    pub message: PathBuf,

    /// Path to config file
    #[arg(short, long, default_value = "orchmap.yaml")]
    pub config: PathBuf,

    /// Use the offline rule-based provider
    #[arg(long)]
    pub offline: bool,

    /// Override max agents running at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Print the view for this role instead of the full map
    #[arg(long)]
    pub role: Option<String>,
}

#[derive(Parser, Clone)]
pub struct DemoArgs {
    /// Bundled sample to run
    #[arg(long, value_enum, default_value_t = Sample::Msg001)]
    pub sample: Sample,

    /// Print the view for this role instead of the full map
    #[arg(long)]
    pub role: Option<String>,

    /// Also store the map in this directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct ProjectArgs {
    /// Stored map JSON written by `run`
    #[arg(short, long)]
    pub map: PathBuf,

    /// Viewer role (project_manager, engineer, vp_engineering, customer)
    #[arg(short, long)]
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sample {
    #[value(name = "msg-001")]
    Msg001,
    #[value(name = "msg-106")]
    Msg106,
}

/// Parse `--role` up front so a bad role fails before any provider call
pub(crate) fn parse_role(role: Option<&str>) -> anyhow::Result<Option<ViewerRole>> {
    Ok(role.map(str::parse::<ViewerRole>).transpose()?)
}

/// Print the rendered map, or the projected view as JSON
pub(crate) fn emit(map: &OrchestrationMap, role: Option<ViewerRole>) -> anyhow::Result<()> {
    match role {
        Some(role) => {
            let view = project(map, role)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        None => print!("{}", map.rendered_text),
    }
    Ok(())
}
