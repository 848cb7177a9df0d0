use clap::Parser;
use orchmap::cli::{self, Cli, Commands};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("orchmap=debug")
    } else {
        EnvFilter::new("orchmap=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Demo(args) => cli::demo::execute(args).await,
        Commands::Project(args) => cli::project::execute(args),
        Commands::Schema => cli::schema::execute(),
    }
}
