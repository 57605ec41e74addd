use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

mod context;
mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "autogram")]
#[command(author, version, about = "Autogram - Telegram <-> IRC bridge with a media cache")]
pub struct Args {
    /// Work with configuration from FILE
    #[arg(long, short = 'c', default_value = "autogram.json")]
    pub config: PathBuf,

    /// Extra tracing filter directive, e.g. "autogram_core::cache=debug"
    #[arg(long)]
    pub log: Option<String>,
}

fn init_tracing(extra: Option<&str>) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge already installed: {}", e);
    }

    let mut filter = EnvFilter::from_default_env()
        .add_directive("autogram=info".parse().unwrap_or_default())
        .add_directive("autogram_core=info".parse().unwrap_or_default())
        .add_directive("autogram_server=info".parse().unwrap_or_default());
    if let Some(directive) = extra {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("ignoring --log '{}': {}", directive, e),
        }
    }

    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());
    info!("*** Autogram {} ***", env!("CARGO_PKG_VERSION"));
    info!("Running with config {}", args.config.display());

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
