use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use iamgraph_hierarchy::{AnalysisOutput, HierarchyProcessor, Mode, ProcessorConfig, ServiceClients};
use token_source::TokenSource;

#[derive(Parser, Debug)]
#[command(
    name = "iamgraph",
    about = "Maps a GCP organization's IAM hierarchy into privilege-escalation reachability tuples"
)]
struct Args {
    /// Pipeline mode: online, offline-collect, or offline-analyze.
    #[arg(long, default_value = "online")]
    mode: String,

    /// Numeric organization id to analyze.
    #[arg(long)]
    org: String,

    /// Directory for offline artifacts and emitted outputs.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Collect principal-access-boundary policies and bindings.
    #[arg(long)]
    collect_pabs: bool,

    /// Collect deny policies on containers.
    #[arg(long)]
    collect_deny_policies: bool,

    /// Restrict collection to these CAI asset types (repeatable).
    #[arg(long = "asset-type")]
    asset_types: Vec<String>,

    /// Include Google-provisioned system projects (sys-*, gcf-*, …).
    #[arg(long)]
    include_system_projects: bool,

    /// Seconds to pause between deny-policy listing pages.
    #[arg(long, default_value_t = 10)]
    deny_page_interval: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("{e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mode: Mode = args.mode.parse()?;
    let mut config = ProcessorConfig::new(mode, &args.org);
    config.collect_pabs = args.collect_pabs;
    config.collect_deny_policies = args.collect_deny_policies;
    config.data_dir = args.data_dir.clone();
    config.asset_types = args.asset_types;
    config.include_system_projects = args.include_system_projects;
    config.deny_page_interval = Duration::from_secs(args.deny_page_interval);

    let mut processor = HierarchyProcessor::new(config);
    match mode {
        Mode::Online => {
            let clients = build_clients()?;
            let output = processor.run_online(&clients, None).await?;
            write_output(&args.data_dir, &output)?;
        }
        Mode::OfflineCollect => {
            let clients = build_clients()?;
            processor.run_offline_collect(&clients, None).await?;
        }
        Mode::OfflineAnalyze => {
            let output = processor.run_offline_analyze()?;
            write_output(&args.data_dir, &output)?;
        }
    }
    Ok(())
}

/// Credentials stay opaque to the engine: the clients take any token
/// source, and this binary supplies a static OAuth2 access token from the
/// environment (`gcloud auth print-access-token`).
#[derive(Debug)]
struct EnvTokenSource {
    token: String,
}

#[async_trait::async_trait]
impl TokenSource for EnvTokenSource {
    async fn token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.token.clone())
    }
}

fn build_clients() -> anyhow::Result<ServiceClients> {
    let token = std::env::var("GOOGLE_ACCESS_TOKEN")
        .context("GOOGLE_ACCESS_TOKEN must hold an OAuth2 access token")?;
    let ts: Arc<dyn TokenSource> = Arc::new(EnvTokenSource { token });
    Ok(ServiceClients::new(reqwest::Client::new(), ts))
}

fn write_output(dir: &Path, output: &AnalysisOutput) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join("tuples.json"),
        serde_json::to_string_pretty(&output.tuples)?,
    )?;
    std::fs::write(
        dir.join("edges.json"),
        serde_json::to_string_pretty(&output.edges)?,
    )?;
    tracing::info!(
        tuples = output.tuples.len(),
        edges = output.edges.len(),
        dir = %dir.display(),
        "wrote analysis outputs"
    );
    Ok(())
}
