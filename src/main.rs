//! ragflow-k8s - provision RAGFlow onto Kubernetes behind the Gateway API

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ragflow_k8s::cluster::KubeClusterClient;
use ragflow_k8s::config::StackConfig;
use ragflow_k8s::gateway::GatewayClassResolver;
use ragflow_k8s::kube_utils::create_client;
use ragflow_k8s::orchestrator::{render, TopologyOrchestrator};

/// Provision the RAGFlow stack and expose it through the Gateway API
///
/// Stack settings are read from the environment (PULUMI_NAME,
/// PULUMI_NAMESPACE, RAGFLOW_GATEWAY, MYSQL_PASSWORD, ...).
#[derive(Parser, Debug)]
#[command(name = "ragflow-k8s", version, about, long_about = None)]
struct Cli {
    /// Path to kubeconfig (defaults to the standard inference chain)
    #[arg(long, env = "KUBECONFIG", global = true)]
    kubeconfig: Option<PathBuf>,

    /// Output format for deployment results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the stack into the current cluster (default)
    Deploy,

    /// Print every object as YAML without contacting a cluster
    ///
    /// The GatewayClass is selected from the given names with the same
    /// rules used against a live cluster.
    Render {
        /// GatewayClass names to select from, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        gateway_classes: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = StackConfig::from_env();

    match cli.command {
        Some(Commands::Render { gateway_classes }) => {
            let class = GatewayClassResolver::new(config.gateway.class_name.clone())
                .select(gateway_classes)?;
            print!("{}", render(&config, &class)?);
            Ok(())
        }
        Some(Commands::Deploy) | None => deploy(cli.kubeconfig, cli.output, config).await,
    }
}

async fn deploy(
    kubeconfig: Option<PathBuf>,
    output: OutputFormat,
    config: StackConfig,
) -> anyhow::Result<()> {
    let client = create_client(kubeconfig.as_deref())
        .await
        .context("failed to create kubernetes client")?;

    let orchestrator = TopologyOrchestrator::new(Arc::new(KubeClusterClient::new(client)), config);
    let outputs = orchestrator.run().await?;
    print_output(&outputs, output)
}

fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
