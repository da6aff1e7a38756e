//! FraudGuard - process entry point
//!
//! Serves the REST API by default; `train` and `info` run the pipeline and
//! dataset summary as one-shot commands.

use clap::{Parser, Subcommand};
use fraudguard::artifact::{ArtifactStore, ModelRegistry};
use fraudguard::data::FraudDataset;
use fraudguard::pipeline::{PipelineConfig, TrainingPipeline};
use fraudguard::sampling::BalanceMethod;
use fraudguard::server::{run_server, ServerConfig};

#[derive(Parser)]
#[command(name = "fraudguard", about = "Credit card fraud detection service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Train all model variants and print their reports
    Train {
        /// Path to the labeled transaction CSV
        #[arg(long)]
        data: String,
        /// Directory for persisted model artifacts
        #[arg(long, default_value = "./models")]
        models_dir: String,
        /// Rebalancing strategy: smote or undersample
        #[arg(long, default_value = "smote")]
        balance_method: String,
    },
    /// Print a summary of the dataset
    Info {
        #[arg(long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudguard=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train {
            data,
            models_dir,
            balance_method,
        }) => cmd_train(&data, &models_dir, &balance_method)?,
        Some(Commands::Info { data }) => cmd_info(&data)?,
        Some(Commands::Serve { host, port }) => {
            let mut config = ServerConfig::default();
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_server(config).await?;
        }
        None => run_server(ServerConfig::default()).await?,
    }

    Ok(())
}

fn cmd_train(data: &str, models_dir: &str, balance_method: &str) -> anyhow::Result<()> {
    let dataset = FraudDataset::load(data)?;
    let registry = ModelRegistry::new();
    let store = ArtifactStore::new(models_dir);

    let config = PipelineConfig {
        balance_method: balance_method.parse::<BalanceMethod>()?,
        ..Default::default()
    };

    let outcomes = TrainingPipeline::new(config).run(&dataset, &registry, &store)?;
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => {
                println!(
                    "{:<22} accuracy={:.4} precision={:.4} recall={:.4} f1={:.4} auc={:.4}",
                    outcome.variant,
                    report.accuracy,
                    report.precision,
                    report.recall,
                    report.f1_score,
                    report.roc_auc
                );
            }
            Err(e) => println!("{:<22} failed: {}", outcome.variant, e),
        }
    }
    Ok(())
}

fn cmd_info(data: &str) -> anyhow::Result<()> {
    let dataset = FraudDataset::load(data)?;
    let summary = dataset.summary()?;
    println!("rows:            {}", summary.total_rows);
    println!("fraud:           {}", summary.fraud_count);
    println!("legitimate:      {}", summary.legitimate_count);
    println!("fraud rate:      {:.4}%", summary.fraud_percentage);
    println!("features:        {}", summary.n_features);
    println!("in-memory size:  {} bytes", summary.memory_bytes);
    Ok(())
}
