//! Zephyr CLI.

use clap::{Parser, Subcommand};

mod commands;

use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "zephyr")]
#[command(about = "Zephyr CI orchestrator CLI", long_about = None)]
struct Cli {
    /// API server URL, for the remote subcommands.
    #[arg(long, env = "ZEPHYR_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// API key sent as `X-API-Key`, for the remote subcommands.
    #[arg(long, env = "ZEPHYR_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline locally, synchronously, without a running API server.
    Run {
        /// Pipeline name to run.
        #[arg(long)]
        pipeline: Option<String>,
        /// Run only this job and its dependencies.
        #[arg(long)]
        job: Option<String>,
        /// Path to a config file; checked for existence only (§6
        /// leaves config parsing to an external collaborator).
        #[arg(long)]
        config: Option<String>,
        /// Skip the warm-pool bracket and run steps directly.
        #[arg(long)]
        local_shell: bool,
    },
    /// Validate a pipeline configuration.
    Validate {
        #[arg(default_value = "zephyr.toml")]
        path: String,
    },
    /// Trigger a pipeline run on a remote API server.
    Trigger {
        project_id: String,
        pipeline_name: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// List pipeline runs on a remote API server.
    Runs {
        #[arg(long)]
        project_id: Option<String>,
    },
    /// Fetch a job's logs from a remote API server.
    Logs { job_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { pipeline, job, config, local_shell } => {
            commands::run::run(RunArgs { pipeline, job, config, local_shell }).await?;
        }
        Commands::Validate { path } => {
            commands::validate::validate(&path);
        }
        Commands::Trigger { project_id, pipeline_name, branch } => {
            commands::remote::trigger(&cli.api_url, cli.api_key, &project_id, &pipeline_name, branch).await?;
        }
        Commands::Runs { project_id } => {
            commands::remote::list_runs(&cli.api_url, cli.api_key, project_id).await?;
        }
        Commands::Logs { job_id } => {
            commands::remote::job_logs(&cli.api_url, cli.api_key, &job_id).await?;
        }
    }

    Ok(())
}
