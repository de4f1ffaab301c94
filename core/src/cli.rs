use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::broker::Broker;
use crate::config::{Config, LogFormat, LoggingConfig};
use crate::el::FeelExpressionLanguage;
use crate::model::WorkflowTransformer;
use crate::types::DeploymentResource;

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Tempo - deterministic record processing for partitioned workflows", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of partitions (overrides config file and env vars)
    #[arg(long, global = true)]
    pub partitions: Option<u32>,

    /// Log filter, e.g. "debug" or "tempo_core=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check workflow resources without deploying them
    Validate {
        /// Workflow resources (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Deploy resources to an in-process broker and print the partitions
    Deploy {
        /// Workflow resources (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Message to publish afterwards, as name:correlation-key[:payload]
        #[arg(short = 'p', long = "publish")]
        publish: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

/// A message given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishArg {
    pub name: String,
    pub correlation_key: String,
    pub payload: Vec<u8>,
}

impl std::str::FromStr for PublishArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let correlation_key = parts
            .next()
            .ok_or_else(|| anyhow!("Expected name:correlation-key[:payload], got '{}'", s))?;
        if name.is_empty() {
            bail!("Message name must not be empty in '{}'", s);
        }

        let payload = match parts.next() {
            Some(payload) => {
                serde_json::from_str::<serde_json::Value>(payload)
                    .with_context(|| format!("Payload of '{}' is not JSON", name))?;
                payload.as_bytes().to_vec()
            }
            None => b"{}".to_vec(),
        };

        Ok(Self {
            name: name.to_string(),
            correlation_key: correlation_key.to_string(),
            payload,
        })
    }
}

/// Install the global tracing subscriber; `RUST_LOG` wins over the config
pub fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if result.is_err() {
        debug!("Tracing subscriber already installed");
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::try_parse_from(args)?;
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config = Config::builder()
        .config_path(cli.config)
        .partition_count(cli.partitions)
        .log_level(cli.log_level)
        .build()?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Validate { files } => validate(&files),
        Commands::Deploy { files, publish } => {
            let messages = publish
                .iter()
                .map(|p| p.parse::<PublishArg>())
                .collect::<Result<Vec<_>>>()?;
            deploy(&config, &files, messages).await
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn read_resource(path: &Path) -> Result<DeploymentResource> {
    let resource = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let resource_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;

    Ok(DeploymentResource {
        resource_name,
        resource,
    })
}

fn validate(files: &[PathBuf]) -> Result<()> {
    let transformer = WorkflowTransformer::new(Arc::new(FeelExpressionLanguage));
    let mut failed = 0;

    for path in files {
        let resource = read_resource(path)?;
        match transformer.transform(resource.resource.as_bytes()) {
            Ok(workflows) => {
                let ids: Vec<_> = workflows.iter().map(|w| w.bpmn_process_id()).collect();
                println!("✓ {}: {}", resource.resource_name, ids.join(", "));
            }
            Err(e) => {
                failed += 1;
                println!("✗ {}:\n{}", resource.resource_name, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} resource(s) are invalid", failed, files.len());
    }
    Ok(())
}

async fn deploy(config: &Config, files: &[PathBuf], messages: Vec<PublishArg>) -> Result<()> {
    let resources = files
        .iter()
        .map(|path| read_resource(path))
        .collect::<Result<Vec<_>>>()?;

    let broker = Broker::builder().config(config.broker.clone()).start()?;

    let (key, deployment) = broker.deploy(resources).await?;
    println!("Deployment {}:", key);
    for workflow in &deployment.workflows {
        println!(
            "  {} | version {} | key {} | {}",
            workflow.bpmn_process_id, workflow.version, workflow.key, workflow.resource_name
        );
    }

    for message in messages {
        let key = broker
            .publish_message(&message.name, &message.correlation_key, message.payload)
            .await?;
        info!(name = %message.name, key, "Published message");
        println!("Message '{}' published with key {}", message.name, key);
    }

    for partition_id in broker.partition_ids() {
        let view = broker.partition_view(partition_id).await?;
        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    broker.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish_arg() {
        let arg: PublishArg = "paid:order-1".parse().unwrap();
        assert_eq!(arg.name, "paid");
        assert_eq!(arg.correlation_key, "order-1");
        assert_eq!(arg.payload, b"{}".to_vec());

        let arg: PublishArg = r#"paid:order-1:{"amount":3}"#.parse().unwrap();
        assert_eq!(arg.payload, br#"{"amount":3}"#.to_vec());
    }

    #[test]
    fn test_reject_malformed_publish_arg() {
        assert!("paid".parse::<PublishArg>().is_err());
        assert!(":order-1".parse::<PublishArg>().is_err());
        assert!("paid:order-1:{not json".parse::<PublishArg>().is_err());
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from([
            "tempo",
            "--partitions",
            "2",
            "deploy",
            "order.json",
            "--publish",
            "paid:order-1",
        ])
        .unwrap();

        assert_eq!(cli.partitions, Some(2));
        match cli.command {
            Commands::Deploy { files, publish } => {
                assert_eq!(files, vec![PathBuf::from("order.json")]);
                assert_eq!(publish, vec!["paid:order-1".to_string()]);
            }
            _ => panic!("expected deploy"),
        }

        assert!(Cli::try_parse_from(["tempo", "validate"]).is_err());
    }
}
