use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

pub mod cloud_init;
pub mod cluster;
pub mod config;
pub mod discovery;
pub mod stack;
pub mod template;
pub mod writer;

#[derive(Parser)]
#[command(name = "cfn-cluster-template")]
#[command(about = "Generate the CloudFormation template for a CoreOS cluster stack")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Log builder activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the template (the default)
    Generate {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Render the template and check it with CloudFormation
    Validate,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

impl From<OutputFormat> for template::Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => template::Format::Json,
            OutputFormat::Yaml => template::Format::Yaml,
        }
    }
}

async fn assemble(config: &config::Config, config_path: &Path) -> anyhow::Result<template::TemplateBuilder> {
    let token = match &config.discovery_token {
        Some(token) => {
            debug!("using discovery token from configuration");
            token.clone()
        }
        None => discovery::fetch_token(&config.discovery_url).await?,
    };

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let cloud_init_path = base.join(&config.cloud_init.location);
    let user_data = cloud_init::load(&cloud_init_path, &token)?;

    let settings = cluster::ClusterSettings {
        region: config.region.clone(),
        user_data,
        discovery_token: token,
        description: config.description.clone(),
    };
    return Ok(cluster::build(&settings)?);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    let config = config::parse(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let template = assemble(&config, &cli.config).await?;

    match cli.command.unwrap_or(Command::Generate {
        output: None,
        format: OutputFormat::Json,
    }) {
        Command::Generate { output, format } => {
            let rendered = template.render(format.into())?;
            writer::write(output.as_deref(), &rendered)?;
            info!(bytes = rendered.len(), "template written");
        }
        Command::Validate => {
            let rendered = template.serialize()?;
            let stack = stack::Stack::new(config.region.as_deref()).await;
            let validation = stack.validate(&rendered).await?;
            if let Some(description) = &validation.description {
                println!("{}", description);
            }
            for parameter in &validation.parameters {
                println!("parameter: {}", parameter);
            }
        }
    }

    return Ok(());
}
