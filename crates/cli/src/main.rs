use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use convertino_core::{
    install_shutdown_handler, load_config, load_default_config, validate_config, BatchDriver,
    BatchProgress, Config, ConversionContext, ConversionOptions, ConversionService, Router,
    ServiceMenu,
};

#[derive(Debug, Parser)]
#[command(name = "convertino", version, about = "Convert files with external tools")]
struct Cli {
    /// Configuration file (defaults to $CONVERTINO_CONFIG or ./convertino.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the conversions available for a set of files
    Formats {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Convert files and save the results to a directory
    Convert {
        /// Service id, e.g. `media:mp3` or `archive:zip`
        #[arg(long)]
        to: ConversionService,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Conversion options as JSON, e.g. '{"image":{"quality":80}}'
        #[arg(long)]
        options: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Report which external tools are available
    Tools,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => load_default_config().context("Failed to load configuration")?,
    };
    validate_config(&config).context("Configuration validation failed")?;
    init_logging(&config);

    let ctx = ConversionContext::new(config);
    match cli.command {
        Command::Formats { files } => print_menu(&ctx, &files),
        Command::Convert {
            to,
            out,
            options,
            files,
        } => convert(ctx, to, out, options.as_deref(), files).await,
        Command::Tools => print_tools(&ctx).await,
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_menu(ctx: &ConversionContext, files: &[PathBuf]) -> Result<()> {
    match ctx.resolver().menu(files) {
        ServiceMenu::Flat(services) if services.is_empty() => {
            println!("No conversions available");
        }
        ServiceMenu::Flat(services) => {
            for service in services {
                println!("{:<24} {}", service.to_string(), service.display_name());
            }
        }
        ServiceMenu::Grouped(sections) => {
            for section in sections {
                println!("{}", section.title);
                for service in section.services {
                    println!("  {:<22} {}", service.to_string(), service.display_name());
                }
            }
        }
    }
    Ok(())
}

async fn print_tools(ctx: &ConversionContext) -> Result<()> {
    for info in ctx.tools.check_all().await {
        let status = match (&info.path, &info.version) {
            (Some(path), Some(version)) => format!("{} ({})", version, path.display()),
            (Some(path), None) => path.display().to_string(),
            _ => "not found".to_string(),
        };
        println!("{:<10} {}", info.tool.name(), status);
    }
    Ok(())
}

async fn convert(
    ctx: ConversionContext,
    service: ConversionService,
    out: PathBuf,
    options: Option<&str>,
    files: Vec<PathBuf>,
) -> Result<()> {
    let options: ConversionOptions = match options {
        Some(json) => serde_json::from_str(json).context("Invalid --options JSON")?,
        None => ConversionOptions::default(),
    };
    options
        .validate(&service)
        .context("Invalid conversion options")?;

    if !ctx.resolver().compatible_outputs(&files).contains(&service) {
        bail!("{} is not available for the given files", service.display_name());
    }

    tokio::fs::create_dir_all(&out)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", out))?;

    let (mut shutdown, _listener) = install_shutdown_handler(ctx.processes.clone(), ctx.temps.clone());
    let driver = BatchDriver::new(ctx.clone(), Arc::new(Router::with_defaults()));
    let progress = BatchProgress::new();

    let outcome = driver
        .convert_batch(&files, service, &options, &progress, &shutdown.token())
        .await;

    if outcome.was_cancelled() && shutdown.is_triggered() {
        shutdown.completed().await;
        bail!("Interrupted");
    }

    for artifact in &outcome.artifacts {
        match ctx.save_artifact(artifact, &out).await {
            Ok(saved) => println!("{}", saved.display()),
            Err(e) => warn!(artifact = %artifact.suggested_name, error = %e, "Failed to save artifact"),
        }
    }
    ctx.temps.cleanup();

    let (done, total) = progress.snapshot();
    match outcome.error {
        Some(e) => Err(e).context(format!("Stopped after {} of {} jobs", done, total)),
        None => {
            info!(jobs = total, artifacts = outcome.artifacts.len(), "Conversion finished");
            Ok(())
        }
    }
}
