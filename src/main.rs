use anyhow::{Context, Result};
use deepdive::cli::init::{self, InitConfig, InitResult};
use deepdive::cli::output::{ConsoleSink, Output};
use deepdive::cli::{Cli, Commands};
use deepdive::{DeepdiveConfig, ResearchCoordinator};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<ExitCode> {
    match cli.command.clone().unwrap_or_else(Commands::interactive) {
        Commands::Init { path, force } => {
            init_tracing(&cli, "info");
            Ok(match init::run(InitConfig { path, force }, output) {
                InitResult::Success => ExitCode::SUCCESS,
                InitResult::AlreadyExists | InitResult::Error(_) => ExitCode::FAILURE,
            })
        }
        Commands::Config { validate } => {
            let config = read_config(&cli.config, output)?;
            init_tracing(&cli, &config.log_level);
            show_config(&cli.config, &config, validate, output)
        }
        Commands::Research {
            query,
            output: report_path,
            no_stream,
        } => {
            let mut config = read_config(&cli.config, output)?;
            init_tracing(&cli, &config.log_level);
            if no_stream {
                config.planner.stream = false;
            }
            config
                .validate()
                .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

            let query = match query {
                Some(query) => query,
                None => output
                    .prompt("Enter your research query:")
                    .context("failed to read the query from stdin")?,
            };
            let report_path = report_path.unwrap_or_else(|| config.output.path.clone());
            research(&config, &query, &report_path, output).await
        }
    }
}

/// Load the config file, or fall back to built-in defaults when it does not exist
fn read_config(path: &Path, output: &Output) -> Result<DeepdiveConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        DeepdiveConfig::from_toml_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    } else {
        output.warning(&format!(
            "{} not found, using built-in defaults (run 'deepdive init' to create one)",
            path.display()
        ));
        Ok(DeepdiveConfig::default())
    }
}

fn init_tracing(cli: &Cli, log_level: &str) {
    let default_filter = if cli.verbose {
        "debug".to_string()
    } else {
        format!("warn,deepdive={}", log_level)
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color);
    let installed = if cli.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        eprintln!("failed to install log subscriber: {}", e);
    }
}

fn show_config(
    path: &Path,
    config: &DeepdiveConfig,
    validate: bool,
    output: &Output,
) -> Result<ExitCode> {
    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    for stage in deepdive::utils::toml_config::STAGE_MODELS {
        if let Some(model) = config.get_model(stage) {
            output.kv(stage, &format!("{} ({})", model.model, model.provider));
        }
    }
    output.kv("search", &format!("{:?}", config.search.backend).to_lowercase());
    output.kv(
        "mcp",
        &if config.mcp.enabled {
            config.mcp.url.clone()
        } else {
            "disabled".to_string()
        },
    );
    output.newline();
    println!("{}", config.to_toml_string()?);

    if validate {
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&format!("Configuration is invalid: {}", e));
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn research(
    config: &DeepdiveConfig,
    query: &str,
    report_path: &Path,
    output: &Output,
) -> Result<ExitCode> {
    let sink = Arc::new(ConsoleSink::new(*output));
    let coordinator = ResearchCoordinator::from_config(config, sink)
        .context("failed to set up the research pipeline")?;

    let report = match coordinator.run(query).await {
        Ok(report) => report,
        Err(e) => {
            output.error(&format!("Research failed at the {} stage: {}", e.stage(), e));
            return Ok(ExitCode::FAILURE);
        }
    };

    std::fs::write(report_path, &report.content)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    output.complete(&format!(
        "Research result saved to {}",
        report_path.display()
    ));
    output.kv("subtasks", &report.subtask_count.to_string());
    output.kv("workers", &report.worker_reports.len().to_string());
    output.kv("duration", &format!("{:.1}s", report.duration_ms as f64 / 1000.0));
    Ok(ExitCode::SUCCESS)
}
