//! Powerscope CLI - drive power-analysis models from the command line.

use anyhow::Context;
use clap::Parser;
use powerscope_cli::cli::{CliFormat, ModelArgs};
use powerscope_cli::config::OutputFormat;
use powerscope_cli::{repl, replay, Cli, Command, Config, Formatter, Script};
use powerscope_project::Project;
use powerscope_solver::{HttpSolver, MockSolver};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(endpoint) = &cli.endpoint {
        config.solver.endpoint = endpoint.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let format = match cli.format {
        Some(CliFormat::Json) => OutputFormat::Json,
        Some(CliFormat::Table) => OutputFormat::Table,
        None => config.settings.format,
    };
    let formatter = Formatter::new(format, !cli.no_color && config.settings.color);

    if cli.offline {
        tracing::info!("Offline: solver requests are echoed back");
    } else {
        tracing::info!("Using solver at {}", config.solver.endpoint);
    }

    match cli.command.unwrap_or_else(|| Command::Repl(ModelArgs::default())) {
        Command::Config => {
            print!("{}", config.to_toml()?);
        }
        Command::Ranges(args) => {
            let mut project = Project::new(args.kind);
            project.add_model(args.to_model()?)?;
            println!("{}", formatter.format_ranges(&project.ranges())?);
        }
        Command::Run(args) => {
            let script = Script::from_file(&args.script)
                .with_context(|| format!("Failed to load script {}", args.script.display()))?;
            let pipeline = config.pipeline.clone();
            let project = if cli.offline {
                replay(&script, MockSolver::echo(), pipeline).await?
            } else {
                replay(&script, HttpSolver::from_config(&config.solver)?, pipeline).await?
            };
            println!("{}", formatter.format_project(&project)?);
        }
        Command::Repl(args) => {
            let pipeline = config.pipeline.clone();
            if cli.offline {
                repl::run_repl(&args, MockSolver::echo(), pipeline, &formatter).await?;
            } else {
                let solver = HttpSolver::from_config(&config.solver)?;
                repl::run_repl(&args, solver, pipeline, &formatter).await?;
            }
        }
    }

    Ok(())
}
