//! CLI command definitions and argument parsing.

use crate::error::{CliError, Result};
use clap::{Parser, Subcommand};
use powerscope_domain::{attribs, Attribs, FieldValue, Model, ModelKind, Output};
use std::path::PathBuf;

/// Powerscope - interactive power analysis against a solver service.
#[derive(Debug, Parser)]
#[command(name = "powerscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "POWERSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Solver endpoint (overrides the config file)
    #[arg(short, long, global = true, env = "POWERSCOPE_SOLVER")]
    pub endpoint: Option<String>,

    /// Echo requests back instead of calling a solver
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a JSON script of edits and drags
    Run(RunArgs),

    /// Show the axis ranges for a single model without solving it
    Ranges(ModelArgs),

    /// Enter interactive REPL mode
    Repl(ModelArgs),

    /// Print the effective configuration
    Config,
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Script file
    pub script: PathBuf,
}

/// Model given on the command line.
#[derive(Debug, Clone, Parser)]
pub struct ModelArgs {
    /// Model kind (ttest, ztest, dichot)
    #[arg(short, long, default_value = "ttest")]
    pub kind: ModelKind,

    /// Field solved for (n, nByCI, power, delta)
    #[arg(short, long, default_value = "power")]
    pub output: Output,

    /// Field assignments, e.g. `--set n=40 --set sigma=12`
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,
}

impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            kind: ModelKind::TTest,
            output: Output::Power,
            assignments: Vec::new(),
        }
    }
}

impl ModelArgs {
    /// Build the model; t and z tests start from a worked example
    pub fn to_model(&self) -> Result<Model> {
        let mut values = match self.kind {
            ModelKind::TTest | ModelKind::ZTest => default_values(),
            ModelKind::Dichot => Attribs::new(),
        };
        for assignment in &self.assignments {
            let (key, value) = parse_assignment(assignment)?;
            values.insert(key, value);
        }
        Ok(Model::new(self.kind, self.output, values)?)
    }
}

/// `alpha 0.05, power 0.8, delta 5, sigma 10, n 33`
pub fn default_values() -> Attribs {
    attribs([
        ("alpha", 0.05),
        ("power", 0.8),
        ("delta", 5.0),
        ("sigma", 10.0),
        ("n", 33.0),
    ])
}

/// Parse `key=value`; values become numbers, flags or text in that order.
pub fn parse_assignment(s: &str) -> Result<(String, FieldValue)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| CliError::InvalidInput(format!("Expected KEY=VALUE, got '{}'", s)))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidInput(format!("Missing key in '{}'", s)));
    }
    let raw = raw.trim();
    let value = if let Ok(number) = raw.parse::<f64>() {
        FieldValue::Number(number)
    } else if let Ok(flag) = raw.parse::<bool>() {
        FieldValue::Flag(flag)
    } else {
        FieldValue::Text(raw.to_string())
    };
    Ok((key.to_string(), value))
}
