use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu",
    version,
    about = "Protein Outliner CLI - Replay and verify outliner sessions against an in-memory host scene.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario and print the resulting outliner tree.
    Replay(ReplayArgs),
    /// Replay a scenario and verify the outliner invariants after every step.
    Check(CheckArgs),
}

/// Arguments shared by every command that loads a scenario.
#[derive(Args, Debug)]
pub struct ScenarioArgs {
    /// Path to the scenario file in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub scenario: PathBuf,

    /// Set a sync configuration value, overriding the scenario file.
    /// Can be used multiple times. Example: -S sync.visibility-min-interval-ms=0
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Print the tree after every action instead of only at the end.
    #[arg(long)]
    pub every_step: bool,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
}
