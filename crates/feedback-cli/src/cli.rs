use crate::{
    config::ConfigArgs,
    submit::SubmitArgs,
    validate::ValidateArgs,
};
use clap::{
    Parser,
    ValueHint,
};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, Default)]
pub struct CliArgs {
    /// Print machine readable JSON instead of formatted text
    #[clap(short, long, global = true)]
    pub json: bool,
    /// Configuration file (defaults to the user config directory)
    #[clap(
        long = "config",
        global = true,
        env = "FEEDBACK_CONFIG",
        value_hint = ValueHint::FilePath
    )]
    pub config_path: Option<PathBuf>,
    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CliArgs {
    pub fn json_output(&self) -> bool {
        self.json
    }
}

#[derive(Parser)]
#[command(
    name = "feedback",
    version,
    about = "Submit feedback through the widget submission pipeline"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[command(flatten)]
    pub args: CliArgs,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    #[command(name = "submit")]
    Submit(SubmitArgs),
    #[command(name = "validate")]
    Validate(ValidateArgs),
    #[command(about = "Manage configuration")]
    Config(ConfigArgs),
}
