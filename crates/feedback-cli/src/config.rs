//! Persistent CLI configuration stored as TOML.

use crate::cli::CliArgs;
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{
        WrapErr,
        eyre,
    },
};
use colored::Colorize;
use feedback_widget::{
    RateLimitConfig,
    WidgetConfig,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::json;
use std::path::{
    Path,
    PathBuf,
};
use tracing::debug;

pub const CONFIG_DIR: &str = "feedback-widget";
pub const CONFIG_FILE: &str = "config.toml";

/// Contents of the configuration file.
///
/// ```toml
/// [widget]
/// theme = "dark"
/// showEmail = false
/// apiUrl = "https://feedback.example.com/submit_comment"
///
/// [rate_limit]
/// max_per_window = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl CliConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Path given on the command line, or the default location.
    pub fn path(args: &CliArgs) -> Result<PathBuf> {
        args.config_path
            .clone()
            .or_else(Self::default_path)
            .ok_or_else(|| eyre!("Could not determine the user configuration directory"))
    }

    pub fn read_from_file(args: &CliArgs) -> Result<Self> {
        Self::read_from_path(&Self::path(args)?)
    }

    /// Load the configuration at `path`. A missing file yields the defaults.
    pub fn read_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read configuration from {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))?;
        config.widget.validate()?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .wrap_err_with(|| format!("Failed to write configuration to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Parser)]
#[clap(about = "Manage configuration")]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Write a configuration file with the default values
    Init {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

impl ConfigArgs {
    pub fn run(&self, args: &CliArgs, config: &CliConfig) -> Result<()> {
        let path = CliConfig::path(args)?;

        match self.command {
            ConfigCommand::Show => {
                if args.json_output() {
                    println!("{}", serde_json::to_string_pretty(config)?);
                } else {
                    println!("{}", format!("# {}", path.display()).dimmed());
                    print!("{}", toml::to_string_pretty(config)?);
                }
            }
            ConfigCommand::Path => {
                if args.json_output() {
                    println!("{}", json!({ "path": path }));
                } else {
                    println!("{}", path.display());
                }
            }
            ConfigCommand::Init { force } => {
                if path.exists() && !force {
                    return Err(eyre!(
                        "Configuration already exists at {} (use --force to overwrite)",
                        path.display()
                    ));
                }
                CliConfig::default().write_to_path(&path)?;

                if args.json_output() {
                    println!("{}", json!({ "status": "success", "path": path }));
                } else {
                    println!("{} {}", "Wrote".green().bold(), path.display());
                }
            }
        }

        Ok(())
    }
}
