mod cli;
mod config;
mod submit;
mod validate;

use crate::{
    cli::{
        Cli,
        Commands,
    },
    config::CliConfig,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::Report,
};
use serde_json::json;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "off",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .display_location_section(false)
        .display_env_section(false)
        .install()?;

    let cli = Cli::parse();
    init_tracing(cli.args.verbose);

    let result = async {
        let config = CliConfig::read_from_file(&cli.args)?;
        match &cli.command {
            Commands::Submit(submit) => submit.run(&cli.args, &config).await?,
            Commands::Validate(validate) => validate.run(&cli.args, &config)?,
            Commands::Config(config_cmd) => config_cmd.run(&cli.args, &config)?,
        }
        Ok::<_, Report>(())
    }
    .await;

    if let Err(err) = result {
        if cli.args.json_output() {
            eprintln!(
                "{}",
                json!({
                    "status": "error",
                    "error": {
                        "message": err.to_string(),
                    }
                })
            );
            std::process::exit(1);
        } else {
            return Err(err);
        }
    }

    Ok(())
}
