//! `feedback validate`: check a draft offline without submitting it.

use crate::{
    cli::CliArgs,
    config::CliConfig,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::eyre,
};
use colored::Colorize;
use feedback_widget::{
    Field,
    ValidationError,
    validation::validate_field,
};
use serde_json::{
    Map,
    Value,
};

#[derive(Debug, Parser)]
#[clap(
    name = "validate",
    arg_required_else_help = true,
    about = "Check feedback against the form rules without sending it"
)]
pub struct ValidateArgs {
    /// Feedback text
    #[clap(value_name = "COMMENT")]
    pub comment: String,

    #[clap(long)]
    pub name: Option<String>,

    #[clap(long)]
    pub email: Option<String>,
}

impl ValidateArgs {
    /// Validation result per visible field, in form order.
    pub fn check(&self, config: &CliConfig) -> Vec<(Field, Result<(), ValidationError>)> {
        let fields = [
            (Field::Comment, Some(&self.comment), true),
            (Field::Name, self.name.as_ref(), config.widget.show_name),
            (Field::Email, self.email.as_ref(), config.widget.show_email),
        ];

        fields
            .into_iter()
            .filter(|(_, _, visible)| *visible)
            .map(|(field, value, _)| {
                let value = value.map(String::as_str).unwrap_or_default();
                (field, validate_field(field, value))
            })
            .collect()
    }

    pub fn run(&self, args: &CliArgs, config: &CliConfig) -> Result<()> {
        let results = self.check(config);
        let failures = results.iter().filter(|(_, result)| result.is_err()).count();

        if args.json_output() {
            let fields: Map<String, Value> = results
                .iter()
                .map(|(field, result)| {
                    let error = match result {
                        Ok(()) => Value::Null,
                        Err(error) => Value::String(error.to_string()),
                    };
                    (field.as_str().to_string(), error)
                })
                .collect();
            let status = if failures == 0 { "valid" } else { "invalid" };
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "status": status,
                    "fields": fields,
                }))?
            );
        } else {
            for (field, result) in &results {
                match result {
                    Ok(()) => println!("{} {}", "ok".green().bold(), field.as_str()),
                    Err(error) => println!("{} {}: {error}", "error".red().bold(), field.as_str()),
                }
            }
        }

        if failures > 0 {
            return Err(eyre!("{failures} field(s) failed validation"));
        }
        Ok(())
    }
}
