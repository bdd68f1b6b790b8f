//! `feedback submit`: run one submission through the full widget pipeline.

use crate::{
    cli::CliArgs,
    config::CliConfig,
};
use clap::{
    Parser,
    ValueHint,
};
use color_eyre::{
    Result,
    eyre::eyre,
};
use colored::Colorize;
use feedback_widget::{
    Environment,
    Field,
    HostContext,
    RetryNotice,
    SubmissionClient,
    SubmitOutcome,
    Widget,
    WidgetConfig,
};
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_PAGE_URL: &str = "http://localhost/";
pub const DEFAULT_USER_AGENT: &str = concat!("feedback-cli/", env!("CARGO_PKG_VERSION"));

/// How often the retry notice is polled while a submission is in flight.
const PROGRESS_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[clap(
    name = "submit",
    arg_required_else_help = true,
    about = "Validate and submit feedback to the backend"
)]
pub struct SubmitArgs {
    /// Feedback text
    #[clap(value_name = "COMMENT")]
    pub comment: String,

    /// Optional name of the submitter
    #[clap(long)]
    pub name: Option<String>,

    /// Optional contact email
    #[clap(long)]
    pub email: Option<String>,

    /// Page the feedback is about; decides the default backend
    #[clap(long = "page-url", value_hint = ValueHint::Url, default_value = DEFAULT_PAGE_URL)]
    pub page_url: String,

    /// User agent reported with the submission
    #[clap(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Submission endpoint, overriding the configuration file
    #[clap(long = "api-url", env = "FEEDBACK_API_URL", value_hint = ValueHint::Url)]
    pub api_url: Option<String>,

    /// Submit to a known backend environment (development or production)
    #[clap(long = "env", env = "FEEDBACK_ENV", conflicts_with = "api_url")]
    pub environment: Option<Environment>,
}

impl SubmitArgs {
    /// Widget configuration with the command line overrides applied.
    pub fn widget_config(&self, config: &CliConfig) -> WidgetConfig {
        let widget = config.widget.clone();
        match (&self.api_url, self.environment) {
            (Some(api_url), _) => widget.with_api_url(api_url.as_str()),
            (None, Some(environment)) => widget.with_api_url(environment.api_url()),
            (None, None) => widget,
        }
    }

    pub async fn run(&self, args: &CliArgs, config: &CliConfig) -> Result<()> {
        let host = HostContext::from_page_url(&self.page_url, self.user_agent.as_str())?;
        let widget_config = self.widget_config(config);
        let client = SubmissionClient::new(&widget_config, &host)?;
        let widget = Widget::with_client(widget_config, host, client, config.rate_limit.clone())?;

        widget.open();
        widget.set_field(Field::Comment, self.comment.as_str());
        if let Some(name) = &self.name {
            widget.set_field(Field::Name, name.as_str());
        }
        if let Some(email) = &self.email {
            widget.set_field(Field::Email, email.as_str());
        }

        let outcome = Self::submit_with_progress(&widget, args.json_output()).await;
        widget.dispose();

        Self::report(outcome, args.json_output())
    }

    /// Await the submission, echoing retry notices as they appear.
    async fn submit_with_progress(widget: &Widget, json_output: bool) -> SubmitOutcome {
        let submit = widget.submit();
        tokio::pin!(submit);

        let mut ticker = tokio::time::interval(PROGRESS_POLL);
        let mut last_notice: Option<RetryNotice> = None;

        loop {
            tokio::select! {
                outcome = &mut submit => return outcome,
                _ = ticker.tick() => {
                    let notice = widget.view().retry_notice;
                    if notice != last_notice {
                        if let (Some(notice), false) = (notice, json_output) {
                            eprintln!("{}", notice.message().yellow());
                        }
                        last_notice = notice;
                    }
                }
            }
        }
    }

    fn report(outcome: SubmitOutcome, json_output: bool) -> Result<()> {
        match outcome {
            SubmitOutcome::Submitted { response, attempts } => {
                if json_output {
                    let output = json!({
                        "status": "success",
                        "attempts": attempts,
                        "response": response,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("{}", "Thank you! Your feedback has been submitted.".green().bold());
                    if attempts > 1 {
                        println!("Delivered after {attempts} attempts");
                    }
                }
                Ok(())
            }
            SubmitOutcome::Invalid { field, error } => Err(eyre!("{}: {error}", field.as_str())),
            SubmitOutcome::Blocked(reason) => Err(eyre!(reason.message())),
            SubmitOutcome::Failed(failure) => Err(failure.into()),
            SubmitOutcome::AlreadySubmitting => Err(eyre!("A submission is already in progress")),
        }
    }
}
