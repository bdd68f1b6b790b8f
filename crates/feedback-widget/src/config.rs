//! Configuration for the feedback widget

use crate::{
    error::{
        Error,
        Result,
    },
    submission::HostContext,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

/// Backend environment the widget submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Environment {
    /// Development backend (localhost)
    Development,
    /// Production backend
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => {
                Err(Error::ConfigError(format!(
                    "Invalid environment '{s}'. Valid values are: development, dev, local, production, prod"
                )))
            }
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "LOCAL"),
            Environment::Production => write!(f, "PRODUCTION"),
        }
    }
}

impl Environment {
    /// Submission endpoint for this environment
    pub fn api_url(&self) -> &'static str {
        match self {
            Environment::Development => "http://localhost:5000/submit_comment",
            Environment::Production => "https://user-comments-backend.onrender.com/submit_comment",
        }
    }

    /// Pick the environment from the page hosting the widget.
    pub fn detect(host: &HostContext) -> Self {
        if host.is_local() {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    /// Load environment from the `FEEDBACK_ENV` environment variable
    ///
    /// Returns None if the variable is not set or contains an invalid value.
    pub fn from_env() -> Option<Self> {
        std::env::var("FEEDBACK_ENV")
            .ok()
            .and_then(|val| val.parse().ok())
    }
}

/// Corner of the viewport the floating button is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

/// Requested color scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThemePreference {
    /// Follow the system color scheme
    #[default]
    Auto,
    Light,
    Dark,
}

fn default_primary_color() -> String {
    "#00C2A8".to_string()
}

fn default_placeholder() -> String {
    "Share your feedback...".to_string()
}

fn default_title() -> String {
    "Feedback".to_string()
}

const fn default_show_field() -> bool {
    true
}

/// Caller-supplied widget configuration.
///
/// Every field is optional when deserializing; `api_url` is resolved from the
/// host page when left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub theme: ThemePreference,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_show_field")]
    pub show_email: bool,
    #[serde(default = "default_show_field")]
    pub show_name: bool,
    /// Submission endpoint; `None` means "pick from the host environment"
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            position: Position::default(),
            theme: ThemePreference::default(),
            primary_color: default_primary_color(),
            placeholder: default_placeholder(),
            title: default_title(),
            show_email: default_show_field(),
            show_name: default_show_field(),
            api_url: None,
        }
    }
}

impl WidgetConfig {
    /// Set the submission endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Backend picked from the host, or `None` when `api_url` overrides it.
    pub fn detected_environment(&self, host: &HostContext) -> Option<Environment> {
        match self.api_url {
            Some(_) => None,
            None => Some(Environment::detect(host)),
        }
    }

    /// Submission endpoint, falling back to the host environment default.
    pub fn resolved_api_url(&self, host: &HostContext) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| Environment::detect(host).api_url().to_string())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(api_url) = &self.api_url {
            if api_url.trim().is_empty() {
                return Err(Error::ConfigError("API URL cannot be empty".to_string()));
            }

            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err(Error::ConfigError(
                    "API URL must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}
