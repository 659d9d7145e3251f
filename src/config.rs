use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const APP_NAME: &str = "gpt-agent";
pub const MAX_STEPS_PER_TASK: usize = 25;
pub const PROPOSAL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    /// Environment variable consulted when the key store has no entry.
    pub fn env_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(AgentError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    Chrome,
    Firefox,
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BrowserEngine::Chrome => "chrome",
            BrowserEngine::Firefox => "firefox",
        })
    }
}

/// Everything one agent run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub provider: Provider,
    pub model: String,
    pub browser: BrowserEngine,
    pub profile_dir: PathBuf,
    pub max_steps: usize,
    pub trace: bool,
    pub timeout: Duration,
    pub headless: bool,
    /// Attach a screenshot of the page to every proposal request.
    pub screenshot: bool,
}

impl RunConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            browser: BrowserEngine::Chrome,
            profile_dir: default_profile_dir(),
            max_steps: MAX_STEPS_PER_TASK,
            trace: false,
            timeout: Duration::from_secs(PROPOSAL_TIMEOUT_SECS),
            headless: false,
            screenshot: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentError::validation("model must be a non-empty string"));
        }
        if self.max_steps == 0 {
            return Err(AgentError::validation("max steps must be greater than zero"));
        }
        if self.timeout.is_zero() {
            return Err(AgentError::validation("timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// `<data dir>/gpt-agent`, or `./.gpt-agent` when the platform has none.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_NAME}")))
}

pub fn default_profile_dir() -> PathBuf {
    data_dir().join("profile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_known_names_only() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        let err = "gemini".parse::<Provider>().unwrap_err();
        assert!(matches!(err, AgentError::UnknownProvider(ref p) if p == "gemini"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = RunConfig::new(Provider::OpenAi);
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.max_steps, MAX_STEPS_PER_TASK);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_blank_model_and_zero_steps() {
        let mut cfg = RunConfig::new(Provider::Anthropic);
        cfg.model = "   ".into();
        assert!(matches!(cfg.validate(), Err(AgentError::Validation(_))));

        let mut cfg = RunConfig::new(Provider::Anthropic);
        cfg.max_steps = 0;
        assert!(matches!(cfg.validate(), Err(AgentError::Validation(_))));
    }
}
