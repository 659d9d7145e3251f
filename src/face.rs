use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::config::RunConfig;
use crate::error::Result;

/// Asks the user before anything risky happens.
#[async_trait]
pub trait Clarifier: Send + Sync {
    /// `true` only on an explicit yes. No answer counts as no.
    async fn confirm(&self, summary: &str) -> Result<bool>;

    async fn ask(&self, question: &str) -> Result<String>;
}

/// Best-effort narration of what the agent is about to do.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn print(&self, text: &str) -> Result<()>;
}

/// Interprets a confirmation answer.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// stdin/stdout front end for the CLI.
pub struct TerminalFace {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Default for TerminalFace {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalFace {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn prompt(&self, label: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;
        let line = self.lines.lock().await.next_line().await?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    /// Next non-empty task, or `None` once stdin is closed.
    pub async fn read_task(&self) -> Result<Option<String>> {
        loop {
            match self.prompt(">> ").await? {
                None => return Ok(None),
                Some(task) if task.is_empty() => {
                    println!("Task cannot be empty. Try again.");
                }
                Some(task) => return Ok(Some(task)),
            }
        }
    }

    /// Read an API key, re-asking until something non-empty arrives.
    pub async fn read_api_key(&self, provider: &str) -> Result<Option<String>> {
        println!("No API key found for {provider}.");
        println!("Paste your key below; press Enter to continue.");
        loop {
            match self.prompt("API key: ").await? {
                None => return Ok(None),
                Some(key) if key.is_empty() => println!("API key cannot be empty. Try again."),
                Some(key) => return Ok(Some(key)),
            }
        }
    }

    pub fn show_banner(&self, cfg: &RunConfig) {
        println!("{}", banner(cfg));
    }
}

/// Boxed summary of the session settings.
pub fn banner(cfg: &RunConfig) -> String {
    const WIDTH: usize = 38;
    let header = format!(">_ {}", crate::config::APP_NAME);
    let version = format!("(v{})", env!("CARGO_PKG_VERSION"));
    let row = |left: &str, right: &str| {
        let pad = WIDTH.saturating_sub(left.chars().count() + right.chars().count());
        format!("│{left}{}{right}│", " ".repeat(pad))
    };

    [
        format!("┌{}┐", "─".repeat(WIDTH)),
        row(&header, &version),
        row("", ""),
        row("provider:", cfg.provider.as_str()),
        row("model:", &cfg.model),
        row("browser:", &cfg.browser.to_string()),
        format!("└{}┘", "─".repeat(WIDTH)),
    ]
    .join("\n")
}

#[async_trait]
impl Clarifier for TerminalFace {
    async fn confirm(&self, summary: &str) -> Result<bool> {
        println!("{summary}");
        let answer = self.prompt("Proceed? [y/N]: ").await?;
        Ok(answer.as_deref().is_some_and(is_affirmative))
    }

    async fn ask(&self, question: &str) -> Result<String> {
        println!("{question}");
        Ok(self.prompt(">> ").await?.unwrap_or_default())
    }
}

#[async_trait]
impl Narrator for TerminalFace {
    async fn print(&self, text: &str) -> Result<()> {
        println!("• {text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;

    #[test]
    fn only_yes_confirms() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn banner_lists_session_settings() {
        let cfg = RunConfig::new(Provider::OpenAi);
        let text = banner(&cfg);
        assert!(text.contains("provider:"));
        assert!(text.contains("gpt-4o-mini"));
        assert!(text.contains("chrome"));
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }
}
