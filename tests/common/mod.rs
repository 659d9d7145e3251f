#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use gpt_agent::brain::Proposer;
use gpt_agent::driver::{PageDriver, RawElement, ScrollDirection};
use gpt_agent::face::{Clarifier, Narrator};
use gpt_agent::{ActionProposal, ActionType, AgentError, PageSnapshot, Result};

/// In-memory page. Elements are keyed by the css passed to `query_all`.
#[derive(Default)]
pub struct FakePage {
    urls: Vec<String>,
    url_reads: AtomicUsize,
    elements: HashMap<String, Vec<RawElement>>,
    broken_query: Option<String>,
    pub queries: AtomicUsize,
    pub idle_waits: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            ..Default::default()
        }
    }

    /// Successive `current_url` reads walk through `urls`, then stick on the last one.
    pub fn with_urls(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with(mut self, css: &str, element: RawElement) -> Self {
        self.elements.entry(css.to_string()).or_default().push(element);
        self
    }

    /// `query_all(css)` fails as if the tab had crashed mid-capture.
    pub fn failing_query(mut self, css: &str) -> Self {
        self.broken_query = Some(css.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutating_calls(&self) -> usize {
        self.calls().len()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn current_url(&self) -> Result<String> {
        let i = self.url_reads.fetch_add(1, Ordering::SeqCst);
        let i = i.min(self.urls.len().saturating_sub(1));
        Ok(self.urls.get(i).cloned().unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        Ok("Fake page".to_string())
    }

    async fn body_text(&self) -> Result<String> {
        Ok("Welcome to the fake page".to_string())
    }

    async fn wait_for_network_idle(&self) -> Result<()> {
        self.idle_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query_all(&self, css: &str) -> Result<Vec<RawElement>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.broken_query.as_deref() == Some(css) {
            return Err(AgentError::Browser(anyhow::anyhow!(
                "Runtime.evaluate failed for {css}: target closed"
            )));
        }
        Ok(self.elements.get(css).cloned().unwrap_or_default())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {url}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click {selector}"));
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.record(format!("fill {selector} {text}"));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.record(format!("press {key}"));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<()> {
        self.record(format!("scroll {direction}"));
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        self.record("back".to_string());
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        self.record("forward".to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.record("reload".to_string());
        Ok(())
    }
}

/// Always proposes the same thing, or always fails.
pub struct ScriptedProposer {
    reply: std::result::Result<ActionProposal, String>,
    pub calls: Arc<AtomicUsize>,
    pub last_snapshot: Arc<Mutex<Option<PageSnapshot>>>,
}

impl ScriptedProposer {
    pub fn proposing(
        action_type: ActionType,
        selector: Option<&str>,
        value: Option<&str>,
        summary: &str,
    ) -> Self {
        Self {
            reply: Ok(ActionProposal {
                action_type,
                selector: selector.map(String::from),
                value: value.map(String::from),
                summary: summary.to_string(),
            }),
            calls: Arc::default(),
            last_snapshot: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Arc::default(),
            last_snapshot: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Proposer for ScriptedProposer {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn propose(&self, _task: &str, snapshot: &PageSnapshot) -> Result<ActionProposal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_snapshot.lock().unwrap() = Some(snapshot.clone());
        match &self.reply {
            Ok(proposal) => Ok(proposal.clone()),
            Err(message) => Err(AgentError::Provider {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}

/// Answers every confirmation the same way and remembers what it was asked.
pub struct FixedAnswer {
    answer: bool,
    pub asked: Mutex<Vec<String>>,
}

impl FixedAnswer {
    pub fn yes() -> Self {
        Self {
            answer: true,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn no() -> Self {
        Self {
            answer: false,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.lock().unwrap().len()
    }
}

#[async_trait]
impl Clarifier for FixedAnswer {
    async fn confirm(&self, summary: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(summary.to_string());
        Ok(self.answer)
    }

    async fn ask(&self, question: &str) -> Result<String> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(if self.answer { "yes" } else { "no" }.to_string())
    }
}

#[derive(Default)]
pub struct RecordingNarrator {
    pub lines: Mutex<Vec<String>>,
}

impl RecordingNarrator {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl Narrator for RecordingNarrator {
    async fn print(&self, text: &str) -> Result<()> {
        self.lines.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
