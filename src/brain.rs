use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::actions::{ActionProposal, action_specs};
use crate::config::{Provider, RunConfig};
use crate::error::{AgentError, Result};
use crate::types::{PageSnapshot, PayloadOptions};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

pub const SYSTEM_PROMPT: &str = r#"You are a browser automation decision agent.

Propose the NEXT SINGLE browser action that moves toward the user's goal, based ONLY on the browser state you are given.
You do not execute actions, you do not ask the user questions and you do not explain your reasoning.

Allowed actions: open, click, type, press, wait, back, forward, reload, scroll, snapshot, done.

Input:
- the user goal
- the browser state (url, title, text, links, inputs, buttons, images)
The browser state is the only source of truth. If an element is not listed, it does not exist. Never invent selectors.

Output:
Call exactly ONE tool representing the next action. Never answer with free-form text.
Risk is computed by the system from the browser state; do not try to assess it.

Rules:
1. One action per response.
2. Prefer the simplest valid next step.
3. Use "wait" when the page may still be changing.
4. Use "snapshot" when the state is unclear.
5. Use "done" only once the goal is fully achieved."#;

/// Produces the next action for a goal, given the current page.
#[async_trait]
pub trait Proposer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn propose(&self, task: &str, snapshot: &PageSnapshot) -> Result<ActionProposal>;
}

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn require_key(api_key: &str) -> Result<String> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(AgentError::validation("API key cannot be empty"));
    }
    Ok(key.to_string())
}

fn browser_state(snapshot: &PageSnapshot) -> String {
    format!("Browser state: {}", snapshot.to_payload(PayloadOptions::default()))
}

async fn read_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let raw = response.text().await?;
    let parsed = serde_json::from_str::<Value>(&raw);
    if !status.is_success() {
        let message = parsed
            .as_ref()
            .ok()
            .and_then(|body| body["error"]["message"].as_str())
            .unwrap_or("Unknown API error")
            .to_string();
        tracing::error!(%status, %message, "model API returned an error");
        return Err(AgentError::Provider {
            status: status.as_u16(),
            message,
        });
    }
    Ok(parsed?)
}

fn log_proposal(provider: Provider, proposal: &ActionProposal) {
    tracing::info!(
        %provider,
        action = %proposal.action_type,
        selector = proposal.selector.as_deref().unwrap_or(""),
        summary = %proposal.summary,
        "model proposed action"
    );
}

pub struct OpenAiProposer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    attach_screenshot: bool,
}

impl OpenAiProposer {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: require_key(api_key)?,
            model: model.into(),
            base_url: OPENAI_API_BASE.to_string(),
            attach_screenshot: false,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.attach_screenshot = enabled;
        self
    }

    fn request_body(&self, task: &str, snapshot: &PageSnapshot) -> Value {
        let mut user_content = vec![
            json!({ "type": "input_text", "text": format!("User goal: {task}") }),
            json!({ "type": "input_text", "text": browser_state(snapshot) }),
        ];
        if let (true, Some(shot)) = (self.attach_screenshot, &snapshot.screenshot_base64) {
            user_content.push(json!({
                "type": "input_image",
                "image_url": format!("data:image/png;base64,{shot}"),
            }));
        }

        let tools: Vec<Value> = action_specs().iter().map(|s| s.to_openai_tool()).collect();

        json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": [{ "type": "input_text", "text": SYSTEM_PROMPT }],
                },
                { "role": "user", "content": user_content },
            ],
            "tools": tools,
            "tool_choice": "required",
        })
    }
}

fn is_tool_call(item: &Value) -> bool {
    matches!(item["type"].as_str(), Some("function_call" | "tool_call"))
}

fn call_parts(item: &Value) -> Option<(String, Value)> {
    let name = item["name"].as_str()?.to_string();
    Some((name, item.get("arguments").cloned().unwrap_or(Value::Null)))
}

/// Find the tool call in a Responses API `output`, either top-level or nested
/// inside a `message` item.
pub(crate) fn openai_tool_call(response: &Value) -> Option<(String, Value)> {
    let output = response["output"].as_array()?;
    for item in output {
        if is_tool_call(item) {
            return call_parts(item);
        }
        if item["type"] == "message" {
            let nested = item["content"]
                .as_array()
                .and_then(|content| content.iter().find(|c| is_tool_call(c)));
            if let Some(call) = nested {
                return call_parts(call);
            }
        }
    }
    None
}

#[async_trait]
impl Proposer for OpenAiProposer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn propose(&self, task: &str, snapshot: &PageSnapshot) -> Result<ActionProposal> {
        tracing::debug!(model = %self.model, url = %snapshot.url, "requesting proposal from OpenAI");

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(task, snapshot))
            .send()
            .await?;
        let body = read_response(response).await?;

        let (name, arguments) = openai_tool_call(&body).ok_or(AgentError::NoToolCall)?;
        let proposal = ActionProposal::from_tool_call(&name, &arguments)?;
        log_proposal(Provider::OpenAi, &proposal);
        Ok(proposal)
    }
}

pub struct AnthropicProposer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    attach_screenshot: bool,
}

impl AnthropicProposer {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: require_key(api_key)?,
            model: model.into(),
            base_url: ANTHROPIC_API_BASE.to_string(),
            attach_screenshot: false,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.attach_screenshot = enabled;
        self
    }

    fn request_body(&self, task: &str, snapshot: &PageSnapshot) -> Value {
        let mut content = vec![
            json!({ "type": "text", "text": format!("User goal: {task}") }),
            json!({ "type": "text", "text": browser_state(snapshot) }),
        ];
        if let (true, Some(shot)) = (self.attach_screenshot, &snapshot.screenshot_base64) {
            content.push(json!({
                "type": "image",
                "source": { "type": "base64", "media_type": "image/png", "data": shot },
            }));
        }

        let tools: Vec<Value> = action_specs().iter().map(|s| s.to_anthropic_tool()).collect();

        json!({
            "model": self.model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": content }],
            "tools": tools,
            "tool_choice": { "type": "any" },
        })
    }
}

pub(crate) fn anthropic_tool_call(response: &Value) -> Option<(String, Value)> {
    response["content"]
        .as_array()?
        .iter()
        .find(|block| block["type"] == "tool_use")
        .and_then(|block| {
            let name = block["name"].as_str()?.to_string();
            Some((name, block.get("input").cloned().unwrap_or(Value::Null)))
        })
}

#[async_trait]
impl Proposer for AnthropicProposer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn propose(&self, task: &str, snapshot: &PageSnapshot) -> Result<ActionProposal> {
        tracing::debug!(model = %self.model, url = %snapshot.url, "requesting proposal from Anthropic");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(task, snapshot))
            .send()
            .await?;
        let body = read_response(response).await?;

        let (name, arguments) = anthropic_tool_call(&body).ok_or(AgentError::NoToolCall)?;
        let proposal = ActionProposal::from_tool_call(&name, &arguments)?;
        log_proposal(Provider::Anthropic, &proposal);
        Ok(proposal)
    }
}

/// The proposer picked by configuration, resolved once at startup.
pub enum AnyProposer {
    OpenAi(OpenAiProposer),
    Anthropic(AnthropicProposer),
}

impl AnyProposer {
    pub fn from_config(cfg: &RunConfig, api_key: &str) -> Result<Self> {
        cfg.validate()?;
        Ok(match cfg.provider {
            Provider::OpenAi => AnyProposer::OpenAi(
                OpenAiProposer::new(api_key, cfg.model.clone(), cfg.timeout)?
                    .with_screenshots(cfg.screenshot),
            ),
            Provider::Anthropic => AnyProposer::Anthropic(
                AnthropicProposer::new(api_key, cfg.model.clone(), cfg.timeout)?
                    .with_screenshots(cfg.screenshot),
            ),
        })
    }

    pub fn provider(&self) -> Provider {
        match self {
            AnyProposer::OpenAi(_) => Provider::OpenAi,
            AnyProposer::Anthropic(_) => Provider::Anthropic,
        }
    }
}

#[async_trait]
impl Proposer for AnyProposer {
    fn model_name(&self) -> &str {
        match self {
            AnyProposer::OpenAi(p) => p.model_name(),
            AnyProposer::Anthropic(p) => p.model_name(),
        }
    }

    async fn propose(&self, task: &str, snapshot: &PageSnapshot) -> Result<ActionProposal> {
        match self {
            AnyProposer::OpenAi(p) => p.propose(task, snapshot).await,
            AnyProposer::Anthropic(p) => p.propose(task, snapshot).await,
        }
    }
}
