use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};
use crate::risk::assess_action_risk;
use crate::types::PageSnapshot;

/// The closed set of things the model may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Open,
    Click,
    Type,
    Press,
    Wait,
    Back,
    Forward,
    Reload,
    Scroll,
    Snapshot,
    Done,
}

impl ActionType {
    pub const ALL: [ActionType; 11] = [
        ActionType::Open,
        ActionType::Click,
        ActionType::Type,
        ActionType::Press,
        ActionType::Wait,
        ActionType::Back,
        ActionType::Forward,
        ActionType::Reload,
        ActionType::Scroll,
        ActionType::Snapshot,
        ActionType::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Open => "open",
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Press => "press",
            ActionType::Wait => "wait",
            ActionType::Back => "back",
            ActionType::Forward => "forward",
            ActionType::Reload => "reload",
            ActionType::Scroll => "scroll",
            ActionType::Snapshot => "snapshot",
            ActionType::Done => "done",
        }
    }

    /// Kinds that cannot change anything outside the browser tab.
    pub fn is_non_mutating(self) -> bool {
        !matches!(self, ActionType::Click | ActionType::Type | ActionType::Press)
    }

    pub fn spec(self) -> ActionSpec {
        let no_params = json!({ "type": "object", "properties": {} });
        let (description, parameters) = match self {
            ActionType::Open => (
                "Open URL on current browser page",
                json!({
                    "type": "object",
                    "properties": { "url": { "type": "string" } },
                    "required": ["url"],
                }),
            ),
            ActionType::Click => (
                "Click on page element",
                json!({
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "CSS or XPath selector" },
                    },
                    "required": ["selector"],
                }),
            ),
            ActionType::Type => (
                "Type text in input element",
                json!({
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string" },
                        "value": { "type": "string" },
                    },
                    "required": ["selector", "value"],
                }),
            ),
            ActionType::Press => (
                "Press button or keyboard shortcut",
                json!({
                    "type": "object",
                    "properties": {
                        "value": { "type": "string", "description": "For example: Enter, Escape, Ctrl+L" },
                    },
                    "required": ["value"],
                }),
            ),
            ActionType::Wait => (
                "Wait for the specified number of milliseconds",
                json!({
                    "type": "object",
                    "properties": {
                        "value": {
                            "type": "integer",
                            "description": "Wait time in milliseconds",
                            "minimum": 0,
                        },
                    },
                    "required": ["value"],
                }),
            ),
            ActionType::Scroll => (
                "Scroll the page",
                json!({
                    "type": "object",
                    "properties": {
                        "value": { "type": "string", "description": "up | down | top | bottom" },
                    },
                    "required": ["value"],
                }),
            ),
            ActionType::Back => ("Return to the previous page", no_params),
            ActionType::Forward => ("Skip forward in history", no_params),
            ActionType::Reload => ("Reload the page", no_params),
            ActionType::Snapshot => (
                "Request page snapshot if a new page state is implied",
                no_params,
            ),
            ActionType::Done => (
                "Notify that the task is fully completed",
                json!({
                    "type": "object",
                    "properties": {
                        "summary": { "type": "string", "description": "Brief summary of actions taken" },
                    },
                    "required": ["summary"],
                }),
            ),
        };

        ActionSpec {
            name: self,
            description,
            parameters,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        ActionType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AgentError::UnknownAction(s.to_string()))
    }
}

/// Severity of an action's possible real-world effect. Ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionRisk {
    Safe,
    Confirm,
    Destructive,
}

impl ActionRisk {
    pub fn requires_confirmation(self) -> bool {
        self >= ActionRisk::Confirm
    }
}

impl fmt::Display for ActionRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionRisk::Safe => "safe",
            ActionRisk::Confirm => "confirm",
            ActionRisk::Destructive => "destructive",
        })
    }
}

/// Name, description and JSON-schema parameters of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub name: ActionType,
    pub description: &'static str,
    pub parameters: Value,
}

impl ActionSpec {
    /// OpenAI Responses API `function` tool.
    pub fn to_openai_tool(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name.as_str(),
            "description": self.description,
            "parameters": self.parameters,
        })
    }

    /// Anthropic Messages API tool.
    pub fn to_anthropic_tool(&self) -> Value {
        json!({
            "name": self.name.as_str(),
            "description": self.description,
            "input_schema": self.parameters,
        })
    }
}

pub fn action_specs() -> Vec<ActionSpec> {
    ActionType::ALL.into_iter().map(ActionType::spec).collect()
}

/// What the model suggested, before any risk assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub action_type: ActionType,
    pub selector: Option<String>,
    pub value: Option<String>,
    pub summary: String,
}

impl ActionProposal {
    /// Turn a raw tool invocation into a proposal.
    ///
    /// `arguments` may be an object or a JSON-encoded string. Anything that
    /// does not decode to an object is treated as "no arguments".
    pub fn from_tool_call(name: &str, arguments: &Value) -> Result<Self> {
        let action_type: ActionType = name.parse()?;
        let args = decode_arguments(arguments);

        let selector = args
            .get("selector")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let value = args
            .get("value")
            .and_then(scalar_to_string)
            .or_else(|| args.get("url").and_then(scalar_to_string));
        let summary = match args.get("summary").and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => {
                let target = selector.as_deref().or(value.as_deref()).unwrap_or("");
                format!("{action_type} {target}").trim().to_string()
            }
        };

        Ok(Self {
            action_type,
            selector,
            value,
            summary,
        })
    }
}

fn decode_arguments(arguments: &Value) -> Map<String, Value> {
    let decoded = match arguments {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "malformed tool arguments, using none");
                Value::Null
            }
        },
        other => other.clone(),
    };
    match decoded {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A proposal with its risk attached; the unit the orchestrator executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    pub selector: Option<String>,
    pub value: Option<String>,
    pub summary: String,
    pub risk: ActionRisk,
}

impl Action {
    pub fn with_assessed_risk(
        action_type: ActionType,
        selector: Option<String>,
        value: Option<String>,
        summary: String,
        snapshot: Option<&PageSnapshot>,
    ) -> Self {
        let risk = assess_action_risk(
            action_type,
            selector.as_deref(),
            value.as_deref(),
            snapshot,
        );
        Self {
            action_type,
            selector,
            value,
            summary,
            risk,
        }
    }

    pub fn from_proposal(proposal: ActionProposal, snapshot: Option<&PageSnapshot>) -> Self {
        Self::with_assessed_risk(
            proposal.action_type,
            proposal.selector,
            proposal.value,
            proposal.summary,
            snapshot,
        )
    }

    pub(crate) fn require_selector(&self) -> Result<&str> {
        self.selector
            .as_deref()
            .ok_or_else(|| AgentError::invalid_action(self.action_type, "missing selector"))
    }

    pub(crate) fn require_value(&self) -> Result<&str> {
        self.value
            .as_deref()
            .ok_or_else(|| AgentError::invalid_action(self.action_type, "missing value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_tiers_are_ordered() {
        assert!(ActionRisk::Safe < ActionRisk::Confirm);
        assert!(ActionRisk::Confirm < ActionRisk::Destructive);
        assert!(!ActionRisk::Safe.requires_confirmation());
        assert!(ActionRisk::Destructive.requires_confirmation());
    }

    #[test]
    fn names_round_trip_through_parse() {
        for kind in ActionType::ALL {
            assert_eq!(kind.as_str().parse::<ActionType>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
        assert!(matches!(
            "Click".parse::<ActionType>(),
            Err(AgentError::UnknownAction(_))
        ));
    }

    #[test]
    fn every_kind_has_an_object_schema() {
        let specs = action_specs();
        assert_eq!(specs.len(), 11);
        for spec in &specs {
            assert_eq!(spec.parameters["type"], "object");
            assert!(!spec.description.is_empty());
        }
        let tool = ActionType::Type.spec().to_openai_tool();
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["parameters"]["required"], json!(["selector", "value"]));
        let tool = ActionType::Wait.spec().to_anthropic_tool();
        assert_eq!(tool["input_schema"]["properties"]["value"]["type"], "integer");
    }

    #[test]
    fn parses_string_encoded_arguments() {
        let p = ActionProposal::from_tool_call(
            "type",
            &json!(r##"{"selector":"#q","value":"shoes","summary":"Search for shoes"}"##),
        )
        .unwrap();
        assert_eq!(p.action_type, ActionType::Type);
        assert_eq!(p.selector.as_deref(), Some("#q"));
        assert_eq!(p.value.as_deref(), Some("shoes"));
        assert_eq!(p.summary, "Search for shoes");
    }

    #[test]
    fn malformed_arguments_degrade_to_empty() {
        let p = ActionProposal::from_tool_call("reload", &json!("{not json")).unwrap();
        assert_eq!(p.selector, None);
        assert_eq!(p.value, None);
        assert_eq!(p.summary, "reload");

        let p = ActionProposal::from_tool_call("back", &json!([1, 2])).unwrap();
        assert_eq!(p.summary, "back");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = ActionProposal::from_tool_call("delete_everything", &json!({})).unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction(name) if name == "delete_everything"));
    }

    #[test]
    fn summary_falls_back_to_action_and_target() {
        let p = ActionProposal::from_tool_call("click", &json!({"selector": "#buy"})).unwrap();
        assert_eq!(p.summary, "click #buy");

        let p = ActionProposal::from_tool_call("open", &json!({"url": "https://example.com"}))
            .unwrap();
        assert_eq!(p.value.as_deref(), Some("https://example.com"));
        assert_eq!(p.summary, "open https://example.com");

        let p = ActionProposal::from_tool_call("wait", &json!({"value": 1500, "summary": "  "}))
            .unwrap();
        assert_eq!(p.value.as_deref(), Some("1500"));
        assert_eq!(p.summary, "wait 1500");
    }

    #[test]
    fn from_proposal_attaches_risk() {
        let proposal = ActionProposal {
            action_type: ActionType::Open,
            selector: None,
            value: Some("https://example.com".into()),
            summary: "open example".into(),
        };
        let action = Action::from_proposal(proposal, None);
        assert_eq!(action.risk, ActionRisk::Safe);
        assert_eq!(action.summary, "open example");
    }
}
