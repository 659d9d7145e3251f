//! Deterministic risk tiers for proposed actions.
//!
//! Absence of evidence never makes a mutating action safe: every path that
//! cannot prove an action harmless ends in [`ActionRisk::Confirm`].

use crate::actions::{ActionRisk, ActionType};
use crate::types::PageSnapshot;

const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "delete",
    "remove",
    "erase",
    "destroy",
    "wipe",
    "clear",
    "reset",
    "revoke",
    "unsubscribe",
    "cancel subscription",
    "permanently",
];

const CONFIRM_KEYWORDS: &[&str] = &[
    "submit",
    "send",
    "save",
    "confirm",
    "approve",
    "accept",
    "apply",
    "publish",
    "post",
    "checkout",
    "purchase",
    "pay",
    "buy",
    "register",
    "sign up",
    "sign in",
    "log in",
    "logout",
    "sign out",
    "update",
    "change",
    "join",
];

const SAFE_KEYWORDS: &[&str] = &["search", "view", "learn more", "details"];

const SENSITIVE_INPUT_NAMES: &[&str] = &["card", "credit", "cvv", "ssn", "iban"];

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

fn joined(parts: &[&str]) -> String {
    let parts: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    normalize(&parts.join(" "))
}

/// Describe the element behind `selector`: buttons first, then links, then
/// inputs. Empty when nothing matches.
pub fn element_context(snapshot: &PageSnapshot, selector: &str) -> String {
    if let Some(b) = snapshot.buttons.iter().find(|b| b.selector == selector) {
        return joined(&[&b.text, &b.aria_label, &b.button_type]);
    }
    if let Some(l) = snapshot.links.iter().find(|l| l.selector == selector) {
        return joined(&[&l.text, &l.href]);
    }
    if let Some(i) = snapshot.inputs.iter().find(|i| i.selector == selector) {
        return joined(&[&i.name, &i.placeholder, &i.input_type]);
    }
    String::new()
}

pub fn assess_action_risk(
    action_type: ActionType,
    selector: Option<&str>,
    value: Option<&str>,
    snapshot: Option<&PageSnapshot>,
) -> ActionRisk {
    if action_type.is_non_mutating() {
        return ActionRisk::Safe;
    }

    let target = snapshot.zip(selector);
    let context = target
        .map(|(snap, sel)| element_context(snap, sel))
        .unwrap_or_default();

    if !context.is_empty() {
        if contains_any(&context, DESTRUCTIVE_KEYWORDS) {
            return ActionRisk::Destructive;
        }
        if contains_any(&context, CONFIRM_KEYWORDS) {
            return ActionRisk::Confirm;
        }
        if contains_any(&context, SAFE_KEYWORDS) {
            return ActionRisk::Safe;
        }
    }

    match action_type {
        ActionType::Type => {
            let input = target
                .and_then(|(snap, sel)| snap.inputs.iter().find(|i| i.selector == sel));
            if let Some(input) = input {
                let kind = normalize(&input.input_type);
                let name = normalize(&input.name);
                let placeholder = normalize(&input.placeholder);
                if name.contains("search") || placeholder.contains("search") || kind == "search" {
                    return ActionRisk::Safe;
                }
                if kind == "password" || contains_any(&name, SENSITIVE_INPUT_NAMES) {
                    return ActionRisk::Confirm;
                }
            }
            ActionRisk::Confirm
        }
        ActionType::Click | ActionType::Press => {
            match value {
                Some(v) if contains_any(&normalize(v), DESTRUCTIVE_KEYWORDS) => {
                    ActionRisk::Destructive
                }
                _ => ActionRisk::Confirm,
            }
        }
        _ => ActionRisk::Confirm,
    }
}
