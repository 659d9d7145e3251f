//! Post-extraction filters over the collected element lists.
//!
//! The extractor collects every element of a kind, then folds the ordered
//! policy list over the result. A policy only overrides the hooks for the
//! targets it cares about; the default hooks hand the items back untouched.

use std::fmt;

use crate::types::{ButtonInfo, ImageInfo, InputInfo, LinkInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyTarget {
    Links,
    Inputs,
    Buttons,
    Images,
}

impl PolicyTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyTarget::Links => "links",
            PolicyTarget::Inputs => "inputs",
            PolicyTarget::Buttons => "buttons",
            PolicyTarget::Images => "images",
        }
    }
}

impl fmt::Display for PolicyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter or rewrite one kind of extracted element.
///
/// Implementations must be pure, accept empty input, and never reorder the
/// items they keep.
pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;

    fn links(&self, items: Vec<LinkInfo>) -> Vec<LinkInfo> {
        items
    }

    fn inputs(&self, items: Vec<InputInfo>) -> Vec<InputInfo> {
        items
    }

    fn buttons(&self, items: Vec<ButtonInfo>) -> Vec<ButtonInfo> {
        items
    }

    fn images(&self, items: Vec<ImageInfo>) -> Vec<ImageInfo> {
        items
    }
}

/// An element kind a policy chain can run over.
pub trait Collected: Sized {
    const TARGET: PolicyTarget;

    fn filter_with(policy: &dyn Policy, items: Vec<Self>) -> Vec<Self>;
}

impl Collected for LinkInfo {
    const TARGET: PolicyTarget = PolicyTarget::Links;

    fn filter_with(policy: &dyn Policy, items: Vec<Self>) -> Vec<Self> {
        policy.links(items)
    }
}

impl Collected for InputInfo {
    const TARGET: PolicyTarget = PolicyTarget::Inputs;

    fn filter_with(policy: &dyn Policy, items: Vec<Self>) -> Vec<Self> {
        policy.inputs(items)
    }
}

impl Collected for ButtonInfo {
    const TARGET: PolicyTarget = PolicyTarget::Buttons;

    fn filter_with(policy: &dyn Policy, items: Vec<Self>) -> Vec<Self> {
        policy.buttons(items)
    }
}

impl Collected for ImageInfo {
    const TARGET: PolicyTarget = PolicyTarget::Images;

    fn filter_with(policy: &dyn Policy, items: Vec<Self>) -> Vec<Self> {
        policy.images(items)
    }
}

/// Thread `items` through every policy, in order.
pub fn apply_policies<T: Collected>(policies: &[Box<dyn Policy>], items: Vec<T>) -> Vec<T> {
    policies.iter().fold(items, |items, policy| {
        let before = items.len();
        let kept = T::filter_with(policy.as_ref(), items);
        if kept.len() != before {
            tracing::debug!(
                policy = policy.name(),
                target = %T::TARGET,
                dropped = before.saturating_sub(kept.len()),
                "policy filtered elements"
            );
        }
        kept
    })
}

/// Drops `<input type="hidden">` fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExcludeHiddenPolicy;

impl Policy for ExcludeHiddenPolicy {
    fn name(&self) -> &'static str {
        "exclude-hidden"
    }

    fn inputs(&self, items: Vec<InputInfo>) -> Vec<InputInfo> {
        items
            .into_iter()
            .filter(|input| !input.input_type.trim().eq_ignore_ascii_case("hidden"))
            .collect()
    }
}

/// Drops anchors without a destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct HrefNecessaryPolicy;

impl Policy for HrefNecessaryPolicy {
    fn name(&self) -> &'static str {
        "href-necessary"
    }

    fn links(&self, items: Vec<LinkInfo>) -> Vec<LinkInfo> {
        items
            .into_iter()
            .filter(|link| !link.href.trim().is_empty())
            .collect()
    }
}

pub fn default_policies() -> Vec<Box<dyn Policy>> {
    vec![Box::new(ExcludeHiddenPolicy), Box::new(HrefNecessaryPolicy)]
}
