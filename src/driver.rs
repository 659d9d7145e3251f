use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// One element as returned by a DOM query: lowercase tag, visible text and
/// every attribute present on the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawElement {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RawElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value, or `""` when absent.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl FromStr for ScrollDirection {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(AgentError::invalid_action(
                "scroll",
                format!("unknown direction '{other}', expected up | down | top | bottom"),
            )),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Top => "top",
            Self::Bottom => "bottom",
        })
    }
}

/// The browser as the agent needs it: read the page, then act on it.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Full visible text of `<body>`.
    async fn body_text(&self) -> Result<String>;

    /// Resolve once the page has stopped issuing network requests.
    async fn wait_for_network_idle(&self) -> Result<()>;

    /// Every element matching `css`, in document order.
    async fn query_all(&self, css: &str) -> Result<Vec<RawElement>>;

    async fn screenshot_png(&self) -> Result<Vec<u8>>;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the value of the input at `selector` with `text`.
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    async fn scroll(&self, direction: ScrollDirection) -> Result<()>;

    async fn back(&self) -> Result<()>;

    async fn forward(&self) -> Result<()>;

    async fn reload(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_direction_parses_case_insensitively() {
        assert_eq!(" Down ".parse::<ScrollDirection>().unwrap(), ScrollDirection::Down);
        assert_eq!("TOP".parse::<ScrollDirection>().unwrap(), ScrollDirection::Top);
        assert!("sideways".parse::<ScrollDirection>().is_err());
    }

    #[test]
    fn raw_element_deserializes_without_optional_fields() {
        let el: RawElement = serde_json::from_str(r#"{"tag":"img"}"#).unwrap();
        assert_eq!(el.tag, "img");
        assert_eq!(el.attr("src"), None);
        assert_eq!(el.attr_or_empty("src"), "");
    }
}
