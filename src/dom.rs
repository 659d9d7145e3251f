use std::fmt::Write;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::driver::{PageDriver, RawElement};
use crate::error::{AgentError, Result};
use crate::policy::{Collected, Policy, apply_policies};
use crate::types::{ButtonInfo, ImageInfo, InputInfo, LinkInfo, PageSnapshot};

/// Best-effort CSS selector for one element.
///
/// Priority: id, aria-label, name, placeholder, up to two class tokens that
/// are not generated (`css-*`), bare tag. Pure: depends on nothing but the
/// element itself.
pub fn build_selector(el: &RawElement) -> String {
    let tag = el.tag.to_ascii_lowercase();

    if let Some(id) = el.attr("id").filter(|v| !v.is_empty()) {
        return format!("#{id}");
    }
    if let Some(aria) = el.attr("aria-label").filter(|v| !v.is_empty()) {
        return format!("[aria-label=\"{}\"]", escape_attr(aria));
    }
    if let Some(name) = el.attr("name").filter(|v| !v.is_empty()) {
        return format!("{tag}[name=\"{}\"]", escape_attr(name));
    }
    if let Some(placeholder) = el.attr("placeholder").filter(|v| !v.is_empty()) {
        return format!("{tag}[placeholder=\"{}\"]", escape_attr(placeholder));
    }
    if let Some(class) = el.attr("class") {
        let classes: Vec<&str> = class
            .split_whitespace()
            .filter(|c| !c.starts_with("css-"))
            .take(2)
            .collect();
        if !classes.is_empty() {
            let classes: Vec<String> = classes.into_iter().map(escape_ident).collect();
            return format!("{tag}.{}", classes.join("."));
        }
    }

    if tag.is_empty() { "*".to_string() } else { tag }
}

/// CSS identifier escaping for class tokens (`hover:bg-blue-500`, `w-1/2`,
/// `2xl`). Non-ASCII characters are valid identifier characters as-is.
fn escape_ident(token: &str) -> String {
    if token == "-" {
        return "\\-".to_string();
    }
    let mut out = String::with_capacity(token.len());
    for (i, c) in token.chars().enumerate() {
        let leading = i == 0 || (i == 1 && token.starts_with('-'));
        if c.is_ascii_digit() && leading {
            let _ = write!(out, "\\{:x} ", u32::from(c));
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parse_dimension(el: &RawElement, name: &str) -> u32 {
    el.attr(name)
        .and_then(|v| v.trim().trim_end_matches("px").parse().ok())
        .unwrap_or(0)
}

impl From<&RawElement> for LinkInfo {
    fn from(el: &RawElement) -> Self {
        LinkInfo {
            text: el.text.trim().to_string(),
            href: el.attr_or_empty("href").to_string(),
            selector: build_selector(el),
        }
    }
}

impl From<&RawElement> for InputInfo {
    fn from(el: &RawElement) -> Self {
        InputInfo {
            name: el.attr_or_empty("name").to_string(),
            input_type: el
                .attr("type")
                .filter(|t| !t.is_empty())
                .unwrap_or("text")
                .to_string(),
            placeholder: el.attr_or_empty("placeholder").to_string(),
            selector: build_selector(el),
        }
    }
}

impl From<&RawElement> for ButtonInfo {
    fn from(el: &RawElement) -> Self {
        ButtonInfo {
            text: el.text.trim().to_string(),
            selector: build_selector(el),
            aria_label: el.attr_or_empty("aria-label").to_string(),
            button_type: el.attr_or_empty("type").to_string(),
            disabled: el.has_attr("disabled"),
        }
    }
}

impl From<&RawElement> for ImageInfo {
    fn from(el: &RawElement) -> Self {
        ImageInfo {
            src: el.attr_or_empty("src").to_string(),
            alt: el.attr_or_empty("alt").to_string(),
            selector: build_selector(el),
            title: el.attr_or_empty("title").to_string(),
            aria_label: el.attr_or_empty("aria-label").to_string(),
            width: parse_dimension(el, "width"),
            height: parse_dimension(el, "height"),
        }
    }
}

/// Builds [`PageSnapshot`]s from the live page.
pub struct Extractor {
    driver: Arc<dyn PageDriver>,
    policies: Vec<Box<dyn Policy>>,
    capture_screenshot: bool,
}

impl Extractor {
    pub fn new(driver: Arc<dyn PageDriver>, policies: Vec<Box<dyn Policy>>) -> Self {
        Self {
            driver,
            policies,
            capture_screenshot: false,
        }
    }

    pub fn with_screenshot(mut self, enabled: bool) -> Self {
        self.capture_screenshot = enabled;
        self
    }

    /// Capture the current page. Any driver failure, or a URL change while
    /// collecting, fails the whole capture.
    pub async fn extract(&self) -> Result<PageSnapshot> {
        let url = self.driver.current_url().await?;
        let title = self.driver.title().await?;
        let text = self.driver.body_text().await?;

        let links = self.collect::<LinkInfo>("a").await?;
        let inputs = self.collect::<InputInfo>("input").await?;
        let buttons = self.collect::<ButtonInfo>("button").await?;
        let images = self.collect::<ImageInfo>("img").await?;

        let screenshot_base64 = if self.capture_screenshot {
            let png = self.driver.screenshot_png().await?;
            Some(BASE64.encode(png))
        } else {
            None
        };

        let after = self.driver.current_url().await?;
        if after != url {
            return Err(AgentError::PageChanged { before: url, after });
        }

        tracing::debug!(
            %url,
            links = links.len(),
            inputs = inputs.len(),
            buttons = buttons.len(),
            images = images.len(),
            "page snapshot captured"
        );

        Ok(PageSnapshot {
            url,
            title,
            text,
            links,
            inputs,
            buttons,
            images,
            screenshot_base64,
        })
    }

    async fn collect<T>(&self, css: &str) -> Result<Vec<T>>
    where
        T: Collected + for<'a> From<&'a RawElement>,
    {
        self.driver.wait_for_network_idle().await?;
        let raw = self.driver.query_all(css).await?;
        let items = raw.iter().map(T::from).collect();
        Ok(apply_policies(&self.policies, items))
    }
}
