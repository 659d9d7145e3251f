use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const SUMMARY_MAX_CHARS: usize = 800;
pub const PAYLOAD_TEXT_MAX_CHARS: usize = 2000;
pub const PAYLOAD_MAX_ITEMS: usize = 50;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub text: String,
    pub href: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInfo {
    pub name: String,
    pub input_type: String,
    pub placeholder: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonInfo {
    pub text: String,
    pub selector: String,
    pub aria_label: String,
    pub button_type: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub src: String,
    pub alt: String,
    pub selector: String,
    pub title: String,
    pub aria_label: String,
    pub width: u32,
    pub height: u32,
}

/// What the agent sees of one page at one instant.
///
/// Built fresh by the extractor for every turn and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub text: String,
    pub links: Vec<LinkInfo>,
    pub inputs: Vec<InputInfo>,
    pub buttons: Vec<ButtonInfo>,
    pub images: Vec<ImageInfo>,
    pub screenshot_base64: Option<String>,
}

/// Bounds applied when a snapshot is serialized for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadOptions {
    pub max_text_len: usize,
    pub max_items: usize,
    pub include_screenshot: bool,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            max_text_len: PAYLOAD_TEXT_MAX_CHARS,
            max_items: PAYLOAD_MAX_ITEMS,
            include_screenshot: false,
        }
    }
}

impl PageSnapshot {
    /// Page text cut to `max_len` characters, ending in `...` when cut.
    pub fn summary(&self, max_len: usize) -> String {
        truncate_with_ellipsis(&self.text, max_len)
    }

    pub fn to_payload(&self, options: PayloadOptions) -> Value {
        let n = options.max_items;
        let mut payload = json!({
            "url": self.url,
            "title": self.title,
            "text": self.summary(options.max_text_len),
            "links": &self.links[..n.min(self.links.len())],
            "inputs": &self.inputs[..n.min(self.inputs.len())],
            "buttons": &self.buttons[..n.min(self.buttons.len())],
            "images": &self.images[..n.min(self.images.len())],
        });

        if options.include_screenshot {
            if let Some(shot) = &self.screenshot_base64 {
                payload["screenshot_base64"] = Value::String(shot.clone());
            }
        }

        payload
    }
}

fn truncate_with_ellipsis(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len <= ELLIPSIS.len() {
        return ELLIPSIS[..max_len].to_string();
    }
    let keep = max_len - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(i: usize) -> LinkInfo {
        LinkInfo {
            text: format!("link {i}"),
            href: format!("/page/{i}"),
            selector: format!("a[name=\"l{i}\"]"),
        }
    }

    fn snapshot_with(text: &str, links: usize) -> PageSnapshot {
        PageSnapshot {
            url: "https://shop.example".into(),
            title: "Shop".into(),
            text: text.into(),
            links: (0..links).map(link).collect(),
            inputs: vec![],
            buttons: vec![],
            images: vec![],
            screenshot_base64: Some("iVBORw0KGgo=".into()),
        }
    }

    #[test]
    fn summary_keeps_short_text() {
        let snap = snapshot_with("hello", 0);
        assert_eq!(snap.summary(10), "hello");
        assert_eq!(snap.summary(5), "hello");
    }

    #[test]
    fn summary_cuts_long_text_with_ellipsis() {
        let snap = snapshot_with("abcdefghij", 0);
        let s = snap.summary(6);
        assert_eq!(s, "abc...");
        assert_eq!(s.chars().count(), 6);
    }

    #[test]
    fn summary_never_exceeds_tiny_limits() {
        let snap = snapshot_with("abcdef", 0);
        assert_eq!(snap.summary(3), "...");
        assert_eq!(snap.summary(2), "..");
        assert_eq!(snap.summary(0), "");
    }

    #[test]
    fn summary_counts_characters_not_bytes() {
        let snap = snapshot_with("привет мир", 0);
        assert_eq!(snap.summary(7), "прив...");
    }

    #[test]
    fn payload_truncates_collections_and_text() {
        let snap = snapshot_with(&"x".repeat(100), 8);
        let payload = snap.to_payload(PayloadOptions {
            max_text_len: 20,
            max_items: 3,
            include_screenshot: false,
        });

        assert_eq!(payload["links"].as_array().unwrap().len(), 3);
        assert_eq!(payload["links"][2]["href"], "/page/2");
        let text = payload["text"].as_str().unwrap();
        assert_eq!(text.chars().count(), 20);
        assert!(text.ends_with("..."));
        assert!(payload.get("screenshot_base64").is_none());
    }

    #[test]
    fn payload_includes_screenshot_only_on_request() {
        let snap = snapshot_with("page", 1);
        let payload = snap.to_payload(PayloadOptions {
            include_screenshot: true,
            ..PayloadOptions::default()
        });
        assert_eq!(payload["screenshot_base64"], "iVBORw0KGgo=");

        let mut bare = snap.clone();
        bare.screenshot_base64 = None;
        let payload = bare.to_payload(PayloadOptions {
            include_screenshot: true,
            ..PayloadOptions::default()
        });
        assert!(payload.get("screenshot_base64").is_none());
    }
}
