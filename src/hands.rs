use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::actions::ActionType;
use crate::config::{BrowserEngine, RunConfig};
use crate::driver::{PageDriver, RawElement, ScrollDirection};
use crate::error::{AgentError, Result};

/// Pause after input events so the page can react before the next query.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Resolves once `document.readyState` is complete and no new resource
/// entries have appeared for 500ms, or after 10s regardless.
const NETWORK_IDLE_JS: &str = r#"
new Promise(resolve => {
  const QUIET_MS = 500, MAX_MS = 10000;
  const start = performance.now();
  let seen = performance.getEntriesByType('resource').length;
  let stableSince = start;
  const tick = () => {
    const now = performance.now();
    const count = performance.getEntriesByType('resource').length;
    if (count !== seen) { seen = count; stableSince = now; }
    const quiet = document.readyState === 'complete' && now - stableSince >= QUIET_MS;
    if (quiet || now - start >= MAX_MS) { resolve(true); return; }
    setTimeout(tick, 100);
  };
  tick();
})
"#;

/// Serializes every element matching a selector as `{tag, text, attributes}`.
/// Returned as a JSON string so the value survives `Runtime.evaluate`.
fn query_all_js(css: &str) -> Result<String> {
    let literal = serde_json::to_string(css)?;
    Ok(format!(
        r#"
(css => JSON.stringify(Array.from(document.querySelectorAll(css)).map(el => ({{
  tag: el.tagName.toLowerCase(),
  text: (el.innerText || '').trim(),
  attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
}}))))({literal})
"#
    ))
}

fn scroll_js(direction: ScrollDirection) -> &'static str {
    match direction {
        ScrollDirection::Up => "window.scrollBy(0, -Math.round(window.innerHeight * 0.8))",
        ScrollDirection::Down => "window.scrollBy(0, Math.round(window.innerHeight * 0.8))",
        ScrollDirection::Top => "window.scrollTo(0, 0)",
        ScrollDirection::Bottom => {
            "window.scrollTo(0, Math.max(document.body.scrollHeight, document.documentElement.scrollHeight))"
        }
    }
}

/// Split `Ctrl+Shift+T` style input into modifiers and the key itself.
/// Unknown prefixes are left in the key name; `Ctrl++` presses `+`.
pub(crate) fn parse_key_combo(value: &str) -> Result<(Vec<ModifierKey>, String)> {
    let mut modifiers = Vec::new();
    let mut rest = value;
    while let Some((head, tail)) = rest.split_once('+') {
        if tail.is_empty() {
            break;
        }
        let modifier = match head.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" => ModifierKey::Ctrl,
            "shift" => ModifierKey::Shift,
            "alt" | "option" => ModifierKey::Alt,
            "meta" | "cmd" | "command" => ModifierKey::Meta,
            _ => break,
        };
        modifiers.push(modifier);
        rest = tail;
    }

    let key = rest.trim();
    if key.is_empty() {
        return Err(AgentError::invalid_action(ActionType::Press, "no key to press"));
    }
    Ok((modifiers, key.to_string()))
}

fn evaluate_string(tab: &Tab, js: &str) -> anyhow::Result<String> {
    let result = tab.evaluate(js, false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default())
}

/// One Chrome instance and the tab the agent drives. Created once, reused
/// for every turn.
pub struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Start Chrome on the configured profile directory. Blocking: call it
    /// from `spawn_blocking`.
    pub fn launch(cfg: &RunConfig) -> Result<Self> {
        if cfg.browser != BrowserEngine::Chrome {
            return Err(AgentError::UnsupportedBrowser(cfg.browser.to_string()));
        }

        std::fs::create_dir_all(&cfg.profile_dir)?;
        tracing::info!(profile = %cfg.profile_dir.display(), headless = cfg.headless, "starting Chrome");

        let options = LaunchOptions {
            headless: cfg.headless,
            user_data_dir: Some(cfg.profile_dir.clone()),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        let browser = Browser::new(options)
            .context("browser launch failed")
            .map_err(AgentError::Browser)?;
        let tab = browser
            .new_tab()
            .context("could not open a tab")
            .map_err(AgentError::Browser)?;
        tab.navigate_to("about:blank").map_err(AgentError::Browser)?;

        tracing::info!("Chrome ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run blocking CDP calls off the async runtime.
    async fn on_tab<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&*tab))
            .await
            .map_err(|e| AgentError::Browser(anyhow!("browser task panicked: {e}")))?
            .map_err(AgentError::Browser)
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn current_url(&self) -> Result<String> {
        self.on_tab(|tab| Ok(tab.get_url())).await
    }

    async fn title(&self) -> Result<String> {
        self.on_tab(|tab| tab.get_title()).await
    }

    async fn body_text(&self) -> Result<String> {
        self.on_tab(|tab| evaluate_string(tab, "document.body ? document.body.innerText : ''"))
            .await
    }

    async fn wait_for_network_idle(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.wait_until_navigated()?;
            tab.evaluate(NETWORK_IDLE_JS, true)?;
            Ok(())
        })
        .await
    }

    async fn query_all(&self, css: &str) -> Result<Vec<RawElement>> {
        let js = query_all_js(css)?;
        let raw = self.on_tab(move |tab| evaluate_string(tab, &js)).await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.on_tab(|tab| tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true))
            .await
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.on_tab(move |tab| {
            tab.navigate_to(&url)
                .with_context(|| format!("failed to open {url}"))?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.on_tab(move |tab| {
            tab.wait_for_element(&selector)
                .with_context(|| format!("no element matches {selector}"))?
                .click()?;
            std::thread::sleep(SETTLE_DELAY);
            Ok(())
        })
        .await
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.on_tab(move |tab| {
            let el = tab
                .wait_for_element(&selector)
                .with_context(|| format!("no element matches {selector}"))?;
            el.click()?;
            el.call_js_fn(
                "function () { if ('value' in this) { this.value = ''; } }",
                vec![],
                false,
            )?;
            el.type_into(&text)?;
            Ok(())
        })
        .await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let (modifiers, key) = parse_key_combo(key)?;
        self.on_tab(move |tab| {
            if modifiers.is_empty() {
                tab.press_key(&key)?;
            } else {
                tab.press_key_with_modifiers(&key, Some(&modifiers))?;
            }
            std::thread::sleep(SETTLE_DELAY);
            Ok(())
        })
        .await
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<()> {
        self.on_tab(move |tab| {
            tab.evaluate(scroll_js(direction), false)?;
            Ok(())
        })
        .await
    }

    async fn back(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.evaluate("history.back()", false)?;
            std::thread::sleep(SETTLE_DELAY);
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn forward(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.evaluate("history.forward()", false)?;
            std::thread::sleep(SETTLE_DELAY);
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn reload(&self) -> Result<()> {
        self.on_tab(|tab| {
            tab.reload(false, None)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }
}
