// src/browser/chrome.rs
//! Chromium-family browser driven over CDP with `chromiumoxide`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{BrowserLauncher, BrowserSession, BrowserTab, SessionProfile};

const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// A lookup error that only means "not on the page yet". Anything else is a
/// broken connection or page and must not read as an empty result.
fn is_absent(err: &CdpError) -> bool {
    match err {
        CdpError::NotFound => true,
        // querySelector yields node 0 on no match; describing it fails with this
        CdpError::Chrome(e) => {
            e.message.contains("Could not find node") || e.message.contains("No node")
        }
        _ => false,
    }
}

// Runs before any page script.
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => false });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
"#;

/// Find a usable Chromium-family executable: `$CHROME_EXECUTABLE`, then PATH.
/// `None` lets chromiumoxide run its own detection.
pub fn find_chrome_executable() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(PathBuf::from(p));
        }
    }
    let path_var = std::env::var_os("PATH")?;
    let candidates = [
        "google-chrome",
        "chromium",
        "chromium-browser",
        "chrome",
        "brave-browser",
    ];
    std::env::split_paths(&path_var)
        .flat_map(|dir| candidates.iter().map(move |exe| dir.join(exe)))
        .find(|full| full.exists())
}

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    headless: bool,
    request_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(executable: Option<PathBuf>, headless: bool, request_timeout: Duration) -> Self {
        Self {
            executable: executable.or_else(find_chrome_executable),
            headless,
            request_timeout,
        }
    }

    fn browser_config(&self, profile: &SessionProfile) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.request_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if let Some(exe) = &self.executable {
            builder = builder.chrome_executable(exe);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some((width, height)) = profile.viewport {
            builder = builder
                .viewport(Viewport {
                    width,
                    height,
                    device_scale_factor: Some(1.0),
                    emulating_mobile: false,
                    is_landscape: true,
                    has_touch: false,
                })
                .window_size(width, height);
        }
        if profile.stealth {
            builder = builder
                .arg("--no-sandbox")
                .arg("--disable-setuid-sandbox")
                .arg("--disable-blink-features=AutomationControlled");
        }

        builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {e}"))
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>> {
        let config = self.browser_config(profile)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {e}"))?;

        // Chrome sends some CDP messages chromiumoxide cannot decode; keep draining.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(target: "browser", error = %e, "cdp handler error");
                }
            }
        });

        info!(target: "browser", stealth = profile.stealth, "browser launched");
        Ok(Box::new(ChromeSession {
            browser: RwLock::new(browser),
            handler_task,
            profile: profile.clone(),
        }))
    }
}

struct ChromeSession {
    browser: RwLock<Browser>,
    handler_task: JoinHandle<()>,
    profile: SessionProfile,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn open_tab(&self) -> Result<Box<dyn BrowserTab>> {
        let page = {
            let browser = self.browser.read().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| anyhow!("Failed to open tab: {e}"))?
        };

        if self.profile.stealth {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                .await
                .map_err(|e| anyhow!("Failed to install stealth script: {e}"))?;
        }
        if let Some(ua) = &self.profile.user_agent {
            page.execute(SetUserAgentOverrideParams::new(ua.clone()))
                .await
                .map_err(|e| anyhow!("Failed to set user agent: {e}"))?;
        }

        Ok(Box::new(ChromeTab { page }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.write().await;
        let closed = browser.close().await;
        // reap the child process
        let _ = browser.wait().await;
        self.handler_task.abort();
        closed
            .map(|_| ())
            .map_err(|e| anyhow!("Failed to close browser: {e}"))
    }
}

struct ChromeTab {
    page: Page,
}

#[async_trait]
impl BrowserTab for ChromeTab {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("navigating to {url}"))?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(true),
                Err(e) if is_absent(&e) => {}
                Err(e) => return Err(anyhow!("waiting for {selector}: {e}")),
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| anyhow!("Failed to get page content: {e}"))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| anyhow!("Failed to close tab: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome_error(message: &str) -> CdpError {
        CdpError::Chrome(chromiumoxide::types::Error {
            code: -32000,
            message: message.to_string(),
        })
    }

    #[test]
    fn only_missing_nodes_count_as_absent() {
        assert!(is_absent(&CdpError::NotFound));
        assert!(!is_absent(&CdpError::NoResponse));
        assert!(!is_absent(&CdpError::Timeout));
        assert!(is_absent(&chrome_error("Could not find node with given id")));
        assert!(!is_absent(&chrome_error("Target closed")));
        assert!(!is_absent(&CdpError::msg("websocket closed")));
    }
}
