// src/browser/mod.rs
//! Headless browser abstraction.
//!
//! A `BrowserSession` is one browser process owned by one acquisition; tabs
//! are opened from it. Both are wrapped in guards that close them on every
//! exit path: explicitly via `close()`, or from `Drop` (spawned on the
//! current runtime) when a future is dropped or an early return skips it.

pub mod chrome;
pub mod fixture;

use std::ops::Deref;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

pub use chrome::ChromeLauncher;
pub use fixture::{FixtureLauncher, FixtureStats};

/// Desktop user agent used by hardened sessions unless configured otherwise.
pub const DEFAULT_STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How a session should present itself before the first navigation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionProfile {
    /// Mask automation signals (webdriver flag, empty plugin list, blink
    /// automation feature).
    pub stealth: bool,
    pub user_agent: Option<String>,
    /// `(width, height)` in CSS pixels.
    pub viewport: Option<(u32, u32)>,
}

impl SessionProfile {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn hardened(user_agent: impl Into<String>) -> Self {
        Self {
            stealth: true,
            user_agent: Some(user_agent.into()),
            viewport: Some((1280, 720)),
        }
    }
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open_tab(&self) -> Result<Box<dyn BrowserTab>>;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserTab: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;
    /// `Ok(false)` when the selector did not attach within `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool>;
    async fn content(&self) -> Result<String>;
    async fn close(&self) -> Result<()>;
}

/// Owns a launched session until it is closed.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub async fn launch(launcher: &dyn BrowserLauncher, profile: &SessionProfile) -> Result<Self> {
        let session = launcher.launch(profile).await?;
        Ok(Self {
            session: Some(session),
        })
    }

    pub async fn open_tab(&self) -> Result<TabGuard> {
        let tab = self.session().open_tab().await?;
        Ok(TabGuard { tab: Some(tab) })
    }

    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(target: "browser", error = ?e, "browser close error (non-fatal)");
            }
        }
    }

    fn session(&self) -> &dyn BrowserSession {
        self.session
            .as_deref()
            .expect("SessionGuard: session already closed")
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            spawn_cleanup("session", async move { session.close().await });
        }
    }
}

/// Owns one tab until it is closed.
pub struct TabGuard {
    tab: Option<Box<dyn BrowserTab>>,
}

impl TabGuard {
    pub async fn close(mut self) {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close().await {
                debug!(target: "browser", error = ?e, "tab close error (non-fatal)");
            }
        }
    }
}

impl Deref for TabGuard {
    type Target = dyn BrowserTab;

    fn deref(&self) -> &Self::Target {
        self.tab.as_deref().expect("TabGuard: tab already closed")
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Some(tab) = self.tab.take() {
            spawn_cleanup("tab", async move { tab.close().await });
        }
    }
}

fn spawn_cleanup<F>(what: &'static str, fut: F)
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = fut.await {
                    warn!(target: "browser", what, error = ?e, "drop cleanup failed");
                }
            });
        }
        Err(_) => warn!(target: "browser", what, "no runtime for drop cleanup"),
    }
}
