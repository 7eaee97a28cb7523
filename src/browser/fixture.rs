// src/browser/fixture.rs
//! In-process browser that serves canned HTML by URL prefix.
//!
//! Used by tests and offline demos. Records every session/tab open and close
//! so callers can assert nothing leaks on failure paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{BrowserLauncher, BrowserSession, BrowserTab, SessionProfile};

#[derive(Debug, Clone)]
enum Route {
    Html(String),
    Fail(String),
    BrokenLookup(String),
}

#[derive(Debug, Default)]
pub struct FixtureStats {
    pub sessions_launched: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub tabs_opened: AtomicUsize,
    pub tabs_closed: AtomicUsize,
    open_tabs: AtomicUsize,
    pub peak_open_tabs: AtomicUsize,
    pub profiles: Mutex<Vec<SessionProfile>>,
}

impl FixtureStats {
    pub fn launched(&self) -> usize {
        self.sessions_launched.load(Ordering::SeqCst)
    }

    pub fn peak_tabs(&self) -> usize {
        self.peak_open_tabs.load(Ordering::SeqCst)
    }

    /// Every launched session and opened tab was closed again.
    pub fn all_released(&self) -> bool {
        self.sessions_launched.load(Ordering::SeqCst) == self.sessions_closed.load(Ordering::SeqCst)
            && self.tabs_opened.load(Ordering::SeqCst) == self.tabs_closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureLauncher {
    routes: Vec<(String, Route)>,
    fail_launch: bool,
    latency: Duration,
    stats: Arc<FixtureStats>,
}

impl FixtureLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for every URL starting with `prefix` (longest prefix wins).
    pub fn route(mut self, prefix: impl Into<String>, html: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), Route::Html(html.into())));
        self
    }

    /// Navigation to URLs starting with `prefix` fails.
    pub fn fail_route(mut self, prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), Route::Fail(reason.into())));
        self
    }

    /// Navigation succeeds but every element lookup on the page errors, as
    /// when the connection drops after load.
    pub fn broken_lookup(mut self, prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), Route::BrokenLookup(reason.into())));
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    /// Delay applied to every navigation, so concurrent tabs overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn stats(&self) -> Arc<FixtureStats> {
        self.stats.clone()
    }

    fn resolve(&self, url: &str) -> Option<Route> {
        self.routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, route)| route.clone())
    }
}

#[async_trait]
impl BrowserLauncher for FixtureLauncher {
    async fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>> {
        if self.fail_launch {
            bail!("Failed to launch browser: fixture launcher is set to fail");
        }
        self.stats.sessions_launched.fetch_add(1, Ordering::SeqCst);
        self.stats
            .profiles
            .lock()
            .expect("fixture stats mutex poisoned")
            .push(profile.clone());
        Ok(Box::new(FixtureSession {
            launcher: self.clone(),
            closed: Mutex::new(false),
        }))
    }
}

struct FixtureSession {
    launcher: FixtureLauncher,
    closed: Mutex<bool>,
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn open_tab(&self) -> Result<Box<dyn BrowserTab>> {
        if *self.closed.lock().expect("fixture session mutex poisoned") {
            bail!("session already closed");
        }
        let stats = &self.launcher.stats;
        stats.tabs_opened.fetch_add(1, Ordering::SeqCst);
        let open = stats.open_tabs.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_open_tabs.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FixtureTab {
            launcher: self.launcher.clone(),
            page: Mutex::new(None),
            lookup_error: Mutex::new(None),
            closed: Mutex::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut closed = self.closed.lock().expect("fixture session mutex poisoned");
        if !*closed {
            *closed = true;
            self.launcher
                .stats
                .sessions_closed
                .fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FixtureTab {
    launcher: FixtureLauncher,
    page: Mutex<Option<String>>,
    lookup_error: Mutex<Option<String>>,
    closed: Mutex<bool>,
}

impl FixtureTab {
    fn current(&self) -> Result<String> {
        self.page
            .lock()
            .expect("fixture tab mutex poisoned")
            .clone()
            .ok_or_else(|| anyhow!("tab has not navigated"))
    }
}

#[async_trait]
impl BrowserTab for FixtureTab {
    async fn goto(&self, url: &str) -> Result<()> {
        if !self.launcher.latency.is_zero() {
            tokio::time::sleep(self.launcher.latency).await;
        }
        match self.launcher.resolve(url) {
            Some(Route::Html(html)) => {
                *self.page.lock().expect("fixture tab mutex poisoned") = Some(html);
                Ok(())
            }
            Some(Route::BrokenLookup(reason)) => {
                *self.page.lock().expect("fixture tab mutex poisoned") = Some(String::new());
                *self.lookup_error.lock().expect("fixture tab mutex poisoned") = Some(reason);
                Ok(())
            }
            Some(Route::Fail(reason)) => Err(anyhow!("navigating to {url}: {reason}")),
            None => Err(anyhow!("navigating to {url}: net::ERR_NAME_NOT_RESOLVED")),
        }
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        let html = self.current()?;
        let broken = self
            .lookup_error
            .lock()
            .expect("fixture tab mutex poisoned")
            .clone();
        if let Some(reason) = broken {
            bail!("waiting for {selector}: {reason}");
        }
        let sel = Selector::parse(selector).map_err(|e| anyhow!("bad selector {selector}: {e}"))?;
        let doc = Html::parse_document(&html);
        let found = doc.select(&sel).next().is_some();
        Ok(found)
    }

    async fn content(&self) -> Result<String> {
        self.current()
    }

    async fn close(&self) -> Result<()> {
        let mut closed = self.closed.lock().expect("fixture tab mutex poisoned");
        if !*closed {
            *closed = true;
            let stats = &self.launcher.stats;
            stats.tabs_closed.fetch_add(1, Ordering::SeqCst);
            stats.open_tabs.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
