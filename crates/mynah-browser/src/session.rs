use crate::{ChromeFinder, ChromeLauncher, Error, ProfileManager, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use mynah_core::RecorderConfig;
use std::process::Child;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One Chrome instance attached over CDP, navigated to one meeting room.
///
/// Owns the Chrome child process, the CDP connection and the single page the
/// controller drives. Created once per dispatch and closed exactly once;
/// `close` is idempotent and swallows secondary failures because it runs on
/// the shutdown path.
pub struct Session {
    child: Option<Child>,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    // Kept alive so the profile directory survives until teardown.
    _profile: ProfileManager,
    page: Page,
    closed: bool,
}

impl Session {
    /// Launch Chrome, attach over CDP, size the viewport to the capture
    /// resolution and navigate to the room.
    pub async fn open(config: &RecorderConfig, room: &str) -> Result<Self> {
        let chrome_binary = ChromeFinder::new(config.chrome_path.clone()).find()?;
        let profile = ProfileManager::temporary()?;
        let launcher = ChromeLauncher::new(
            chrome_binary,
            profile.path().to_path_buf(),
            config.width,
            config.height,
        )?;
        let debugging_port = launcher.debugging_port();

        tracing::info!("Launching Chrome for room {}", room);
        let mut child = launcher.launch()?;

        match Self::attach(config, room, debugging_port).await {
            Ok((browser, handler_task, page)) => Ok(Self {
                child: Some(child),
                browser: Some(browser),
                handler_task: Some(handler_task),
                _profile: profile,
                page,
                closed: false,
            }),
            Err(e) => {
                // Chrome is up but unusable; don't leave it orphaned.
                terminate_pid(child.id());
                let _ = child.wait();
                Err(e)
            }
        }
    }

    /// Connect to the debug port, claim a page and size it.
    async fn attach(
        config: &RecorderConfig,
        room: &str,
        debugging_port: u16,
    ) -> Result<(Browser, JoinHandle<()>, Page)> {
        // Chrome may not have the debug endpoint up yet; retry the handshake
        // a bounded number of times.
        let ws_url = format!("http://localhost:{}", debugging_port);
        let (browser, mut handler) = {
            let mut retries = 10;
            loop {
                tracing::debug!("Attempting CDP connection to {}...", ws_url);
                match Browser::connect(&ws_url).await {
                    Ok(result) => {
                        tracing::info!("CDP connection established");
                        break result;
                    }
                    Err(e) => {
                        retries -= 1;
                        if retries == 0 {
                            return Err(Error::Cdp(format!(
                                "Failed to connect to Chrome after 10 attempts: {}",
                                e
                            )));
                        }
                        tracing::debug!("CDP connection attempt failed, retrying: {}", e);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        };

        // The handler must be polled for any CDP command to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        // Give Chrome a moment to create its initial tab.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let page = if let Some(page) = browser.pages().await?.first() {
            page.clone()
        } else {
            browser.new_page("about:blank").await?
        };

        // Viewport must match the capture geometry; the recording is a raw
        // screen grab of this window.
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(config.width as i64)
            .height(config.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(Error::Cdp)?;
        page.execute(metrics).await?;

        let url = config
            .meeting_url(room)
            .map_err(|e| Error::Browser(e.to_string()))?;
        tracing::info!("Navigating to {}", url);
        page.goto(url.as_str()).await?;
        if let Err(e) = page.wait_for_navigation().await {
            // Meeting pages keep loading assets long after they are usable.
            tracing::debug!("Navigation wait ended early: {}", e);
        }

        Ok((browser, handler_task, page))
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Poll for a selector until it appears or the timeout elapses.
    ///
    /// Readiness polling instead of a blind sleep: meeting pages render
    /// asynchronously and DOM queries before paint completes are unreliable.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Option<Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Some(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Tear the session down: close the browser, stop the CDP handler, and
    /// make sure the Chrome process is gone. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Browser close failed (continuing teardown): {}", e);
            }
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        if let Some(mut child) = self.child.take() {
            // Chrome usually exits with the CDP close; reap it, escalating
            // only if it lingers.
            let mut waited = 0;
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::debug!("Chrome exited: {}", status);
                        break;
                    }
                    Ok(None) if waited < 10 => {
                        if waited == 0 {
                            terminate_pid(child.id());
                        }
                        waited += 1;
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                    Ok(None) => {
                        tracing::warn!("Chrome did not exit, killing pid {}", child.id());
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Could not reap Chrome: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// Ask a process to terminate (SIGTERM on unix).
fn terminate_pid(pid: u32) {
    #[cfg(unix)]
    {
        use std::process::Command;
        let _ = Command::new("kill").arg(pid.to_string()).output();
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output();
    }
}

// Full session tests require a running Chrome instance; the launcher arg
// construction and finder logic are unit-tested in their own modules.
