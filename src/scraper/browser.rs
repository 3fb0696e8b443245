//! Browser automation using chromiumoxide.

use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig as ChromeConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::BrowserConfig;
use crate::error::{HarvestError, Result};

use super::session::Session;

/// One headless Chrome instance with a single tab.
///
/// Each session is its own browser process so that every pool member keeps a
/// separate cookie jar and login.
pub struct ChromeSession {
    browser: ChromeBrowser,
    handle: tokio::task::JoinHandle<()>,
    page: Page,
    settle: Duration,
}

impl ChromeSession {
    /// Launch a new browser instance
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let chrome_path = config
            .chrome_path
            .clone()
            .unwrap_or_else(|| default_chrome_path().to_string());

        let mut builder = ChromeConfig::builder()
            .chrome_executable(chrome_path)
            .no_sandbox()
            .disable_default_args()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .window_size(1280, 900);
        builder = if config.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };

        let chrome_config = builder
            .build()
            .map_err(|e| HarvestError::Browser(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = ChromeBrowser::launch(chrome_config)
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to launch browser: {}", e)))?;

        // Handler must keep being polled for the browser to work
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to open tab: {}", e)))?;

        Ok(Self {
            browser,
            handle,
            page,
            settle: config.settle(),
        })
    }
}

fn default_chrome_path() -> &'static str {
    if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else if cfg!(target_os = "windows") {
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"
    } else {
        "google-chrome"
    }
}

impl Session for ChromeSession {
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<()>> {
        async move {
            self.page
                .goto(url)
                .await
                .map_err(|e| HarvestError::fetch(url, e))?;
            tokio::time::sleep(self.settle).await;
            Ok(())
        }
    }

    fn html(&mut self) -> impl Future<Output = Result<String>> {
        async move {
            self.page
                .content()
                .await
                .map_err(|e| HarvestError::Browser(format!("failed to read page content: {}", e)))
        }
    }

    fn click(&mut self, selector: &str) -> impl Future<Output = Result<()>> {
        async move {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| HarvestError::StructureMismatch(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| HarvestError::Browser(format!("click on {} failed: {}", selector, e)))?;
            tokio::time::sleep(self.settle).await;
            Ok(())
        }
    }

    fn fill(&mut self, selector: &str, text: &str) -> impl Future<Output = Result<()>> {
        async move {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| HarvestError::StructureMismatch(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| HarvestError::Browser(format!("focus on {} failed: {}", selector, e)))?;
            element
                .type_str(text)
                .await
                .map_err(|e| HarvestError::Browser(format!("typing into {} failed: {}", selector, e)))?;
            Ok(())
        }
    }

    fn close(mut self) -> impl Future<Output = Result<()>> {
        async move {
            let result = self.browser.close().await;
            let _ = self.browser.wait().await;
            self.handle.abort();
            result
                .map(|_| ())
                .map_err(|e| HarvestError::Browser(format!("failed to close browser: {}", e)))
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
