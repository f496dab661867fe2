use crate::error::SsoError;
use crate::login::{BrowserContext, BrowserCookie};
use headless_chrome::browser::default_executable;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use which::which;

/// Settings for the Chrome instance the user logs in with.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Executable path or a name to look up on `PATH`.
    pub executable: Option<String>,
}

/// Resolves a user-supplied browser executable.
///
/// The lookup is performed in two steps:
/// 1. Check if `user_path` directly points to an existing file.
/// 2. Search the system's PATH (via the `which` crate).
pub fn locate_browser(user_path: &str) -> Option<PathBuf> {
    let candidate = Path::new(user_path);
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }

    which(user_path).ok()
}

/// Launches Chrome with a fresh profile and an 800x800 window.
///
/// The idle timeout is unbounded: the user may spend minutes on the identity
/// provider's pages, and the login wait enforces its own deadline.
fn launch(options: &BrowserOptions) -> Result<Browser, SsoError> {
    let mut builder = LaunchOptions::default_builder();
    let mut launch_options = builder
        .headless(options.headless)
        .sandbox(false)
        .idle_browser_timeout(Duration::MAX)
        .window_size(Some((800, 800)))
        .enable_gpu(false)
        .args(vec![
            OsStr::new("--new-window"),
            OsStr::new("--no-first-run"),
            OsStr::new("--no-default-browser-check"),
            OsStr::new("--disable-session-crashed-bubble"),
        ]);

    if let Some(requested) = &options.executable {
        let path = locate_browser(requested).ok_or_else(|| SsoError::Browser {
            message: format!("cannot locate browser executable '{requested}'"),
        })?;
        launch_options = launch_options.path(Some(path));
    } else if let Ok(executable_path) = default_executable() {
        launch_options = launch_options.path(Some(executable_path));
    }

    let launch_options = launch_options
        .build()
        .map_err(|e| SsoError::browser("invalid launch options", e))?;
    Browser::new(launch_options).map_err(|e| SsoError::browser("could not launch browser", e))
}

/// CDP request for every cookie in the browser context, whatever URL the tab
/// is on. `Tab::get_cookies` only returns the ones matching the current page.
fn all_cookies_request() -> Network::GetAllCookies {
    Network::GetAllCookies(None)
}

fn get_initial_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    for _ in 0..10 {
        if let Ok(tabs) = browser.get_tabs().lock() {
            if let Some(t) = tabs.first() {
                return Ok(Arc::clone(t));
            }
        }
        sleep(Duration::from_millis(200));
    }
    browser.new_tab()
}

/// [`BrowserContext`] backed by a real Chrome process.
///
/// Dropping it terminates the browser, so the process never outlives the
/// login wait even on error paths.
pub struct ChromeContext {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeContext {
    pub fn launch(options: &BrowserOptions) -> Result<Self, SsoError> {
        let browser = launch(options)?;
        let tab = get_initial_tab(&browser)
            .map_err(|e| SsoError::browser("could not open a browser tab", e))?;
        tab.set_default_timeout(Duration::from_secs(30));

        Ok(Self {
            browser: Some(browser),
            tab,
        })
    }
}

impl BrowserContext for ChromeContext {
    fn navigate(&mut self, url: &str) -> Result<(), SsoError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| SsoError::browser("could not navigate", e))?;

        // Identity providers often keep loading long after the first paint.
        if let Err(e) = self.tab.wait_until_navigated() {
            log::warn!("initial navigation wait timed out: {}, continuing...", e);
        }
        Ok(())
    }

    fn list_cookies(&mut self) -> Result<Vec<BrowserCookie>, SsoError> {
        let cookies = self
            .tab
            .call_method(all_cookies_request())
            .map_err(|e| SsoError::browser("browser connection lost", e))?
            .cookies;

        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie::new(c.name, c.value))
            .collect())
    }

    fn close(&mut self) -> Result<(), SsoError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };

        if let Ok(tabs) = browser.get_tabs().lock() {
            for tab in tabs.iter() {
                // We don't want to hang here if the browser is already dead.
                let _ = tab.close(true);
            }
        }
        sleep(Duration::from_millis(200));
        drop(browser);
        Ok(())
    }
}
