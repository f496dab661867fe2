use crate::error::SsoError;
use crate::session::Stage;
use crate::utils::CancellationToken;
use log::{debug, info, warn};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// A cookie as reported by the browser's jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
}

impl BrowserCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What the login wait needs from a browser: somewhere to send the user and a
/// cookie jar to watch.
pub trait BrowserContext {
    fn navigate(&mut self, url: &str) -> Result<(), SsoError>;
    fn list_cookies(&mut self) -> Result<Vec<BrowserCookie>, SsoError>;
    fn close(&mut self) -> Result<(), SsoError>;
}

/// How long and how often to poll the cookie jar.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` waits until the cookie shows up or the wait is cancelled.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    /// Fails with [`SsoError::Cancelled`] once the cancel token has fired.
    pub fn check_cancelled(&self, stage: Stage) -> Result<(), SsoError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(SsoError::Cancelled(stage)),
            _ => Ok(()),
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            timeout: None,
            cancel: None,
        }
    }
}

/// Picks the cookie whose name is exactly `name`.
pub fn find_token_cookie<'a>(cookies: &'a [BrowserCookie], name: &str) -> Option<&'a BrowserCookie> {
    cookies.iter().find(|c| c.name == name)
}

/// Polls the jar until a cookie named `cookie_name` appears, the deadline
/// passes, or the wait is cancelled.
pub fn wait_for_token_cookie<B: BrowserContext + ?Sized>(
    browser: &mut B,
    cookie_name: &str,
    options: &WaitOptions,
) -> Result<BrowserCookie, SsoError> {
    let deadline = options.timeout.map(|t| Instant::now() + t);
    let mut polls: u64 = 0;

    loop {
        options.check_cancelled(Stage::Login)?;

        let cookies = browser.list_cookies()?;
        polls += 1;
        if let Some(cookie) = find_token_cookie(&cookies, cookie_name) {
            debug!(stage = Stage::Login.as_str(), polls = polls; "token cookie present");
            return Ok(cookie.clone());
        }

        if let (Some(deadline), Some(timeout)) = (deadline, options.timeout) {
            if Instant::now() >= deadline {
                return Err(SsoError::LoginTimeout(timeout));
            }
        }

        sleep(options.poll_interval);
    }
}

/// Sends the browser to the identity provider and waits for the token cookie.
///
/// The browser is closed whichever way the wait ends; a failure to close it
/// after a successful capture is only logged.
pub fn capture_token_cookie<B: BrowserContext + ?Sized>(
    browser: &mut B,
    login_url: &str,
    cookie_name: &str,
    options: &WaitOptions,
) -> Result<BrowserCookie, SsoError> {
    let stage = Stage::Login.as_str();

    let result = match browser.navigate(login_url) {
        Ok(()) => {
            info!(stage = stage, url = login_url, cookie = cookie_name; "waiting for authentication token cookie in the browser");
            wait_for_token_cookie(browser, cookie_name, options)
        }
        Err(e) => Err(e),
    };

    if let Err(e) = browser.close() {
        warn!(stage = stage; "could not close the browser cleanly: {}", e);
    }

    let cookie = result?;
    info!(stage = stage; "received authentication token cookie from browser");
    Ok(cookie)
}
