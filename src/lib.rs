//! # OpenConnect SSO Library
//!
//! This library drives the AnyConnect "aggregate auth" single-sign-on handshake:
//! it asks the gateway where to log in, waits in a browser for the identity
//! provider to hand back a token cookie, trades that token for a VPN session
//! cookie and writes the result where `openconnect` can pick it up.

pub mod browser;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod logger;
pub mod login;
pub mod protocol;
pub mod session;
pub mod utils;

// Re-export commonly used items
pub use browser::{BrowserOptions, ChromeContext};
pub use credentials::CredentialBundle;
pub use error::{ErrorCategory, SsoError};
pub use gateway::{Gateway, GatewayClient};
pub use logger::{init_logger, LogFormat, LogLevel};
pub use login::{BrowserContext, BrowserCookie, WaitOptions};
pub use session::{authenticate, Stage};
pub use utils::CancellationToken;
