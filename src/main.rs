//! # OpenConnect SSO
//!
//! Completes an AnyConnect gateway's single-sign-on login in a browser and
//! saves the resulting session cookie and server fingerprint for `openconnect`.

mod args;

use args::Args;
use clap::Parser;
use log::{error, info, warn};
use openconnect_sso::{
    authenticate, init_logger, BrowserOptions, CancellationToken, ChromeContext, GatewayClient,
    SsoError, WaitOptions,
};
use std::process::ExitCode;
use std::time::Duration;

fn run(args: &Args, cancel: CancellationToken) -> Result<(), SsoError> {
    let gateway = GatewayClient::new()?;

    let browser_options = BrowserOptions {
        headless: args.headless,
        executable: args.browser.clone(),
    };
    let wait = WaitOptions {
        poll_interval: Duration::from_millis(args.poll_interval),
        timeout: (args.login_timeout > 0).then(|| Duration::from_secs(args.login_timeout)),
        cancel: Some(cancel),
    };

    let bundle = authenticate(
        &gateway,
        &args.server,
        || ChromeContext::launch(&browser_options),
        &wait,
    )?;

    bundle.write_to(&args.config)
}

/// The main entry point of the application.
fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_format, args.log_level);
    info!("Logger initialized");

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    // First Ctrl-C stops the flow at the next stage boundary or poll; a second
    // one aborts whatever is running.
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(1);
        }
        warn!("interrupt received, stopping (press Ctrl-C again to abort immediately)");
        handler_token.cancel();
    }) {
        warn!("could not install Ctrl-C handler: {}", e);
    }

    match run(&args, cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let category = e.category().as_str();
            match e.stage() {
                Some(stage) => error!(stage = stage.as_str(), category = category; "{}", e),
                None => error!(category = category; "{}", e),
            }
            if let Some(body) = e.response_body() {
                error!(body = body; "unexpected response body");
            }
            ExitCode::FAILURE
        }
    }
}
