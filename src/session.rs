use crate::credentials::CredentialBundle;
use crate::error::SsoError;
use crate::gateway::Gateway;
use crate::login::{capture_token_cookie, BrowserContext, WaitOptions};
use crate::protocol::{
    auth_reply_request, init_request, FinalizationResponse, InitializationResponse,
};
use log::{debug, info};
use std::fmt;

/// Step of the handshake a log record or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialization,
    Login,
    Finalization,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initialization => "initialization",
            Stage::Login => "login",
            Stage::Finalization => "finalization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the gateway address and submits the `init` request.
///
/// Returns the parsed reply together with the resolved URL, which every later
/// request must target.
pub fn initialize<G: Gateway + ?Sized>(
    gateway: &G,
    server: &str,
) -> Result<(InitializationResponse, String), SsoError> {
    let stage = Stage::Initialization;

    let target = gateway.resolve(server)?;
    debug!(stage = stage.as_str(), url = target.as_str(); "configuring VPN request");

    let body = gateway.post_xml(stage, &target, init_request(&target))?;
    let reply = InitializationResponse::parse(&body)?;

    info!(
        stage = stage.as_str(),
        login_url = reply.login_url.as_str(),
        login_final_url = reply.login_final_url.as_str(),
        token_cookie_name = reply.token_cookie_name.as_str();
        "parsed init response"
    );
    Ok((reply, target))
}

/// Trades the SSO token for the VPN session cookie and server fingerprint.
pub fn finalize<G: Gateway + ?Sized>(
    gateway: &G,
    target: &str,
    sso_token: &str,
    opaque: &str,
) -> Result<FinalizationResponse, SsoError> {
    let stage = Stage::Finalization;

    let body = gateway.post_xml(stage, target, auth_reply_request(opaque, sso_token))?;
    let reply = FinalizationResponse::parse(&body)?;

    debug!(
        stage = stage.as_str(),
        cookie = reply.cookie.as_str(),
        fingerprint = reply.fingerprint.as_str();
        "parsed final response"
    );
    info!(stage = stage.as_str(); "received server fingerprint and connection cookie");
    Ok(reply)
}

/// Runs the whole handshake: initialization, browser login, finalization.
///
/// The browser is only launched once the gateway has answered the `init`
/// request, so an unreachable gateway never opens a window. The cancel token in
/// `wait` is honoured between stages as well as during the login wait, and a
/// cancelled run never returns a bundle.
pub fn authenticate<G, B, L>(
    gateway: &G,
    server: &str,
    launch_browser: L,
    wait: &WaitOptions,
) -> Result<CredentialBundle, SsoError>
where
    G: Gateway + ?Sized,
    B: BrowserContext,
    L: FnOnce() -> Result<B, SsoError>,
{
    let (init, target) = initialize(gateway, server)?;
    wait.check_cancelled(Stage::Initialization)?;

    let mut browser = launch_browser()?;
    let token = capture_token_cookie(&mut browser, &init.login_url, &init.token_cookie_name, wait)?;

    wait.check_cancelled(Stage::Finalization)?;
    let reply = finalize(gateway, &target, &token.value, &init.opaque.value)?;
    wait.check_cancelled(Stage::Finalization)?;

    Ok(CredentialBundle {
        cookie: reply.cookie,
        servercert: reply.fingerprint,
        host: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::BrowserCookie;
    use crate::utils::CancellationToken;
    use std::cell::{Cell, RefCell};

    struct RecordingGateway {
        resolved: String,
        replies: RefCell<Vec<String>>,
        posts: RefCell<Vec<(Stage, String, String)>>,
        /// Fired while the given stage's POST is in flight.
        cancel_during: Option<(Stage, CancellationToken)>,
    }

    impl RecordingGateway {
        fn new(replies: &[&str]) -> Self {
            Self {
                resolved: "https://vpn2.example.com".to_string(),
                replies: RefCell::new(replies.iter().map(|r| r.to_string()).collect()),
                posts: RefCell::new(Vec::new()),
                cancel_during: None,
            }
        }
    }

    impl Gateway for RecordingGateway {
        fn resolve(&self, _server: &str) -> Result<String, SsoError> {
            Ok(self.resolved.clone())
        }

        fn post_xml(&self, stage: Stage, url: &str, body: String) -> Result<String, SsoError> {
            self.posts
                .borrow_mut()
                .push((stage, url.to_string(), body));
            if let Some((at, token)) = &self.cancel_during {
                if *at == stage {
                    token.cancel();
                }
            }
            Ok(self.replies.borrow_mut().remove(0))
        }
    }

    struct JarBrowser(Vec<BrowserCookie>);

    impl BrowserContext for JarBrowser {
        fn navigate(&mut self, _url: &str) -> Result<(), SsoError> {
            Ok(())
        }

        fn list_cookies(&mut self) -> Result<Vec<BrowserCookie>, SsoError> {
            Ok(self.0.clone())
        }

        fn close(&mut self) -> Result<(), SsoError> {
            Ok(())
        }
    }

    const INIT: &str = r#"<config-auth type="auth-request"><opaque is-for="sg">abc123</opaque>
<auth id="main"><sso-v2-login>https://idp.example.com/login</sso-v2-login>
<sso-v2-token-cookie-name>ssotoken</sso-v2-token-cookie-name></auth></config-auth>"#;

    const FINAL: &str = r#"<config-auth type="complete"><session-token>sesscookie</session-token>
<config><vpn-base-config><server-cert-hash>fp789</server-cert-hash></vpn-base-config></config></config-auth>"#;

    #[test]
    fn both_posts_target_the_resolved_url() {
        let gateway = RecordingGateway::new(&[INIT, FINAL]);

        let bundle = authenticate(
            &gateway,
            "https://vpn.example.com",
            || Ok(JarBrowser(vec![BrowserCookie::new("ssotoken", "tok456")])),
            &WaitOptions::default(),
        )
        .unwrap();

        assert_eq!(bundle.host, "https://vpn2.example.com");
        assert_eq!(bundle.cookie, "sesscookie");
        assert_eq!(bundle.servercert, "fp789");

        let posts = gateway.posts.borrow();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].0, Stage::Initialization);
        assert_eq!(posts[1].0, Stage::Finalization);
        assert!(posts.iter().all(|(_, url, _)| url == "https://vpn2.example.com"));
        assert!(posts[0]
            .2
            .contains("<group-access>https://vpn2.example.com</group-access>"));
        assert!(posts[1].2.contains("<opaque is-for=\"sg\">abc123</opaque>"));
        assert!(posts[1].2.contains("<sso-token>tok456</sso-token>"));
    }

    #[test]
    fn cancel_during_initialization_never_opens_the_browser() {
        let token = CancellationToken::new();
        let gateway = RecordingGateway {
            cancel_during: Some((Stage::Initialization, token.clone())),
            ..RecordingGateway::new(&[INIT, FINAL])
        };
        let launched = Cell::new(false);

        let err = authenticate(
            &gateway,
            "https://vpn.example.com",
            || {
                launched.set(true);
                Ok(JarBrowser(vec![BrowserCookie::new("ssotoken", "tok456")]))
            },
            &WaitOptions {
                cancel: Some(token),
                ..WaitOptions::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, SsoError::Cancelled(Stage::Initialization)));
        assert!(!launched.get());
        assert_eq!(gateway.posts.borrow().len(), 1);
    }

    #[test]
    fn cancel_during_finalization_returns_no_bundle() {
        let token = CancellationToken::new();
        let gateway = RecordingGateway {
            cancel_during: Some((Stage::Finalization, token.clone())),
            ..RecordingGateway::new(&[INIT, FINAL])
        };

        let err = authenticate(
            &gateway,
            "https://vpn.example.com",
            || Ok(JarBrowser(vec![BrowserCookie::new("ssotoken", "tok456")])),
            &WaitOptions {
                cancel: Some(token),
                ..WaitOptions::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, SsoError::Cancelled(Stage::Finalization)));
        assert_eq!(gateway.posts.borrow().len(), 2);
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Initialization.to_string(), "initialization");
        assert_eq!(Stage::Login.as_str(), "login");
        assert_eq!(Stage::Finalization.as_str(), "finalization");
    }
}
