//! AnyConnect "aggregate auth" XML documents.
//!
//! The gateway speaks a small `<config-auth>` dialect. Only the handful of
//! elements the SSO flow needs are modelled; everything else in a response
//! is ignored.

use crate::error::SsoError;
use crate::session::Stage;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use serde::Deserialize;

/// Client version the gateway sees, both in the XML and in the `User-Agent`.
pub const CLIENT_VERSION: &str = "4.7.00136";

pub const DEVICE_ID: &str = "linux-64";

/// Parsed reply to the `init` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationResponse {
    pub login_url: String,
    pub login_final_url: String,
    pub token_cookie_name: String,
    pub opaque: Opaque,
}

/// Inner XML of `<opaque>`, which must be sent back untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub value: String,
}

/// Parsed reply to the `auth-reply` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationResponse {
    pub cookie: String,
    pub fingerprint: String,
}

pub fn init_request(group_access: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<config-auth client="vpn" type="init" aggregate-auth-version="2">
  <version who="vpn">{version}</version>
  <device-id>{device}</device-id>
  <group-select></group-select>
  <group-access>{group_access}</group-access>
  <capabilities>
    <auth-method>single-sign-on-v2</auth-method>
  </capabilities>
</config-auth>
"#,
        version = CLIENT_VERSION,
        device = DEVICE_ID,
        group_access = escape(group_access),
    )
}

pub fn auth_reply_request(opaque: &str, sso_token: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<config-auth client="vpn" type="auth-reply" aggregate-auth-version="2">
  <version who="vpn">{version}</version>
  <device-id>{device}</device-id>
  <session-token/>
  <session-id/>
  <opaque is-for="sg">{opaque}</opaque>
  <auth>
    <sso-token>{token}</sso-token>
  </auth>
</config-auth>
"#,
        version = CLIENT_VERSION,
        device = DEVICE_ID,
        opaque = opaque,
        token = escape(sso_token),
    )
}

// ── Response shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config-auth")]
struct InitXml {
    #[serde(default)]
    auth: Option<AuthXml>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthXml {
    #[serde(rename = "sso-v2-login", default)]
    login: Option<String>,
    #[serde(rename = "sso-v2-login-final", default)]
    login_final: Option<String>,
    #[serde(rename = "sso-v2-token-cookie-name", default)]
    token_cookie_name: Option<String>,
    #[serde(default)]
    error: Option<ErrorXml>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorXml {
    #[serde(rename = "$text", default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config-auth")]
struct FinalXml {
    #[serde(rename = "session-token", default)]
    session_token: Option<String>,
    #[serde(default)]
    auth: Option<AuthXml>,
    #[serde(default)]
    config: Option<ConfigXml>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigXml {
    #[serde(rename = "vpn-base-config", default)]
    base: Option<BaseConfigXml>,
}

#[derive(Debug, Default, Deserialize)]
struct BaseConfigXml {
    #[serde(rename = "server-cert-hash", default)]
    server_cert_hash: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turns an `<auth><error>` element into a rejection, if present.
fn rejection(stage: Stage, auth: Option<&AuthXml>) -> Result<(), SsoError> {
    match auth.and_then(|a| a.error.as_ref()) {
        Some(error) => Err(SsoError::GatewayRejected {
            stage,
            message: error.message.trim().to_string(),
        }),
        None => Ok(()),
    }
}

/// Returns the raw inner XML of the first element named `tag`.
/// An empty element yields an empty string; a missing one yields `None`.
fn inner_xml(body: &str, tag: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event()? {
            Event::Start(start) if start.name().as_ref() == tag.as_bytes() => {
                let end = start.name().as_ref().to_vec();
                return Ok(Some(reader.read_text(QName(&end))?.into_owned()));
            }
            Event::Empty(empty) if empty.name().as_ref() == tag.as_bytes() => {
                return Ok(Some(String::new()))
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

impl InitializationResponse {
    pub fn parse(body: &str) -> Result<Self, SsoError> {
        let stage = Stage::Initialization;
        let parsed: InitXml = quick_xml::de::from_str(body)
            .map_err(|e| SsoError::protocol(stage, e.to_string(), body))?;
        rejection(stage, parsed.auth.as_ref())?;

        let auth = parsed.auth.unwrap_or_default();
        let login_url = non_empty(auth.login)
            .ok_or_else(|| SsoError::protocol(stage, "missing <sso-v2-login>", body))?;
        let token_cookie_name = non_empty(auth.token_cookie_name).ok_or_else(|| {
            SsoError::protocol(stage, "missing <sso-v2-token-cookie-name>", body)
        })?;
        let opaque = inner_xml(body, "opaque")
            .map_err(|e| SsoError::protocol(stage, e.to_string(), body))?
            .ok_or_else(|| SsoError::protocol(stage, "missing <opaque>", body))?;

        Ok(Self {
            login_url,
            login_final_url: non_empty(auth.login_final).unwrap_or_default(),
            token_cookie_name,
            opaque: Opaque { value: opaque },
        })
    }
}

impl FinalizationResponse {
    pub fn parse(body: &str) -> Result<Self, SsoError> {
        let stage = Stage::Finalization;
        let parsed: FinalXml = quick_xml::de::from_str(body)
            .map_err(|e| SsoError::protocol(stage, e.to_string(), body))?;
        rejection(stage, parsed.auth.as_ref())?;

        let cookie = non_empty(parsed.session_token)
            .ok_or_else(|| SsoError::protocol(stage, "missing <session-token>", body))?;
        let fingerprint = non_empty(
            parsed
                .config
                .and_then(|c| c.base)
                .and_then(|b| b.server_cert_hash),
        )
        .ok_or_else(|| SsoError::protocol(stage, "missing <server-cert-hash>", body))?;

        Ok(Self {
            cookie,
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config-auth client="vpn" type="auth-request" aggregate-auth-version="2">
  <opaque is-for="sg">abc123</opaque>
  <auth id="main">
    <title>Login</title>
    <message>Please complete the authentication process in the AnyConnect Login window.</message>
    <banner></banner>
    <sso-v2-login>https://idp.example.com/login</sso-v2-login>
    <sso-v2-login-final>https://vpn.example.com/+CSCOE+/saml_ac_login.html</sso-v2-login-final>
    <sso-v2-logout>https://idp.example.com/logout</sso-v2-logout>
    <sso-v2-token-cookie-name>ssotoken</sso-v2-token-cookie-name>
    <form>
      <input type="sso" name="sso-token"></input>
    </form>
  </auth>
</config-auth>
"#;

    const FINAL_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config-auth client="vpn" type="complete" aggregate-auth-version="2">
  <session-id>48291</session-id>
  <session-token>sesscookie</session-token>
  <auth id="success">
    <banner>Welcome</banner>
    <message id="0" param1="" param2=""></message>
  </auth>
  <capabilities>
    <crypto-supported>ssl-dhe</crypto-supported>
  </capabilities>
  <config client="vpn" type="private">
    <vpn-base-config>
      <server-cert-hash>fp789</server-cert-hash>
    </vpn-base-config>
    <opaque is-for="vpn-client"></opaque>
  </config>
</config-auth>
"#;

    #[test]
    fn parses_init_reply() {
        let parsed = InitializationResponse::parse(INIT_REPLY).unwrap();
        assert_eq!(parsed.login_url, "https://idp.example.com/login");
        assert_eq!(
            parsed.login_final_url,
            "https://vpn.example.com/+CSCOE+/saml_ac_login.html"
        );
        assert_eq!(parsed.token_cookie_name, "ssotoken");
        assert_eq!(parsed.opaque.value, "abc123");
    }

    #[test]
    fn opaque_keeps_nested_markup_verbatim() {
        let body = r#"<config-auth client="vpn" type="auth-request">
<opaque is-for="sg"><tunnel-group>SSO</tunnel-group><config-hash>1595829378234</config-hash></opaque>
<auth id="main"><sso-v2-login>https://idp/</sso-v2-login><sso-v2-token-cookie-name>t</sso-v2-token-cookie-name></auth>
</config-auth>"#;

        let parsed = InitializationResponse::parse(body).unwrap();
        assert_eq!(
            parsed.opaque.value,
            "<tunnel-group>SSO</tunnel-group><config-hash>1595829378234</config-hash>"
        );
        assert_eq!(parsed.login_final_url, "");
    }

    #[test]
    fn init_reply_without_login_url_is_rejected() {
        let body = r#"<config-auth><opaque>x</opaque><auth id="main"><sso-v2-token-cookie-name>t</sso-v2-token-cookie-name></auth></config-auth>"#;
        let err = InitializationResponse::parse(body).unwrap_err();
        assert!(err.to_string().contains("sso-v2-login"));
        assert_eq!(err.response_body(), Some(body));
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let err = InitializationResponse::parse("<html><body>502 Bad Gateway").unwrap_err();
        assert!(matches!(err, SsoError::Protocol { .. }));
    }

    #[test]
    fn gateway_error_element_becomes_rejection() {
        let body = r#"<config-auth client="vpn" type="auth-request">
<auth id="main"><error id="88" param1="" param2="">Login failed.</error></auth>
</config-auth>"#;
        match FinalizationResponse::parse(body).unwrap_err() {
            SsoError::GatewayRejected { stage, message } => {
                assert_eq!(stage, Stage::Finalization);
                assert_eq!(message, "Login failed.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_final_reply() {
        let parsed = FinalizationResponse::parse(FINAL_REPLY).unwrap();
        assert_eq!(parsed.cookie, "sesscookie");
        assert_eq!(parsed.fingerprint, "fp789");
    }

    #[test]
    fn final_reply_without_fingerprint_is_rejected() {
        let body = r#"<config-auth type="complete"><session-token>abc</session-token></config-auth>"#;
        let err = FinalizationResponse::parse(body).unwrap_err();
        assert!(err.to_string().contains("server-cert-hash"));
    }

    #[test]
    fn init_request_carries_group_access() {
        let body = init_request("https://vpn2.example.com/?a=1&b=2");
        assert!(body.contains(r#"type="init" aggregate-auth-version="2""#));
        assert!(body.contains("<version who=\"vpn\">4.7.00136</version>"));
        assert!(body.contains("<device-id>linux-64</device-id>"));
        assert!(body.contains("<group-select></group-select>"));
        assert!(body.contains("<group-access>https://vpn2.example.com/?a=1&amp;b=2</group-access>"));
    }

    #[test]
    fn auth_reply_echoes_opaque_and_token() {
        let body = auth_reply_request("<config-hash>1</config-hash>", "tok456");
        assert!(body.contains(r#"type="auth-reply""#));
        assert!(body.contains("<session-token/>"));
        assert!(body.contains("<session-id/>"));
        assert!(body.contains(r#"<opaque is-for="sg"><config-hash>1</config-hash></opaque>"#));
        assert!(body.contains("<sso-token>tok456</sso-token>"));
    }
}
