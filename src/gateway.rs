use crate::error::SsoError;
use crate::protocol::CLIENT_VERSION;
use crate::session::Stage;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::Url;

/// The two network calls the handshake makes against the VPN gateway.
pub trait Gateway {
    /// Follows redirects from `server` and returns the final URL.
    fn resolve(&self, server: &str) -> Result<String, SsoError>;

    /// POSTs an aggregate-auth XML document and returns the response body.
    fn post_xml(&self, stage: Stage, url: &str, body: String) -> Result<String, SsoError>;
}

/// reqwest-backed [`Gateway`] that presents itself as an AnyConnect client.
pub struct GatewayClient {
    http: Client,
}

impl GatewayClient {
    pub fn new() -> Result<Self, SsoError> {
        let http = Client::builder().build().map_err(SsoError::ClientSetup)?;
        Ok(Self { http })
    }

    pub fn user_agent() -> String {
        format!("AnyConnect Linux_64 {CLIENT_VERSION}")
    }
}

impl Gateway for GatewayClient {
    fn resolve(&self, server: &str) -> Result<String, SsoError> {
        let response = self
            .http
            .get(server)
            .send()
            .map_err(|source| SsoError::Transport {
                stage: Stage::Initialization,
                url: server.to_string(),
                source,
            })?;

        let resolved = canonical_url(response.url());
        debug!(url = server, resolved = resolved.as_str(); "resolved gateway address");
        Ok(resolved)
    }

    fn post_xml(&self, stage: Stage, url: &str, body: String) -> Result<String, SsoError> {
        let transport = |source| SsoError::Transport {
            stage,
            url: url.to_string(),
            source,
        };

        let response = self
            .http
            .post(url)
            .header("User-Agent", Self::user_agent())
            .header("Accept", "*/*")
            .header("Accept-Encoding", "identity")
            .header("X-Transcend-Version", "1")
            .header("X-Aggregate-Auth", "1")
            .header("X-Support-HTTP-Auth", "true")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(transport)?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let text = response.text().map_err(transport)?;

        info!(stage = stage.as_str(), url = final_url.as_str(); "received response from server");
        debug!(stage = stage.as_str(), status = status, body = text.as_str(); "raw response");
        Ok(text)
    }
}

/// Renders a resolved URL the way it should be echoed to the gateway and the
/// credential file: a bare origin loses the trailing `/` that `Url` adds.
pub(crate) fn canonical_url(url: &Url) -> String {
    let rendered = url.as_str();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        rendered.trim_end_matches('/').to_string()
    } else {
        rendered.to_string()
    }
}
