//! Client-credentials token acquisition.
//!
//! The token is fetched once per run and reused for every lookup. There is
//! no refresh: a run that outlives the token's lifetime fails its next
//! lookup with a 401 after retries.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::http::Transport;

/// Bearer credential for the catalog API.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct TokenAuthClient<'a, T> {
    transport: T,
    token_url: &'a str,
    credentials: Option<&'a Credentials>,
}

impl<'a, T: Transport> TokenAuthClient<'a, T> {
    pub fn new(transport: T, token_url: &'a str, credentials: Option<&'a Credentials>) -> Self {
        Self {
            transport,
            token_url,
            credentials,
        }
    }

    /// POST `grant_type=client_credentials` with HTTP Basic auth and read
    /// `access_token` from the JSON body.
    pub fn acquire(&self) -> Result<Credential> {
        let creds = self
            .credentials
            .ok_or_else(|| Error::Auth("client id and secret are not configured".to_string()))?;

        let response = self.transport.post_form(
            self.token_url,
            &[("Authorization", basic_authorization(creds))],
            &[("grant_type", "client_credentials")],
        )
        .map_err(|e| Error::Auth(format!("token request to {} failed: {}", self.token_url, e)))?;

        if !response.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint {} answered HTTP {}",
                self.token_url, response.status
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| Error::Auth(format!("unreadable token response: {}", e)))?;
        if body.access_token.is_empty() {
            return Err(Error::Auth("token endpoint returned an empty token".to_string()));
        }
        Ok(Credential::new(body.access_token))
    }
}

fn basic_authorization(creds: &Credentials) -> String {
    let raw = format!("{}:{}", creds.client_id, creds.client_secret);
    format!("Basic {}", STANDARD.encode(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::*;

    fn creds() -> Credentials {
        Credentials {
            client_id: "abc".to_string(),
            client_secret: "xyz".to_string(),
        }
    }

    #[test]
    fn test_acquire_sends_basic_auth_and_grant() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"access_token":"tok-1","token_type":"Bearer","expires_in":3600}"#)]);
        let c = creds();
        let client = TokenAuthClient::new(&transport, "https://auth/token", Some(&c));
        let credential = client.acquire().unwrap();
        assert_eq!(credential.authorization(), "Bearer tok-1");

        let calls = transport.calls.borrow();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].url, "https://auth/token");
        // base64("abc:xyz")
        assert_eq!(calls[0].headers[0].1, "Basic YWJjOnh5eg==");
        assert_eq!(calls[0].params[0], ("grant_type".to_string(), "client_credentials".to_string()));
    }

    #[test]
    fn test_missing_credentials() {
        let transport = ScriptedTransport::new(vec![]);
        let client = TokenAuthClient::new(&transport, "https://auth/token", None);
        let err = client.acquire().unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_rejected_request() {
        let transport = ScriptedTransport::new(vec![status(400, r#"{"error":"invalid_client"}"#)]);
        let c = creds();
        let client = TokenAuthClient::new(&transport, "https://auth/token", Some(&c));
        let err = client.acquire().unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn test_transport_failure_is_auth_error() {
        let transport = ScriptedTransport::new(vec![Err(Error::Data("operation timed out".to_string()))]);
        let c = creds();
        let client = TokenAuthClient::new(&transport, "https://auth/token", Some(&c));
        let err = client.acquire().unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_unreadable_body() {
        let transport = ScriptedTransport::new(vec![ok("not json")]);
        let c = creds();
        let client = TokenAuthClient::new(&transport, "https://auth/token", Some(&c));
        assert_eq!(client.acquire().unwrap_err().kind(), "auth");
    }
}
