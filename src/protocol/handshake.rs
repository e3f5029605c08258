//! Verification of the server's upgrade response (RFC 6455 Section 4.1).
//!
//! Building the HTTP Upgrade request and parsing the response are the HTTP
//! layer's job. The engine only supplies the `Sec-WebSocket-Key` nonce and
//! checks the already-parsed response against it.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wss_engine::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// The `Sec-WebSocket-Key` nonce of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(String);

impl ClientKey {
    /// Generate a fresh key from 16 random bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the OS random source is unavailable.
    pub fn generate() -> Result<Self> {
        let mut nonce = [0u8; 16];
        getrandom::getrandom(&mut nonce).map_err(|e| Error::Io(e.to_string()))?;
        Ok(Self(BASE64.encode(nonce)))
    }

    /// Use a known key, e.g. the RFC sample nonce in tests.
    #[must_use]
    pub fn from_base64(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Value for the `Sec-WebSocket-Key` request header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `Sec-WebSocket-Accept` value a compliant server answers with.
    #[must_use]
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.0)
    }
}

/// Status and headers of the server's response to the upgrade request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeResponse {
    /// HTTP status code.
    pub status: u16,
    headers: Vec<(String, String)>,
}

impl UpgradeResponse {
    /// Create a response with the given status and no headers.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of the header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    }

    /// Check the response completes the handshake started with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The status code is not `101 Switching Protocols`.
    /// - The `Upgrade` header is missing or not `websocket`.
    /// - The `Connection` header is missing or does not contain `upgrade`.
    /// - `Sec-WebSocket-Accept` is missing or does not match `key`.
    pub fn validate(&self, key: &ClientKey) -> Result<()> {
        if self.status != 101 {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {}",
                self.status
            )));
        }

        let upgrade = self
            .header("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = self.header("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        let accept = self.header("sec-websocket-accept").ok_or_else(|| {
            Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into())
        })?;
        if accept != key.expected_accept() {
            return Err(Error::InvalidHandshake(
                "Sec-WebSocket-Accept does not match Sec-WebSocket-Key".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
    const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

    fn valid_response() -> UpgradeResponse {
        UpgradeResponse::new(101)
            .with_header("Upgrade", "websocket")
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", SAMPLE_ACCEPT)
    }

    #[test]
    fn test_compute_accept_key_rfc_example() {
        assert_eq!(compute_accept_key(SAMPLE_KEY), SAMPLE_ACCEPT);
    }

    #[test]
    fn test_generated_keys_are_16_bytes_and_unique() {
        let a = ClientKey::generate().unwrap();
        let b = ClientKey::generate().unwrap();
        assert_ne!(a, b);
        assert_eq!(BASE64.decode(a.as_str()).unwrap().len(), 16);
    }

    #[test]
    fn test_validate_accepts_rfc_response() {
        let key = ClientKey::from_base64(SAMPLE_KEY);
        assert!(valid_response().validate(&key).is_ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = valid_response();
        assert_eq!(response.header("UPGRADE"), Some("websocket"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn test_validate_connection_token_list() {
        let key = ClientKey::from_base64(SAMPLE_KEY);
        let response = UpgradeResponse::new(101)
            .with_header("upgrade", "WebSocket")
            .with_header("connection", "keep-alive, Upgrade")
            .with_header("sec-websocket-accept", SAMPLE_ACCEPT);
        assert!(response.validate(&key).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_responses() {
        let key = ClientKey::from_base64(SAMPLE_KEY);

        let wrong_status = UpgradeResponse::new(200)
            .with_header("Upgrade", "websocket")
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", SAMPLE_ACCEPT);
        let wrong_accept = UpgradeResponse::new(101)
            .with_header("Upgrade", "websocket")
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", "bm90IHRoZSByaWdodCBrZXk=");
        let no_upgrade = UpgradeResponse::new(101)
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", SAMPLE_ACCEPT);
        let no_connection = UpgradeResponse::new(101)
            .with_header("Upgrade", "websocket")
            .with_header("Sec-WebSocket-Accept", SAMPLE_ACCEPT);

        for response in [wrong_status, wrong_accept, no_upgrade, no_connection] {
            assert!(matches!(
                response.validate(&key),
                Err(Error::InvalidHandshake(_))
            ));
        }
    }
}
