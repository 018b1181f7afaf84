//! Pluggable credentials.
//!
//! The client never implements an authentication scheme. It asks a
//! [`CredentialProvider`] for headers before every HTTP request, every gRPC
//! call, and once at the WebSocket handshake.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::TransportResult;

/// Supplies authentication headers per call.
#[async_trait]
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Headers to attach to the next outgoing call.
    ///
    /// Names are treated case-insensitively by every transport.
    async fn auth_headers(&self) -> TransportResult<HashMap<String, String>>;
}

/// A provider that always returns the same headers.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    headers: HashMap<String, String>,
}

impl StaticCredentials {
    /// Use the given headers verbatim
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    /// `Authorization: Bearer <token>`
    pub fn bearer(token: impl AsRef<str>) -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            "authorization".to_string(),
            format!("Bearer {}", token.as_ref()),
        );
        Self { headers }
    }

    /// Add one header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// Header values are secrets; only names are printed.
impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn auth_headers(&self) -> TransportResult<HashMap<String, String>> {
        Ok(self.headers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bearer_headers() {
        let creds = StaticCredentials::bearer("s3cret").with_header("x-tenant", "acme");
        let headers = creds.auth_headers().await.unwrap();
        assert_eq!(headers["authorization"], "Bearer s3cret");
        assert_eq!(headers["x-tenant"], "acme");
    }

    #[test]
    fn test_debug_hides_values() {
        let creds = StaticCredentials::bearer("s3cret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("authorization"));
        assert!(!printed.contains("s3cret"));
    }
}
