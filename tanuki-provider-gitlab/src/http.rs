//! HTTP transport boundary
//!
//! The REST and GraphQL clients only ever talk to an [`HttpTransport`], so
//! handlers can be driven against an in-memory GitLab in tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header name/value pairs; lookups are case-insensitive
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("invalid TLS configuration: {0}")]
    Tls(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// First header value matching `name`, ignoring case
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// TLS settings for [`ReqwestTransport`]
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM bundle added to the trusted roots
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Skip certificate verification
    pub insecure: bool,
    /// PEM client certificate followed by its private key
    pub identity_pem: Option<Vec<u8>>,
}

/// Transport backed by reqwest (rustls)
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_tls(tls: &TlsOptions, timeout: Duration) -> Result<Self, HttpError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .user_agent(concat!("tanuki/", env!("CARGO_PKG_VERSION")));

        if let Some(pem) = &tls.ca_cert_pem {
            let cert =
                reqwest::Certificate::from_pem(pem).map_err(|e| HttpError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        if tls.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = &tls.identity_pem {
            let identity =
                reqwest::Identity::from_pem(pem).map_err(|e| HttpError::Tls(e.to_string()))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (k, v) in request.headers {
            builder = builder.header(&k, &v);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers: HttpHeaders = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------- Test-only mock transport ----------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_is_case_insensitive() {
        let headers: HttpHeaders = vec![
            ("X-Next-Page".to_string(), "2".to_string()),
            ("x-next-page".to_string(), "3".to_string()),
        ];
        assert_eq!(header_get(&headers, "x-next-page"), Some("2"));
        assert_eq!(header_get(&headers, "X-Total"), None);
    }

    #[test]
    fn success_range() {
        let resp = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert!(resp.is_success());
        assert!(!HttpResponse { status: 404, ..resp }.is_success());
    }
}
