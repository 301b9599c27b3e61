//! GitLab REST client
//!
//! Thin JSON layer over an [`HttpTransport`]. Every call takes the operation
//! context and is abandoned as soon as the context is cancelled.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tanuki_core::context::OperationContext;
use tanuki_core::lock::ApiLock;
use tanuki_core::pagination::{Page, PageError, collect_pages};
use tanuki_core::retry::RetryConfig;

use crate::config::ResolvedConfig;
use crate::error::GitLabError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

const PER_PAGE: &str = "20";

/// Percent-encode one path segment (project paths contain `/`)
pub fn escape(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Query string parameters, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// `filter[environment_scope]=<scope>` used by scoped variable endpoints
    pub fn environment_scope(scope: &str) -> Self {
        Self::new().with("filter[environment_scope]", scope)
    }

    pub(crate) fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

pub struct GitLabClient {
    api_url: String,
    graphql_url: String,
    token: String,
    transport: Arc<dyn HttpTransport>,
    file_lock: ApiLock,
    file_retry: RetryConfig,
}

impl GitLabClient {
    /// Client for the REST root `api_url` (ending in `/api/v4`)
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let instance = api_url.strip_suffix("/api/v4").unwrap_or(&api_url);
        let graphql_url = format!("{}/api/graphql", instance);
        Self {
            api_url,
            graphql_url,
            token: token.into(),
            transport,
            file_lock: ApiLock::new(),
            file_retry: RetryConfig::default(),
        }
    }

    /// Client talking to GitLab over reqwest
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, GitLabError> {
        let transport = ReqwestTransport::with_tls(&config.tls, config.request_timeout)?;
        Ok(Self::new(
            config.api_url.clone(),
            config.token.clone(),
            Arc::new(transport),
        ))
    }

    /// Back-off used while retrying repository file conflicts
    pub fn with_file_retry(mut self, retry: RetryConfig) -> Self {
        self.file_retry = retry;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    /// Serializes repository file writes across all resources of this client
    pub fn file_lock(&self) -> &ApiLock {
        &self.file_lock
    }

    pub fn file_retry(&self) -> &RetryConfig {
        &self.file_retry
    }

    fn url(&self, path: &str, query: &Query) -> String {
        if query.0.is_empty() {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}{}?{}", self.api_url, path, query.encode())
        }
    }

    /// Send one request; non-2xx answers become [`GitLabError::Api`]
    pub(crate) async fn send(
        &self,
        ctx: &OperationContext,
        method: HttpMethod,
        url: String,
        body: Vec<u8>,
    ) -> Result<HttpResponse, GitLabError> {
        let mut headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.token),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if !body.is_empty() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        log::debug!("{} {}", method, url);
        let request = HttpRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };
        let resp = ctx.run(self.transport.send(request)).await??;

        if !resp.is_success() {
            log::debug!("{} {} returned {}", method, url, resp.status);
            return Err(GitLabError::from_response(method, &url, &resp));
        }
        Ok(resp)
    }

    fn decode<T: DeserializeOwned>(url: &str, resp: &HttpResponse) -> Result<T, GitLabError> {
        serde_json::from_slice(&resp.body).map_err(|source| GitLabError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, GitLabError> {
        serde_json::to_vec(body).map_err(GitLabError::Encode)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        path: &str,
        query: &Query,
    ) -> Result<T, GitLabError> {
        let url = self.url(path, query);
        let resp = self.send(ctx, HttpMethod::Get, url.clone(), Vec::new()).await?;
        Self::decode(&url, &resp)
    }

    /// Fetch one page; the next page number comes from `X-Next-Page`
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        path: &str,
        query: &Query,
        page: u32,
    ) -> Result<Page<T>, GitLabError> {
        let query = query
            .clone()
            .with("page", page)
            .with("per_page", PER_PAGE);
        let url = self.url(path, &query);
        let resp = self.send(ctx, HttpMethod::Get, url.clone(), Vec::new()).await?;

        let next_page = resp
            .header("X-Next-Page")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);
        Ok(Page::new(Self::decode(&url, &resp)?, next_page))
    }

    /// Fetch every page of a list endpoint
    pub async fn list<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        path: &str,
        query: &Query,
    ) -> Result<Vec<T>, GitLabError> {
        collect_pages(move |page| self.get_page(ctx, path, query, page))
            .await
            .map_err(|e| match e {
                PageError::Fetch(e) => e,
                PageError::RepeatedPage(n) => GitLabError::RepeatedPage(n),
            })
    }

    pub async fn post<B, T>(
        &self,
        ctx: &OperationContext,
        path: &str,
        body: &B,
    ) -> Result<T, GitLabError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, &Query::new());
        let resp = self
            .send(ctx, HttpMethod::Post, url.clone(), Self::encode(body)?)
            .await?;
        Self::decode(&url, &resp)
    }

    pub async fn put<B, T>(
        &self,
        ctx: &OperationContext,
        path: &str,
        query: &Query,
        body: &B,
    ) -> Result<T, GitLabError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, query);
        let resp = self
            .send(ctx, HttpMethod::Put, url.clone(), Self::encode(body)?)
            .await?;
        Self::decode(&url, &resp)
    }

    pub async fn delete(
        &self,
        ctx: &OperationContext,
        path: &str,
        query: &Query,
    ) -> Result<(), GitLabError> {
        let url = self.url(path, query);
        self.send(ctx, HttpMethod::Delete, url, Vec::new()).await?;
        Ok(())
    }

    /// DELETE carrying a JSON body (repository files need commit details)
    pub async fn delete_with_body<B>(
        &self,
        ctx: &OperationContext,
        path: &str,
        body: &B,
    ) -> Result<(), GitLabError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.url(path, &Query::new());
        self.send(ctx, HttpMethod::Delete, url, Self::encode(body)?)
            .await?;
        Ok(())
    }
}
