//! HTTP client wrapper: the drop-in replacement for a direct HTTP call.
//!
//! `ApiClient` owns one `RequestGovernor` and one executor. Call sites use
//! `get`/`post`/... exactly as they would a plain HTTP client; every call is
//! admitted to the governor and inherits its concurrency ceiling and retry
//! policy.

mod reqwest_executor;

pub use reqwest_executor::{ReqwestExecutor, failure_from_reqwest, failure_from_status};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ConfigError, GovernorError};
use crate::executor::Executor;
use crate::queue::{RequestGovernor, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

/// Opaque request description handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Governor(#[from] GovernorError),

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

impl ClientError {
    /// The governor error, if the request itself failed.
    pub fn governor_error(&self) -> Option<&GovernorError> {
        match self {
            ClientError::Governor(e) => Some(e),
            _ => None,
        }
    }
}

pub type HttpGovernor = RequestGovernor<HttpRequest, HttpResponse>;

/// HTTP client whose calls all go through one governor.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Option<Url>,
    default_headers: Vec<(String, String)>,
    governor: HttpGovernor,
    executor: Arc<dyn Executor<HttpRequest, HttpResponse>>,
}

impl ApiClient {
    /// Build a client backed by `reqwest`, configured from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let executor = ReqwestExecutor::from_config(config)?;
        Self::new(config, Arc::new(executor))
    }

    /// Build a client around any executor (tests, mocks, other transports).
    pub fn new(
        config: &ClientConfig,
        executor: Arc<dyn Executor<HttpRequest, HttpResponse>>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let base_url = if config.base_url.is_empty() {
            None
        } else {
            Some(parse_base(&config.base_url)?)
        };
        let governor = RequestGovernor::new(config.governor.clone())?;
        Ok(Self {
            base_url,
            default_headers: Vec::new(),
            governor,
            executor,
        })
    }

    /// Header added to every request that does not set it itself.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn governor(&self) -> &HttpGovernor {
        &self.governor
    }

    /// Resolve `path` against the base URL. Absolute http(s) URLs pass through.
    pub fn url(&self, path: &str) -> Result<String, ClientError> {
        if let Some(absolute) = Url::parse(path)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
        {
            return Ok(absolute.into());
        }
        let base = self.base_url.as_ref().ok_or_else(|| ClientError::InvalidUrl {
            url: path.to_string(),
            reason: "relative path without a base_url".to_string(),
        })?;
        // "./" keeps a colon in the first segment from reading as a scheme.
        base.join(&format!("./{}", path.trim_start_matches('/')))
            .map(String::from)
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Admit a prepared request without waiting for it.
    pub fn enqueue(&self, mut request: HttpRequest) -> Result<Ticket<HttpResponse>, ClientError> {
        request.url = self.url(&request.url)?;
        for (name, value) in &self.default_headers {
            if !request.has_header(name) {
                request.headers.push((name.clone(), value.clone()));
            }
        }
        Ok(self
            .governor
            .submit_shared(request, Arc::clone(&self.executor)))
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        Ok(self.enqueue(request)?.await?)
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, ClientError> {
        self.send(HttpRequest::get(path)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Ok(self.get(path).await?.json()?)
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, ClientError> {
        self.send(HttpRequest::new(Method::Post, path).json(body)?)
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, ClientError> {
        self.send(HttpRequest::new(Method::Put, path).json(body)?)
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, ClientError> {
        self.send(HttpRequest::new(Method::Patch, path).json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, ClientError> {
        self.send(HttpRequest::delete(path)).await
    }

    /// Drop all queued work (e.g. on sign-out). In-flight requests finish.
    pub fn reset(&self) -> usize {
        self.governor.clear()
    }
}

fn parse_base(raw: &str) -> Result<Url, ClientError> {
    // Without a trailing slash `join` would replace the last path segment.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernorConfig;
    use crate::domain::Failure;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every request; answers from a script, then 200 with the URL as body.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HttpRequest>>,
        script: Mutex<Vec<Result<HttpResponse, Failure>>>,
    }

    impl Recorder {
        fn scripted(script: Vec<Result<HttpResponse, Failure>>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                script: Mutex::new(script),
            })
        }

        fn seen(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Executor<HttpRequest, HttpResponse> for Recorder {
        async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Failure> {
            self.seen.lock().unwrap().push(request.clone());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(HttpResponse::new(200, request.url.clone()))
            } else {
                script.remove(0)
            }
        }
    }

    fn config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.to_string(),
            governor: GovernorConfig::default().with_base_delay(Duration::from_millis(100)),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn joins_relative_paths_onto_base() {
        let client = ApiClient::new(&config("https://api.example.com/v1"), Recorder::scripted(vec![])).unwrap();
        assert_eq!(
            client.url("customers/42").unwrap(),
            "https://api.example.com/v1/customers/42"
        );
        assert_eq!(
            client.url("/vehicles").unwrap(),
            "https://api.example.com/v1/vehicles"
        );
        assert_eq!(
            client.url("https://other.example.com/x").unwrap(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn colon_in_first_segment_stays_relative() {
        let client = ApiClient::new(&config("https://api.example.com/v1"), Recorder::scripted(vec![])).unwrap();
        assert_eq!(
            client.url("v1:batch").unwrap(),
            "https://api.example.com/v1/v1:batch"
        );
        assert_eq!(
            client.url("/jobs:run?dry=1").unwrap(),
            "https://api.example.com/v1/jobs:run?dry=1"
        );
    }

    #[test]
    fn relative_path_without_base_is_an_error() {
        let client = ApiClient::new(&config(""), Recorder::scripted(vec![])).unwrap();
        assert!(matches!(
            client.url("customers"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn get_goes_through_governor_with_default_headers() {
        let exec = Recorder::scripted(vec![]);
        let client = ApiClient::new(&config("https://api.example.com/"), exec.clone())
            .unwrap()
            .with_default_header("accept", "application/json");

        let resp = client.get("orders").await.unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.text(), "https://api.example.com/orders");
        let seen = exec.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::Get);
        assert!(seen[0].has_header("Accept"));
        assert_eq!(client.governor().stats().succeeded, 1);
    }

    #[tokio::test]
    async fn explicit_header_wins_over_default() {
        let exec = Recorder::scripted(vec![]);
        let client = ApiClient::new(&config("https://api.example.com/"), exec.clone())
            .unwrap()
            .with_default_header("accept", "application/json");

        client
            .send(HttpRequest::get("x").header("Accept", "text/csv"))
            .await
            .unwrap();

        let seen = exec.seen();
        let accepts: Vec<_> = seen[0]
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .collect();
        assert_eq!(accepts.len(), 1);
        assert_eq!(accepts[0].1, "text/csv");
    }

    #[tokio::test]
    async fn post_serializes_json_body() {
        #[derive(Serialize)]
        struct NewCustomer<'a> {
            name: &'a str,
        }

        let exec = Recorder::scripted(vec![]);
        let client = ApiClient::new(&config("https://api.example.com/"), exec.clone()).unwrap();
        client
            .post("customers", &NewCustomer { name: "Ada" })
            .await
            .unwrap();

        let req = &exec.seen()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body.as_deref(), Some(br#"{"name":"Ada"}"#.as_slice()));
        assert!(req.has_header("content-type"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_transparently() {
        let exec = Recorder::scripted(vec![
            Err(Failure::status(503, "unavailable")),
            Ok(HttpResponse::new(200, r#"{"id":7}"#)),
        ]);
        let client = ApiClient::new(&config("https://api.example.com/"), exec.clone()).unwrap();

        #[derive(Deserialize)]
        struct Created {
            id: u32,
        }
        let created: Created = client.get_json("orders/7").await.unwrap();

        assert_eq!(created.id, 7);
        assert_eq!(exec.seen().len(), 2);
    }

    #[tokio::test]
    async fn auth_failure_surfaces_as_governor_error() {
        let exec = Recorder::scripted(vec![Err(Failure::status(401, "expired"))]);
        let client = ApiClient::new(&config("https://api.example.com/"), exec.clone()).unwrap();

        let err = client.delete("orders/1").await.unwrap_err();

        assert!(matches!(
            err.governor_error(),
            Some(GovernorError::Auth(_))
        ));
        assert_eq!(exec.seen().len(), 1);
    }

    #[test]
    fn response_helpers() {
        let mut resp = HttpResponse::new(201, r#"{"ok":true}"#);
        resp.headers.push(("Content-Type".into(), "application/json".into()));
        assert!(resp.is_success());
        assert_eq!(resp.header("content-type"), Some("application/json"));
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["ok"], true);
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config("https://api.example.com/");
        cfg.governor.max_concurrency = 0;
        assert!(matches!(
            ApiClient::new(&cfg, Recorder::scripted(vec![])),
            Err(ClientError::Config(_))
        ));
    }
}
