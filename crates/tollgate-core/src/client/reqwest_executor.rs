//! `reqwest`-backed executor.

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, Method};
use crate::config::ClientConfig;
use crate::domain::Failure;
use crate::executor::Executor;

/// Longest slice of an error body kept in the failure message.
const MAX_ERROR_BODY: usize = 256;

/// Executes `HttpRequest`s with a shared `reqwest::Client`.
///
/// Non-2xx responses become `FailureCause::Status`; the per-request
/// timeout configured on the client surfaces as `FailureCause::TimedOut`.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::new(client))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

#[async_trait]
impl Executor<HttpRequest, HttpResponse> for ReqwestExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Failure> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| failure_from_reqwest(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| failure_from_reqwest(&e))?
            .to_vec();

        let response = HttpResponse {
            status,
            headers,
            body,
        };
        if response.is_success() {
            Ok(response)
        } else {
            Err(failure_from_status(response.status, &response.body))
        }
    }
}

/// Describe a transport-level `reqwest` error.
pub fn failure_from_reqwest(err: &reqwest::Error) -> Failure {
    if err.is_timeout() {
        Failure::timed_out(err.to_string())
    } else if let Some(status) = err.status() {
        Failure::status(status.as_u16(), err.to_string())
    } else if err.is_builder() || err.is_decode() || err.is_redirect() {
        // Local problems: resending the same request cannot help.
        Failure::other(err.to_string())
    } else {
        Failure::no_response(err.to_string())
    }
}

/// Describe a non-success response. The message is a prefix of the body,
/// or the canonical reason phrase when the body is empty.
pub fn failure_from_status(status: u16, body: &[u8]) -> Failure {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    let message = if text.is_empty() {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        text.chars().take(MAX_ERROR_BODY).collect()
    };
    Failure::status(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn status_failure_uses_reason_for_empty_body() {
        let f = failure_from_status(503, b"");
        assert_eq!(f.status_code(), Some(503));
        assert_eq!(f.message, "Service Unavailable");
        assert_eq!(f.kind(), ErrorKind::Server);
    }

    #[test]
    fn status_failure_keeps_body_prefix() {
        let body = "x".repeat(1000);
        let f = failure_from_status(422, body.as_bytes());
        assert_eq!(f.message.len(), MAX_ERROR_BODY);
        assert_eq!(f.kind(), ErrorKind::Client);
    }

    #[test]
    fn methods_map_to_reqwest() {
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest_method(Method::Head), reqwest::Method::HEAD);
    }

    #[tokio::test]
    async fn invalid_url_is_not_retryable() {
        let exec = ReqwestExecutor::from_config(&ClientConfig::default()).unwrap();
        let err = exec
            .execute(&HttpRequest::get("not a url"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_failure() {
        let exec = ReqwestExecutor::from_config(&ClientConfig::default()).unwrap();
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let err = exec
            .execute(&HttpRequest::get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
