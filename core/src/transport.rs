//! Transport dispatcher: turns (endpoint, params, headers) into one HTTP
//! round trip and a parsed JSON body.
//!
//! # Design
//! `BaseFetcher` splits each call into `build_request` and
//! `parse_response`, both pure. The round trip itself is delegated to a
//! [`Transport`], so tests can substitute a recording fake and production
//! code uses [`UreqTransport`]. Every `send` executes exactly once; there is
//! no retry or backoff at this layer, and a call that outlives the
//! transport's timeout fails instead of blocking.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Request parameters, keyed by name.
pub type Params = serde_json::Map<String, Value>;

/// Request headers, keyed by name.
pub type Headers = BTreeMap<String, String>;

/// Executes an `HttpRequest` and returns the raw response.
///
/// Implementations must hand back non-2xx responses as data; status
/// interpretation happens in [`BaseFetcher::parse_response`].
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Upper bound on one round trip, connect to last body byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// A transport whose calls fail with `TransportError::Io` once `timeout`
    /// has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Params travel in the query string for every verb.
fn prepare<B>(builder: ureq::RequestBuilder<B>, req: &HttpRequest) -> ureq::RequestBuilder<B> {
    let mut builder = builder.query_pairs(req.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match req.method {
            HttpMethod::Get => prepare(self.agent.get(&req.path), &req).call(),
            HttpMethod::Delete => prepare(self.agent.delete(&req.path), &req).call(),
            HttpMethod::Post => prepare(self.agent.post(&req.path), &req).send_empty(),
            HttpMethod::Put => prepare(self.agent.put(&req.path), &req).send_empty(),
        };

        let mut response = result.map_err(|e| TransportError::Io(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

/// Builds requests against one base URL and parses their JSON responses.
pub struct BaseFetcher<T> {
    base_url: String,
    headers: Headers,
    transport: T,
}

impl<T: Transport> BaseFetcher<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: Headers::new(),
            transport,
        }
    }

    /// Headers sent with every request; per-call headers win on collision.
    pub fn with_base_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_request(
        &self,
        endpoint: &str,
        params: &Params,
        headers: &Headers,
        method: HttpMethod,
    ) -> HttpRequest {
        let mut merged = self.headers.clone();
        merged.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        let query = params
            .iter()
            .filter_map(|(k, v)| query_value(v).map(|v| (k.clone(), v)))
            .collect();

        HttpRequest {
            method,
            path: format!("{}/{}", self.base_url, endpoint.trim_start_matches('/')),
            query,
            headers: merged.into_iter().collect(),
        }
    }

    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, TransportError> {
        check_status(&response)?;
        if response.body.trim().is_empty() {
            return Ok(Value::Object(Params::new()));
        }
        serde_json::from_str(&response.body)
            .map_err(|e| TransportError::DeserializationError(e.to_string()))
    }

    /// One synchronous round trip: build, execute, parse.
    pub fn send(
        &self,
        endpoint: &str,
        params: &Params,
        headers: &Headers,
        method: HttpMethod,
    ) -> Result<Value, TransportError> {
        let request = self.build_request(endpoint, params, headers, method);
        tracing::debug!(method = %request.method, path = %request.path, "dispatching request");
        let response = self.transport.execute(request)?;
        self.parse_response(response)
    }
}

/// Render a parameter for the query string. Nulls are dropped.
fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Map non-success status codes to the appropriate `TransportError` variant.
fn check_status(response: &HttpResponse) -> Result<(), TransportError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(TransportError::NotFound);
    }
    Err(TransportError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    type FnTransport = fn(HttpRequest) -> Result<HttpResponse, TransportError>;

    fn unreachable_transport(_: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Io("not connected".to_string()))
    }

    fn fetcher() -> BaseFetcher<FnTransport> {
        BaseFetcher::new("http://localhost:3000/", unreachable_transport as FnTransport)
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_request_joins_endpoint_and_strips_slashes() {
        let req = fetcher().build_request("/email-verifier", &Params::new(), &Headers::new(), HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/email-verifier");
        assert_eq!(req.method, HttpMethod::Get);
    }

    #[test]
    fn build_request_renders_query_pairs() {
        let params = json!({"email": "a@b.com", "limit": 10, "strict": true, "skip": null});
        let params = params.as_object().unwrap();
        let req = fetcher().build_request("x", params, &Headers::new(), HttpMethod::Get);
        assert_eq!(
            req.query,
            vec![
                ("email".to_string(), "a@b.com".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("strict".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn call_headers_win_over_base_headers() {
        let base = Headers::from([
            ("accept".to_string(), "application/json".to_string()),
            ("x-client".to_string(), "base".to_string()),
        ]);
        let call = Headers::from([("x-client".to_string(), "call".to_string())]);
        let req = fetcher()
            .with_base_headers(base)
            .build_request("x", &Params::new(), &call, HttpMethod::Get);
        assert_eq!(
            req.headers,
            vec![
                ("accept".to_string(), "application/json".to_string()),
                ("x-client".to_string(), "call".to_string()),
            ]
        );
    }

    #[test]
    fn parse_response_success() {
        let value = fetcher().parse_response(ok(r#"{"data":{"status":"valid"}}"#)).unwrap();
        assert_eq!(value["data"]["status"], "valid");
    }

    #[test]
    fn parse_response_empty_body_is_empty_mapping() {
        let value = fetcher().parse_response(ok("")).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn parse_response_not_found() {
        let response = HttpResponse {
            status: 404,
            headers: Vec::new(),
            body: String::new(),
        };
        let err = fetcher().parse_response(response).unwrap_err();
        assert!(matches!(err, TransportError::NotFound));
    }

    #[test]
    fn parse_response_wrong_status() {
        let response = HttpResponse {
            status: 401,
            headers: Vec::new(),
            body: "no api key".to_string(),
        };
        let err = fetcher().parse_response(response).unwrap_err();
        assert!(matches!(err, TransportError::HttpError { status: 401, .. }));
    }

    #[test]
    fn parse_response_bad_json() {
        let err = fetcher().parse_response(ok("not json")).unwrap_err();
        assert!(matches!(err, TransportError::DeserializationError(_)));
    }

    #[test]
    fn send_executes_exactly_once() {
        let seen = Mutex::new(Vec::new());
        let transport = |req: HttpRequest| {
            seen.lock().unwrap().push(req.path.clone());
            Ok(ok(r#"{"data":{}}"#))
        };
        let fetcher = BaseFetcher::new("http://api.test", transport);
        fetcher
            .send("account", &Params::new(), &Headers::new(), HttpMethod::Get)
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["http://api.test/account".to_string()]);
    }

    #[test]
    fn send_propagates_transport_failure() {
        let err = fetcher()
            .send("account", &Params::new(), &Headers::new(), HttpMethod::Get)
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
