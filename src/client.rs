//! Authenticated JSON:API client
//!
//! Owns the base URL, the credential pair and the current bearer token.
//! Construction performs the client-credentials exchange immediately; a
//! 401 on any later call refreshes the token and retries that call once.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::denormalize::{denormalize_value, FlatEntity};
use crate::error::ApiError;
use crate::transport::{Body, HttpTransport, Request, ReqwestTransport};

const CONTENT_TYPE_JSON: &str = "application/json";
const ACCEPT_JSONAPI: &str = "application/vnd.api+json";

/// Relative path of the OAuth token endpoint
const TOKEN_ENDPOINT: &str = "oauth/token";
/// Relative path of the batch sync endpoint
const SYNC_ENDPOINT: &str = "_action/sync";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Indexing strategy for batch sync requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingBehavior {
    UseQueueIndexing,
    DisableIndexing,
}

impl IndexingBehavior {
    /// Wire value for the `indexing-behavior` header
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingBehavior::UseQueueIndexing => "use-queue-indexing",
            IndexingBehavior::DisableIndexing => "disable-indexing",
        }
    }
}

/// Connection settings for one API instance
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API host, without the `/api` suffix
    pub base_url: String,
    /// OAuth client id of the integration
    pub client_id: String,
    /// OAuth client secret of the integration
    pub client_secret: String,
    /// Timeout applied to each HTTP exchange
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Blocking client for a JSON:API service behind OAuth2 client-credentials
///
/// Each instance holds exactly one bearer token. The token field is locked
/// only to read or swap the value, never across an HTTP exchange, so
/// parallel callers hitting a 401 at the same time may both refresh; both
/// exchanges succeed and the later write wins.
pub struct ApiClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    transport: Box<dyn HttpTransport>,
    bearer_token: Mutex<String>,
}

impl ApiClient {
    /// Connect to an API instance, exchanging credentials for a token
    ///
    /// Fails if the base URL does not parse or the credential exchange is
    /// rejected.
    pub fn connect(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Connect using a caller-supplied transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Box<dyn HttpTransport>,
    ) -> Result<Self, ApiError> {
        Url::parse(&config.base_url)?;

        let client = Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            transport,
            bearer_token: Mutex::new(String::new()),
        };

        let token = client.request_access_token()?;
        *client.lock_token() = token;

        Ok(client)
    }

    /// Issue an authenticated call against the API
    ///
    /// Attaches the bearer token and the fixed JSON:API headers; `headers`
    /// merge over those, replacing on a case-insensitive name match. A 401
    /// response triggers a token refresh and a single retry of the same
    /// request; the retried outcome is final either way.
    pub fn call(
        &self,
        endpoint: &str,
        body: Body,
        headers: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let request = self.authenticated_request(endpoint, &body, headers);

        match self.dispatch(&request) {
            Err(error) if error.is_unauthorized() => {
                warn!(endpoint, "access token rejected, refreshing");
                self.refresh_token()?;
                let retry = self.authenticated_request(endpoint, &body, headers);
                self.dispatch(&retry)
            }
            outcome => outcome,
        }
    }

    /// Perform an exchange without default headers, auth or retry
    pub fn unauthenticated_call(
        &self,
        endpoint: &str,
        body: Body,
        headers: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let request = Request {
            method: body.method(),
            url: self.endpoint_url(endpoint),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body,
        };

        self.dispatch(&request)
    }

    /// GET an endpoint
    pub fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.call(endpoint, Body::Empty, &[])
    }

    /// POST a JSON payload to an endpoint
    pub fn post(&self, endpoint: &str, payload: Value) -> Result<Value, ApiError> {
        self.call(endpoint, Body::Json(payload), &[])
    }

    /// Send a batch payload to the sync endpoint
    ///
    /// A given indexing behavior is passed as the `indexing-behavior`
    /// header.
    pub fn sync_call(
        &self,
        payload: Value,
        indexing: Option<IndexingBehavior>,
    ) -> Result<Value, ApiError> {
        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(behavior) = indexing {
            headers.push(("indexing-behavior", behavior.as_str()));
        }

        self.call(SYNC_ENDPOINT, Body::Json(payload), &headers)
    }

    /// GET an endpoint and flatten the JSON:API document it returns
    pub fn fetch_flattened(&self, endpoint: &str) -> Result<Vec<FlatEntity>, ApiError> {
        let response = self.get(endpoint)?;
        denormalize_value(response)
    }

    /// Send a request and decode the JSON body of a 2xx response
    fn dispatch(&self, request: &Request) -> Result<Value, ApiError> {
        let response = self.transport.send(request)?;

        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                body: response.body,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    fn authenticated_request(
        &self,
        endpoint: &str,
        body: &Body,
        extra: &[(&str, &str)],
    ) -> Request {
        let token = self.lock_token().clone();
        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", token)),
            ("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string()),
            ("Accept".to_string(), ACCEPT_JSONAPI.to_string()),
        ];

        for (name, value) in extra {
            merge_header(&mut headers, name, value);
        }

        Request {
            method: body.method(),
            url: self.endpoint_url(endpoint),
            headers,
            body: body.clone(),
        }
    }

    /// Resolve an endpoint to a full URL
    ///
    /// An endpoint that already carries a URI scheme is used verbatim;
    /// everything else lives under `{base_url}/api/`.
    fn endpoint_url(&self, endpoint: &str) -> String {
        if Url::parse(endpoint).is_ok() {
            endpoint.to_string()
        } else {
            format!("{}/api/{}", self.base_url, endpoint)
        }
    }

    /// Exchange client credentials for an access token
    fn request_access_token(&self) -> Result<String, ApiError> {
        let fields = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
        ];

        let response = self.unauthenticated_call(TOKEN_ENDPOINT, Body::Form(fields), &[])?;

        response
            .get("access_token")
            .and_then(|token| token.as_str())
            .map(str::to_string)
            .ok_or(ApiError::MissingAccessToken)
    }

    /// Re-run the credential exchange and swap in the new token
    fn refresh_token(&self) -> Result<(), ApiError> {
        debug!("refreshing access token");
        let token = self.request_access_token()?;
        *self.lock_token() = token;
        Ok(())
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, String> {
        self.bearer_token.lock().expect("bearer token lock poisoned")
    }
}

/// Replace a header on a case-insensitive name match, else append
fn merge_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::transport::{Method, Response};

    /// Transport that replays canned responses and records every request
    #[derive(Default)]
    struct Script {
        responses: RefCell<VecDeque<Response>>,
        seen: RefCell<Vec<Request>>,
    }

    struct ScriptedTransport(Rc<Script>);

    impl HttpTransport for ScriptedTransport {
        fn send(&self, request: &Request) -> Result<Response, ApiError> {
            self.0.seen.borrow_mut().push(request.clone());
            self.0
                .responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| ApiError::Transport {
                    url: request.url.clone(),
                    reason: "script exhausted".to_string(),
                })
        }
    }

    fn ok(body: Value) -> Response {
        Response {
            status: 200,
            body: body.to_string(),
        }
    }

    fn status(code: u16, body: &str) -> Response {
        Response {
            status: code,
            body: body.to_string(),
        }
    }

    fn token_response(token: &str) -> Response {
        ok(json!({"access_token": token}))
    }

    fn script(responses: Vec<Response>) -> Rc<Script> {
        let script = Rc::new(Script::default());
        *script.responses.borrow_mut() = responses.into();
        script
    }

    fn connect(script: &Rc<Script>) -> Result<ApiClient, ApiError> {
        ApiClient::with_transport(
            ClientConfig::new("https://shop.example", "SWIAKEY", "s3cret"),
            Box::new(ScriptedTransport(Rc::clone(script))),
        )
    }

    #[test]
    fn test_connect_exchanges_credentials() {
        let script = script(vec![token_response("tok-1")]);
        let client = connect(&script).unwrap();

        let seen = script.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::Post);
        assert_eq!(seen[0].url, "https://shop.example/api/oauth/token");
        match &seen[0].body {
            Body::Form(fields) => {
                assert!(fields.contains(&(
                    "grant_type".to_string(),
                    "client_credentials".to_string()
                )));
                assert!(fields.contains(&("client_id".to_string(), "SWIAKEY".to_string())));
                assert!(fields.contains(&("client_secret".to_string(), "s3cret".to_string())));
            }
            other => panic!("expected form body, got {:?}", other),
        }
        // token exchange carries no default headers
        assert!(seen[0].headers.is_empty());
        drop(seen);

        assert_eq!(*client.lock_token(), "tok-1");
    }

    #[test]
    fn test_connect_fails_without_access_token() {
        let script = script(vec![ok(json!({"token_type": "Bearer"}))]);
        let result = connect(&script);
        assert!(matches!(result, Err(ApiError::MissingAccessToken)));
    }

    #[test]
    fn test_connect_rejects_bad_base_url() {
        let result = ApiClient::with_transport(
            ClientConfig::new("not a url", "id", "secret"),
            Box::new(ScriptedTransport(script(vec![]))),
        );
        assert!(matches!(result, Err(ApiError::Url(_))));
    }

    #[test]
    fn test_call_attaches_default_headers() {
        let script = script(vec![token_response("tok-1"), ok(json!({"data": []}))]);
        let client = connect(&script).unwrap();

        client.get("product").unwrap();

        let seen = script.seen.borrow();
        let request = &seen[1];
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "https://shop.example/api/product");
        assert_eq!(request.header("Authorization"), Some("Bearer tok-1"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.header("Accept"), Some("application/vnd.api+json"));
    }

    #[test]
    fn test_caller_headers_override_case_insensitively() {
        let script = script(vec![token_response("tok-1"), ok(json!({}))]);
        let client = connect(&script).unwrap();

        client
            .call("product", Body::Empty, &[("accept", "application/json")])
            .unwrap();

        let seen = script.seen.borrow();
        let request = &seen[1];
        let accepts: Vec<_> = request
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("accept"))
            .collect();
        assert_eq!(accepts.len(), 1);
        assert_eq!(accepts[0].1, "application/json");
    }

    #[test]
    fn test_refresh_and_retry_once_on_401() {
        let script = script(vec![
            token_response("tok-old"),
            status(401, "expired"),
            token_response("tok-new"),
            ok(json!({"data": [1, 2]})),
        ]);
        let client = connect(&script).unwrap();

        let result = client.get("order").unwrap();
        assert_eq!(result, json!({"data": [1, 2]}));

        let seen = script.seen.borrow();
        let order_calls: Vec<_> = seen.iter().filter(|r| r.url.ends_with("/order")).collect();
        assert_eq!(order_calls.len(), 2);
        assert_eq!(order_calls[0].header("Authorization"), Some("Bearer tok-old"));
        assert_eq!(order_calls[1].header("Authorization"), Some("Bearer tok-new"));
    }

    #[test]
    fn test_second_401_propagates() {
        let script = script(vec![
            token_response("tok-old"),
            status(401, "expired"),
            token_response("tok-new"),
            status(401, "still expired"),
        ]);
        let client = connect(&script).unwrap();

        let result = client.get("order");
        match result {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "still expired");
            }
            other => panic!("expected status error, got {:?}", other),
        }

        // no third attempt at the endpoint
        let seen = script.seen.borrow();
        assert_eq!(seen.iter().filter(|r| r.url.ends_with("/order")).count(), 2);
    }

    #[test]
    fn test_non_401_fails_without_retry() {
        let script = script(vec![
            token_response("tok-1"),
            status(500, "boom"),
        ]);
        let client = connect(&script).unwrap();

        let result = client.get("order");
        assert_eq!(result.unwrap_err().status_code(), Some(500));

        // exactly the token exchange plus one endpoint call
        assert_eq!(script.seen.borrow().len(), 2);
    }

    #[test]
    fn test_absolute_endpoint_used_verbatim() {
        let script = script(vec![token_response("tok-1"), ok(json!({}))]);
        let client = connect(&script).unwrap();

        client.get("https://other.example/x").unwrap();

        let seen = script.seen.borrow();
        assert_eq!(seen[1].url, "https://other.example/x");
    }

    #[test]
    fn test_post_sends_json_body() {
        let script = script(vec![token_response("tok-1"), ok(json!({}))]);
        let client = connect(&script).unwrap();

        client.post("product", json!({"name": "Widget"})).unwrap();

        let seen = script.seen.borrow();
        assert_eq!(seen[1].method, Method::Post);
        match &seen[1].body {
            Body::Json(value) => assert_eq!(value, &json!({"name": "Widget"})),
            other => panic!("expected json body, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_call_targets_sync_endpoint() {
        let script = script(vec![token_response("tok-1"), ok(json!({}))]);
        let client = connect(&script).unwrap();

        client
            .sync_call(json!([{"action": "upsert"}]), Some(IndexingBehavior::DisableIndexing))
            .unwrap();

        let seen = script.seen.borrow();
        assert_eq!(seen[1].url, "https://shop.example/api/_action/sync");
        assert_eq!(seen[1].header("indexing-behavior"), Some("disable-indexing"));
    }

    #[test]
    fn test_sync_call_without_indexing_has_no_header() {
        let script = script(vec![token_response("tok-1"), ok(json!({}))]);
        let client = connect(&script).unwrap();

        client.sync_call(json!([]), None).unwrap();

        let seen = script.seen.borrow();
        assert_eq!(seen[1].header("indexing-behavior"), None);
    }

    #[test]
    fn test_malformed_success_body_is_decode_error() {
        let script = script(vec![
            token_response("tok-1"),
            status(200, "<html>not json</html>"),
        ]);
        let client = connect(&script).unwrap();

        let result = client.get("product");
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_fetch_flattened_resolves_relationships() {
        let script = script(vec![
            token_response("tok-1"),
            ok(json!({
                "data": [{
                    "type": "product",
                    "id": "p1",
                    "attributes": {"name": "Widget"},
                    "relationships": {
                        "manufacturer": {"data": {"type": "manufacturer", "id": "m1"}}
                    }
                }],
                "included": [{
                    "type": "manufacturer",
                    "id": "m1",
                    "attributes": {"name": "Acme"},
                    "relationships": {}
                }]
            })),
        ]);
        let client = connect(&script).unwrap();

        let rows = client.fetch_flattened("product").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["manufacturer"]["name"], "Acme");
    }

    #[test]
    fn test_indexing_behavior_wire_values() {
        assert_eq!(IndexingBehavior::UseQueueIndexing.as_str(), "use-queue-indexing");
        assert_eq!(IndexingBehavior::DisableIndexing.as_str(), "disable-indexing");
    }
}
