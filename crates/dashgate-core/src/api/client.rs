//! API client for the dashboard REST service.
//!
//! This module provides the `ApiClient` struct for logging in and for making
//! authenticated requests against the dashboard data endpoints.

use std::time::Duration;

use reqwest::{header, Client, ClientBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AuthGrant, Authenticator};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the dashboard API (local development server)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

/// Demo account accepted by the development API
pub const DEMO_EMAIL: &str = "user1@example.com";
pub const DEMO_PASSWORD: &str = "password123";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Raw login response. Fields are checked in `parse_login_body`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
    #[serde(alias = "userId", alias = "user_id")]
    id: Option<UserId>,
}

/// Ids arrive as either strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserId {
    Text(String),
    Number(i64),
}

impl UserId {
    fn into_string(self) -> String {
        match self {
            UserId::Text(s) => s,
            UserId::Number(n) => n.to_string(),
        }
    }
}

/// API client for the dashboard service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the given base URL
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::from_builder(Client::builder(), base_url)
    }

    fn from_builder(builder: ClientBuilder, base_url: &str) -> Result<Self, ApiError> {
        let client = builder
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in with email and password, returning the issued token and user id.
    /// Login is never retried; a failed attempt needs an explicit resubmission.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, ApiError> {
        let url = self.url("/api/login");
        debug!(url = %url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        Self::parse_login_body(&body)
    }

    /// Validate a login response body. A grant needs a non-empty token and an id.
    fn parse_login_body(body: &str) -> Result<AuthGrant, ApiError> {
        let parsed: LoginResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed login response: {}", e)))?;

        let token = parsed
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Login response has no token".to_string()))?;

        let user_id = parsed
            .id
            .map(UserId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Login response has no user id".to_string()))?;

        Ok(AuthGrant { token, user_id })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidResponse("Stored token is not a valid header value".to_string()))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch the overview statistics shown on the dashboard home cards
    pub async fn fetch_overview(&self) -> Result<Value, ApiError> {
        self.get("/api/overview").await
    }

    /// Fetch the analytics chart series
    pub async fn fetch_analytics(&self) -> Result<Value, ApiError> {
        self.get("/api/analytics").await
    }

    /// Fetch the user directory
    pub async fn fetch_users(&self) -> Result<Value, ApiError> {
        self.get("/api/users").await
    }

    /// Fetch the product catalog
    pub async fn fetch_products(&self) -> Result<Value, ApiError> {
        self.get("/api/products").await
    }
}

impl Authenticator for ApiClient {
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<AuthGrant, ApiError> {
        self.login(identifier, secret).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, MemoryStorage, SessionStore, TokenStorage};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serve one canned `(status, body)` response per connection, in order.
    /// The handle yields the raw requests that were received.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (ApiClient, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("test server address");

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.expect("accept");
                requests.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.expect("write response");
                let _ = socket.shutdown().await;
            }
            requests
        });

        let client = ApiClient::from_builder(Client::builder().no_proxy(), &format!("http://{}", addr))
            .expect("client should build");
        (client, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.expect("read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let (client, server) = serve(vec![(200, r#"{"token":"abc123","id":1}"#)]).await;

        let grant = client.login(DEMO_EMAIL, DEMO_PASSWORD).await.expect("login should succeed");
        assert_eq!(grant.token, "abc123");
        assert_eq!(grant.user_id, "1");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/login "), "{}", requests[0]);
        assert!(requests[0].contains(r#""email":"user1@example.com""#));
        assert!(requests[0].contains(r#""password":"password123""#));
    }

    #[tokio::test]
    async fn test_login_error_statuses() {
        let (client, server) = serve(vec![
            (401, r#"{"message":"Invalid credentials"}"#),
            (500, "boom"),
            (200, r#"{"message":"ok"}"#),
            (429, ""),
        ])
        .await;

        assert!(matches!(client.login("a@b.c", "x").await, Err(ApiError::Unauthorized)));
        assert!(matches!(client.login("a@b.c", "x").await, Err(ApiError::ServerError(b)) if b == "boom"));
        assert!(matches!(client.login("a@b.c", "x").await, Err(ApiError::InvalidResponse(_))));
        // Login is not retried on 429
        assert!(matches!(client.login("a@b.c", "x").await, Err(ApiError::RateLimited)));

        assert_eq!(server.await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_store_maps_http_failures_to_authentication_failed() {
        let (client, server) = serve(vec![
            (401, ""),
            (503, "maintenance"),
            (200, r#"{"token":"","id":"u1"}"#),
        ])
        .await;

        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(Box::new(storage.clone()), client);
        store.initialize();

        for _ in 0..3 {
            let err = store.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap_err();
            assert!(matches!(err, AuthError::AuthenticationFailed));
            assert!(store.current_session().is_none());
            assert_eq!(storage.get("token").unwrap(), None);
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_store_commits_http_login() {
        let (client, server) = serve(vec![(200, r#"{"token":"abc123","userId":"u1"}"#)]).await;

        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(Box::new(storage.clone()), client);
        let session = store.login(DEMO_EMAIL, DEMO_PASSWORD).await.expect("login should succeed");
        assert_eq!(session.user_id.as_deref(), Some("u1"));
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("abc123"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_get_retries_after_rate_limit() {
        let (client, server) = serve(vec![(429, ""), (200, r#"[{"id":1,"name":"Ada"}]"#)]).await;

        let users = client
            .with_token("abc123".to_string())
            .fetch_users()
            .await
            .expect("second attempt should succeed");
        assert_eq!(users[0]["name"], "Ada");

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.starts_with("GET /api/users "), "{}", request);
            assert!(request.to_ascii_lowercase().contains("authorization: bearer abc123"));
        }
    }

    #[tokio::test]
    async fn test_fetch_error_statuses() {
        let (client, server) = serve(vec![
            (401, ""),
            (403, "forbidden"),
            (404, "no such route"),
            (200, "not json"),
        ])
        .await;
        let client = client.with_token("abc123".to_string());

        assert!(matches!(client.fetch_overview().await, Err(ApiError::Unauthorized)));
        assert!(matches!(client.fetch_analytics().await, Err(ApiError::AccessDenied(b)) if b == "forbidden"));
        assert!(matches!(client.fetch_products().await, Err(ApiError::NotFound(b)) if b == "no such route"));
        assert!(matches!(client.fetch_users().await, Err(ApiError::InvalidResponse(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_without_token_sends_nothing() {
        let client = ApiClient::new(DEFAULT_API_BASE_URL).expect("client should build");
        assert!(matches!(client.fetch_overview().await, Err(ApiError::MissingToken)));
    }

    #[test]
    fn test_parse_login_body_string_id() {
        let grant = ApiClient::parse_login_body(r#"{"token":"abc123","id":"u1"}"#)
            .expect("valid login body should parse");
        assert_eq!(grant.token, "abc123");
        assert_eq!(grant.user_id, "u1");
    }

    #[test]
    fn test_parse_login_body_numeric_id() {
        let grant = ApiClient::parse_login_body(r#"{"token":"abc123","id":42,"email":"a@b.c"}"#)
            .expect("numeric id should be accepted");
        assert_eq!(grant.user_id, "42");
    }

    #[test]
    fn test_parse_login_body_user_id_alias() {
        let grant = ApiClient::parse_login_body(r#"{"token":"t","userId":"u9"}"#)
            .expect("userId alias should be accepted");
        assert_eq!(grant.user_id, "u9");
    }

    #[test]
    fn test_parse_login_body_rejects_malformed() {
        let bad = [
            "",
            "not json",
            "[]",
            r#"{"id":"u1"}"#,
            r#"{"token":"","id":"u1"}"#,
            r#"{"token":"   ","id":"u1"}"#,
            r#"{"token":"abc"}"#,
            r#"{"token":"abc","id":""}"#,
            r#"{"token":123,"id":"u1"}"#,
            r#"{"token":"abc","id":null}"#,
        ];
        for body in bad {
            assert!(
                matches!(ApiClient::parse_login_body(body), Err(ApiError::InvalidResponse(_))),
                "expected rejection for {:?}",
                body
            );
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("https://api.example.com/").expect("client should build");
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(client.url("/api/users"), "https://api.example.com/api/users");
    }

    #[test]
    fn test_auth_headers_require_token() {
        let client = ApiClient::new(DEFAULT_API_BASE_URL).expect("client should build");
        assert!(matches!(client.auth_headers(), Err(ApiError::MissingToken)));

        let authed = client.with_token("abc123".to_string());
        let headers = authed.auth_headers().expect("token should produce headers");
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc123")
        );
    }
}
