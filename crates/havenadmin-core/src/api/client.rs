//! API client for the LocalHaven survey backend.
//!
//! Covers the public endpoints (`/login`, `/survey`, `/health`) and the
//! admin endpoints that require a bearer token (`/verify`, `/results`,
//! `/metrics`).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::models::{ServerMetrics, SurveyResponse};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Body of a successful `/verify` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

/// API client for the survey backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    backoff: Duration,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
            backoff: self.backoff,
        }
    }

    /// Override the initial rate-limit backoff (tests use a short one).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for a token.
    ///
    /// Sends exactly one request: a rejected login is never retried, so a
    /// 429 from the backend's login limiter surfaces as `ApiError::RateLimited`.
    pub async fn login(&self, credentials: &Credentials) -> Result<String> {
        let url = self.url("/login");
        debug!(url = %url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await
            .map_err(ApiError::NetworkError)
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse login response")?;

        if login.token.is_empty() {
            bail!("Login response carried an empty token");
        }
        Ok(login.token)
    }

    /// Ask the backend whether the current token is still accepted
    pub async fn verify(&self) -> Result<VerifyResponse> {
        self.get(&self.url("/verify")).await
    }

    pub async fn fetch_results(&self) -> Result<Vec<SurveyResponse>> {
        // The backend encodes an empty table as `null`
        let results: Option<Vec<SurveyResponse>> = self.get(&self.url("/results")).await?;
        Ok(results.unwrap_or_default())
    }

    pub async fn fetch_metrics(&self) -> Result<ServerMetrics> {
        self.get(&self.url("/metrics")).await
    }

    pub async fn delete_result(&self, id: &str) -> Result<String> {
        let url = self.url(&format!("/results/{}", id));

        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(ApiError::NetworkError)
            .with_context(|| format!("Failed to send DELETE request to {}", url))?;

        let response = Self::check_response(response).await?;
        let body: MessageResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))?;
        Ok(body.message)
    }

    /// Submit a survey; the backend assigns `id` and `createdAt`
    pub async fn submit_survey(&self, survey: &SurveyResponse) -> Result<SurveyResponse> {
        survey.validate()?;
        self.post(&self.url("/survey"), survey).await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.url("/health");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::NetworkError)
            .context("Failed to reach health endpoint")?;
        let response = Self::check_response(response).await?;

        // Preview deployments answer with a bare "healthy" string
        let body = response.text().await.context("Failed to read health response")?;
        match serde_json::from_str::<HealthStatus>(&body) {
            Ok(status) => Ok(status),
            Err(_) => Ok(HealthStatus {
                status: body.trim().to_string(),
                host: None,
            }),
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Token is not a valid header value")?,
            );
        }
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff = self.backoff;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(ApiError::NetworkError)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response.json().await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .map_err(ApiError::NetworkError)
            .with_context(|| format!("Failed to send POST request to {}", url))?;

        let response = Self::check_response(response).await?;
        response.json().await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = ApiClient::new("http://localhost:8090/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8090");
        assert_eq!(api.url("/login"), "http://localhost:8090/login");
    }

    #[tokio::test]
    async fn test_login_posts_json_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header_eq("content-type", "application/json"))
            .and(body_json(serde_json::json!({"username": "alice", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "abc123"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = client(&server)
            .login(&Credentials::new("alice", "pw"))
            .await
            .unwrap();
        assert_eq!(token, "abc123");
    }

    #[tokio::test]
    async fn test_login_rejects_empty_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": ""})))
            .mount(&server)
            .await;

        let err = client(&server)
            .login(&Credentials::new("alice", "pw"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ApiError>().is_none());
        assert!(err.to_string().contains("empty token"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Nothing listens on port 1
        let api = ApiClient::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap();

        let err = api.login(&Credentials::new("alice", "pw")).await.unwrap_err();
        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert!(matches!(api_error, ApiError::NetworkError(_)));
        assert!(!api_error.is_server_answer());

        let err = api.fetch_metrics().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_login_is_not_retried_when_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .login(&Credentials::new("alice", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token_and_retries_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/metrics"))
            .and(header_eq("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalResponses": 2, "betaInterestCount": 1
            })))
            .mount(&server)
            .await;

        let api = client(&server).with_token("tok".to_string());
        let metrics = api.fetch_metrics().await.unwrap();
        assert_eq!(metrics.total_responses, 2);
    }

    #[tokio::test]
    async fn test_get_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/results"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server).fetch_results().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_fetch_results_accepts_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/results"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let results = client(&server).fetch_results().await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_verify_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"error": "Invalid token"})))
            .mount(&server)
            .await;

        let err = client(&server).with_token("stale".into()).verify().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_delete_result() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/results/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "Result deleted"})))
            .mount(&server)
            .await;

        let message = client(&server).with_token("t".into()).delete_result("abc").await.unwrap();
        assert_eq!(message, "Result deleted");
    }

    #[tokio::test]
    async fn test_submit_survey_validates_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/survey"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let survey = SurveyResponse::default();
        assert!(client(&server).submit_survey(&survey).await.is_err());
    }

    #[tokio::test]
    async fn test_health_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("healthy"))
            .mount(&server)
            .await;

        let health = client(&server).health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.host, None);
    }
}
