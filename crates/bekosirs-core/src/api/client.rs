//! API client for the BekoSIRS REST backend.
//!
//! Every outbound request goes through [`ApiClient::send`] (or its anonymous
//! twin): the access token is read from the credential store and attached as a
//! bearer header, and the outcome is classified into the three [`ApiError`]
//! buckets. Nothing here retries.

use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::config::Config;
use crate::storage::CredentialStore;

/// A response that made it back with a success status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decode the body. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
        serde_json::from_slice(body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// API client for the BekoSIRS backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credentials: CredentialStore,
}

impl ApiClient {
    pub fn new(config: &Config, credentials: CredentialStore) -> Result<Self, ApiError> {
        Self::with_timeout(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
            credentials,
        )
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        credentials: CredentialStore,
    ) -> Result<Self, ApiError> {
        // Url::join drops the last path segment unless the base ends in '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::Setup(format!("Invalid API base URL {:?}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from_transport)?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Setup(format!("Invalid endpoint path {:?}: {}", path, e)))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.credentials.access_token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Setup("Stored access token is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send a request carrying the stored access token, if any.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ApiError> {
        let headers = self.auth_headers()?;
        self.dispatch(method, path, body, headers).await
    }

    /// Send a request without a bearer header. Used for endpoints that take
    /// credentials in the body, where a stale token would only get in the way.
    pub async fn send_anonymous<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ApiError> {
        self.dispatch(method, path, body, header::HeaderMap::new())
            .await
    }

    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: header::HeaderMap,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(headers)
            .header(header::ACCEPT, "application/json");

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::Setup(format!("Failed to encode request body: {}", e)))?;
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(bytes);
        }

        debug!(method = %method, path = path, "Sending request");
        let response = request.send().await.map_err(|e| {
            let err = ApiError::from_transport(e);
            warn!(method = %method, path = path, error = %err, "Request failed before a response");
            err
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(ApiError::from_transport)?
            .to_vec();

        if status.is_success() {
            debug!(method = %method, path = path, status = status.as_u16(), "Request succeeded");
            Ok(ApiResponse { status, body })
        } else {
            let text = String::from_utf8_lossy(&body);
            debug!(method = %method, path = path, status = status.as_u16(), "Server rejected request");
            Err(ApiError::from_status(status, &text))
        }
    }

    /// Send with the bearer token and decode the JSON response.
    pub async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        self.send(method, path, body).await?.json(path)
    }

    /// Send without the bearer token and decode the JSON response.
    pub async fn request_anonymous<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        self.send_anonymous(method, path, body).await?.json(path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::api::FailureKind;
    use crate::testing::{MemoryStorage, MockBackend};

    fn client_for(base_url: &str) -> (CredentialStore, ApiClient) {
        let store = CredentialStore::new(Arc::new(MemoryStorage::default()));
        let client = ApiClient::with_timeout(base_url, Duration::from_secs(5), store.clone()).unwrap();
        (store, client)
    }

    #[tokio::test]
    async fn test_attaches_bearer_when_token_present() {
        let backend = MockBackend::start().await;
        backend.respond("GET", "profile/", 200, json!({"id": 1, "username": "ayse"}));
        let (store, client) = client_for(&backend.base_url);
        store.save_tokens("acc-1", "ref-1").unwrap();

        let _: serde_json::Value = client.get("profile/").await.unwrap();

        let calls = backend.calls_to("profile/");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer acc-1"));
    }

    #[tokio::test]
    async fn test_no_token_is_not_an_error() {
        let backend = MockBackend::start().await;
        backend.respond("GET", "products/", 200, json!([]));
        let (_, client) = client_for(&backend.base_url);

        let products: Vec<serde_json::Value> = client.get("products/").await.unwrap();
        assert!(products.is_empty());
        assert_eq!(backend.calls_to("products/")[0].authorization, None);
    }

    #[tokio::test]
    async fn test_anonymous_send_omits_token() {
        let backend = MockBackend::start().await;
        backend.respond("POST", "token/refresh/", 200, json!({"access": "a"}));
        let (store, client) = client_for(&backend.base_url);
        store.save_tokens("stale", "ref").unwrap();

        let _: serde_json::Value = client
            .request_anonymous(Method::POST, "token/refresh/", Some(&json!({"refresh": "ref"})))
            .await
            .unwrap();

        let call = &backend.calls_to("token/refresh/")[0];
        assert_eq!(call.authorization, None);
        assert_eq!(call.body["refresh"], "ref");
    }

    #[tokio::test]
    async fn test_error_status_is_server_rejected() {
        let backend = MockBackend::start().await;
        backend.respond("POST", "wishlist/", 403, json!({"detail": "Forbidden"}));
        let (_, client) = client_for(&backend.base_url);

        let err = client
            .post::<serde_json::Value, _>("wishlist/", &json!({"product": 3}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::ServerRejected);
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(err.server_message().as_deref(), Some("Forbidden"));
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let url = MockBackend::closed_url().await;
        let (_, client) = client_for(&url);

        let err = client.get::<serde_json::Value>("profile/").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Unreachable);
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let backend = MockBackend::start().await;
        backend.respond_slowly("GET", "profile/", Duration::from_millis(1500));
        let store = CredentialStore::new(Arc::new(MemoryStorage::default()));
        let client =
            ApiClient::with_timeout(&backend.base_url, Duration::from_millis(200), store).unwrap();

        let err = client.get::<serde_json::Value>("profile/").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Unreachable);
    }

    #[tokio::test]
    async fn test_unserializable_body_is_fatal() {
        let backend = MockBackend::start().await;
        let (_, client) = client_for(&backend.base_url);

        // JSON object keys must be strings.
        let mut body = BTreeMap::new();
        body.insert(vec![1u8], "value");

        let err = client
            .post::<serde_json::Value, _>("token/", &body)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Fatal);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_fatal() {
        let backend = MockBackend::start().await;
        backend.respond("GET", "profile/", 200, json!({"unexpected": true}));
        let (_, client) = client_for(&backend.base_url);

        let err = client
            .get::<crate::api::types::Profile>("profile/")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert_eq!(err.kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_invalid_base_url_is_setup_error() {
        let store = CredentialStore::new(Arc::new(MemoryStorage::default()));
        let err = ApiClient::with_timeout("not a url", Duration::from_secs(1), store)
            .err()
            .unwrap();
        assert_eq!(err.kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_endpoint_join_keeps_base_path() {
        let store = CredentialStore::new(Arc::new(MemoryStorage::default()));
        let client =
            ApiClient::with_timeout("http://example.test/api", Duration::from_secs(1), store).unwrap();
        assert_eq!(
            client.endpoint("/biometric/verify-device/").unwrap().as_str(),
            "http://example.test/api/biometric/verify-device/"
        );
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let response = ApiResponse {
            status: StatusCode::NO_CONTENT,
            body: Vec::new(),
        };
        let decoded: Option<serde_json::Value> = response.json("x/").unwrap();
        assert!(decoded.is_none());
    }
}
