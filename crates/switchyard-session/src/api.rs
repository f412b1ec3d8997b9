//! REST client for the backend gateway.
//!
//! Every request carries the current credential from the [`SessionStore`].
//! A `401` from the gateway clears the session, which is how fragments learn
//! that the credential has been revoked.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::store::SessionStore;

/// Gateway client bound to a session store.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a client with its own HTTP connection pool.
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url, session))
    }

    /// Create a client over an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    /// Gateway base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.http.get(self.url(path));
        let response = self.send(request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `POST {base}{path}` with a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(path)).json(body);
        let response = self.send(request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `POST {base}{path}` with a JSON body and return the response text.
    pub async fn post_text<B>(&self, path: &str, body: &B) -> Result<String, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.http.post(self.url(path)).json(body);
        let response = self.send(request).await?;
        Ok(response.text().await?)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.session.current_credential() {
            Some(credential) => request.bearer_auth(credential),
            None => {
                warn!("sending gateway request without a credential");
                request
            }
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "gateway response");

        if status == StatusCode::UNAUTHORIZED {
            warn!("gateway rejected credential, clearing session");
            self.session.clear();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, session: &Arc<SessionStore>) -> ApiClient {
        ApiClient::new(server.uri(), Arc::clone(session), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn attaches_bearer_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/shipments"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "trackingId": "TRK-1", "status": "CREATED" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::in_memory());
        session.establish("abc123", "ops1");

        let shipments: serde_json::Value = client(&server, &session)
            .get_json("/api/shipments")
            .await
            .unwrap();
        assert_eq!(shipments[0]["trackingId"], "TRK-1");
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::in_memory());
        session.establish("stale", "ops1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _obs = session.observe_authenticated(move |v| sink.lock().push(v));

        let result: Result<serde_json::Value, _> =
            client(&server, &session).get_json("api/orders").await;

        assert_matches!(result, Err(ApiError::Unauthorized));
        assert!(session.current_credential().is_none());
        assert_eq!(seen.lock().last(), Some(&false));
    }

    #[tokio::test]
    async fn forbidden_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("not yours"))
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::in_memory());
        session.establish("abc123", "ops1");

        let result = client(&server, &session)
            .post_text("/api/shipments/TRK-1/dispatch", &serde_json::json!({}))
            .await;

        assert_matches!(result, Err(ApiError::Rejected { status: 403, ref message }) if message == "not yours");
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn post_json_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orders"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": 7 })),
            )
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::in_memory());
        session.establish("abc123", "ops1");

        let created: serde_json::Value = client(&server, &session)
            .post_json("/api/orders", &serde_json::json!({ "sku": "PALLET" }))
            .await
            .unwrap();
        assert_eq!(created["id"], 7);
    }

    #[tokio::test]
    async fn request_without_credential_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::in_memory());
        let body: Vec<serde_json::Value> =
            client(&server, &session).get_json("/api/fleet").await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::in_memory());
        let result: Result<serde_json::Value, _> =
            client(&server, &session).get_json("/").await;
        assert_matches!(result, Err(ApiError::Json(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let session = Arc::new(SessionStore::in_memory());
        let api = ApiClient::with_client(reqwest::Client::new(), "http://gw:8080/", session);
        assert_eq!(api.base_url(), "http://gw:8080");
        assert_eq!(api.url("api/x"), "http://gw:8080/api/x");
        assert_eq!(api.url("/api/x"), "http://gw:8080/api/x");
    }
}
