use anyhow::Result;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Failures reported by the backend itself, as opposed to transport errors.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {body}")]
    Status { status: StatusCode, body: String },
}

/// Thin JSON client for the console backend (`/api/students`, `/api/teachers`,
/// `/api/appointments`).
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_base_url(&config.api_base_url)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::NOT_FOUND => RestError::NotFound(path.to_string()).into(),
                _ => RestError::Status { status, body: error_text }.into(),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// True when the error chain carries a backend 404.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<RestError>(), Some(RestError::NotFound(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strips_trailing_slash_from_base_url() {
        let client = RestClient::with_base_url("http://localhost:8080/");
        assert_eq!(client.get_base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn get_decodes_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/teachers/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "status": "ACTIVE"})))
            .mount(&server)
            .await;

        let client = RestClient::with_base_url(&server.uri());
        let value: Value = client.get("/api/teachers/7").await.unwrap();
        assert_eq!(value["status"], "ACTIVE");
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/appointments"))
            .and(body_json(json!({"content": "Algebra"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::with_base_url(&server.uri());
        let value: Value = client
            .post("/api/appointments", json!({"content": "Algebra"}))
            .await
            .unwrap();
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn not_found_is_distinguishable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/students/99"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let client = RestClient::with_base_url(&server.uri());
        let err = client.get::<Value>("/api/students/99").await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn server_error_is_not_a_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/appointments"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = RestClient::with_base_url(&server.uri());
        let err = client.get::<Value>("/api/appointments").await.unwrap_err();
        assert!(!is_not_found(&err));
        assert!(err.to_string().contains("500"));
    }
}
