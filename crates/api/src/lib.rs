//! Skillforge REST layer
//!
//! The envelope types the backend's collection and mutation endpoints
//! speak, a thin `reqwest` client for them, and the mapping from HTTP
//! status categories to the client's error taxonomy. Optimistic
//! rollback decisions in the facade hang off [`ApiError`], so the
//! classification here is the single place status codes are
//! interpreted.

use std::collections::HashMap;

use log::debug;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use skillforge_rust_store::Pagination;

/// Error taxonomy for mutation and fetch calls.
///
/// Validation failures caught client-side never reach this type; these
/// are the post-submission categories, all of which require rolling
/// back whatever optimistic mutation was applied.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 400: the server rejected the payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// 403: the caller is not allowed to do this.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// 404: the optimistic assumption that the entity exists was wrong.
    #[error("not found: {0}")]
    NotFound(String),

    /// 409: concurrent modification conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// 5xx: server-side failure; treated as transient but not retried
    /// automatically.
    #[error("server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => ApiError::Validation(message),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ApiError::Authorization(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            _ => ApiError::Server(message),
        }
    }

    /// The message to surface to the user, verbatim from the server
    /// where one exists.
    pub fn surface_message(&self) -> String {
        match self {
            ApiError::Validation(m)
            | ApiError::Authorization(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Server(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Transient failures a user-initiated resubmission may succeed on.
    /// Nothing in this layer retries automatically; mutations with
    /// financial side effects must never be re-fired behind the user's
    /// back.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Server(_))
    }
}

/// `{ success, message, data }` as returned by mutation endpoints.
#[derive(Debug, Deserialize)]
pub struct MutationEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// `{ success: false, message, code }` error body.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[allow(dead_code)]
    success: bool,
    message: String,
    #[allow(dead_code)]
    #[serde(default)]
    code: Option<String>,
}

/// The `data` object of a list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListData<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    #[serde(default)]
    pub filters: HashMap<String, String>,
    #[serde(default)]
    pub summary: HashMap<String, f64>,
}

/// `{ success, data, meta }` as returned by list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListEnvelope<T> {
    pub success: bool,
    pub data: ListData<T>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

/// Thin client over the Skillforge REST surface.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: None,
        })
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.base_url.join(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    /// Fetch a paginated list, reusing the last-applied filters as
    /// query parameters.
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &HashMap<String, String>,
    ) -> Result<ListData<T>, ApiError> {
        debug!("GET {path} with {} filter(s)", filters.len());
        let response = self
            .request(Method::GET, path)?
            .query(filters)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(decode_error(status, &body));
        }
        let envelope: ListEnvelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(ApiError::UnexpectedResponse(
                "list envelope flagged success=false on a 2xx response".to_string(),
            ));
        }
        Ok(envelope.data)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path)?.send().await?;
        decode_mutation(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.request(Method::POST, path)?.json(body).send().await?;
        decode_mutation(response).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.request(Method::PUT, path)?.json(body).send().await?;
        decode_mutation(response).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.request(Method::PATCH, path)?.json(body).send().await?;
        decode_mutation(response).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::DELETE, path)?.send().await?;
        decode_mutation(response).await
    }
}

async fn decode_mutation<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(decode_error(status, &body));
    }
    let envelope: MutationEnvelope<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        return Err(ApiError::UnexpectedResponse(
            "mutation envelope flagged success=false on a 2xx response".to_string(),
        ));
    }
    Ok(envelope.data)
}

fn decode_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError::from_status(status, envelope.message),
        // Error bodies from proxies etc. are not always enveloped.
        Err(_) => ApiError::from_status(status, format!("HTTP {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_taxonomy() {
        let cases = [
            (StatusCode::BAD_REQUEST, "validation error: bad title"),
            (StatusCode::FORBIDDEN, "authorization error: not yours"),
            (StatusCode::NOT_FOUND, "not found: gone"),
            (StatusCode::CONFLICT, "conflict: stale"),
            (StatusCode::INTERNAL_SERVER_ERROR, "server error: oops"),
        ];
        for (status, display) in cases {
            let message = display.split(": ").nth(1).unwrap().to_string();
            let err = ApiError::from_status(status, message.clone());
            assert_eq!(err.to_string(), display);
            assert_eq!(err.surface_message(), message);
        }
    }

    #[test]
    fn only_network_and_server_errors_are_transient() {
        assert!(ApiError::Server("boom".into()).is_transient());
        assert!(!ApiError::Validation("bad".into()).is_transient());
        assert!(!ApiError::Conflict("stale".into()).is_transient());
    }

    #[test]
    fn unenveloped_error_body_still_classifies() {
        let err = decode_error(StatusCode::FORBIDDEN, "<html>forbidden</html>");
        assert!(matches!(err, ApiError::Authorization(_)));
    }
}
