//! API client for the Stork oracle REST API.
//!
//! Every call carries the bearer token it is given; token lifetime is the
//! caller's concern (see `auth::TokenManager`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{MeResponse, PricesResponse, ValidationRequest, ValidationResponse};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the oracle API
pub const DEFAULT_API_BASE_URL: &str = "https://app-api.jp.stork-oracle.network";

/// Default HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ME_PATH: &str = "/v1/me";
const PRICES_PATH: &str = "/v1/stork_signed_prices";
const VALIDATIONS_PATH: &str = "/v1/stork_signed_prices/validations";

/// The three remote calls a validation cycle makes.
#[async_trait]
pub trait OracleApi: Send + Sync {
    /// `GET /v1/me`
    async fn fetch_me(&self, token: &str) -> Result<MeResponse, ApiError>;

    /// `GET /v1/stork_signed_prices`
    async fn fetch_signed_prices(&self, token: &str) -> Result<PricesResponse, ApiError>;

    /// `POST /v1/stork_signed_prices/validations` with `{ msg_hash, valid: true }`
    async fn submit_validation(
        &self,
        token: &str,
        msg_hash: &str,
    ) -> Result<ValidationResponse, ApiError>;
}

/// API client for the oracle service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct StorkClient {
    client: Client,
    base_url: String,
}

impl StorkClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }
}

#[async_trait]
impl OracleApi for StorkClient {
    async fn fetch_me(&self, token: &str) -> Result<MeResponse, ApiError> {
        self.get(ME_PATH, token).await
    }

    async fn fetch_signed_prices(&self, token: &str) -> Result<PricesResponse, ApiError> {
        self.get(PRICES_PATH, token).await
    }

    async fn submit_validation(
        &self,
        token: &str,
        msg_hash: &str,
    ) -> Result<ValidationResponse, ApiError> {
        let body = ValidationRequest {
            msg_hash,
            valid: true,
        };
        self.post(VALIDATIONS_PATH, token, &body).await
    }
}
