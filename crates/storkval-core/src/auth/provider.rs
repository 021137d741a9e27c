//! Credential providers: turn account credentials into a fresh access token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::token::TokenDecodeError;

/// Cognito JSON-RPC target for the password login flow
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

/// Content type the Cognito endpoint expects
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Login request timeout in seconds
const LOGIN_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login rejected: {0}")]
    Rejected(String),

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),

    #[error("Access token not found in login response")]
    TokenNotFound,

    #[error("Login request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Access token is unusable: {0}")]
    InvalidToken(#[from] TokenDecodeError),

    /// A refresh this caller waited on failed; carries that failure's message.
    #[error("{0}")]
    Shared(String),
}

/// Account secrets handed to a provider.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A token as returned by a provider.
#[derive(Debug, Clone)]
pub struct FetchedToken {
    pub access_token: String,
    /// Expiry as reported by the issuer, if any. Informational only.
    pub expires_at_ms: Option<i64>,
}

/// Produces a fresh access token for the given credentials. May be slow.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch_token(&self, credentials: &Credentials) -> Result<FetchedToken, AuthError>;
}

// ============================================================================
// Cognito
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
struct AuthParameters<'a> {
    #[serde(rename = "USERNAME")]
    username: &'a str,
    #[serde(rename = "PASSWORD")]
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Logs in against the Cognito user pool that fronts the oracle API.
#[derive(Clone)]
pub struct CognitoProvider {
    client: Client,
    endpoint: String,
    client_id: String,
}

impl CognitoProvider {
    pub fn new(region: &str, client_id: impl Into<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(LOGIN_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("https://cognito-idp.{}.amazonaws.com/", region),
            client_id: client_id.into(),
        })
    }

    fn extract_token(body: &str) -> Result<FetchedToken, AuthError> {
        let parsed: InitiateAuthResponse = serde_json::from_str(body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if let Some(challenge) = parsed.challenge_name {
            debug!(challenge = %challenge, "Login answered with a challenge");
            return Err(AuthError::TokenNotFound);
        }

        let result = parsed
            .authentication_result
            .ok_or(AuthError::TokenNotFound)?;
        let access_token = result
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::TokenNotFound)?;

        Ok(FetchedToken {
            access_token,
            expires_at_ms: result
                .expires_in
                .map(|secs| Utc::now().timestamp_millis() + secs * 1000),
        })
    }
}

#[async_trait]
impl CredentialProvider for CognitoProvider {
    async fn fetch_token(&self, credentials: &Credentials) -> Result<FetchedToken, AuthError> {
        info!(email = %credentials.email, "Logging in");

        let request = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.client_id,
            auth_parameters: AuthParameters {
                username: &credentials.email,
                password: &credentials.password,
            },
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected(format!("{}: {}", status, text)));
        }

        Self::extract_token(&text)
    }
}
