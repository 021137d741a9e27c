//! JWT expiry decoding.
//!
//! Only the claims are read; the signature is the server's concern.

use std::collections::HashSet;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum TokenDecodeError {
    #[error("Token is not a readable JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Token has no exp claim")]
    MissingExpiry,
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Claims-only validation: no signature, expiry, audience or required-claim checks.
fn claims_only() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation
}

/// Decode the `exp` claim of a JWT and return it in epoch milliseconds.
pub fn decode_expiry_ms(token: &str) -> Result<i64, TokenDecodeError> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &claims_only())?;
    let exp = data.claims.exp.ok_or(TokenDecodeError::MissingExpiry)?;
    Ok((exp * 1000.0) as i64)
}

/// Whether the token is expired at `now_ms`. Undecodable tokens count as expired.
pub fn is_expired(token: &str, now_ms: i64) -> bool {
    match decode_expiry_ms(token) {
        Ok(expires_at_ms) => now_ms >= expires_at_ms,
        Err(e) => {
            warn!(error = %e, "Could not decode access token, treating it as expired");
            true
        }
    }
}

/// Build a JWT carrying the given `exp` (seconds). Test helper.
#[cfg(test)]
pub(crate) fn make_token(exp_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = serde_json::json!({
        "sub": "user-1",
        "token_use": "access",
        "exp": exp_secs,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret"))
        .expect("Failed to encode test token")
}
