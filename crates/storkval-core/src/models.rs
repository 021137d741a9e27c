//! Wire models for the oracle API and the domain snapshots built from them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Map;

// ============================================================================
// GET /v1/me
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub data: MeData,
}

#[derive(Debug, Deserialize)]
pub struct MeData {
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub stats: MeStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeStats {
    #[serde(default)]
    pub stork_signed_prices_valid_count: u64,
    #[serde(default)]
    pub stork_signed_prices_invalid_count: u64,
    #[serde(default)]
    pub stork_signed_prices_last_verified_at: Option<Timestamp>,
}

/// The API has sent both ISO strings and epoch milliseconds here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}

// ============================================================================
// GET /v1/stork_signed_prices
// ============================================================================

/// Signed prices keyed by asset symbol, in response order.
#[derive(Debug, Deserialize)]
pub struct PricesResponse {
    #[serde(default)]
    pub data: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignedPrice {
    pub timestamped_signature: TimestampedSignature,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimestampedSignature {
    pub msg_hash: String,
}

impl PricesResponse {
    /// The first asset in response order with its signed price.
    /// `None` when the response holds no assets.
    pub fn first_asset(&self) -> Option<Result<(String, SignedPrice), serde_json::Error>> {
        self.data.iter().next().map(|(symbol, value)| {
            SignedPrice::deserialize(value).map(|price| (symbol.clone(), price))
        })
    }
}

// ============================================================================
// POST /v1/stork_signed_prices/validations
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ValidationRequest<'a> {
    pub msg_hash: &'a str,
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct ValidationResponse {
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Domain snapshots
// ============================================================================

/// Profile and counters from the latest successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStats {
    pub email: String,
    pub id: String,
    pub valid_count: u64,
    pub invalid_count: u64,
    /// Already converted to the display timezone
    pub last_verified_at: Option<String>,
}

/// Result of the latest validation submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub asset: String,
    pub submitted_msg_hash: String,
    pub response_message: String,
}
