use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;

/// Why a validation cycle failed. None of these stop the scheduler.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthError),

    #[error("Network request failed: {0}")]
    NetworkFailed(#[from] ApiError),

    #[error("No asset data found in the prices response")]
    NoAssetData,
}

impl CycleError {
    /// Short label for the status line
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::AuthenticationFailed(_) => "auth",
            CycleError::NetworkFailed(_) => "network",
            CycleError::NoAssetData => "no-assets",
        }
    }
}
