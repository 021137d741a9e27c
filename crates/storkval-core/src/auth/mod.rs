//! Authentication module for managing the oracle access token.
//!
//! This module provides:
//! - `TokenManager`: owns the current `Session` and refreshes it on expiry
//! - `CredentialProvider`: pluggable source of fresh access tokens
//! - `SessionStore`: the persisted `{ accessToken }` artifact
//! - `CredentialStore`: OS keychain storage for the account password
//!
//! Token expiry always comes from the JWT `exp` claim.

pub mod credentials;
pub mod manager;
pub mod provider;
pub mod session;
pub mod token;

pub use credentials::{AccountFile, CredentialStore};
pub use manager::TokenManager;
pub use provider::{AuthError, CognitoProvider, CredentialProvider, Credentials, FetchedToken};
pub use session::{Session, SessionStore};
pub use token::TokenDecodeError;
