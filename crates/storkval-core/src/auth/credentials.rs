use std::path::Path;

use anyhow::{Context, Result};
use keyring::Entry;
use serde::Deserialize;

use super::provider::Credentials;

const SERVICE_NAME: &str = "storkval";

/// OS keychain storage for the account password.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for an account in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an account from the OS keychain
    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }
}

/// The account file: `{ "email": ..., "password": ... }`, password optional.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountFile {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl AccountFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read account file {}", path.display()))?;
        let account: AccountFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse account file {}", path.display()))?;
        if account.email.trim().is_empty() {
            anyhow::bail!("Account file {} has an empty email", path.display());
        }
        Ok(account)
    }

    /// Resolve full credentials, falling back to the keychain for the password.
    pub fn credentials(&self) -> Result<Credentials> {
        let password = match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => password.to_string(),
            None => CredentialStore::get_password(&self.email).with_context(|| {
                format!(
                    "No password in account file and none stored for {} (run with --store-password)",
                    self.email
                )
            })?,
        };
        Ok(Credentials::new(self.email.clone(), password))
    }
}
