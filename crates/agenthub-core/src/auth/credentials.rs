use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "agenthub";

/// OS-keychain storage for the refresh token, keyed by account email.
///
/// The session file under the cache directory carries the full session for
/// fast restarts; the keychain copy of the refresh token is the fallback
/// when that file is missing (cache cleared, new machine profile).
pub struct CredentialStore;

impl CredentialStore {
    /// Store the refresh token for an account in the OS keychain
    pub fn store_refresh_token(email: &str, refresh_token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(refresh_token)
            .context("Failed to store refresh token in keychain")?;
        Ok(())
    }

    /// Retrieve the refresh token for an account from the OS keychain
    pub fn get_refresh_token(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve refresh token from keychain")
    }

    /// Delete the stored refresh token for an account
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete refresh token from keychain")?;
        Ok(())
    }

    /// Check if a refresh token is stored for an account
    pub fn has_refresh_token(email: &str) -> bool {
        if let Ok(entry) = Entry::new(SERVICE_NAME, email) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }
}
