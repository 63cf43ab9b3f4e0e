//! Credential lookup for bot accounts
//!
//! Accounts are configured by label only; the login identifier and app
//! password are looked up per label when the account is processed. The
//! default store reads `BSKY_USERNAME_<LABEL>` and `BSKY_PASSWORD_<LABEL>`
//! from the environment, which is how CI secrets are usually injected.
//!
//! Passwords are held in [`SecretString`] so they are zeroed on drop and never
//! show up in `Debug` output or logs.

use std::collections::HashMap;

use secrecy::SecretString;

use crate::error::{PlatformError, Result};

/// Login material for one account
#[derive(Debug)]
pub struct AccountCredentials {
    /// Configured label (e.g. "BEAUTYFAN")
    pub label: String,
    /// Handle or email used to log in
    pub identifier: String,
    /// App password
    pub password: SecretString,
}

impl AccountCredentials {
    pub fn new(label: impl Into<String>, identifier: impl Into<String>, password: String) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.into(),
            password: SecretString::from(password),
        }
    }
}

/// Source of per-label credentials
pub trait CredentialStore: Send + Sync {
    /// Look up the credentials for `label`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` when the label has no usable
    /// credentials; the caller skips that account.
    fn credentials_for(&self, label: &str) -> Result<AccountCredentials>;

    fn backend_name(&self) -> &str;
}

/// Reads credentials from `<PREFIX>USERNAME_<LABEL>` style variables
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    username_prefix: String,
    password_prefix: String,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::with_prefixes("BSKY_USERNAME_", "BSKY_PASSWORD_")
    }
}

impl EnvCredentials {
    pub fn with_prefixes(username_prefix: &str, password_prefix: &str) -> Self {
        Self {
            username_prefix: username_prefix.to_string(),
            password_prefix: password_prefix.to_string(),
        }
    }

    /// Variable names consulted for `label`
    pub fn variable_names(&self, label: &str) -> (String, String) {
        let suffix = env_suffix(label);
        (
            format!("{}{}", self.username_prefix, suffix),
            format!("{}{}", self.password_prefix, suffix),
        )
    }
}

/// Uppercase, with anything outside `[A-Z0-9_]` turned into `_`
fn env_suffix(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CredentialStore for EnvCredentials {
    fn credentials_for(&self, label: &str) -> Result<AccountCredentials> {
        let (user_var, password_var) = self.variable_names(label);

        match (non_empty_var(&user_var), non_empty_var(&password_var)) {
            (Some(identifier), Some(password)) => {
                Ok(AccountCredentials::new(label, identifier, password))
            }
            _ => Err(PlatformError::Authentication(format!(
                "No credentials for account '{}'. Set {} and {}.",
                label, user_var, password_var
            ))
            .into()),
        }
    }

    fn backend_name(&self) -> &str {
        "environment"
    }
}

/// In-memory store, used for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentials {
    entries: HashMap<String, (String, String)>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, identifier: &str, password: &str) {
        self.entries.insert(
            label.to_string(),
            (identifier.to_string(), password.to_string()),
        );
    }

    pub fn with(mut self, label: &str, identifier: &str, password: &str) -> Self {
        self.insert(label, identifier, password);
        self
    }
}

impl CredentialStore for MemoryCredentials {
    fn credentials_for(&self, label: &str) -> Result<AccountCredentials> {
        self.entries
            .get(label)
            .map(|(identifier, password)| {
                AccountCredentials::new(label, identifier.clone(), password.clone())
            })
            .ok_or_else(|| {
                PlatformError::Authentication(format!("No credentials for account '{}'", label))
                    .into()
            })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    #[test]
    fn test_variable_names() {
        let store = EnvCredentials::default();
        assert_eq!(
            store.variable_names("beautyfan"),
            (
                "BSKY_USERNAME_BEAUTYFAN".to_string(),
                "BSKY_PASSWORD_BEAUTYFAN".to_string()
            )
        );
        assert_eq!(
            store.variable_names("hot-bleusky"),
            (
                "BSKY_USERNAME_HOT_BLEUSKY".to_string(),
                "BSKY_PASSWORD_HOT_BLEUSKY".to_string()
            )
        );
    }

    #[test]
    #[serial]
    fn test_env_credentials_found() {
        std::env::set_var("SKYBOOST_TEST_USER_DMPHOTOS", "dmphotos.bsky.social");
        std::env::set_var("SKYBOOST_TEST_PASS_DMPHOTOS", "abcd-efgh-ijkl-mnop");

        let store = EnvCredentials::with_prefixes("SKYBOOST_TEST_USER_", "SKYBOOST_TEST_PASS_");
        let creds = store.credentials_for("DMPHOTOS").unwrap();
        assert_eq!(creds.label, "DMPHOTOS");
        assert_eq!(creds.identifier, "dmphotos.bsky.social");
        assert_eq!(creds.password.expose_secret(), "abcd-efgh-ijkl-mnop");

        std::env::remove_var("SKYBOOST_TEST_USER_DMPHOTOS");
        std::env::remove_var("SKYBOOST_TEST_PASS_DMPHOTOS");
    }

    #[test]
    #[serial]
    fn test_env_credentials_missing_password() {
        std::env::set_var("SKYBOOST_TEST_USER_HALF", "half.bsky.social");
        std::env::set_var("SKYBOOST_TEST_PASS_HALF", "   ");

        let store = EnvCredentials::with_prefixes("SKYBOOST_TEST_USER_", "SKYBOOST_TEST_PASS_");
        let err = store.credentials_for("HALF").unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("SKYBOOST_TEST_PASS_HALF"));

        std::env::remove_var("SKYBOOST_TEST_USER_HALF");
        std::env::remove_var("SKYBOOST_TEST_PASS_HALF");
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let creds = AccountCredentials::new("A", "a.bsky.social", "super-secret".to_string());
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_memory_credentials() {
        let store = MemoryCredentials::new().with("A", "a.bsky.social", "pw");
        assert_eq!(store.credentials_for("A").unwrap().identifier, "a.bsky.social");
        assert!(store.credentials_for("B").unwrap_err().is_authentication());
        assert_eq!(store.backend_name(), "memory");
    }
}
