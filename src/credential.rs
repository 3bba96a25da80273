//! API credential resolution and the optional interactive key selector.
//!
//! The credential is looked up every time a request is made, so a key
//! selected interactively (or exported into the environment) after startup
//! is picked up by the next call.

use crate::error::{PixelGenError, Result};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_VAR: &str = "API_KEY";

/// Environment variable consulted when the primary one is unset.
pub const FALLBACK_API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Resolves the API credential at call time.
#[derive(Debug)]
pub struct Credentials {
    env_vars: Vec<String>,
    selected: RwLock<Option<String>>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self::from_env_var(DEFAULT_API_KEY_VAR)
    }
}

impl Credentials {
    /// Reads the key from `var`, falling back to `GOOGLE_API_KEY`.
    pub fn from_env_var(var: impl Into<String>) -> Self {
        let var = var.into();
        let mut env_vars = vec![var.clone()];
        if var != FALLBACK_API_KEY_VAR {
            env_vars.push(FALLBACK_API_KEY_VAR.to_string());
        }
        Self {
            env_vars,
            selected: RwLock::new(None),
        }
    }

    /// Uses only the given variables, without the fallback.
    pub fn from_env_vars(vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            env_vars: vars.into_iter().map(Into::into).collect(),
            selected: RwLock::new(None),
        }
    }

    /// Stores a key chosen interactively. It takes precedence over the
    /// environment.
    pub fn select(&self, key: impl Into<String>) {
        let key = key.into();
        let mut selected = self.selected.write().unwrap_or_else(|e| e.into_inner());
        *selected = Some(key);
    }

    /// Returns the current key, if any. Empty values count as missing.
    pub fn resolve(&self) -> Option<String> {
        let selected = self
            .selected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        selected
            .into_iter()
            .chain(self.env_vars.iter().filter_map(|var| std::env::var(var).ok()))
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }

    /// Returns the current key or `CredentialMissing`.
    pub fn require(&self) -> Result<String> {
        self.resolve().ok_or_else(|| {
            PixelGenError::CredentialMissing(
                self.env_vars
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_API_KEY_VAR.to_string()),
            )
        })
    }
}

/// Optional capability for environments that ask the user to pick a key
/// before high-quality requests.
#[async_trait]
pub trait CredentialSelector: Send + Sync {
    /// Returns true if a key has already been selected.
    async fn has_selected_credential(&self) -> Result<bool>;

    /// Opens the picker and waits for the user.
    ///
    /// Returns `CredentialSelectionCancelled` if the user backs out.
    async fn open_credential_picker(&self) -> Result<()>;
}

/// Selector for environments without a picker: always reports a key as
/// selected, so requests dispatch directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSelected;

#[async_trait]
impl CredentialSelector for AlwaysSelected {
    async fn has_selected_credential(&self) -> Result<bool> {
        Ok(true)
    }

    async fn open_credential_picker(&self) -> Result<()> {
        Ok(())
    }
}

/// Terminal picker: prompts on stderr and reads a key from stdin.
///
/// An empty line or end of input cancels the selection.
#[derive(Debug, Clone)]
pub struct TerminalKeyPicker {
    credentials: Arc<Credentials>,
}

impl TerminalKeyPicker {
    /// Creates a picker that stores the chosen key into `credentials`.
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialSelector for TerminalKeyPicker {
    async fn has_selected_credential(&self) -> Result<bool> {
        Ok(self.credentials.resolve().is_some())
    }

    async fn open_credential_picker(&self) -> Result<()> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"A paid API key is required for upscaling. Paste key (empty to cancel): ")
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

        let key = line.trim();
        if key.is_empty() {
            return Err(PixelGenError::CredentialSelectionCancelled);
        }
        self.credentials.select(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET_VAR: &str = "PIXELGEN_TEST_CREDENTIAL_NEVER_SET";

    #[test]
    fn test_missing_credential() {
        let credentials = Credentials::from_env_vars([UNSET_VAR]);
        assert!(credentials.resolve().is_none());
        match credentials.require() {
            Err(PixelGenError::CredentialMissing(var)) => assert_eq!(var, UNSET_VAR),
            other => panic!("expected CredentialMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_selected_key_wins() {
        let credentials = Credentials::from_env_vars([UNSET_VAR]);
        credentials.select("  picked-key ");
        assert_eq!(credentials.resolve().as_deref(), Some("picked-key"));
    }

    #[test]
    fn test_blank_selected_key_is_ignored() {
        let credentials = Credentials::from_env_vars([UNSET_VAR]);
        credentials.select("   ");
        assert!(credentials.resolve().is_none());
    }

    #[test]
    fn test_fallback_var_is_appended_once() {
        let credentials = Credentials::from_env_var("MY_KEY");
        assert_eq!(credentials.env_vars, vec!["MY_KEY", FALLBACK_API_KEY_VAR]);

        let credentials = Credentials::from_env_var(FALLBACK_API_KEY_VAR);
        assert_eq!(credentials.env_vars, vec![FALLBACK_API_KEY_VAR]);
    }

    #[tokio::test]
    async fn test_always_selected() {
        let selector = AlwaysSelected;
        assert!(selector.has_selected_credential().await.unwrap());
        selector.open_credential_picker().await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_picker_reports_selected_key() {
        let credentials = Arc::new(Credentials::from_env_vars([UNSET_VAR]));
        let picker = TerminalKeyPicker::new(credentials.clone());
        assert!(!picker.has_selected_credential().await.unwrap());

        credentials.select("k");
        assert!(picker.has_selected_credential().await.unwrap());
    }
}
