//! API credential storage and lookup
//!
//! The model backend credential is resolved from the process environment
//! first, then the OS keyring, then a permission-restricted fallback file.
//! A missing credential is not an error here: callers degrade to the
//! "service unavailable" reply.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const SERVICE_NAME: &str = "lynqo";
const API_KEY_USERNAME: &str = "model-api-key";
const API_KEY_FILE: &str = "api_key.txt";

/// Get the path for the fallback API key file
fn api_key_file_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lynqo", "lynqo")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join(API_KEY_FILE))
}

/// Resolve the model API key, trying `env_var` before stored credentials
pub fn resolve_api_key(env_var: &str) -> Option<String> {
    if let Some(key) = non_empty(std::env::var(env_var).ok()) {
        debug!("Using API key from ${}", env_var);
        return Some(key);
    }

    if let Ok(entry) = ::keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if let Some(key) = non_empty(entry.get_password().ok()) {
            debug!("Using API key from OS keyring");
            return Some(key);
        }
    }

    let stored = api_key_file_path()
        .ok()
        .and_then(|path| fs::read_to_string(path).ok());
    if let Some(key) = non_empty(stored) {
        debug!("Using API key from fallback file");
        return Some(key);
    }

    None
}

/// Store API key - tries keyring first, falls back to file
pub fn set_api_key(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    if let Ok(entry) = ::keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if entry.set_password(key).is_ok() {
            return Ok(());
        }
    }

    save_to_file(key)?;
    println!("Note: Using file-based storage (keyring unavailable)");
    Ok(())
}

/// Delete API key from both keyring and file
pub fn delete_api_key() -> Result<()> {
    if let Ok(entry) = ::keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        let _ = entry.delete_credential();
    }

    let path = api_key_file_path()?;
    if path.exists() {
        fs::remove_file(&path).context("Failed to delete API key file")?;
    }

    Ok(())
}

fn save_to_file(key: &str) -> Result<()> {
    let path = api_key_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
    }
    fs::write(&path, key).context("Failed to write API key file")?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_wins() {
        std::env::set_var("LYNQO_TEST_KEY_PRESENT", "  gsk_test  ");
        assert_eq!(
            resolve_api_key("LYNQO_TEST_KEY_PRESENT").as_deref(),
            Some("gsk_test")
        );
        std::env::remove_var("LYNQO_TEST_KEY_PRESENT");
    }

    #[test]
    fn test_non_empty_filters_blank() {
        assert_eq!(non_empty(Some("   ".into())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("k\n".into())).as_deref(), Some("k"));
    }
}
