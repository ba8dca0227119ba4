//! The token file that authenticates requests to the Google Sheets API.
//!
//! Obtaining and refreshing the token is done outside of this program. We only read it.

use crate::{utils, Result};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The contents of `.secrets/token.json`.
///
/// ```json
/// {
///   "access_token": "ya29.a0AfB_byC...",
///   "refresh_token": "1//0gLx...",
///   "expires_at": "2025-01-01T12:00:00Z"
/// }
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct TokenFile {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl TokenFile {
    /// Loads the token and checks that it can be used right now.
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let token: Self = utils::deserialize(path)
            .await
            .context("Unable to deserialize the token JSON file")?;
        if token.access_token.trim().is_empty() {
            bail!("The token file at {} has no access_token", path.display());
        }
        if token.is_expired() {
            bail!(
                "The access token in {} has expired, replace it with a fresh one",
                path.display()
            );
        }
        Ok(token)
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(crate) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// A token without an expiry is assumed to be valid.
    pub(crate) fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now(),
            None => false,
        }
    }
}

/// Makes `path` readable and writable only by its owner.
pub(crate) fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_token_file_good() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        utils::write(
            &path,
            r#"{"access_token":"abc","refresh_token":"def","expires_at":"2999-01-01T00:00:00Z"}"#,
        )
        .await
        .unwrap();
        let token = TokenFile::load(&path).await.unwrap();
        assert_eq!(token.access_token(), "abc");
        assert_eq!(token.refresh_token(), "def");
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn test_load_token_file_minimal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        utils::write(&path, r#"{"access_token":"abc"}"#).await.unwrap();
        let token = TokenFile::load(&path).await.unwrap();
        assert_eq!(token.refresh_token(), "");
    }

    #[tokio::test]
    async fn test_load_token_file_expired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        utils::write(
            &path,
            r#"{"access_token":"abc","expires_at":"2001-01-01T00:00:00Z"}"#,
        )
        .await
        .unwrap();
        let err = TokenFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_load_token_file_missing() {
        let dir = TempDir::new().unwrap();
        assert!(TokenFile::load(dir.path().join("nope.json")).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restrict_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        utils::write(&path, "{}").await.unwrap();
        restrict_permissions(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
