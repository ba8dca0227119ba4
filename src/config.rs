//! Configuration file handling for fundraise.
//!
//! The configuration file is stored at `$FUNDRAISE_HOME/config.json` and contains the Google Sheet
//! URL, the range that mirrors the initiatives, the sync quiescence window and the token file path.

use crate::api::restrict_permissions;
use crate::session::SyncSettings;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "fundraise";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const EXPORTS: &str = "exports";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
pub(crate) const DEFAULT_RANGE: &str = "Sheet1!A:F";
pub(crate) const DEFAULT_QUIESCENCE_MS: u64 = 2000;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$FUNDRAISE_HOME` and from there it loads `$FUNDRAISE_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    exports: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

impl Config {
    /// Creates the home directory, its subdirectories and:
    /// - Creates an initial `config.json` file using `sheet_url` along with default settings
    /// - Copies `token_file`, when given, to `.secrets/token.json` and makes it private
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g. `$HOME/fundraise`
    /// - `sheet_url` - The URL of the Google Sheet that mirrors the initiatives.
    ///   e.g. https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    /// - `token_file` - A JSON file holding an `access_token` for the Sheets API.
    /// - `range` - The A1 range holding the initiatives, `Sheet1!A:F` when `None`.
    ///
    /// # Errors
    /// - Returns an error if the URL has no spreadsheet ID or any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        sheet_url: &str,
        token_file: Option<&Path>,
        range: Option<&str>,
    ) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the fundraise home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let exports = root.join(EXPORTS);
        utils::make_dir(&exports).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        if let Some(token_file) = token_file {
            let destination = secrets.join(TOKEN_JSON);
            utils::copy(token_file, &destination).await?;
            restrict_permissions(&destination)?;
        }

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            range: range.map(str::to_string).unwrap_or_else(default_range),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            exports,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load the config file
    /// - validate that the exports and secrets directories exist
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The fundraise home directory is missing, run 'fundraise init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let config = Self {
            exports: root.join(EXPORTS),
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            spreadsheet_id,
        };
        if !config.exports.is_dir() {
            bail!(
                "The exports directory is missing '{}'",
                config.exports.display()
            )
        }
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exports(&self) -> &Path {
        &self.exports
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn range(&self) -> &str {
        &self.config_file.range
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.config_file.quiescence_ms)
    }

    /// The settings a `Session` needs to sync with the sheet.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            range: self.range().to_string(),
            quiescence: self.quiescence(),
        }
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        let p = self.config_file.token_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "fundraise",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "range": "Sheet1!A:F",
///   "quiescence_ms": 2000,
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "fundraise"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the Google Sheet that mirrors the initiatives
    sheet_url: String,

    /// The A1 range holding the initiatives, header row included
    #[serde(default = "default_range")]
    range: String,

    /// How long the initiatives must go unchanged before they are written to the sheet
    #[serde(default = "default_quiescence_ms")]
    quiescence_ms: u64,

    /// Path to the access token file (optional, relative to the home directory or absolute)
    /// Defaults to $FUNDRAISE_HOME/.secrets/token.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_range() -> String {
    DEFAULT_RANGE.to_string()
}

fn default_quiescence_ms() -> u64 {
    DEFAULT_QUIESCENCE_MS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            range: default_range(),
            quiescence_ms: DEFAULT_QUIESCENCE_MS,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.range.trim().is_empty(),
            "The range in the config file is empty"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// If the path is relative, it is interpreted as relative to the home directory.
    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    bail!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str =
        "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("fundraise_home");
        let token_source = dir.path().join("x.json");
        let token_content = r#"{"access_token":"12345"}"#;
        utils::write(&token_source, token_content).await.unwrap();

        let config = Config::create(&home_dir, URL, Some(token_source.as_path()), None)
            .await
            .unwrap();

        assert_eq!(URL, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert_eq!(config.range(), "Sheet1!A:F");
        assert_eq!(config.quiescence(), Duration::from_millis(2000));

        // The token is copied, not moved.
        let found = utils::read(&config.token_path()).await.unwrap();
        assert_eq!(token_content, found);
        assert!(token_source.is_file());

        assert!(config.exports().is_dir());
        assert!(config.secrets().is_dir());
        assert!(config.config_path().is_file());
    }

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let created = Config::create(dir.path(), URL, None, Some("Initiatives!A:F"))
            .await
            .unwrap();
        let loaded = Config::load(dir.path()).await.unwrap();
        assert_eq!(created.root(), loaded.root());
        assert_eq!(loaded.range(), "Initiatives!A:F");
        assert_eq!(loaded.spreadsheet_id(), created.spreadsheet_id());
        let settings = loaded.sync_settings();
        assert_eq!(settings.range, "Initiatives!A:F");
        assert_eq!(settings.quiescence, Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_config_create_bad_url() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let result = Config::create(&home, "https://example.com/invalid", None, None).await;
        assert!(result.is_err());
        assert!(!home.exists());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_config_load_missing_exports_dir() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path(), URL, None, None).await.unwrap();
        tokio::fs::remove_dir(config.exports()).await.unwrap();
        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("exports directory is missing"));
    }

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.app_name, "fundraise");
        assert_eq!(config.sheet_url, "");
        assert_eq!(config.range, DEFAULT_RANGE);
        assert_eq!(config.quiescence_ms, 2000);
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let original = ConfigFile {
            sheet_url: "https://docs.google.com/spreadsheets/d/test123".to_string(),
            range: "Goals!A1:F500".to_string(),
            quiescence_ms: 500,
            token_path: Some(PathBuf::from("/etc/fundraise/token.json")),
            ..ConfigFile::default()
        };
        original.save(&config_path).await.unwrap();
        let loaded = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "fundraise",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/minimal"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.range, DEFAULT_RANGE);
        assert_eq!(config.quiescence_ms, DEFAULT_QUIESCENCE_MS);
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "tiller",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_absolute_token_path_is_kept() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::create(dir.path(), URL, None, None).await.unwrap();
        assert_eq!(
            config.token_path(),
            config.root().join(".secrets").join("token.json")
        );
        config.config_file.token_path = Some(PathBuf::from("/abs/token.json"));
        assert_eq!(config.token_path(), PathBuf::from("/abs/token.json"));
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("token_path"));
        assert!(json.contains("quiescence_ms"));
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        assert_eq!(
            extract_spreadsheet_id(URL).unwrap(),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/ABC123?foo=bar").unwrap(),
            "ABC123"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/ABC123#gid=0").unwrap(),
            "ABC123"
        );
        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert!(extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/").is_err());
        assert!(extract_spreadsheet_id("").is_err());
    }
}
