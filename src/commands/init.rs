use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its subdirectories and:
/// - Creates an initial `config.json` file using `sheet_url` along with default settings
/// - Copies `token_file`, if given, to `.secrets/token.json`
///
/// # Errors
/// - Returns an error if the URL is not a Google Sheets URL or any file operations fail.
pub async fn init(
    home: &Path,
    sheet_url: &str,
    token_file: Option<&Path>,
    range: Option<&str>,
) -> Result<Out<()>> {
    let config = Config::create(home, sheet_url, token_file, range)
        .await
        .context("Unable to create the home directory and config")?;
    let mut message = format!(
        "Successfully created the fundraise directory at {}",
        config.root().display()
    );
    if token_file.is_none() {
        message.push_str(&format!(
            ". Put your access token in {} before connecting",
            config.token_path().display()
        ));
    }
    Ok(message.into())
}
