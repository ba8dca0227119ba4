//! The boundary to the remote tabular store. Everything past the `Sheet` trait is an opaque
//! request/response service that reads and writes rows of text cells.

mod files;
mod sheet;
mod sheet_test_client;

use crate::{Config, Result};
use std::fmt::{Display, Formatter};
use tracing::debug;

pub(crate) use files::{restrict_permissions, TokenFile};
pub use sheet::GoogleConnector;
pub use sheet_test_client::{TestConnector, TestSheet, TestSheetState};

/// When this environment variable is set and non-empty, the in-memory `TestSheet` is used instead
/// of Google Sheets.
pub const TEST_MODE_ENV: &str = "FUNDRAISE_SYNC_IN_TEST_MODE";

/// A rectangular range of a spreadsheet, read and written as rows of text cells.
#[async_trait::async_trait]
pub trait Sheet {
    /// Returns the rows of `range`. Trailing empty rows and cells are not returned.
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>>;

    /// Removes all values from `range`.
    async fn clear(&mut self, range: &str) -> Result<()>;

    /// Writes `rows` into `range`, starting at its top-left cell.
    async fn write(&mut self, range: &str, rows: &[Vec<String>]) -> Result<()>;
}

/// Creates a ready-to-use `Sheet`. This is the "initialize the client library" step of connecting;
/// a failed attempt leaves nothing behind, so calling it again retries from scratch.
#[async_trait::async_trait]
pub trait Connector {
    async fn connect(&self) -> Result<Box<dyn Sheet + Send>>;
}

/// Whether we talk to Google or to an in-memory sheet.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    /// Reads `FUNDRAISE_SYNC_IN_TEST_MODE`: set and non-empty means `Mode::Test`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Google => f.write_str("google"),
            Mode::Test => f.write_str("test"),
        }
    }
}

/// Returns the `Connector` for `mode`.
pub fn connector(config: &Config, mode: Mode) -> Box<dyn Connector + Send + Sync> {
    debug!("Using the {mode} sheet connector");
    match mode {
        Mode::Google => Box::new(GoogleConnector::new(config)),
        Mode::Test => Box::new(TestConnector::seeded(config.spreadsheet_id())),
    }
}
