//! These structs provide the CLI interface for the fundraise CLI, and the commands accepted inside
//! an interactive session.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// fundraise: Track fundraising initiatives and mirror them to a Google sheet.
///
/// Initiatives and the contributions made toward them are kept in memory while a session runs.
/// When the session is connected to your sheet, it loads the initiatives from the sheet and then
/// writes the whole collection back a short while after each change.
///
/// The sheet is accessed with an access token that you obtain yourself and hand to `init`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration file.
    ///
    /// - Decide what directory you want to store data in and pass this as --home. By default it
    ///   will be $HOME/fundraise.
    ///
    /// - Get the URL of your Google Sheet and pass it as --sheet-url.
    ///
    /// - Pass a JSON file holding an "access_token" for the Google Sheets API as --token-file. It
    ///   is copied to .secrets/token.json in the home directory.
    Init(InitArgs),
    /// Start an interactive session. Type `help` once it is running to see the commands.
    Session(SessionArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where fundraise configuration and exports are held. Defaults to ~/fundraise
    #[arg(long, env = "FUNDRAISE_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `fundraise init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// A JSON file with the access token, e.g. {"access_token": "ya29..."}.
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// The range of the sheet holding the initiatives. Defaults to Sheet1!A:F
    #[arg(long)]
    range: Option<String>,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        token_file: Option<PathBuf>,
        range: Option<String>,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            token_file,
            range,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn token_file(&self) -> Option<&Path> {
        self.token_file.as_deref()
    }

    pub fn range(&self) -> Option<&str> {
        self.range.as_deref()
    }
}

/// (Not shown): Args for the `fundraise session` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct SessionArgs {
    /// Connect to the sheet as soon as the session starts.
    #[arg(long)]
    connect: bool,

    /// Overrides the quiescence window from the config file, in milliseconds.
    #[arg(long)]
    quiescence_ms: Option<u64>,
}

impl SessionArgs {
    pub fn new(connect: bool, quiescence_ms: Option<u64>) -> Self {
        Self {
            connect,
            quiescence_ms,
        }
    }

    pub fn connect(&self) -> bool {
        self.connect
    }

    pub fn quiescence_ms(&self) -> Option<u64> {
        self.quiescence_ms
    }
}

/// One line typed into an interactive session.
#[derive(Debug, Parser, Clone)]
#[command(no_binary_name = true, name = "session", disable_version_flag = true)]
pub struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

impl SessionLine {
    pub fn command(&self) -> &SessionCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone, Eq, PartialEq)]
pub enum SessionCommand {
    /// Add an initiative, e.g. add-initiative "Spring Gala" 50000 --type event
    AddInitiative(AddInitiativeArgs),
    /// Record a contribution, e.g. add-transaction 1 250 "Rotary Club" --description tickets
    AddTransaction(AddTransactionArgs),
    /// Add an initiative type
    AddCategory {
        label: String,
    },
    /// Connect to the sheet, or disconnect when connected
    Connect,
    /// List the initiatives
    List,
    /// List the initiative types
    Categories,
    /// Show the totals
    Summary,
    /// Save a JSON snapshot of everything
    Export(ExportArgs),
    /// Show the connection and sync state
    Status,
    /// Wait for pending writes and leave the session
    #[command(alias = "exit")]
    Quit,
}

#[derive(ClapArgs, Debug, Clone, Eq, PartialEq)]
pub struct AddInitiativeArgs {
    pub name: String,
    #[arg(allow_hyphen_values = true)]
    pub target: String,
    #[arg(long = "type", default_value = "sponsorship")]
    pub kind: String,
}

#[derive(ClapArgs, Debug, Clone, Eq, PartialEq)]
pub struct AddTransactionArgs {
    pub id: u64,
    #[arg(allow_hyphen_values = true)]
    pub amount: String,
    pub source: String,
    #[arg(long)]
    pub description: Option<String>,
    /// YYYY-MM-DD, defaults to today
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, Eq, PartialEq)]
pub struct ExportArgs {
    /// Write to this file instead of the exports directory
    #[arg(long)]
    pub out: Option<PathBuf>,
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("fundraise"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or FUNDRAISE_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("fundraise")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
