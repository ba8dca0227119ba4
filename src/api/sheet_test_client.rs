//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.
//!
//! Sheets are kept in a process-wide registry keyed by spreadsheet ID. A `TestSheet` is only a
//! handle into that registry, so tests can inspect what was written, or make the next request fail,
//! while a session holds the client.

use crate::api::{Connector, Sheet};
use crate::Result;
use anyhow::bail;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tracing::trace;

static SHEETS: OnceLock<Mutex<HashMap<String, TestSheetState>>> = OnceLock::new();

fn registry() -> MutexGuard<'static, HashMap<String, TestSheetState>> {
    SHEETS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Everything an in-memory sheet holds, plus switches that make requests fail.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TestSheetState {
    pub rows: Vec<Vec<String>>,
    pub fail_connect: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// How long each write takes.
    pub write_delay: Option<Duration>,
    pub connects: usize,
    pub reads: usize,
    pub clears: usize,
    pub writes: usize,
}

/// An implementation of the `Sheet` trait that does not use Google sheets.
#[derive(Debug, Clone)]
pub struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// A copy of the state of the sheet registered as `spreadsheet_id`, or an empty state.
    pub fn get_state(spreadsheet_id: &str) -> TestSheetState {
        registry()
            .get(spreadsheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_state(spreadsheet_id: &str, state: TestSheetState) {
        registry().insert(spreadsheet_id.to_string(), state);
    }

    /// Applies `f` to the state of `spreadsheet_id`, creating it if needed.
    pub fn update_state(spreadsheet_id: &str, f: impl FnOnce(&mut TestSheetState)) {
        let mut sheets = registry();
        f(sheets.entry(spreadsheet_id.to_string()).or_default());
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        trace!("test sheet get {range}");
        tokio::task::yield_now().await;
        let mut sheets = registry();
        let state = sheets.entry(self.spreadsheet_id.clone()).or_default();
        state.reads += 1;
        if state.fail_reads {
            bail!("The test sheet refused to read {range}");
        }
        Ok(trim_trailing_empty(&state.rows))
    }

    async fn clear(&mut self, range: &str) -> Result<()> {
        trace!("test sheet clear {range}");
        tokio::task::yield_now().await;
        let mut sheets = registry();
        let state = sheets.entry(self.spreadsheet_id.clone()).or_default();
        if state.fail_writes {
            bail!("The test sheet refused to clear {range}");
        }
        state.clears += 1;
        // Whole rows are removed from the first row of the range down; columns are ignored.
        state.rows.truncate(first_row(range).saturating_sub(1));
        Ok(())
    }

    async fn write(&mut self, range: &str, rows: &[Vec<String>]) -> Result<()> {
        trace!("test sheet write {} rows to {range}", rows.len());
        let delay = registry()
            .get(&self.spreadsheet_id)
            .and_then(|state| state.write_delay);
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        let mut sheets = registry();
        let state = sheets.entry(self.spreadsheet_id.clone()).or_default();
        if state.fail_writes {
            bail!("The test sheet refused to write {range}");
        }
        state.writes += 1;
        // Values land at the top-left of the range and overlay whatever is already there.
        for (row_ix, row) in rows.iter().enumerate() {
            if state.rows.len() <= row_ix {
                state.rows.push(Vec::new());
            }
            let existing = &mut state.rows[row_ix];
            for (col_ix, value) in row.iter().enumerate() {
                if existing.len() <= col_ix {
                    existing.resize(col_ix + 1, String::new());
                }
                existing[col_ix] = value.clone();
            }
        }
        Ok(())
    }
}

/// The 1-based row a range such as `Sheet1!A3:F` starts at. Whole columns start at row 1.
fn first_row(range: &str) -> usize {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    let start = cells.split(':').next().unwrap_or(cells);
    start
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .unwrap_or(1)
}

/// Hands out `TestSheet` clients for one spreadsheet ID.
#[derive(Debug, Clone)]
pub struct TestConnector {
    spreadsheet_id: String,
}

impl TestConnector {
    /// A connector for `spreadsheet_id`. The sheet starts out empty unless it is already registered.
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        let spreadsheet_id = spreadsheet_id.into();
        TestSheet::update_state(&spreadsheet_id, |_| {});
        Self { spreadsheet_id }
    }

    /// Like `new`, but a sheet that is not yet registered is seeded with a few initiatives.
    pub fn seeded(spreadsheet_id: impl Into<String>) -> Self {
        let spreadsheet_id = spreadsheet_id.into();
        {
            let mut sheets = registry();
            if !sheets.contains_key(&spreadsheet_id) {
                let rows = match load_csv(SEED_DATA) {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::error!("Unable to load the test sheet seed data: {e:#}");
                        Vec::new()
                    }
                };
                sheets.insert(
                    spreadsheet_id.clone(),
                    TestSheetState {
                        rows,
                        ..Default::default()
                    },
                );
            }
        }
        Self { spreadsheet_id }
    }
}

#[async_trait::async_trait]
impl Connector for TestConnector {
    async fn connect(&self) -> Result<Box<dyn Sheet + Send>> {
        tokio::task::yield_now().await;
        let fail = {
            let mut sheets = registry();
            let state = sheets.entry(self.spreadsheet_id.clone()).or_default();
            state.connects += 1;
            state.fail_connect
        };
        if fail {
            bail!("Unable to initialize the test sheet client");
        }
        Ok(Box::new(TestSheet::new(self.spreadsheet_id.clone())))
    }
}

/// Drops empty rows and cells from the ends, the way the Sheets API does.
fn trim_trailing_empty(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut trimmed: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let len = row
                .iter()
                .rposition(|v| !v.is_empty())
                .map(|ix| ix + 1)
                .unwrap_or(0);
            row[..len].to_vec()
        })
        .collect();
    while trimmed.last().is_some_and(|row| row.is_empty()) {
        trimmed.pop();
    }
    trimmed
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed initiative data.
const SEED_DATA: &str = r##"ID,Name,Target,Current,Type,Transactions
1,Spring Gala,50000,12500,event,"[{""date"":""2024-03-01"",""amount"":10000,""source"":""Rotary Club"",""description"":""Table sponsorship""},{""date"":""2024-03-05"",""amount"":2500,""source"":""Walk-ins"",""description"":""No description""}]"
2,Raffle Drive,10000,750.5,raffle,"[{""date"":""2024-02-14"",""amount"":750.5,""source"":""Ticket booth"",""description"":""Week one sales""}]"
3,Team Shirts,3000,0,merchandise,[]
"##;
