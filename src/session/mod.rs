//! The `Session` owns the local store and its connection to the sheet.
//!
//! While connected, every accepted change to the initiatives (re)arms a quiescence timer. When the
//! timer expires, the whole collection is written to the sheet by a spawned task. The session does
//! not run anything by itself: the caller drives the timer and the write task by awaiting
//! `Session::next_event`, typically in a `tokio::select!` next to its input source.

mod debounce;

use crate::api::{Connector, Sheet};
use crate::config::{DEFAULT_QUIESCENCE_MS, DEFAULT_RANGE};
use crate::error::{Outcome, Rejection};
use crate::export::{self, Snapshot};
use crate::model::{grid, Amount};
use crate::store::{LocalStore, NewTransaction, Summary};
use crate::{sync, Result};
use chrono::{DateTime, Utc};
use debounce::Debounce;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

type SharedSheet = Arc<Mutex<Box<dyn Sheet + Send>>>;

/// How the session talks to the sheet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SyncSettings {
    /// The A1 range that holds the header row and the initiatives.
    pub range: String,
    /// How long the initiatives must go unchanged before they are written.
    pub quiescence: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            range: DEFAULT_RANGE.to_string(),
            quiescence: Duration::from_millis(DEFAULT_QUIESCENCE_MS),
        }
    }
}

/// Receives the one user-facing notice produced by each failed sync operation.
pub trait Notifier: Send {
    fn notify(&self, message: &str);
}

/// Prints notices to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("! {message}");
    }
}

/// Keeps notices in memory. Clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    messages: Arc<StdMutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

serde_plain::derive_display_from_serialize!(ConnectionState);
serde_plain::derive_fromstr_from_deserialize!(ConnectionState);

/// What a successful connection toggle did.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnectionChange {
    /// Now connected. `pulled` is the number of initiatives loaded from the sheet, or `None` when
    /// the sheet had none and local data was kept.
    Connected { pulled: Option<usize> },
    Disconnected,
}

/// Progress of the background write.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SyncEvent {
    /// The quiescence timer expired and a write of the current initiatives was started.
    WriteStarted,
    /// A write completed at the given time.
    Written(DateTime<Utc>),
    /// A write failed. The notice has already been sent.
    WriteFailed(String),
}

/// A point-in-time view of the connection, for display.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Status {
    pub state: ConnectionState,
    pub busy: bool,
    pub write_scheduled: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

enum Wake {
    Finished(std::result::Result<Result<DateTime<Utc>>, JoinError>),
    Expired,
}

/// The context of one user session. See the module documentation.
pub struct Session {
    store: LocalStore,
    settings: SyncSettings,
    connector: Box<dyn Connector + Send + Sync>,
    client: Option<SharedSheet>,
    connected: bool,
    last_sync: Option<DateTime<Utc>>,
    debounce: Debounce,
    in_flight: Option<JoinHandle<Result<DateTime<Utc>>>>,
    notifier: Box<dyn Notifier>,
}

impl Session {
    pub fn new(
        store: LocalStore,
        settings: SyncSettings,
        connector: Box<dyn Connector + Send + Sync>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let debounce = Debounce::new(settings.quiescence);
        Self {
            store,
            settings,
            connector,
            client: None,
            connected: false,
            last_sync: None,
            debounce,
            in_flight: None,
            notifier,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// A write is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Nothing is being written and no write is scheduled.
    pub fn is_idle(&self) -> bool {
        !self.is_busy() && self.debounce.is_idle()
    }

    pub fn status(&self) -> Status {
        Status {
            state: self.state(),
            busy: self.is_busy(),
            write_scheduled: !self.debounce.is_idle(),
            last_sync: self.last_sync,
        }
    }

    pub fn summary(&self) -> Summary {
        self.store.summary()
    }

    pub fn snapshot(&self) -> Snapshot {
        export::snapshot(&self.store, self.last_sync, Utc::now())
    }

    pub fn add_initiative(&mut self, name: &str, target: &str, kind: &str) -> Outcome<u64> {
        let outcome = self.store.add_initiative(name, target, kind);
        if outcome.is_accepted() {
            self.schedule_write();
        }
        outcome
    }

    /// Returns the new `current` of the initiative.
    pub fn add_transaction(&mut self, new: NewTransaction) -> Outcome<Amount> {
        let outcome = self.store.add_transaction(new);
        if outcome.is_accepted() {
            self.schedule_write();
        }
        outcome
    }

    /// Categories are not stored in the sheet, so this never schedules a write.
    pub fn add_category(&mut self, label: &str) -> Outcome<String> {
        self.store.add_category(label)
    }

    /// Connects when disconnected and disconnects when connected.
    ///
    /// Connecting creates the sheet client if there is none yet, then pulls the initiatives. When
    /// the sheet has initiatives they replace the local ones. Any failure sends one notice and
    /// leaves the session disconnected with its data untouched; the client is only kept once it
    /// was created successfully, so the next attempt retries from where this one failed.
    ///
    /// Disconnecting cancels a scheduled write but lets a running one finish.
    pub async fn toggle_connection(&mut self) -> Outcome<ConnectionChange> {
        if self.is_busy() {
            return Outcome::Rejected(Rejection::Busy);
        }
        if self.connected {
            self.disconnect();
            return Outcome::Accepted(ConnectionChange::Disconnected);
        }
        match self.connect().await {
            Ok(pulled) => Outcome::Accepted(ConnectionChange::Connected { pulled }),
            Err(e) => {
                let message = format!("Unable to connect: {e:#}");
                self.report(&message);
                Outcome::Rejected(Rejection::Remote(message))
            }
        }
    }

    async fn connect(&mut self) -> Result<Option<usize>> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let sheet = self.connector.connect().await?;
                let client: SharedSheet = Arc::new(Mutex::new(sheet));
                self.client = Some(client.clone());
                client
            }
        };

        let pulled = {
            let mut sheet = client.lock().await;
            sync::pull(&mut **sheet, &self.settings.range).await?
        };

        let count = match pulled {
            Some(initiatives) => {
                let count = initiatives.len();
                self.store.replace_initiatives(initiatives);
                self.last_sync = Some(Utc::now());
                Some(count)
            }
            None => None,
        };
        self.connected = true;
        info!("Connected to the sheet");
        Ok(count)
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.debounce.cancel();
        info!("Disconnected from the sheet");
    }

    fn schedule_write(&mut self) {
        if self.connected {
            self.debounce.arm();
            debug!("Sync scheduled in {:?}", self.debounce.window());
        }
    }

    /// Waits for the next thing to happen to the background write: the timer expiring or a
    /// running write completing. Never completes while the session is idle.
    pub async fn next_event(&mut self) -> SyncEvent {
        loop {
            let deadline = self.debounce.deadline();
            let in_flight = &mut self.in_flight;
            let wake = tokio::select! {
                joined = async move {
                    match in_flight.as_mut() {
                        Some(handle) => handle.await,
                        None => std::future::pending().await,
                    }
                } => Wake::Finished(joined),
                _ = async move {
                    match deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => Wake::Expired,
            };

            match wake {
                Wake::Finished(joined) => {
                    self.in_flight = None;
                    let event = self.finish_write(joined);
                    if self.debounce.take_pending() {
                        self.start_write();
                    }
                    return event;
                }
                Wake::Expired => {
                    self.debounce.expire();
                    if self.is_busy() {
                        debug!("A write is still running, the next one will follow it");
                        self.debounce.mark_pending();
                        continue;
                    }
                    if let Some(event) = self.start_write() {
                        return event;
                    }
                }
            }
        }
    }

    /// Drives the timer and writes until the session is idle, returning what happened.
    pub async fn settle(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while !self.is_idle() {
            events.push(self.next_event().await);
        }
        events
    }

    fn start_write(&mut self) -> Option<SyncEvent> {
        if !self.connected {
            return None;
        }
        let client = self.client.clone()?;
        let rows = match grid::to_rows(self.store.initiatives()) {
            Ok(rows) => rows,
            Err(e) => {
                let message = format!("Sync failed: {e:#}");
                self.report(&message);
                return Some(SyncEvent::WriteFailed(message));
            }
        };
        let range = self.settings.range.clone();
        debug!("Writing {} initiatives to {range}", rows.len() - 1);
        self.in_flight = Some(tokio::spawn(async move {
            let mut sheet = client.lock().await;
            sync::push(&mut **sheet, &range, &rows).await?;
            Ok(Utc::now())
        }));
        Some(SyncEvent::WriteStarted)
    }

    fn finish_write(
        &mut self,
        joined: std::result::Result<Result<DateTime<Utc>>, JoinError>,
    ) -> SyncEvent {
        let message = match joined {
            Ok(Ok(written_at)) => {
                self.last_sync = Some(written_at);
                return SyncEvent::Written(written_at);
            }
            Ok(Err(e)) => format!("Sync failed: {e:#}"),
            Err(e) => format!("Sync failed, the write task stopped: {e}"),
        };
        self.report(&message);
        SyncEvent::WriteFailed(message)
    }

    fn report(&self, message: &str) {
        error!("{message}");
        self.notifier.notify(message);
    }
}
