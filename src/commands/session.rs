//! The interactive session: one command per line on stdin, with the sheet synced in between.

use crate::api::{self, Mode};
use crate::args::{SessionArgs, SessionCommand, SessionLine};
use crate::commands::Out;
use crate::error::Outcome;
use crate::export::{self, Exports};
use crate::model::Initiative;
use crate::session::{ConnectionChange, Session, StderrNotifier, SyncEvent};
use crate::store::{LocalStore, NewTransaction};
use crate::{Config, Result};
use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

const PROMPT: &str = "fundraise> ";

/// Whether the session keeps reading commands.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What a session command prints, and whether the session goes on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reply {
    pub flow: Flow,
    pub text: String,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            flow: Flow::Continue,
            text: text.into(),
        }
    }
}

/// Runs the session until `quit` or the end of stdin, then waits for outstanding sync work.
pub async fn session(config: Config, mode: Mode, args: &SessionArgs) -> Result<Out<()>> {
    let mut settings = config.sync_settings();
    if let Some(ms) = args.quiescence_ms() {
        settings.quiescence = Duration::from_millis(ms);
    }
    debug!("Sync settings: {settings:?}");
    let mut session = Session::new(
        LocalStore::new(),
        settings,
        api::connector(&config, mode),
        Box::new(StderrNotifier),
    );
    let exports = Exports::new(&config);

    if args.connect() {
        let reply = execute(&mut session, &exports, &SessionCommand::Connect).await?;
        println!("{}", reply.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Unable to read from stdin")? else {
                    break;
                };
                if run_line(&mut session, &exports, &line).await == Flow::Quit {
                    break;
                }
                prompt();
            }
            event = session.next_event() => log_event(&event),
        }
    }

    if !session.is_idle() {
        println!("Waiting for the sheet to be updated...");
        for event in session.settle().await {
            log_event(&event);
        }
    }
    Ok("Session ended".into())
}

fn prompt() {
    print!("{PROMPT}");
    let _ = std::io::stdout().flush();
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::WriteStarted => debug!("Writing initiatives to the sheet"),
        SyncEvent::Written(at) => info!("Sheet updated at {}", at.to_rfc3339()),
        // Already reported through the notifier.
        SyncEvent::WriteFailed(_) => {}
    }
}

/// Parses and executes one line, printing the reply. Errors are printed, not returned, so that a
/// failed export does not end the session.
async fn run_line(session: &mut Session, exports: &Exports, line: &str) -> Flow {
    let Some(words) = shlex::split(line) else {
        println!("Unbalanced quotes in: {line}");
        return Flow::Continue;
    };
    if words.is_empty() {
        return Flow::Continue;
    }
    let parsed = match SessionLine::try_parse_from(&words) {
        Ok(parsed) => parsed,
        Err(e) => {
            // Includes the output of `help`.
            println!("{e}");
            return Flow::Continue;
        }
    };
    match execute(session, exports, parsed.command()).await {
        Ok(reply) => {
            if !reply.text.is_empty() {
                println!("{}", reply.text);
            }
            reply.flow
        }
        Err(e) => {
            error!("{e:#}");
            Flow::Continue
        }
    }
}

/// Executes one session command.
pub async fn execute(
    session: &mut Session,
    exports: &Exports,
    command: &SessionCommand,
) -> Result<Reply> {
    let reply = match command {
        SessionCommand::AddInitiative(args) => {
            match session.add_initiative(&args.name, &args.target, &args.kind) {
                Outcome::Accepted(id) => {
                    Reply::say(format!("Added initiative {id}: {}", args.name.trim()))
                }
                Outcome::Rejected(reason) => Reply::say(format!("Rejected: {reason}")),
            }
        }

        SessionCommand::AddTransaction(args) => {
            let new = NewTransaction {
                initiative_id: args.id,
                amount: args.amount.clone(),
                source: args.source.clone(),
                description: args.description.clone(),
                date: args.date.clone(),
            };
            match session.add_transaction(new) {
                Outcome::Accepted(current) => Reply::say(format!(
                    "Recorded transaction for initiative {}, raised so far: {current}",
                    args.id
                )),
                Outcome::Rejected(reason) => Reply::say(format!("Rejected: {reason}")),
            }
        }

        SessionCommand::AddCategory { label } => match session.add_category(label) {
            Outcome::Accepted(label) => Reply::say(format!("Added type '{label}'")),
            Outcome::Rejected(reason) => Reply::say(format!("Rejected: {reason}")),
        },

        SessionCommand::Connect => match session.toggle_connection().await {
            Outcome::Accepted(ConnectionChange::Connected { pulled: Some(count) }) => {
                Reply::say(format!("Connected, loaded {count} initiatives from the sheet"))
            }
            Outcome::Accepted(ConnectionChange::Connected { pulled: None }) => {
                Reply::say("Connected, the sheet has no initiatives so local data was kept")
            }
            Outcome::Accepted(ConnectionChange::Disconnected) => Reply::say("Disconnected"),
            Outcome::Rejected(reason) => Reply::say(format!("Rejected: {reason}")),
        },

        SessionCommand::List => {
            let initiatives = session.store().initiatives();
            if initiatives.is_empty() {
                Reply::say("No initiatives yet")
            } else {
                let lines: Vec<String> = initiatives.iter().map(list_line).collect();
                Reply::say(lines.join("\n"))
            }
        }

        SessionCommand::Categories => {
            Reply::say(session.store().categories().labels().join(", "))
        }

        SessionCommand::Summary => {
            let summary = session.summary();
            Reply::say(format!(
                "Target: {}  Raised: {}  Remaining: {}  Progress: {}%",
                summary.total_target,
                summary.total_current,
                summary.remaining,
                summary.progress_text(2)
            ))
        }

        SessionCommand::Export(args) => {
            let snapshot = session.snapshot();
            let path = match &args.out {
                Some(out) => export::save_to(out, &snapshot).await?,
                None => exports.save(&snapshot).await?,
            };
            Reply::say(format!("Exported to {}", path.display()))
        }

        SessionCommand::Status => {
            let status = session.status();
            let last_sync = status
                .last_sync
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            let mut text = format!("{}, last sync: {last_sync}", status.state);
            if status.busy {
                text.push_str(", writing");
            }
            if status.write_scheduled {
                text.push_str(", write scheduled");
            }
            Reply::say(text)
        }

        SessionCommand::Quit => Reply {
            flow: Flow::Quit,
            text: String::new(),
        },
    };
    Ok(reply)
}

fn list_line(initiative: &Initiative) -> String {
    format!(
        "{:>4}  {}  [{}]  {} / {} ({}%)  {} transactions",
        initiative.id(),
        initiative.name(),
        initiative.kind(),
        initiative.current(),
        initiative.target(),
        initiative.progress().round_dp(1),
        initiative.transactions().len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestConnector, TestSheet};
    use crate::args::{AddInitiativeArgs, AddTransactionArgs, ExportArgs};
    use crate::session::RecordingNotifier;
    use crate::test::TestEnv;

    fn session_for(env: &TestEnv) -> Session {
        Session::new(
            LocalStore::new(),
            env.config().sync_settings(),
            Box::new(TestConnector::seeded(env.config().spreadsheet_id())),
            Box::new(RecordingNotifier::default()),
        )
    }

    fn line(words: &[&str]) -> SessionCommand {
        SessionLine::try_parse_from(words).unwrap().command().clone()
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let env = TestEnv::new().await;
        let mut session = session_for(&env);
        let exports = Exports::new(&env.config());

        let reply = execute(
            &mut session,
            &exports,
            &SessionCommand::AddInitiative(AddInitiativeArgs {
                name: "Gala".to_string(),
                target: "1000".to_string(),
                kind: "Event".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(reply.text, "Added initiative 1: Gala");

        let reply = execute(
            &mut session,
            &exports,
            &SessionCommand::AddTransaction(AddTransactionArgs {
                id: 1,
                amount: "250".to_string(),
                source: "Ana".to_string(),
                description: None,
                date: None,
            }),
        )
        .await
        .unwrap();
        assert!(reply.text.ends_with("raised so far: 250.00"));

        let reply = execute(&mut session, &exports, &SessionCommand::List)
            .await
            .unwrap();
        assert_eq!(
            reply.text,
            "   1  Gala  [event]  250.00 / 1,000.00 (25.0%)  1 transactions"
        );
    }

    #[tokio::test]
    async fn test_rejections_are_replies() {
        let env = TestEnv::new().await;
        let mut session = session_for(&env);
        let exports = Exports::new(&env.config());
        let reply = execute(
            &mut session,
            &exports,
            &line(&["add-initiative", "Gala", "-5", "--type", "event"]),
        )
        .await
        .unwrap();
        assert!(reply.text.starts_with("Rejected:"));
        let reply = execute(&mut session, &exports, &line(&["add-category", "RAFFLE"]))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Rejected:"));
        assert_eq!(reply.flow, Flow::Continue);
    }

    #[tokio::test]
    async fn test_connect_pulls_and_summary() {
        let env = TestEnv::new().await;
        let mut session = session_for(&env);
        let exports = Exports::new(&env.config());
        let reply = execute(&mut session, &exports, &SessionCommand::Connect)
            .await
            .unwrap();
        assert_eq!(reply.text, "Connected, loaded 3 initiatives from the sheet");

        let reply = execute(&mut session, &exports, &SessionCommand::Summary)
            .await
            .unwrap();
        assert_eq!(
            reply.text,
            "Target: 63,000.00  Raised: 13,250.50  Remaining: 49,749.50  Progress: 21.03%"
        );

        let reply = execute(&mut session, &exports, &SessionCommand::Status)
            .await
            .unwrap();
        assert!(reply.text.starts_with("connected, last sync: 20"));
    }

    #[tokio::test]
    async fn test_export_and_quit() {
        let env = TestEnv::new().await;
        let mut session = session_for(&env);
        let exports = Exports::new(&env.config());
        let reply = execute(
            &mut session,
            &exports,
            &SessionCommand::Export(ExportArgs { out: None }),
        )
        .await
        .unwrap();
        assert!(reply.text.contains("fundraising-tracker-"));
        let mut entries = std::fs::read_dir(env.config().exports()).unwrap();
        assert!(entries.next().is_some());

        let reply = execute(&mut session, &exports, &SessionCommand::Quit)
            .await
            .unwrap();
        assert_eq!(reply.flow, Flow::Quit);
        assert_eq!(TestSheet::get_state(env.config().spreadsheet_id()).writes, 0);
    }

    #[tokio::test]
    async fn test_run_line_handles_bad_input() {
        let env = TestEnv::new().await;
        let mut session = session_for(&env);
        let exports = Exports::new(&env.config());
        assert_eq!(run_line(&mut session, &exports, "").await, Flow::Continue);
        assert_eq!(
            run_line(&mut session, &exports, "add-initiative \"Gala").await,
            Flow::Continue
        );
        assert_eq!(run_line(&mut session, &exports, "nope").await, Flow::Continue);
        assert_eq!(
            run_line(&mut session, &exports, "add-initiative 'Spring Gala' 500").await,
            Flow::Continue
        );
        assert_eq!(session.store().initiatives()[0].name(), "Spring Gala");
        assert_eq!(run_line(&mut session, &exports, "quit").await, Flow::Quit);
    }
}
