//! Test doubles for the daemon directory and wire protocol

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use sphinxglue::{Connector, DaemonClient, Directory, Error, MailboxInfo, Result, StatementReply};

/// One row of the fake `latest` side table.
#[derive(Debug, Clone)]
pub struct LatestRow {
    pub id: u32,
    pub mboxname: String,
    pub uidvalidity: u32,
    pub uid: u32,
}

/// Shared state behind every client the fake connector hands out.
#[derive(Debug, Default)]
pub struct DaemonState {
    /// Every statement executed, in order.
    pub statements: Vec<String>,
    /// Canned reply to the main MATCH query.
    pub match_rows: Vec<Vec<String>>,
    /// Canned reply to CALL SNIPPETS.
    pub snippet_rows: Vec<Vec<String>>,
    pub latest_rows: Vec<LatestRow>,
    /// Largest document id already in the realtime index.
    pub doc_max_id: u32,
    pub commits: u32,
    /// Fail any statement containing this substring with an IO error.
    pub fail_substring: Option<String>,
}

pub struct FakeDirectory {
    pub endpoint: Mutex<String>,
    pub resolves: AtomicU32,
    pub stops: AtomicU32,
}

impl FakeDirectory {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: Mutex::new(endpoint.to_string()),
            resolves: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        })
    }

    pub fn set_endpoint(&self, endpoint: &str) {
        *self.endpoint.lock().unwrap() = endpoint.to_string();
    }
}

impl Directory for FakeDirectory {
    fn resolve(&self, _mailbox: &str) -> Result<String> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoint.lock().unwrap().clone())
    }

    fn request_stop(&self, _mailbox: &str) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeConnector {
    pub state: Arc<Mutex<DaemonState>>,
    pub connects: AtomicU32,
}

impl FakeConnector {
    pub fn new(state: Arc<Mutex<DaemonState>>) -> Arc<Self> {
        Arc::new(Self {
            state,
            connects: AtomicU32::new(0),
        })
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _endpoint: &str) -> Result<Box<dyn DaemonClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClient {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeClient {
    state: Arc<Mutex<DaemonState>>,
}

impl DaemonClient for FakeClient {
    fn execute(&mut self, statement: &str) -> Result<StatementReply> {
        let mut state = self.state.lock().unwrap();

        if let Some(needle) = &state.fail_substring {
            if statement.contains(needle.as_str()) {
                return Err(Error::Io("injected failure".to_string()));
            }
        }

        state.statements.push(statement.to_string());

        if statement.starts_with("SELECT max(id) FROM rt") {
            let max = state.doc_max_id;
            return Ok(StatementReply::Rows(vec![vec![max.to_string()]]));
        }

        if statement.starts_with("SELECT max(id) FROM latest") {
            let max = state.latest_rows.iter().map(|r| r.id).max().unwrap_or(0);
            return Ok(StatementReply::Rows(vec![vec![max.to_string()]]));
        }

        if let Some(rest) = statement.strip_prefix("SELECT id,mboxname,uid FROM latest WHERE uidvalidity=") {
            let uidvalidity = parse_leading_u32(rest);
            let rows = state
                .latest_rows
                .iter()
                .filter(|r| r.uidvalidity == uidvalidity)
                .map(|r| vec![r.id.to_string(), r.mboxname.clone(), r.uid.to_string()])
                .collect();
            return Ok(StatementReply::Rows(rows));
        }

        if let Some(rest) = statement.strip_prefix("SELECT mboxname,uid FROM latest WHERE uidvalidity=") {
            let uidvalidity = parse_leading_u32(rest);
            let rows = state
                .latest_rows
                .iter()
                .filter(|r| r.uidvalidity == uidvalidity)
                .map(|r| vec![r.mboxname.clone(), r.uid.to_string()])
                .collect();
            return Ok(StatementReply::Rows(rows));
        }

        if let Some(rest) = statement.strip_prefix("INSERT INTO latest (id,mboxname,uidvalidity,uid) VALUES (") {
            let values: Vec<&str> = rest.trim_end_matches(')').split(',').collect();
            assert_eq!(values.len(), 4, "unexpected latest INSERT shape: {}", statement);
            state.latest_rows.push(LatestRow {
                id: values[0].parse().unwrap(),
                mboxname: values[1].trim_matches('\'').to_string(),
                uidvalidity: values[2].parse().unwrap(),
                uid: values[3].parse().unwrap(),
            });
            return Ok(StatementReply::Affected(1));
        }

        if let Some(rest) = statement.strip_prefix("UPDATE latest SET uid=") {
            let uid = parse_leading_u32(rest);
            let id = parse_leading_u32(rest.split_once("WHERE id=").expect("no WHERE id").1);
            for row in &mut state.latest_rows {
                if row.id == id {
                    row.uid = uid;
                }
            }
            return Ok(StatementReply::Affected(1));
        }

        if statement.starts_with("INSERT INTO rt ") {
            return Ok(StatementReply::Affected(1));
        }

        if statement == "COMMIT" {
            state.commits += 1;
            return Ok(StatementReply::Affected(0));
        }

        if statement.starts_with("SELECT msgkey FROM rt WHERE MATCH(") {
            return Ok(StatementReply::Rows(state.match_rows.clone()));
        }

        if statement.starts_with("CALL SNIPPETS(") {
            return Ok(StatementReply::Rows(state.snippet_rows.clone()));
        }

        Ok(StatementReply::Affected(0))
    }

    fn close(&mut self) {}
}

fn parse_leading_u32(text: &str) -> u32 {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

pub fn mailbox(name: &str, uidvalidity: u32, last_uid: u32) -> MailboxInfo {
    MailboxInfo {
        name: name.to_string(),
        uidvalidity,
        last_uid,
    }
}

/// Directory + connector + shared daemon state, wired together.
pub fn fixture() -> (
    Arc<FakeDirectory>,
    Arc<FakeConnector>,
    Arc<Mutex<DaemonState>>,
) {
    let _ = env_logger::builder().is_test(true).try_init();

    let state = Arc::new(Mutex::new(DaemonState::default()));
    let directory = FakeDirectory::new("sphinx-a.sock");
    let connector = FakeConnector::new(Arc::clone(&state));
    (directory, connector, state)
}
