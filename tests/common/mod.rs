//! Scripted stand-ins for the external capabilities, shared by the
//! integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use opsrelay::credentials::{Credential, CredentialKind, CredentialStore};
use opsrelay::errors::{ConnectError, OpsError, OpsResult};
use opsrelay::handlers::Capabilities;
use opsrelay::logsink::{EventLog, EventRecord};
use opsrelay::netconf::{DeviceConnector, DeviceSession, RpcReply, RpcRequest};
use opsrelay::notify::ChatSink;

/// Chat sink that records every delivered message and hands back
/// sequential correlation ids.
pub struct RecordingChat {
    pub messages: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    /// A sink whose deliveries always fail.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn contents(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, content)| content.clone())
            .collect()
    }
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send(&self, content: &str, chat_id: &str) -> OpsResult<String> {
        if self.fail {
            return Err(OpsError::ChatRelay("relay unreachable".into()));
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push((chat_id.to_string(), content.to_string()));
        Ok(format!("m{}", messages.len()))
    }
}

/// In-memory credential store.
pub struct MockCredentials {
    devices: HashMap<String, Credential>,
    servers: HashMap<String, Credential>,
}

impl MockCredentials {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            devices: HashMap::new(),
            servers: HashMap::new(),
        })
    }

    pub fn with_device(device: &str) -> Arc<Self> {
        Self::with_devices(&[device])
    }

    pub fn with_devices(names: &[&str]) -> Arc<Self> {
        let devices = names
            .iter()
            .map(|name| {
                (
                    (*name).to_string(),
                    Credential {
                        username: "ops".into(),
                        password: "pw".into(),
                    },
                )
            })
            .collect();
        Arc::new(Self {
            devices,
            servers: HashMap::new(),
        })
    }

    pub fn with_device_and_server(device: &str, server: &str) -> Arc<Self> {
        let mut devices = HashMap::new();
        devices.insert(
            device.to_string(),
            Credential {
                username: "ops".into(),
                password: "pw".into(),
            },
        );
        let mut servers = HashMap::new();
        servers.insert(
            server.to_string(),
            Credential {
                username: "ftp".into(),
                password: "ftppw".into(),
            },
        );
        Arc::new(Self { devices, servers })
    }
}

#[async_trait]
impl CredentialStore for MockCredentials {
    async fn resolve(
        &self,
        kind: CredentialKind,
        identifier: &str,
    ) -> OpsResult<Option<Credential>> {
        let table = match kind {
            CredentialKind::Device => &self.devices,
            CredentialKind::Server => &self.servers,
        };
        Ok(table.get(identifier).cloned())
    }
}

/// Session that answers `run`/`rpc` calls from prepared scripts and counts
/// `close` calls through a shared handle.
pub struct ScriptedSession {
    run_results: VecDeque<Result<String, OpsError>>,
    rpc_results: VecDeque<Result<RpcReply, OpsError>>,
    commands: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

/// Observer handles for a [`ScriptedSession`] that outlive the session.
#[derive(Clone)]
pub struct SessionProbe {
    pub commands: Arc<Mutex<Vec<String>>>,
    pub closes: Arc<AtomicUsize>,
}

impl SessionProbe {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

impl ScriptedSession {
    pub fn new(
        run_results: Vec<Result<String, OpsError>>,
        rpc_results: Vec<Result<RpcReply, OpsError>>,
    ) -> (Box<Self>, SessionProbe) {
        let probe = SessionProbe {
            commands: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        let session = Box::new(Self {
            run_results: run_results.into(),
            rpc_results: rpc_results.into(),
            commands: Arc::clone(&probe.commands),
            closes: Arc::clone(&probe.closes),
        });
        (session, probe)
    }
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    async fn run(&mut self, command: &str, _timeout: Duration) -> Result<String, OpsError> {
        self.commands.lock().unwrap().push(command.to_string());
        self.run_results
            .pop_front()
            .unwrap_or_else(|| Err(OpsError::RemoteCommand("script exhausted".into())))
    }

    async fn rpc(&mut self, request: RpcRequest) -> Result<RpcReply, OpsError> {
        self.commands.lock().unwrap().push(format!("{:?}", request));
        self.rpc_results
            .pop_front()
            .unwrap_or_else(|| Err(OpsError::RemoteCommand("script exhausted".into())))
    }

    async fn close(self: Box<Self>) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector that hands out prepared sessions, or refuses every attempt.
pub struct MockConnector {
    sessions: Mutex<VecDeque<Box<dyn DeviceSession>>>,
    failure: Option<ConnectError>,
    pub attempts: AtomicUsize,
}

impl MockConnector {
    pub fn with_sessions(sessions: Vec<Box<dyn DeviceSession>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            failure: None,
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn refusing(failure: ConnectError) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(VecDeque::new()),
            failure: Some(failure),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceConnector for MockConnector {
    async fn connect(
        &self,
        _host: &str,
        _username: &str,
        _password: &str,
    ) -> Result<Box<dyn DeviceSession>, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ConnectError::Refused)
    }
}

/// Event log that records every write.
pub struct RecordingLog {
    pub records: Mutex<Vec<(String, EventRecord)>>,
}

impl RecordingLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
        })
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl EventLog for RecordingLog {
    async fn write(&self, table: &str, record: &EventRecord) -> OpsResult<()> {
        self.records
            .lock()
            .unwrap()
            .push((table.to_string(), record.clone()));
        Ok(())
    }
}

pub fn capabilities(
    chat: Arc<RecordingChat>,
    credentials: Arc<MockCredentials>,
    connector: Arc<MockConnector>,
    log: Arc<RecordingLog>,
) -> Capabilities {
    Capabilities {
        chat,
        credentials,
        connector,
        log,
    }
}

/// Poll until a detached job reaches the expected state.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {}", what);
}
