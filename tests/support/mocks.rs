#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use steward::control::auth::{AccessToken, AuthError, CredentialProvider};
use steward::control::client::{ControlPlane, ControlPlaneError, WorkloadAction};
use steward::domain::{LifecycleState, ReadinessInfo, ReplyChannel, ServerTarget};
use steward::notify::{Notifier, NotifyError};
use steward::probe::{ProbeError, ReadinessProbe};

pub fn target(alias: &str) -> ServerTarget {
    ServerTarget {
        alias: alias.to_string(),
        group_name: "mc-main".to_string(),
        probe_host: "mc.example.net".to_string(),
        probe_port: 25565,
    }
}

pub fn readiness(version: &str, online: u32, max: u32) -> ReadinessInfo {
    ReadinessInfo {
        version_label: version.to_string(),
        players_online: online,
        players_max: max,
    }
}

/// Credential provider that either always succeeds or always fails, counting
/// acquisitions either way.
pub struct ScriptedCredentials {
    fail: bool,
    calls: AtomicU32,
}

impl ScriptedCredentials {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for ScriptedCredentials {
    async fn acquire(&self) -> Result<AccessToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(AuthError::Rejected { status: 401 })
        } else {
            Ok(AccessToken::new("test-token"))
        }
    }
}

/// Control plane that records invocations and serves one canned query state.
pub struct ScriptedControlPlane {
    invoke_fail: bool,
    query_state: Option<LifecycleState>,
    invocations: Mutex<Vec<(String, WorkloadAction)>>,
    query_calls: AtomicU32,
}

impl ScriptedControlPlane {
    pub fn accepting(query_state: Option<LifecycleState>) -> Self {
        Self {
            invoke_fail: false,
            query_state,
            invocations: Mutex::new(Vec::new()),
            query_calls: AtomicU32::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            invoke_fail: true,
            query_state: None,
            invocations: Mutex::new(Vec::new()),
            query_calls: AtomicU32::new(0),
        }
    }

    pub fn recorded_invocations(&self) -> Vec<(String, WorkloadAction)> {
        self.invocations.lock().expect("invocation log").clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().expect("invocation log").len()
    }

    pub fn query_count(&self) -> u32 {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn invoke(
        &self,
        target: &ServerTarget,
        action: WorkloadAction,
        _token: &AccessToken,
    ) -> Result<(), ControlPlaneError> {
        self.invocations
            .lock()
            .expect("invocation log")
            .push((target.alias.clone(), action));
        if self.invoke_fail {
            Err(ControlPlaneError::Status {
                operation: "invoke",
                status: 500,
            })
        } else {
            Ok(())
        }
    }

    async fn query(
        &self,
        target: &ServerTarget,
        _token: &AccessToken,
    ) -> Result<LifecycleState, ControlPlaneError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        match &self.query_state {
            Some(state) => Ok(state.clone()),
            None => Err(ControlPlaneError::WorkloadMissing {
                group: target.group_name.clone(),
            }),
        }
    }
}

/// Probe fed from a script of outcomes; once the script is exhausted every
/// further attempt fails.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Option<ReadinessInfo>>>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn always_failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_script(steps: Vec<Option<ReadinessInfo>>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessProbe for ScriptedProbe {
    async fn probe(&self, _host: &str, _port: u16) -> Result<ReadinessInfo, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().expect("probe script").pop_front() {
            Some(Some(info)) => Ok(info),
            _ => Err(ProbeError::Timeout(Duration::from_millis(10))),
        }
    }
}

/// Notifier that records every delivery instead of talking to a chat API.
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("message log")
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.messages.lock().expect("message log").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel: &ReplyChannel, text: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .expect("message log")
            .push((channel.as_str().to_string(), text.to_string()));
        Ok(())
    }
}
