#![forbid(unsafe_code)]

use std::fmt;

/// Chat-facing commands. The command layer rejects anything outside this set
/// before an [`ActionRequest`] is ever built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Status,
}

impl Action {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque destination for outgoing chat messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyChannel(String);

impl ReplyChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One controllable workload, defined entirely by static configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerTarget {
    /// Short name users supply in the chat command.
    pub alias: String,
    /// Workload group name within the configured control-plane scope.
    pub group_name: String,
    pub probe_host: String,
    pub probe_port: u16,
}

/// One user-initiated unit of work. Lives only for the duration of the
/// orchestration run; never persisted, never retried as a unit.
#[derive(Clone, Debug)]
pub struct ActionRequest {
    pub action: Action,
    pub target: ServerTarget,
    pub channel: ReplyChannel,
}

/// Control-plane reported lifecycle phase. The provider string is open-ended;
/// unrecognised values are carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Running,
    Waiting,
    Terminated,
    Other(String),
}

impl Phase {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Running" => Self::Running,
            "Waiting" => Self::Waiting,
            "Terminated" => Self::Terminated,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Waiting => "Waiting",
            Self::Terminated => "Terminated",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the control plane's view of a workload. Produced fresh on
/// every query; never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleState {
    pub phase: Phase,
    /// Timestamp of the last phase transition, as reported by the provider.
    /// Displayed verbatim; chiefly meaningful for `Terminated`.
    pub since: Option<String>,
}

/// Application-level probe result. Absent (not an error) while the workload
/// is provisioned but not yet answering its own protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadinessInfo {
    pub version_label: String,
    pub players_online: u32,
    pub players_max: u32,
}
