//! The per-request state machine: Dispatched → Authenticated → Executed →
//! Replied, with a Failed terminal state. Stages run strictly in order; a
//! stage begins only after the previous one succeeded.
//!
//! Chat replies on failure are always the one generic line — full error
//! context goes to the log before any user-facing message is produced.

use crate::command::poller::{run_poll_loop, PollPolicy, PollRun};
use crate::control::auth::{AuthError, CredentialProvider};
use crate::control::client::{ControlPlane, ControlPlaneError, WorkloadAction};
use crate::domain::{Action, ActionRequest, Phase, ReadinessInfo};
use crate::notify::{send_best_effort, Notifier};
use crate::probe::ReadinessProbe;
use crate::status;
use crate::telemetry::counters;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("credential acquisition failed: {0}")]
    Auth(#[from] AuthError),
    #[error("control plane request failed: {0}")]
    ControlPlane(#[from] ControlPlaneError),
}

enum Executed {
    Replied(String),
    StartInvoked,
}

pub struct CommandOrchestrator {
    credentials: Arc<dyn CredentialProvider>,
    control: Arc<dyn ControlPlane>,
    probe: Arc<dyn ReadinessProbe>,
    notifier: Arc<dyn Notifier>,
    policy: PollPolicy,
    inflight: InflightTargets,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl CommandOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        control: Arc<dyn ControlPlane>,
        probe: Arc<dyn ReadinessProbe>,
        notifier: Arc<dyn Notifier>,
        policy: PollPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            credentials,
            control,
            probe,
            notifier,
            policy,
            inflight: InflightTargets::default(),
            tasks: TaskTracker::new(),
            shutdown,
        }
    }

    /// Run the request in the background, tracked for drain on shutdown.
    pub fn dispatch(self: &Arc<Self>, request: ActionRequest) {
        let orchestrator = Arc::clone(self);
        self.tasks
            .spawn(async move { orchestrator.handle(request).await });
    }

    pub async fn handle(self: Arc<Self>, request: ActionRequest) {
        let action = request.action;
        let alias = request.target.alias.clone();

        let Some(guard) = self.inflight.try_claim(&alias) else {
            tracing::info!(
                action = action.as_str(),
                target = %alias,
                "command rejected; target already has an action in flight"
            );
            counters().record_command_rejected(action.as_str());
            send_best_effort(
                self.notifier.as_ref(),
                &request.channel,
                status::ALREADY_IN_PROGRESS_REPLY,
            )
            .await;
            return;
        };

        tracing::info!(
            action = action.as_str(),
            target = %alias,
            channel = %request.channel,
            "dispatching command"
        );

        match self.execute(&request).await {
            Ok(Executed::Replied(text)) => {
                counters().record_command_success(action.as_str());
                send_best_effort(self.notifier.as_ref(), &request.channel, &text).await;
            }
            Ok(Executed::StartInvoked) => {
                counters().record_command_success(action.as_str());
                // The poller owns the terminal notification; the guard moves
                // with it so the target stays claimed until the run ends.
                self.spawn_poll(request, guard);
            }
            Err(err) => {
                tracing::error!(
                    action = action.as_str(),
                    target = %alias,
                    error = %err,
                    "command failed"
                );
                counters().record_command_failure(action.as_str());
                send_best_effort(
                    self.notifier.as_ref(),
                    &request.channel,
                    status::GENERIC_FAILURE_REPLY,
                )
                .await;
            }
        }
    }

    async fn execute(&self, request: &ActionRequest) -> Result<Executed, CommandError> {
        let token = self.credentials.acquire().await?;

        match request.action {
            Action::Status => {
                let lifecycle = self.control.query(&request.target, &token).await?;
                let readiness = if lifecycle.phase == Phase::Running {
                    self.probe_for_status(request).await
                } else {
                    None
                };
                let text = status::format_status(
                    &lifecycle,
                    readiness.as_ref(),
                    Some(&request.target.probe_host),
                );
                Ok(Executed::Replied(text))
            }
            Action::Stop => {
                self.control
                    .invoke(&request.target, WorkloadAction::Stop, &token)
                    .await?;
                Ok(Executed::Replied(status::STOP_SUCCESS_REPLY.to_string()))
            }
            Action::Start => {
                self.control
                    .invoke(&request.target, WorkloadAction::Start, &token)
                    .await?;
                Ok(Executed::StartInvoked)
            }
        }
    }

    /// A probe failure during a status query is not an orchestration failure:
    /// the workload is merely still booting, and the caller renders the
    /// lifecycle-only view.
    async fn probe_for_status(&self, request: &ActionRequest) -> Option<ReadinessInfo> {
        match self
            .probe
            .probe(&request.target.probe_host, request.target.probe_port)
            .await
        {
            Ok(info) => Some(info),
            Err(err) => {
                tracing::info!(
                    target = %request.target.alias,
                    error = %err,
                    "workload reported running but the probe went unanswered; reporting boot state"
                );
                None
            }
        }
    }

    fn spawn_poll(&self, request: ActionRequest, guard: InflightGuard) {
        let run = PollRun {
            target: request.target,
            channel: request.channel,
        };
        let probe = Arc::clone(&self.probe);
        let notifier = Arc::clone(&self.notifier);
        let policy = self.policy;
        let shutdown = self.shutdown.clone();

        self.tasks.spawn(async move {
            let _guard = guard;
            run_poll_loop(probe, notifier, run, policy, shutdown).await;
        });
    }

    /// Close the task set so `wait_tasks` completes once running work ends.
    pub fn close_tasks(&self) {
        self.tasks.close();
    }

    pub async fn wait_tasks(&self) {
        self.tasks.wait().await;
    }
}

/// Advisory single-flight set: one in-flight action per target alias,
/// claimed at Dispatched and released when the guard drops (Replied/Failed,
/// or the end of a start's poll run).
#[derive(Clone, Default)]
struct InflightTargets {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl InflightTargets {
    fn try_claim(&self, alias: &str) -> Option<InflightGuard> {
        let mut guard = self.inner.lock().expect("inflight set poisoned");
        if !guard.insert(alias.to_string()) {
            return None;
        }
        Some(InflightGuard {
            inner: Arc::clone(&self.inner),
            alias: alias.to_string(),
        })
    }
}

struct InflightGuard {
    inner: Arc<Mutex<HashSet<String>>>,
    alias: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.remove(&self.alias);
        }
    }
}
