//! Bounded readiness polling after a start action.
//!
//! The policy is a pure description of the schedule; the driver loop owns the
//! probing, interim notifications, and terminal message. Exhausting the
//! attempt budget is a successful termination of the poll, not an error: the
//! workload may still come up later and the give-up message points users at
//! the status command.

use crate::domain::{LifecycleState, Phase, ReplyChannel, ServerTarget};
use crate::notify::{send_best_effort, Notifier};
use crate::probe::ReadinessProbe;
use crate::status;
use crate::telemetry::counters;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug)]
pub struct PollPolicy {
    pub grace_delay: Duration,
    pub interval: Duration,
    /// Highest attempt ordinal; attempts are numbered 0..=max_attempts.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Delay before the next attempt after `attempt` failed, or `None` once
    /// the budget is spent.
    pub fn after_failure(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.interval)
    }
}

/// One scheduled poll run, keyed by target and reply channel. Independent of
/// the orchestrator once spawned.
#[derive(Clone, Debug)]
pub struct PollRun {
    pub target: ServerTarget,
    pub channel: ReplyChannel,
}

/// Sleeps for `duration` but aborts early if the shutdown token fires.
/// Returns `true` if shutdown occurred during the wait.
pub async fn sleep_with_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

pub async fn run_poll_loop(
    probe: Arc<dyn ReadinessProbe>,
    notifier: Arc<dyn Notifier>,
    run: PollRun,
    policy: PollPolicy,
    shutdown: CancellationToken,
) {
    if sleep_with_shutdown(policy.grace_delay, &shutdown).await {
        counters().record_poll_cancelled(&run.target.alias);
        return;
    }

    let mut attempt: u32 = 0;
    loop {
        match probe.probe(&run.target.probe_host, run.target.probe_port).await {
            Ok(info) => {
                let lifecycle = LifecycleState {
                    phase: Phase::Running,
                    since: None,
                };
                let text =
                    status::format_status(&lifecycle, Some(&info), Some(&run.target.probe_host));
                send_best_effort(notifier.as_ref(), &run.channel, &text).await;
                tracing::info!(
                    target = %run.target.alias,
                    attempt,
                    "workload reachable; start notification delivered"
                );
                counters().record_poll_succeeded(&run.target.alias, attempt);
                return;
            }
            Err(err) => {
                tracing::debug!(
                    target = %run.target.alias,
                    attempt,
                    error = %err,
                    "readiness attempt failed"
                );
                send_best_effort(notifier.as_ref(), &run.channel, status::POLL_INTERIM_REPLY)
                    .await;

                match policy.after_failure(attempt) {
                    Some(delay) => {
                        attempt += 1;
                        if sleep_with_shutdown(delay, &shutdown).await {
                            counters().record_poll_cancelled(&run.target.alias);
                            return;
                        }
                    }
                    None => {
                        tracing::warn!(
                            target = %run.target.alias,
                            attempts = attempt + 1,
                            "workload never answered the readiness probe; giving up"
                        );
                        send_best_effort(
                            notifier.as_ref(),
                            &run.channel,
                            status::POLL_GIVE_UP_REPLY,
                        )
                        .await;
                        counters().record_poll_gave_up(&run.target.alias, attempt + 1);
                        return;
                    }
                }
            }
        }
    }
}
