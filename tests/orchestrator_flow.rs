mod support;

use std::sync::Arc;
use std::time::Duration;
use support::mocks::{
    readiness, target, RecordingNotifier, ScriptedControlPlane, ScriptedCredentials, ScriptedProbe,
};
use steward::command::{CommandOrchestrator, PollPolicy};
use steward::control::client::WorkloadAction;
use steward::domain::{Action, ActionRequest, LifecycleState, Phase, ReplyChannel};
use tokio_util::sync::CancellationToken;

struct Harness {
    orchestrator: Arc<CommandOrchestrator>,
    credentials: Arc<ScriptedCredentials>,
    control: Arc<ScriptedControlPlane>,
    probe: Arc<ScriptedProbe>,
    notifier: Arc<RecordingNotifier>,
    shutdown: CancellationToken,
}

fn harness(
    credentials: ScriptedCredentials,
    control: ScriptedControlPlane,
    probe: ScriptedProbe,
    policy: PollPolicy,
) -> Harness {
    let credentials = Arc::new(credentials);
    let control = Arc::new(control);
    let probe = Arc::new(probe);
    let notifier = Arc::new(RecordingNotifier::new());
    let shutdown = CancellationToken::new();

    let credentials_dyn: Arc<dyn steward::control::auth::CredentialProvider> =
        credentials.clone();
    let control_dyn: Arc<dyn steward::control::client::ControlPlane> = control.clone();
    let probe_dyn: Arc<dyn steward::probe::ReadinessProbe> = probe.clone();
    let notifier_dyn: Arc<dyn steward::notify::Notifier> = notifier.clone();

    let orchestrator = Arc::new(CommandOrchestrator::new(
        credentials_dyn,
        control_dyn,
        probe_dyn,
        notifier_dyn,
        policy,
        shutdown.clone(),
    ));

    Harness {
        orchestrator,
        credentials,
        control,
        probe,
        notifier,
        shutdown,
    }
}

fn default_policy() -> PollPolicy {
    PollPolicy {
        grace_delay: Duration::from_secs(60),
        interval: Duration::from_secs(15),
        max_attempts: 10,
    }
}

fn request(action: Action) -> ActionRequest {
    ActionRequest {
        action,
        target: target("default"),
        channel: ReplyChannel::new("chan-1"),
    }
}

fn running() -> LifecycleState {
    LifecycleState {
        phase: Phase::Running,
        since: None,
    }
}

#[tokio::test]
async fn auth_failure_on_start_sends_one_generic_reply_and_nothing_else_runs() {
    let h = harness(
        ScriptedCredentials::failing(),
        ScriptedControlPlane::accepting(None),
        ScriptedProbe::always_failing(),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Start)).await;

    assert_eq!(h.notifier.texts(), vec!["Error, please check logs"]);
    assert_eq!(h.credentials.call_count(), 1);
    assert_eq!(h.control.invocation_count(), 0);
    assert_eq!(h.control.query_count(), 0);
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test]
async fn status_with_running_phase_and_failing_probe_reports_boot_state() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(Some(running())),
        ScriptedProbe::always_failing(),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Status)).await;

    assert_eq!(h.notifier.texts(), vec!["Running"]);
    assert_eq!(h.probe.call_count(), 1);
    assert_eq!(h.control.invocation_count(), 0);
}

#[tokio::test]
async fn status_with_terminated_phase_skips_the_probe() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(Some(LifecycleState {
            phase: Phase::Terminated,
            since: Some("2024-03-01T08:15:00Z".to_string()),
        })),
        ScriptedProbe::always_failing(),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Status)).await;

    assert_eq!(
        h.notifier.texts(),
        vec!["Not Running since 2024-03-01T08:15:00Z"]
    );
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test]
async fn status_with_reachable_workload_reports_players_and_host() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(Some(running())),
        ScriptedProbe::with_script(vec![Some(readiness("1.20", 2, 10))]),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Status)).await;

    assert_eq!(
        h.notifier.texts(),
        vec!["Running 1.20 with 2/10 players\nYou can access the server at mc.example.net"]
    );
}

#[tokio::test]
async fn status_with_missing_workload_sends_the_generic_failure_reply() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(None),
        ScriptedProbe::always_failing(),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Status)).await;

    assert_eq!(h.notifier.texts(), vec!["Error, please check logs"]);
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test]
async fn stop_success_sends_the_stop_reply() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(None),
        ScriptedProbe::always_failing(),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Stop)).await;

    assert_eq!(h.notifier.texts(), vec!["successfully stopped the server!"]);
    assert_eq!(
        h.control.recorded_invocations(),
        vec![("default".to_string(), WorkloadAction::Stop)]
    );
}

#[tokio::test]
async fn stop_control_plane_failure_sends_one_generic_reply_and_no_poll() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::rejecting(),
        ScriptedProbe::always_failing(),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Stop)).await;

    assert_eq!(h.notifier.texts(), vec!["Error, please check logs"]);
    assert_eq!(h.probe.call_count(), 0);

    // Nothing was scheduled: draining the task set completes immediately.
    h.orchestrator.close_tasks();
    h.orchestrator.wait_tasks().await;
}

#[tokio::test(start_paused = true)]
async fn start_defers_notification_until_the_workload_answers() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(None),
        ScriptedProbe::with_script(vec![None, None, Some(readiness("1.20", 2, 10))]),
        default_policy(),
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Start)).await;

    // The synchronous run ends with the invoke; no reply has gone out yet.
    assert_eq!(
        h.control.recorded_invocations(),
        vec![("default".to_string(), WorkloadAction::Start)]
    );
    assert_eq!(h.notifier.texts(), Vec::<String>::new());

    h.orchestrator.close_tasks();
    h.orchestrator.wait_tasks().await;

    assert_eq!(
        h.notifier.texts(),
        vec![
            "...".to_string(),
            "...".to_string(),
            "Running 1.20 with 2/10 players\nYou can access the server at mc.example.net"
                .to_string(),
        ]
    );
    assert_eq!(h.probe.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn second_request_for_a_polling_target_is_rejected() {
    let h = harness(
        ScriptedCredentials::succeeding(),
        ScriptedControlPlane::accepting(None),
        ScriptedProbe::always_failing(),
        PollPolicy {
            grace_delay: Duration::from_secs(3600),
            interval: Duration::from_secs(15),
            max_attempts: 10,
        },
    );

    Arc::clone(&h.orchestrator).handle(request(Action::Start)).await;
    Arc::clone(&h.orchestrator).handle(request(Action::Stop)).await;

    assert_eq!(
        h.notifier.texts(),
        vec!["another action for this server is already in progress, please wait for it to finish"]
    );
    // Only the start reached the control plane.
    assert_eq!(h.control.invocation_count(), 1);

    h.shutdown.cancel();
    h.orchestrator.close_tasks();
    h.orchestrator.wait_tasks().await;
}
