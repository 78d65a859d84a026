//! Chat-facing message rendering.
//!
//! The formatter is a pure function; the branch order below is load-bearing.
//! A workload can be `Running` per the control plane while its own service is
//! not yet answering, so the readiness branch fires only on real probe data —
//! phase `Running` with no readiness falls through to the raw-phase branch,
//! which is the "still booting" signal users see.

use crate::domain::{Action, LifecycleState, Phase, ReadinessInfo};

/// The only failure text that ever reaches the chat surface. Internal error
/// detail stays in the operational log.
pub const GENERIC_FAILURE_REPLY: &str = "Error, please check logs";

pub const STOP_SUCCESS_REPLY: &str = "successfully stopped the server!";

pub const ALREADY_IN_PROGRESS_REPLY: &str =
    "another action for this server is already in progress, please wait for it to finish";

/// Low-information placeholder sent after each failed readiness attempt.
pub const POLL_INTERIM_REPLY: &str = "...";

pub const POLL_GIVE_UP_REPLY: &str =
    "Server takes longer than expected to start, please wait a bit, then try /status!";

pub fn format_status(
    lifecycle: &LifecycleState,
    readiness: Option<&ReadinessInfo>,
    probe_host: Option<&str>,
) -> String {
    if lifecycle.phase == Phase::Terminated {
        let since = lifecycle.since.as_deref().unwrap_or("unknown");
        return format!("Not Running since {since}");
    }

    if let Some(info) = readiness {
        let mut text = format!(
            "Running {} with {}/{} players",
            info.version_label, info.players_online, info.players_max
        );
        if let Some(host) = probe_host {
            text.push_str(&format!("\nYou can access the server at {host}"));
        }
        return text;
    }

    if lifecycle.phase == Phase::Waiting {
        return "Waiting".to_string();
    }

    lifecycle.phase.as_str().to_string()
}

/// Synchronous acknowledgment returned while orchestration runs in the
/// background.
pub const fn acknowledgement(action: Action) -> &'static str {
    match action {
        Action::Start => "starting the server, this takes some time, please be patient...",
        Action::Stop => "stopping the server, this takes some time, please be patient...",
        Action::Status => "looking up the server status, one moment...",
    }
}
