use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self as stdfmt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "steward";

pub fn init_tracing() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("steward=info,info"));

    let stdout = std::io::stdout;
    let stderr = std::io::stderr;

    let writer = stdout
        .with_max_level(tracing::Level::INFO)
        .or_else(stderr.with_min_level(tracing::Level::WARN));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(false)
        .with_ansi(false)
        .event_format(KeyValueFormatter)
        .with_writer(writer)
        .try_init()
        .map_err(|err| crate::err!("failed to initialise tracing subscriber: {err}"))
}

/// Renders events as one `key=value` line so downstream log parsing never has
/// to guess at field boundaries.
struct KeyValueFormatter;

impl<S, N> FormatEvent<S, N> for KeyValueFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());

        let mut line = String::new();
        push_field(&mut line, "ts", &timestamp);
        push_field(&mut line, "level", metadata.level().as_str());
        push_field(&mut line, "service", SERVICE_NAME);
        push_field(&mut line, "component", metadata.target());
        push_field(&mut line, "msg", &message);

        for (key, value) in visitor.fields {
            push_field(&mut line, &key, &value);
        }

        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record_field(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_field(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        self.record_field(field, format!("{value:?}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_field(field, value.to_string());
    }
}

fn encode_field_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '=' | '\n' | '\r' | '\t'));

    if !needs_quotes {
        return value.to_string();
    }

    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push('"');
    for ch in value.chars() {
        match ch {
            '"' => encoded.push_str("\\\""),
            '\\' => encoded.push_str("\\\\"),
            '\n' => encoded.push_str("\\n"),
            '\r' => encoded.push_str("\\r"),
            '\t' => encoded.push_str("\\t"),
            _ => encoded.push(ch),
        }
    }
    encoded.push('"');
    encoded
}

fn push_field(buffer: &mut String, key: &str, value: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(key);
    buffer.push('=');
    buffer.push_str(&encode_field_value(value));
}

/// In-process counters surfaced on the health endpoint.
#[derive(Default)]
pub struct RuntimeCounters {
    commands: CommandOutcomeRegistry,
    polls: PollOutcomeRegistry,
    notify_failures: AtomicU64,
    webhook_requests: WebhookRegistry,
}

static RUNTIME_COUNTERS: OnceLock<RuntimeCounters> = OnceLock::new();

pub fn counters() -> &'static RuntimeCounters {
    RUNTIME_COUNTERS.get_or_init(RuntimeCounters::default)
}

impl RuntimeCounters {
    pub fn record_command_success(&self, action: &'static str) {
        self.commands.record(action, CommandOutcome::Success);
    }

    pub fn record_command_failure(&self, action: &'static str) {
        self.commands.record(action, CommandOutcome::Failure);
    }

    pub fn record_command_rejected(&self, action: &'static str) {
        self.commands.record(action, CommandOutcome::Rejected);
    }

    pub fn record_poll_succeeded(&self, target: &str, attempts: u32) {
        self.polls.record(target, PollOutcome::Succeeded, attempts);
    }

    pub fn record_poll_gave_up(&self, target: &str, attempts: u32) {
        self.polls.record(target, PollOutcome::GaveUp, attempts);
    }

    pub fn record_poll_cancelled(&self, target: &str) {
        self.polls.record(target, PollOutcome::Cancelled, 0);
    }

    pub fn record_notify_failure(&self) {
        self.notify_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_request(&self, route: &str) {
        self.webhook_requests.record(route);
    }

    pub fn snapshot(&self) -> RuntimeCountersSnapshot {
        RuntimeCountersSnapshot {
            commands: self.commands.snapshot(),
            polls: self.polls.snapshot(),
            notify_failures: self.notify_failures.load(Ordering::Relaxed),
            webhook_requests: self.webhook_requests.snapshot(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeCountersSnapshot {
    pub commands: Vec<CommandOutcomeSnapshot>,
    pub polls: Vec<PollOutcomeSnapshot>,
    pub notify_failures: u64,
    pub webhook_requests: Vec<WebhookRouteSnapshot>,
}

enum CommandOutcome {
    Success,
    Failure,
    Rejected,
}

#[derive(Clone, Debug, Default)]
struct CommandOutcomeEntry {
    success: u64,
    failure: u64,
    rejected: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOutcomeSnapshot {
    pub action: String,
    pub success: u64,
    pub failure: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct CommandOutcomeRegistry {
    inner: Mutex<BTreeMap<&'static str, CommandOutcomeEntry>>,
}

impl CommandOutcomeRegistry {
    fn record(&self, action: &'static str, outcome: CommandOutcome) {
        let mut guard = self.inner.lock().expect("command registry poisoned");
        let entry = guard.entry(action).or_default();
        match outcome {
            CommandOutcome::Success => entry.success = entry.success.saturating_add(1),
            CommandOutcome::Failure => entry.failure = entry.failure.saturating_add(1),
            CommandOutcome::Rejected => entry.rejected = entry.rejected.saturating_add(1),
        }
    }

    fn snapshot(&self) -> Vec<CommandOutcomeSnapshot> {
        let guard = self.inner.lock().expect("command registry poisoned");
        guard
            .iter()
            .map(|(action, entry)| CommandOutcomeSnapshot {
                action: action.to_string(),
                success: entry.success,
                failure: entry.failure,
                rejected: entry.rejected,
            })
            .collect()
    }
}

enum PollOutcome {
    Succeeded,
    GaveUp,
    Cancelled,
}

#[derive(Clone, Debug, Default)]
struct PollOutcomeEntry {
    succeeded: u64,
    gave_up: u64,
    cancelled: u64,
    attempts_total: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PollOutcomeSnapshot {
    pub target: String,
    pub succeeded: u64,
    pub gave_up: u64,
    pub cancelled: u64,
    pub attempts_total: u64,
}

#[derive(Default)]
struct PollOutcomeRegistry {
    inner: Mutex<BTreeMap<String, PollOutcomeEntry>>,
}

impl PollOutcomeRegistry {
    fn record(&self, target: &str, outcome: PollOutcome, attempts: u32) {
        let mut guard = self.inner.lock().expect("poll registry poisoned");
        let entry = guard.entry(target.to_string()).or_default();
        match outcome {
            PollOutcome::Succeeded => entry.succeeded = entry.succeeded.saturating_add(1),
            PollOutcome::GaveUp => entry.gave_up = entry.gave_up.saturating_add(1),
            PollOutcome::Cancelled => entry.cancelled = entry.cancelled.saturating_add(1),
        }
        entry.attempts_total = entry.attempts_total.saturating_add(u64::from(attempts));
    }

    fn snapshot(&self) -> Vec<PollOutcomeSnapshot> {
        let guard = self.inner.lock().expect("poll registry poisoned");
        guard
            .iter()
            .map(|(target, entry)| PollOutcomeSnapshot {
                target: target.clone(),
                succeeded: entry.succeeded,
                gave_up: entry.gave_up,
                cancelled: entry.cancelled,
                attempts_total: entry.attempts_total,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookRouteSnapshot {
    pub route: String,
    pub total: u64,
}

#[derive(Default)]
struct WebhookRegistry {
    inner: Mutex<BTreeMap<String, u64>>,
}

impl WebhookRegistry {
    fn record(&self, route: &str) {
        let mut guard = self.inner.lock().expect("webhook registry poisoned");
        *guard.entry(route.to_string()).or_insert(0) += 1;
    }

    fn snapshot(&self) -> Vec<WebhookRouteSnapshot> {
        let guard = self.inner.lock().expect("webhook registry poisoned");
        guard
            .iter()
            .map(|(route, total)| WebhookRouteSnapshot {
                route: route.clone(),
                total: *total,
            })
            .collect()
    }
}
