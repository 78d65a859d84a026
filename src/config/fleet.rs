//! Fleet document: which workloads exist, where the control plane lives, and
//! how readiness polling is paced. Parsed leniently into raw structs, then
//! validated in one pass that accumulates every problem before reporting.

use crate::domain::ServerTarget;
use humantime::parse_duration;
use serde::de::Error as _;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const TOP_LEVEL_FIELDS: &str = "api_version, control_plane, targets, default_target, polling";

const MAX_POLL_ATTEMPTS_CEILING: u32 = 20;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub api_version: ApiVersion,
    pub control_plane: ControlPlaneConfig,
    /// Immutable alias map built once at startup; lookups are pure reads.
    pub targets: BTreeMap<String, ServerTarget>,
    pub default_target: String,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub api_base: String,
    pub api_version: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    /// Wait before the first readiness attempt after a start, so the probe is
    /// not hammering a workload the provider has barely begun to schedule.
    pub grace_delay: Duration,
    pub interval: Duration,
    /// Highest attempt ordinal; attempt numbers run 0..=max_attempts.
    pub max_attempts: u32,
    pub probe_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_secs(60),
            interval: Duration::from_secs(15),
            max_attempts: 10,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    V1,
    Unsupported(String),
}

impl FleetConfig {
    pub fn from_reader(mut reader: impl Read) -> Result<Self, FleetConfigError> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FleetConfigError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    fn from_yaml_str(contents: &str) -> Result<Self, FleetConfigError> {
        let mut documents = serde_yaml::Deserializer::from_str(contents);
        let mut parsed = None;
        let mut extra_errors = Vec::new();

        for (index, document) in documents.by_ref().enumerate() {
            if index == 0 {
                parsed = Some(RawFleetFile::deserialize(document)?);
            } else {
                let _: YamlValue = YamlValue::deserialize(document)?;
                extra_errors
                    .push("error[root]: multiple YAML documents are not supported".to_string());
                break;
            }
        }

        let Some(raw) = parsed else {
            let err =
                serde_yaml::Error::custom("fleet config must contain exactly one YAML document");
            return Err(FleetConfigError::Parse(err));
        };

        Self::from_raw(raw, extra_errors).map_err(FleetConfigError::Invalid)
    }

    fn from_raw(
        raw: RawFleetFile,
        mut errors: Vec<String>,
    ) -> Result<Self, FleetValidationError> {
        let RawFleetFile {
            api_version: raw_api_version,
            control_plane: raw_control_plane,
            targets: raw_targets,
            default_target: raw_default,
            polling: raw_polling,
            extra_fields,
        } = raw;

        for key in extra_fields.keys() {
            errors.push(format!(
                "error[root]: unknown top-level key \"{key}\" (expected one of {TOP_LEVEL_FIELDS})"
            ));
        }

        let api_version = parse_api_version(raw_api_version, &mut errors);
        let control_plane = parse_control_plane(raw_control_plane, &mut errors);
        let targets = parse_targets(raw_targets, &mut errors);
        let default_target = resolve_default_target(raw_default, &targets, &mut errors);
        let polling = parse_polling(raw_polling, &mut errors);

        if errors.is_empty() {
            Ok(Self {
                api_version,
                control_plane,
                targets,
                default_target,
                polling,
            })
        } else {
            Err(FleetValidationError::new(errors))
        }
    }

    /// Resolve the chat-supplied alias; `None` selects the configured
    /// default target.
    pub fn resolve_target(&self, alias: Option<&str>) -> Option<&ServerTarget> {
        match alias {
            Some(alias) => self.targets.get(alias),
            None => self.targets.get(&self.default_target),
        }
    }
}

fn parse_api_version(raw: Option<String>, errors: &mut Vec<String>) -> ApiVersion {
    match raw {
        None => {
            errors
                .push("error[root]: api_version is required (supported versions: v1)".to_string());
            ApiVersion::V1
        }
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.eq_ignore_ascii_case("v1") {
                ApiVersion::V1
            } else {
                errors.push(format!(
                    "api_version `{trimmed}` is not supported (supported versions: v1)"
                ));
                ApiVersion::Unsupported(trimmed.to_string())
            }
        }
    }
}

fn parse_control_plane(
    raw: Option<RawControlPlaneSection>,
    errors: &mut Vec<String>,
) -> ControlPlaneConfig {
    let raw = raw.unwrap_or_default();
    let mut config = ControlPlaneConfig {
        api_base: "https://management.azure.com".to_string(),
        api_version: "2023-05-01".to_string(),
        subscription_id: String::new(),
        resource_group: String::new(),
        request_timeout: Duration::from_secs(10),
    };

    if let Some(base) = raw.api_base {
        match Url::parse(&base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                config.api_base = base.trim_end_matches('/').to_string();
            }
            Ok(url) => errors.push(format!(
                "control_plane.api_base has unsupported scheme `{}`",
                url.scheme()
            )),
            Err(err) => errors.push(format!("control_plane.api_base is not a valid URL: {err}")),
        }
    }

    if let Some(version) = raw.api_version {
        if version.trim().is_empty() {
            errors.push("control_plane.api_version must be a non-empty string".to_string());
        } else {
            config.api_version = version;
        }
    }

    match raw.subscription_id {
        Some(value) if !value.trim().is_empty() => config.subscription_id = value,
        _ => errors.push("control_plane.subscription_id is required".to_string()),
    }

    match raw.resource_group {
        Some(value) if !value.trim().is_empty() => config.resource_group = value,
        _ => errors.push("control_plane.resource_group is required".to_string()),
    }

    if let Some(duration) =
        parse_duration_field("control_plane.request_timeout", raw.request_timeout, errors)
    {
        config.request_timeout = duration;
    }

    config
}

fn parse_targets(
    raw: Vec<RawTarget>,
    errors: &mut Vec<String>,
) -> BTreeMap<String, ServerTarget> {
    let mut targets = BTreeMap::new();

    if raw.is_empty() {
        errors.push("at least one entry is required under `targets`".to_string());
        return targets;
    }

    for (index, entry) in raw.into_iter().enumerate() {
        let label = entry
            .alias
            .clone()
            .unwrap_or_else(|| format!("targets[{index}]"));

        let Some(alias) = entry.alias.filter(|alias| !alias.trim().is_empty()) else {
            errors.push(format!("error[{label}]: alias is required"));
            continue;
        };

        let Some(group_name) = entry.group_name.filter(|name| !name.trim().is_empty()) else {
            errors.push(format!("error[{alias}]: group_name is required"));
            continue;
        };

        let Some(probe_host) = entry.probe_host.filter(|host| !host.trim().is_empty()) else {
            errors.push(format!("error[{alias}]: probe_host is required"));
            continue;
        };

        let probe_port = match entry.probe_port {
            Some(port) if port != 0 => port,
            Some(_) => {
                errors.push(format!("error[{alias}]: probe_port must be non-zero"));
                continue;
            }
            None => {
                errors.push(format!("error[{alias}]: probe_port is required"));
                continue;
            }
        };

        if targets.contains_key(&alias) {
            errors.push(format!("error[{alias}]: duplicate target alias"));
            continue;
        }

        targets.insert(
            alias.clone(),
            ServerTarget {
                alias,
                group_name,
                probe_host,
                probe_port,
            },
        );
    }

    targets
}

fn resolve_default_target(
    raw: Option<String>,
    targets: &BTreeMap<String, ServerTarget>,
    errors: &mut Vec<String>,
) -> String {
    match raw {
        Some(alias) => {
            if !targets.is_empty() && !targets.contains_key(&alias) {
                errors.push(format!(
                    "default_target `{alias}` does not name a configured target"
                ));
            }
            alias
        }
        None => {
            if targets.len() == 1 {
                targets
                    .keys()
                    .next()
                    .cloned()
                    .unwrap_or_default()
            } else {
                if !targets.is_empty() {
                    errors.push(
                        "default_target is required when more than one target is configured"
                            .to_string(),
                    );
                }
                String::new()
            }
        }
    }
}

fn parse_polling(raw: Option<RawPollingSection>, errors: &mut Vec<String>) -> PollingConfig {
    let raw = raw.unwrap_or_default();
    let mut config = PollingConfig::default();

    if let Some(duration) = parse_duration_field("polling.grace_delay", raw.grace_delay, errors) {
        config.grace_delay = duration;
    }

    if let Some(duration) = parse_duration_field("polling.interval", raw.interval, errors) {
        config.interval = duration;
    }

    if let Some(duration) = parse_duration_field("polling.probe_timeout", raw.probe_timeout, errors)
    {
        config.probe_timeout = duration;
    }

    if let Some(value) = raw.max_attempts {
        if value == 0 || value > MAX_POLL_ATTEMPTS_CEILING {
            errors.push(format!(
                "polling.max_attempts must be between 1 and {MAX_POLL_ATTEMPTS_CEILING}"
            ));
        } else {
            config.max_attempts = value;
        }
    }

    config
}

fn parse_duration_field(
    label: &str,
    raw: Option<String>,
    errors: &mut Vec<String>,
) -> Option<Duration> {
    let raw = raw?;
    match parse_duration(raw.trim()) {
        Ok(duration) if duration.is_zero() => {
            errors.push(format!("{label} must be a positive duration"));
            None
        }
        Ok(duration) => Some(duration),
        Err(err) => {
            errors.push(format!("{label} `{raw}` is not a valid duration: {err}"));
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFleetFile {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    control_plane: Option<RawControlPlaneSection>,
    #[serde(default)]
    targets: Vec<RawTarget>,
    #[serde(default)]
    default_target: Option<String>,
    #[serde(default)]
    polling: Option<RawPollingSection>,
    #[serde(default)]
    #[serde(flatten)]
    extra_fields: BTreeMap<String, YamlValue>,
}

#[derive(Debug, Default, Deserialize)]
struct RawControlPlaneSection {
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    subscription_id: Option<String>,
    #[serde(default)]
    resource_group: Option<String>,
    #[serde(default)]
    request_timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    probe_host: Option<String>,
    #[serde(default)]
    probe_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPollingSection {
    #[serde(default)]
    grace_delay: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    probe_timeout: Option<String>,
}

#[derive(Debug, Error)]
pub enum FleetConfigError {
    #[error("failed to read fleet config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse fleet config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(FleetValidationError),
}

#[derive(Debug, Error)]
#[error("fleet config validation failed:\n{rendered}")]
pub struct FleetValidationError {
    rendered: String,
}

impl FleetValidationError {
    pub fn new(messages: Vec<String>) -> Self {
        let rendered = messages
            .iter()
            .map(|msg| format!("- {msg}"))
            .collect::<Vec<_>>()
            .join("\n");
        Self { rendered }
    }
}
