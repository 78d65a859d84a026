//! Request/response adapter for the container control plane.
//!
//! Action invocations are side-effect only: the provider's textual response
//! is logged, never parsed. State queries must locate the one workload entry
//! matching the target inside the structured response — a missing entry is an
//! error, not a silent default.

use crate::config::fleet::ControlPlaneConfig;
use crate::control::auth::AccessToken;
use crate::domain::{LifecycleState, Phase, ServerTarget};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("control plane request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("control plane returned status {status} for {operation}")]
    Status {
        operation: &'static str,
        status: u16,
    },
    #[error("workload `{group}` not present in control plane response")]
    WorkloadMissing { group: String },
    #[error("control plane response malformed: {detail}")]
    MalformedResponse { detail: String },
}

/// Superset of the chat-facing action set; `Restart` is accepted here even
/// though the default command flow never issues it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadAction {
    Start,
    Stop,
    Restart,
}

impl WorkloadAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn invoke(
        &self,
        target: &ServerTarget,
        action: WorkloadAction,
        token: &AccessToken,
    ) -> Result<(), ControlPlaneError>;

    async fn query(
        &self,
        target: &ServerTarget,
        token: &AccessToken,
    ) -> Result<LifecycleState, ControlPlaneError>;
}

pub struct ContainerControlClient {
    client: reqwest::Client,
    api_base: String,
    api_version: String,
    subscription_id: String,
    resource_group: String,
}

impl ContainerControlClient {
    pub fn new(config: &ControlPlaneConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_version: config.api_version.clone(),
            subscription_id: config.subscription_id.clone(),
            resource_group: config.resource_group.clone(),
        })
    }

    fn group_url(&self, group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{}?api-version={}",
            self.api_base, self.subscription_id, self.resource_group, group, self.api_version
        )
    }

    fn action_url(&self, group: &str, action: WorkloadAction) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{}/{}?api-version={}",
            self.api_base,
            self.subscription_id,
            self.resource_group,
            group,
            action.as_str(),
            self.api_version
        )
    }
}

#[async_trait]
impl ControlPlane for ContainerControlClient {
    async fn invoke(
        &self,
        target: &ServerTarget,
        action: WorkloadAction,
        token: &AccessToken,
    ) -> Result<(), ControlPlaneError> {
        let url = self.action_url(&target.group_name, action);
        let response = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControlPlaneError::Status {
                operation: "invoke",
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            target = %target.alias,
            action = action.as_str(),
            status = status.as_u16(),
            body = %body,
            "control plane acknowledged action"
        );
        Ok(())
    }

    async fn query(
        &self,
        target: &ServerTarget,
        token: &AccessToken,
    ) -> Result<LifecycleState, ControlPlaneError> {
        let url = self.group_url(&target.group_name);
        let response = self
            .client
            .get(url)
            .bearer_auth(token.secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControlPlaneError::Status {
                operation: "query",
                status: status.as_u16(),
            });
        }

        let payload: ContainerGroupResponse = response.json().await?;
        lifecycle_from_response(payload, &target.group_name)
    }
}

#[derive(Debug, Deserialize)]
struct ContainerGroupResponse {
    #[serde(default)]
    properties: Option<GroupProperties>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupProperties {
    #[serde(default)]
    containers: Vec<ContainerEntry>,
}

#[derive(Debug, Deserialize)]
struct ContainerEntry {
    name: String,
    #[serde(default)]
    properties: Option<ContainerProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerProperties {
    #[serde(default)]
    instance_view: Option<InstanceView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceView {
    #[serde(default)]
    current_state: Option<CurrentState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentState {
    state: String,
    #[serde(default)]
    finish_time: Option<String>,
}

fn lifecycle_from_response(
    response: ContainerGroupResponse,
    group: &str,
) -> Result<LifecycleState, ControlPlaneError> {
    let containers = response
        .properties
        .map(|properties| properties.containers)
        .unwrap_or_default();

    let entry = containers
        .into_iter()
        .find(|entry| entry.name == group)
        .ok_or_else(|| ControlPlaneError::WorkloadMissing {
            group: group.to_string(),
        })?;

    let current = entry
        .properties
        .and_then(|properties| properties.instance_view)
        .and_then(|view| view.current_state)
        .ok_or_else(|| ControlPlaneError::MalformedResponse {
            detail: format!("workload `{group}` carries no instance state"),
        })?;

    Ok(LifecycleState {
        phase: Phase::parse(&current.state),
        since: current.finish_time,
    })
}
