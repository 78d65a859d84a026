//! Application-level readiness probe.
//!
//! Distinct from the control plane's notion of "running": the probe answers
//! only once the workload's own service is accepting connections and speaking
//! its status-query protocol. Callers never distinguish failure modes — any
//! error here means "not yet ready".

pub mod wire;

use crate::domain::ReadinessInfo;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const MAX_STATUS_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe frame invalid: {0}")]
    Frame(#[from] wire::FrameError),
    #[error("unexpected status packet id {0:#x}")]
    UnexpectedPacket(i32),
    #[error("status payload malformed: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn probe(&self, host: &str, port: u16) -> Result<ReadinessInfo, ProbeError>;
}

/// Status-query client with a single bounded timeout covering connect and the
/// whole exchange, keeping the poller's cadence predictable.
pub struct StatusQueryClient {
    timeout: Duration,
}

impl StatusQueryClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ReadinessProbe for StatusQueryClient {
    async fn probe(&self, host: &str, port: u16) -> Result<ReadinessInfo, ProbeError> {
        match tokio::time::timeout(self.timeout, exchange(host, port)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

async fn exchange(host: &str, port: u16) -> Result<ReadinessInfo, ProbeError> {
    let mut stream = TcpStream::connect((host, port)).await?;

    let mut handshake = Vec::new();
    wire::put_varint(&mut handshake, 0x00);
    // Protocol version is irrelevant for a status exchange; -1 by convention.
    wire::put_varint(&mut handshake, -1);
    wire::put_string(&mut handshake, host);
    handshake.extend_from_slice(&port.to_be_bytes());
    // Next state: status.
    wire::put_varint(&mut handshake, 1);

    stream.write_all(&wire::frame(&handshake)).await?;
    stream.write_all(&wire::frame(&[0x00])).await?;
    stream.flush().await?;

    let declared = wire::read_varint(&mut stream).await?;
    if declared < 0 {
        return Err(ProbeError::Frame(wire::FrameError::NegativeLength(declared)));
    }

    let packet_id = wire::read_varint(&mut stream).await?;
    if packet_id != 0x00 {
        return Err(ProbeError::UnexpectedPacket(packet_id));
    }

    let payload = wire::read_string(&mut stream, MAX_STATUS_BYTES).await?;
    readiness_from_payload(&payload)
}

#[derive(Deserialize)]
struct StatusPayload {
    version: VersionSection,
    players: PlayersSection,
}

#[derive(Deserialize)]
struct VersionSection {
    name: String,
}

#[derive(Deserialize)]
struct PlayersSection {
    online: u32,
    max: u32,
}

fn readiness_from_payload(raw: &str) -> Result<ReadinessInfo, ProbeError> {
    let payload: StatusPayload = serde_json::from_str(raw)?;
    Ok(ReadinessInfo {
        version_label: payload.version.name,
        players_online: payload.players.online,
        players_max: payload.players.max,
    })
}
