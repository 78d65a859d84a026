use crate::app_state::AppState;
use crate::command::{CommandOrchestrator, PollPolicy};
use crate::config::{FleetConfig, StewardConfig};
use crate::control::auth::ClientSecretCredential;
use crate::control::client::ContainerControlClient;
use crate::error::{Context, Result};
use crate::notify::ChatNotifier;
use crate::probe::StatusQueryClient;
use crate::transport::http_server;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const DEFAULT_FLEET_CONFIG_PATH: &str = "config/fleet.yaml";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct StewardApp {
    state: Arc<AppState>,
    listen_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl StewardApp {
    pub fn initialise(config: StewardConfig) -> Result<Self> {
        let fleet_path = config
            .fleet_config_path
            .as_deref()
            .unwrap_or(DEFAULT_FLEET_CONFIG_PATH);
        let fleet = FleetConfig::from_path(fleet_path)
            .with_context(|| format!("failed to load fleet config from {fleet_path}"))?;

        let listen_addr: SocketAddr =
            format!("{}:{}", config.listen.host, config.listen.port).parse()?;

        let credentials = ClientSecretCredential::new(&config.identity)
            .context("failed to construct credential provider")?;
        let control = ContainerControlClient::new(&fleet.control_plane)
            .context("failed to construct control plane client")?;
        let probe = StatusQueryClient::new(fleet.polling.probe_timeout);
        let notifier =
            ChatNotifier::new(&config.chat).context("failed to construct chat notifier")?;

        let policy = PollPolicy {
            grace_delay: fleet.polling.grace_delay,
            interval: fleet.polling.interval,
            max_attempts: fleet.polling.max_attempts,
        };

        let shutdown = CancellationToken::new();
        let orchestrator = Arc::new(CommandOrchestrator::new(
            Arc::new(credentials),
            Arc::new(control),
            Arc::new(probe),
            Arc::new(notifier),
            policy,
            shutdown.clone(),
        ));

        let state = Arc::new(AppState {
            orchestrator,
            fleet: Arc::new(fleet),
        });

        Ok(Self {
            state,
            listen_addr,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            state,
            listen_addr,
            shutdown,
        } = self;

        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?;
        let router = http_server::router(Arc::clone(&state));

        tracing::info!(
            addr = %listen_addr,
            targets = state.fleet.targets.len(),
            "steward ready; press Ctrl+C to stop"
        );

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                signal_token.cancel();
            }
        });

        let serve_token = shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await?;

        // The server has stopped; cancel any in-flight poll loops and give
        // them a bounded window to wind down.
        shutdown.cancel();
        state.orchestrator.close_tasks();
        match timeout(DRAIN_TIMEOUT, state.orchestrator.wait_tasks()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(crate::err!(
                "graceful shutdown timed out after {:?}",
                DRAIN_TIMEOUT
            )),
        }
    }
}
