//! Gateway Server
//!
//! AMQP 1.0 front door: binds the listening socket once, deploys one worker
//! per configured instance and shuts them down again. All external
//! collaborators (protocol engine, endpoints, authorization service) are
//! injected through [`GatewayDependencies`].

mod connection;
mod gateway;
mod startup;
mod worker;

pub use connection::ConnectionDriver;
pub use gateway::{ConnectionGateway, GatewayBuilder, LinkOutcome};
pub use startup::{RunningWorker, StartupError, WorkerLauncher, WorkerPool};
pub use worker::{EndpointFactory, GatewayLauncher, GatewayWorker, WorkerContext};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use devgate_core::{EventBus, EventReceiver, GatewayConfig};
use tracing::info;

use crate::authorization::AuthorizationService;
use crate::engine::ProtocolEngine;

/// External collaborators of the gateway
#[derive(Clone)]
pub struct GatewayDependencies {
    pub engine: Arc<dyn ProtocolEngine>,
    pub endpoints: Arc<dyn EndpointFactory>,
    pub authorization: Arc<dyn AuthorizationService>,
}

/// AMQP gateway before startup
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    dependencies: GatewayDependencies,
    event_bus: EventBus,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, dependencies: GatewayDependencies) -> Self {
        Self {
            config: Arc::new(config),
            dependencies,
            event_bus: EventBus::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Subscribe to gateway events, including those raised during startup
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Bind the listener and deploy all workers
    ///
    /// Resolves once every worker accepts connections, or fails after
    /// stopping the workers that did start.
    pub async fn start(self) -> Result<RunningGateway, StartupError> {
        let Self {
            config,
            dependencies,
            event_bus,
        } = self;

        let launcher = GatewayLauncher::bind(
            config.clone(),
            dependencies.engine,
            dependencies.endpoints,
            dependencies.authorization,
            event_bus.sender(),
        )?;
        let local_addr = launcher.local_addr();

        let pool = WorkerPool::start(
            Arc::new(launcher),
            config.instance_count(),
            config.startup_timeout(),
            config.shutdown_timeout(),
        )
        .await?;

        info!(
            "[Gateway] AMQP gateway listening on {} with {} worker(s)",
            local_addr,
            pool.len()
        );

        Ok(RunningGateway {
            pool,
            local_addr,
            shutdown_timeout: config.shutdown_timeout(),
            event_bus,
        })
    }
}

/// AMQP gateway after a successful startup
pub struct RunningGateway {
    pool: WorkerPool,
    local_addr: SocketAddr,
    shutdown_timeout: Duration,
    event_bus: EventBus,
}

impl RunningGateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Shut down with the configured timeout
    pub async fn shutdown(self) -> bool {
        let timeout = self.shutdown_timeout;
        self.shutdown_within(timeout).await
    }

    pub async fn shutdown_within(self, timeout: Duration) -> bool {
        info!("[Gateway] Shutting down");
        self.pool.shutdown(timeout).await
    }

    /// Shut down and report the outcome to `handler`
    pub async fn shutdown_then<F>(self, handler: F)
    where
        F: FnOnce(bool) + Send,
    {
        let timeout = self.shutdown_timeout;
        self.pool.shutdown_then(timeout, handler).await
    }
}
