//! Gateway worker - one single-threaded event loop per instance
//!
//! Each worker runs on its own OS thread with a current-thread runtime.
//! Workers share the listening socket (bound once by the launcher) and keep
//! everything else to themselves: endpoint registry, authorization channel,
//! connection set.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devgate_core::{EventSender, GatewayConfig, GatewayEvent};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::connection::ConnectionDriver;
use super::gateway::ConnectionGateway;
use super::startup::{RunningWorker, StartupError, WorkerLauncher};
use crate::auth::AuthenticatorFactory;
use crate::authorization::{AuthorizationChannel, AuthorizationService, ChannelAuthorizationGate};
use crate::engine::ProtocolEngine;
use crate::registry::Endpoint;

/// Creates the endpoints of one worker
pub trait EndpointFactory: Send + Sync + 'static {
    fn create(&self, worker: usize) -> Vec<Arc<dyn Endpoint>>;
}

impl<F> EndpointFactory for F
where
    F: Fn(usize) -> Vec<Arc<dyn Endpoint>> + Send + Sync + 'static,
{
    fn create(&self, worker: usize) -> Vec<Arc<dyn Endpoint>> {
        self(worker)
    }
}

/// Everything a worker needs to run
pub struct WorkerContext {
    pub index: usize,
    pub config: Arc<GatewayConfig>,
    pub listener: std::net::TcpListener,
    pub engine: Arc<dyn ProtocolEngine>,
    pub endpoints: Arc<dyn EndpointFactory>,
    pub authorization: Arc<dyn AuthorizationService>,
    pub authenticators: AuthenticatorFactory,
    pub events: EventSender,
}

/// Handle of a running worker thread
pub struct GatewayWorker {
    index: usize,
    shutdown: CancellationToken,
    finished: oneshot::Receiver<()>,
    _guard: DropGuard,
}

impl GatewayWorker {
    /// Start a worker thread and wait until it accepts connections
    pub async fn spawn(context: WorkerContext) -> Result<Self, StartupError> {
        let index = context.index;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        std::thread::Builder::new()
            .name(format!("gateway-worker-{}", index))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(StartupError::WorkerFailed {
                            index,
                            reason: format!("failed to build runtime: {}", e),
                        }));
                        return;
                    }
                };
                runtime.block_on(run(context, ready_tx, token));
                // Dropping the runtime cancels the remaining connection tasks
                drop(runtime);
                let _ = finished_tx.send(());
            })
            .map_err(|e| StartupError::WorkerFailed {
                index,
                reason: format!("failed to spawn thread: {}", e),
            })?;

        // Abandoning this future before ready must still stop the thread
        let guard = shutdown.clone().drop_guard();

        match ready_rx.await {
            Ok(Ok(local_addr)) => {
                debug!("[Worker {}] Ready on {}", index, local_addr);
                Ok(Self {
                    index,
                    shutdown,
                    finished: finished_rx,
                    _guard: guard,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StartupError::WorkerAborted { index }),
        }
    }
}

#[async_trait]
impl RunningWorker for GatewayWorker {
    fn index(&self) -> usize {
        self.index
    }

    async fn stop(self: Box<Self>, timeout: Duration) -> bool {
        let Self {
            index,
            shutdown,
            finished,
            ..
        } = *self;
        shutdown.cancel();

        match tokio::time::timeout(timeout, finished).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                warn!("[Worker {}] Thread ended abnormally", index);
                false
            }
            Err(_) => {
                warn!("[Worker {}] Did not stop within {:?}", index, timeout);
                false
            }
        }
    }
}

async fn run(
    context: WorkerContext,
    ready: oneshot::Sender<Result<SocketAddr, StartupError>>,
    shutdown: CancellationToken,
) {
    let WorkerContext {
        index,
        config,
        listener,
        engine,
        endpoints,
        authorization,
        authenticators,
        events,
    } = context;

    let listener = match adopt_listener(index, listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!("[Worker {}] {}", index, e);
            let _ = ready.send(Err(e));
            return;
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(source) => {
            let _ = ready.send(Err(StartupError::WorkerBind { index, source }));
            return;
        }
    };
    let container = config.container_id(local_addr.port(), index);

    let (channel, inbox) = AuthorizationChannel::open(
        config.authorization_address(index),
        config.authorization.queue_capacity,
    );
    let _authorization_service = inbox.serve(authorization);
    let gate = Arc::new(ChannelAuthorizationGate::new(
        channel,
        config.authorization.timeout(),
    ));

    let mut builder = ConnectionGateway::builder(index, gate)
        .config(&config)
        .container(container.clone())
        .events(events.clone());
    for endpoint in endpoints.create(index) {
        builder.endpoint(endpoint);
    }
    let gateway = Arc::new(builder.build());

    if let Err(e) = gateway.start_endpoints() {
        error!("[Worker {}] {}", index, e);
        let _ = ready.send(Err(e));
        return;
    }

    info!("[Worker {}] Listening on {} as [{}]", index, local_addr, container);
    events.emit(GatewayEvent::WorkerStarted {
        worker: index,
        container,
    });

    if ready.send(Ok(local_addr)).is_err() {
        warn!("[Worker {}] Startup abandoned, stopping", index);
    } else {
        accept_loop(index, listener, engine, authenticators, gateway, shutdown).await;
    }

    events.emit(GatewayEvent::WorkerStopped { worker: index });
    info!("[Worker {}] Stopped", index);
}

/// Register the shared listener with this worker's runtime
fn adopt_listener(
    index: usize,
    listener: std::net::TcpListener,
) -> Result<TcpListener, StartupError> {
    listener
        .set_nonblocking(true)
        .and_then(|_| TcpListener::from_std(listener))
        .map_err(|source| StartupError::WorkerBind { index, source })
}

async fn accept_loop(
    index: usize,
    listener: TcpListener,
    engine: Arc<dyn ProtocolEngine>,
    authenticators: AuthenticatorFactory,
    gateway: Arc<ConnectionGateway>,
    shutdown: CancellationToken,
) {
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<Uuid>();
    let mut connections: HashMap<Uuid, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(id) = closed_rx.recv() => {
                connections.remove(&id);
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, remote)) => {
                    debug!("[Worker {}] Accepted connection from {}", index, remote);
                    let driver = ConnectionDriver::new(
                        socket,
                        engine.clone(),
                        authenticators.clone(),
                        gateway.clone(),
                    );
                    let id = driver.id();
                    let closed = closed_tx.clone();
                    let task = tokio::spawn(async move {
                        driver.run().await;
                        let _ = closed.send(id);
                    });
                    connections.insert(id, task);
                }
                Err(e) => warn!("[Worker {}] Failed to accept connection: {}", index, e),
            },
        }
    }

    info!(
        "[Worker {}] Closing listener and {} connection(s)",
        index,
        connections.len()
    );
    for (_, task) in connections.drain() {
        task.abort();
    }
}

/// Launches [`GatewayWorker`]s on a listener bound once for all of them
pub struct GatewayLauncher {
    config: Arc<GatewayConfig>,
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
    engine: Arc<dyn ProtocolEngine>,
    endpoints: Arc<dyn EndpointFactory>,
    authorization: Arc<dyn AuthorizationService>,
    authenticators: AuthenticatorFactory,
    events: EventSender,
}

impl GatewayLauncher {
    /// Bind the shared listener on the configured address and port
    pub fn bind(
        config: Arc<GatewayConfig>,
        engine: Arc<dyn ProtocolEngine>,
        endpoints: Arc<dyn EndpointFactory>,
        authorization: Arc<dyn AuthorizationService>,
        events: EventSender,
    ) -> Result<Self, StartupError> {
        let address = format!("{}:{}", config.bind_address, config.port);
        let bind_error = |source: std::io::Error| {
            error!("[Startup] Failed to bind {}: {}", address, source);
            StartupError::Bind {
                address: address.clone(),
                source,
            }
        };
        let listener = std::net::TcpListener::bind(&address).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!("[Startup] Bound {}", local_addr);

        let authenticators = AuthenticatorFactory::from_config(&config.sasl);

        Ok(Self {
            config,
            listener,
            local_addr,
            engine,
            endpoints,
            authorization,
            authenticators,
            events,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl WorkerLauncher for GatewayLauncher {
    async fn launch(&self, index: usize) -> Result<Box<dyn RunningWorker>, StartupError> {
        let listener = self
            .listener
            .try_clone()
            .map_err(|source| StartupError::WorkerBind { index, source })?;

        let worker = GatewayWorker::spawn(WorkerContext {
            index,
            config: self.config.clone(),
            listener,
            engine: self.engine.clone(),
            endpoints: self.endpoints.clone(),
            authorization: self.authorization.clone(),
            authenticators: self.authenticators.clone(),
            events: self.events.clone(),
        })
        .await?;

        Ok(Box::new(worker))
    }
}
