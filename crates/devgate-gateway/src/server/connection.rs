//! Connection driver - one task per accepted socket
//!
//! Hands the socket to the protocol engine together with a fresh PLAIN
//! authenticator, then dispatches the engine's connection events to the
//! worker's [`ConnectionGateway`]. Every link attach runs as its own task so
//! a slow authorization reply never blocks other links on the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use devgate_core::GatewayEvent;
use tokio::net::TcpStream;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use super::gateway::ConnectionGateway;
use crate::auth::{AuthenticatorFactory, ConnectionAttachments};
use crate::engine::{
    ConnectionEvent, EngineConnection, ProtocolEngine, SaslAuthenticator, SaslSession,
};
use crate::logging::ConnectionTrace;

pub struct ConnectionDriver {
    id: Uuid,
    socket: TcpStream,
    remote: Option<SocketAddr>,
    engine: Arc<dyn ProtocolEngine>,
    authenticators: AuthenticatorFactory,
    gateway: Arc<ConnectionGateway>,
}

impl ConnectionDriver {
    pub fn new(
        socket: TcpStream,
        engine: Arc<dyn ProtocolEngine>,
        authenticators: AuthenticatorFactory,
        gateway: Arc<ConnectionGateway>,
    ) -> Self {
        let remote = socket.peer_addr().ok();
        Self {
            id: Uuid::new_v4(),
            socket,
            remote,
            engine,
            authenticators,
            gateway,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive the connection until it is closed or lost
    pub async fn run(self) {
        let trace = ConnectionTrace::new(self.gateway.worker(), self.id, self.remote);
        let span = trace.span();
        self.drive(trace).instrument(span).await
    }

    async fn drive(self, trace: ConnectionTrace) {
        let Self {
            id,
            socket,
            remote,
            engine,
            authenticators,
            gateway,
        } = self;
        let worker = gateway.worker();
        let events = gateway.events().clone();

        events.emit(GatewayEvent::ConnectionOpened {
            worker,
            connection_id: id,
            remote: remote.map(|addr| addr.to_string()),
        });

        let mut attachments = ConnectionAttachments::default();
        let mut authenticator = authenticators.create();
        let accepted = engine
            .accept(socket, SaslSession::new(&mut authenticator, &mut attachments))
            .await;

        let EngineConnection {
            mut connection,
            events: mut connection_events,
        } = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("[Connection] Engine rejected connection: {}", e);
                events.emit(GatewayEvent::ConnectionClosed {
                    worker,
                    connection_id: id,
                });
                return;
            }
        };

        let succeeded = authenticator.succeeded();
        attachments.set_authenticated(succeeded);
        trace.log_sasl(succeeded, attachments.principal());
        events.emit(GatewayEvent::SaslCompleted {
            worker,
            connection_id: id,
            succeeded,
            subject: attachments.principal().map(|p| p.subject().to_string()),
        });

        connection.set_container(gateway.container());

        while let Some(event) = connection_events.recv().await {
            debug!("[Connection] Event {}", event.name());
            match event {
                ConnectionEvent::Opened => {
                    debug!(
                        "[Connection] Client [{}:{}] connected",
                        connection.remote_hostname().unwrap_or_default(),
                        connection.remote_container().unwrap_or_default()
                    );
                    connection.open();
                }
                ConnectionEvent::SessionOpened(mut session) => {
                    gateway.on_session_open(&attachments, session.as_mut());
                }
                ConnectionEvent::SessionClosed(mut session) => {
                    gateway.on_session_close(session.as_mut());
                }
                ConnectionEvent::ReceiverOpened(link) | ConnectionEvent::SenderOpened(link) => {
                    let gateway = gateway.clone();
                    let attachments = attachments.clone();
                    tokio::spawn(
                        async move {
                            gateway.attach_link(&attachments, link).await;
                        }
                        .in_current_span(),
                    );
                }
                ConnectionEvent::Closed => {
                    debug!("[Connection] Client closed connection");
                    connection.close();
                    break;
                }
                ConnectionEvent::Disconnected => {
                    debug!("[Connection] Client disconnected");
                    connection.disconnect();
                    break;
                }
            }
        }

        trace.log_closed();
        events.emit(GatewayEvent::ConnectionClosed {
            worker,
            connection_id: id,
        });
    }
}
