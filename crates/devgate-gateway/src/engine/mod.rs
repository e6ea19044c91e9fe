//! Protocol engine seam
//!
//! The AMQP 1.0 frame codec, flow control and session/link bookkeeping live
//! in an external protocol engine. The gateway only:
//! - hands every accepted socket to the engine together with a SASL session,
//! - reacts to the connection/session/link events the engine raises,
//! - issues commands back through the handles carried by those events
//!   (open, mirror terminus, set condition, close).

mod condition;

pub use condition::{conditions, ErrorCondition};

use async_trait::async_trait;
use devgate_core::LinkRole;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::auth::ConnectionAttachments;

// ============================================================================
// SASL
// ============================================================================

/// Outcome signalled to the remote peer at the end of SASL negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslOutcome {
    /// Authentication succeeded
    Ok,
    /// Authentication failed (bad credentials or malformed response)
    Auth,
}

/// Engine-side SASL layer of one transport
pub trait SaslTransport: Send {
    /// Act as the SASL server of this transport
    fn set_server_mode(&mut self);

    /// Whether a client may skip SASL altogether
    fn allow_skip(&mut self, allow: bool);

    /// Mechanisms offered to the client
    fn set_mechanisms(&mut self, mechanisms: &[&str]);

    /// Mechanisms proposed by the client, preferred first; empty until known
    fn remote_mechanisms(&self) -> Vec<String>;

    /// Take the pending initial response bytes
    fn recv_response(&mut self) -> Vec<u8>;

    /// Conclude negotiation with the given outcome
    fn done(&mut self, outcome: SaslOutcome);
}

/// Server side of a SASL negotiation, one instance per connection
pub trait SaslAuthenticator: Send {
    /// Configure the transport before the mechanism list is sent
    fn init(&mut self, transport: &mut dyn SaslTransport);

    /// Called whenever the transport has mechanism bytes available.
    ///
    /// Returns `false` while the client has not proposed a mechanism yet,
    /// `true` once an outcome has been signalled.
    fn process(
        &mut self,
        transport: &mut dyn SaslTransport,
        attachments: &mut ConnectionAttachments,
    ) -> bool;

    /// Outcome of the last completed negotiation step
    fn succeeded(&self) -> bool;
}

/// A SASL negotiation as handed to the engine for one accepted socket
///
/// Pairs the authenticator with the connection-scoped storage it publishes
/// the authenticated identity into.
pub struct SaslSession<'a> {
    authenticator: &'a mut dyn SaslAuthenticator,
    attachments: &'a mut ConnectionAttachments,
}

impl<'a> SaslSession<'a> {
    pub fn new(
        authenticator: &'a mut dyn SaslAuthenticator,
        attachments: &'a mut ConnectionAttachments,
    ) -> Self {
        Self {
            authenticator,
            attachments,
        }
    }

    pub fn init(&mut self, transport: &mut dyn SaslTransport) {
        self.authenticator.init(transport);
    }

    pub fn process(&mut self, transport: &mut dyn SaslTransport) -> bool {
        self.authenticator.process(transport, self.attachments)
    }

    pub fn succeeded(&self) -> bool {
        self.authenticator.succeeded()
    }
}

// ============================================================================
// HANDLES
// ============================================================================

/// Engine handle of an AMQP connection
pub trait ConnectionHandle: Send {
    /// Container id announced in the local open frame
    fn set_container(&mut self, container: &str);

    fn remote_hostname(&self) -> Option<String>;

    fn remote_container(&self) -> Option<String>;

    /// Send the local open frame
    fn open(&mut self);

    /// Send the local close frame
    fn close(&mut self);

    /// Drop the transport without a close handshake
    fn disconnect(&mut self);
}

/// Engine handle of a session
pub trait SessionHandle: Send {
    fn open(&mut self);

    fn close(&mut self);
}

/// Engine handle of a link
pub trait LinkHandle: Send {
    fn role(&self) -> LinkRole;

    /// Remote terminus address: the target of a receiver, the source of a sender
    fn remote_address(&self) -> Option<String>;

    /// Set the local terminus to mirror the remote one
    fn mirror_remote_terminus(&mut self);

    /// Error condition sent with the next detach
    fn set_condition(&mut self, condition: ErrorCondition);

    fn close(&mut self);
}

// ============================================================================
// EVENTS
// ============================================================================

/// Lifecycle events raised by the engine for one connection
pub enum ConnectionEvent {
    /// The remote peer sent its open frame
    Opened,
    /// The remote peer began a session
    SessionOpened(Box<dyn SessionHandle>),
    /// The remote peer ended a session
    SessionClosed(Box<dyn SessionHandle>),
    /// The remote peer attached a link sending to the gateway
    ReceiverOpened(Box<dyn LinkHandle>),
    /// The remote peer attached a link receiving from the gateway
    SenderOpened(Box<dyn LinkHandle>),
    /// The remote peer closed the connection
    Closed,
    /// The transport was lost
    Disconnected,
}

impl ConnectionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::SessionOpened(_) => "session_opened",
            Self::SessionClosed(_) => "session_closed",
            Self::ReceiverOpened(_) => "receiver_opened",
            Self::SenderOpened(_) => "sender_opened",
            Self::Closed => "closed",
            Self::Disconnected => "disconnected",
        }
    }
}

/// A connection after the engine finished the transport and SASL layers
pub struct EngineConnection {
    pub connection: Box<dyn ConnectionHandle>,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// External AMQP 1.0 engine
#[async_trait]
pub trait ProtocolEngine: Send + Sync + 'static {
    /// Take over an accepted socket.
    ///
    /// The engine drives `sasl` (calling `init` once and `process` until it
    /// returns `true`) before it raises any connection event.
    async fn accept(
        &self,
        socket: TcpStream,
        sasl: SaslSession<'_>,
    ) -> Result<EngineConnection, EngineError>;
}
