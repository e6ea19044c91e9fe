//! Gateway Events - lifecycle facts raised by workers
//!
//! Emitted by the worker pool, the connection gateway and the endpoint
//! registry. Consumers (audit logging, tests, health probes) subscribe
//! through the [`EventBus`](crate::event_bus::EventBus) and decide which
//! events they care about.
//!
//! Events serialize with a `type` field containing the snake_case variant
//! name:
//! ```json
//! { "type": "link_rejected", "worker": 0, "address": "unknown/t1", ... }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Permission;

// ============================================================================
// LINK ROLE / REJECTION
// ============================================================================

/// Direction of a link as seen from the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    /// Device to gateway; the gateway receives messages
    Receiver,
    /// Gateway to device; the gateway sends messages
    Sender,
}

impl LinkRole {
    /// Permission a link of this role needs on its resource
    pub fn required_permission(&self) -> Permission {
        match self {
            Self::Receiver => Permission::Write,
            Self::Sender => Permission::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receiver => "receiver",
            Self::Sender => "sender",
        }
    }
}

/// Why a link attach ended in a close instead of an attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The address is not a structurally valid resource identifier
    AddressRejected,
    /// No endpoint is registered under the resolved endpoint name
    EndpointMissing,
    /// The authorization service did not grant the required permission
    Unauthorized,
    /// The connection has not completed SASL successfully
    NotAuthenticated,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddressRejected => "address_rejected",
            Self::EndpointMissing => "endpoint_missing",
            Self::Unauthorized => "unauthorized",
            Self::NotAuthenticated => "not_authenticated",
        }
    }
}

// ============================================================================
// GATEWAY EVENT ENUM
// ============================================================================

/// Lifecycle events for the whole gateway
///
/// # Event Categories
///
/// - **Workers**: started, stopped
/// - **Connections**: opened, SASL outcome, closed
/// - **Links**: attached, rejected
/// - **Registry**: duplicate endpoint registrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    // ════════════════════════════════════════════════════════════════════════
    // WORKERS
    // ════════════════════════════════════════════════════════════════════════
    /// A worker bound its listener and started its endpoints
    WorkerStarted { worker: usize, container: String },

    /// A worker closed its listener
    WorkerStopped { worker: usize },

    // ════════════════════════════════════════════════════════════════════════
    // CONNECTIONS
    // ════════════════════════════════════════════════════════════════════════
    /// A socket was accepted and handed to the protocol engine
    ConnectionOpened {
        worker: usize,
        connection_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        remote: Option<String>,
    },

    /// SASL negotiation finished for a connection
    SaslCompleted {
        worker: usize,
        connection_id: Uuid,
        succeeded: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    },

    /// A connection was closed or lost
    ConnectionClosed { worker: usize, connection_id: Uuid },

    // ════════════════════════════════════════════════════════════════════════
    // LINKS
    // ════════════════════════════════════════════════════════════════════════
    /// A link was authorized and handed to its endpoint
    LinkAttached {
        worker: usize,
        role: LinkRole,
        resource: String,
        subject: String,
    },

    /// A link was closed instead of attached
    LinkRejected {
        worker: usize,
        role: LinkRole,
        #[serde(skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        reason: RejectionReason,
    },

    // ════════════════════════════════════════════════════════════════════════
    // REGISTRY
    // ════════════════════════════════════════════════════════════════════════
    /// A second endpoint was registered under an existing name and discarded
    EndpointRegistrationRejected { worker: usize, name: String },
}

impl GatewayEvent {
    /// Get the event type name (for logging/debugging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::WorkerStarted { .. } => "worker_started",
            Self::WorkerStopped { .. } => "worker_stopped",
            Self::ConnectionOpened { .. } => "connection_opened",
            Self::SaslCompleted { .. } => "sasl_completed",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::LinkAttached { .. } => "link_attached",
            Self::LinkRejected { .. } => "link_rejected",
            Self::EndpointRegistrationRejected { .. } => "endpoint_registration_rejected",
        }
    }

    /// Worker that raised the event
    pub fn worker(&self) -> usize {
        match self {
            Self::WorkerStarted { worker, .. }
            | Self::WorkerStopped { worker }
            | Self::ConnectionOpened { worker, .. }
            | Self::SaslCompleted { worker, .. }
            | Self::ConnectionClosed { worker, .. }
            | Self::LinkAttached { worker, .. }
            | Self::LinkRejected { worker, .. }
            | Self::EndpointRegistrationRejected { worker, .. } => *worker,
        }
    }
}
