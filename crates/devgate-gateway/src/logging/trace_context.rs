//! Trace Context - connection correlation and structured logging
//!
//! Every accepted connection runs inside a span carrying the worker index
//! and a short connection id, so all link attach logs can be correlated.

use std::net::SocketAddr;
use std::time::Instant;

use devgate_core::AuthenticatedIdentity;
use tracing::{info, info_span, Span};
use uuid::Uuid;

/// Correlation data of one accepted connection
#[derive(Debug, Clone)]
pub struct ConnectionTrace {
    pub worker: usize,
    pub connection_id: Uuid,
    pub remote: Option<SocketAddr>,
    pub started_at: Instant,
}

impl ConnectionTrace {
    pub fn new(worker: usize, connection_id: Uuid, remote: Option<SocketAddr>) -> Self {
        Self {
            worker,
            connection_id,
            remote,
            started_at: Instant::now(),
        }
    }

    /// First 8 chars of the connection id
    pub fn short_id(&self) -> String {
        self.connection_id.simple().to_string()[..8].to_string()
    }

    /// Remote address for logging, `-` when unknown
    pub fn remote_label(&self) -> String {
        self.remote
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Span wrapping everything that happens on the connection
    pub fn span(&self) -> Span {
        info_span!(
            "connection",
            worker = self.worker,
            conn = %self.short_id(),
            remote = %self.remote_label(),
        )
    }

    /// Log the SASL outcome (single consolidated line)
    pub fn log_sasl(&self, succeeded: bool, principal: Option<&AuthenticatedIdentity>) {
        let subject = principal.map(|p| p.subject()).unwrap_or("-");
        if succeeded {
            info!("→ SASL ok subject={}", subject);
        } else {
            info!("→ SASL failed");
        }
    }

    /// Log connection end with its lifetime
    pub fn log_closed(&self) {
        info!("← closed ({}ms)", self.elapsed_ms());
    }
}
