//! Authorization of link attaches
//!
//! Every worker talks to its own authorization service over a typed
//! request/reply channel addressed `<base>.<worker index>`. The gate sends
//! `{subject, resource, permission}` and treats anything but the reply
//! `"allowed"` (including transport failures and timeouts) as a denial.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devgate_core::domain::authorization::is_allowed;
use devgate_core::{AuthenticatedIdentity, AuthorizationRequest, Permission, ResourceIdentifier};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Decides whether an identity may use a resource with a permission
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn check(
        &self,
        identity: &AuthenticatedIdentity,
        resource: &ResourceIdentifier,
        permission: Permission,
    ) -> bool;
}

/// Server side answering authorization requests
///
/// The reply body is compared against `"allowed"`; an error sends no reply.
#[async_trait]
pub trait AuthorizationService: Send + Sync + 'static {
    async fn authorize(&self, request: &AuthorizationRequest) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("no authorization service listening on [{0}]")]
    ServiceUnavailable(String),
    #[error("authorization service on [{0}] sent no reply")]
    NoReply(String),
}

/// One request in flight together with its reply slot
pub struct AuthorizationExchange {
    pub request: AuthorizationRequest,
    reply: oneshot::Sender<String>,
}

impl AuthorizationExchange {
    pub fn reply(self, body: impl Into<String>) {
        // The requester may have timed out already
        let _ = self.reply.send(body.into());
    }
}

/// Requesting end of a worker's authorization channel
#[derive(Clone)]
pub struct AuthorizationChannel {
    address: String,
    sender: mpsc::Sender<AuthorizationExchange>,
}

/// Serving end of a worker's authorization channel
pub struct AuthorizationInbox {
    address: String,
    receiver: mpsc::Receiver<AuthorizationExchange>,
}

impl AuthorizationChannel {
    /// Open a channel under `address` buffering at most `capacity` requests
    pub fn open(address: impl Into<String>, capacity: usize) -> (Self, AuthorizationInbox) {
        let address = address.into();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                address: address.clone(),
                sender,
            },
            AuthorizationInbox { address, receiver },
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a request and wait for its reply body
    pub async fn request(
        &self,
        request: AuthorizationRequest,
    ) -> Result<String, AuthorizationError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(AuthorizationExchange { request, reply })
            .await
            .map_err(|_| AuthorizationError::ServiceUnavailable(self.address.clone()))?;

        response
            .await
            .map_err(|_| AuthorizationError::NoReply(self.address.clone()))
    }
}

impl AuthorizationInbox {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next pending request, `None` once every requester is gone
    pub async fn next(&mut self) -> Option<AuthorizationExchange> {
        self.receiver.recv().await
    }

    /// Answer requests with `service` until every requester is gone
    ///
    /// Requests are answered concurrently; replies may complete in any order.
    pub fn serve(mut self, service: Arc<dyn AuthorizationService>) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("[Authorization] Serving requests on [{}]", self.address);
            while let Some(exchange) = self.next().await {
                let service = service.clone();
                let address = self.address.clone();
                tokio::spawn(async move {
                    match service.authorize(&exchange.request).await {
                        Ok(body) => exchange.reply(body),
                        Err(e) => {
                            warn!("[Authorization] Service on [{}] failed: {}", address, e);
                        }
                    }
                });
            }
            debug!("[Authorization] Channel [{}] closed", self.address);
        })
    }
}

/// Gate backed by an [`AuthorizationChannel`]
pub struct ChannelAuthorizationGate {
    channel: AuthorizationChannel,
    timeout: Duration,
}

impl ChannelAuthorizationGate {
    pub fn new(channel: AuthorizationChannel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }
}

#[async_trait]
impl AuthorizationGate for ChannelAuthorizationGate {
    async fn check(
        &self,
        identity: &AuthenticatedIdentity,
        resource: &ResourceIdentifier,
        permission: Permission,
    ) -> bool {
        let request = AuthorizationRequest::new(identity, resource, permission);
        match tokio::time::timeout(self.timeout, self.channel.request(request)).await {
            Ok(Ok(body)) => {
                let allowed = is_allowed(&body);
                debug!(
                    "[Authorization] [{}] {} on [{}]: {}",
                    identity, permission, resource, body
                );
                allowed
            }
            Ok(Err(e)) => {
                debug!("[Authorization] Denying [{}] on [{}]: {}", identity, resource, e);
                false
            }
            Err(_) => {
                debug!(
                    "[Authorization] Denying [{}] on [{}]: no reply from [{}] within {:?}",
                    identity,
                    resource,
                    self.channel.address(),
                    self.timeout
                );
                false
            }
        }
    }
}

/// Gate that grants every request
///
/// For setups without an authorization service.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGate;

#[async_trait]
impl AuthorizationGate for AllowAllGate {
    async fn check(
        &self,
        _identity: &AuthenticatedIdentity,
        _resource: &ResourceIdentifier,
        _permission: Permission,
    ) -> bool {
        true
    }
}
