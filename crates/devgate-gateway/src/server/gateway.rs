//! Connection Gateway - per-worker link attach handling
//!
//! Decides for every incoming link whether it is handed to an endpoint or
//! closed with an error condition:
//!
//! 1. parse the remote address as a resource identifier
//! 2. look up the endpoint by name
//! 3. resolve the connection's identity
//! 4. ask the authorization gate for the permission the link role needs
//! 5. mirror the terminus and hand the link to the endpoint, or close it

use std::sync::Arc;

use devgate_core::{
    AddressRejection, AuthenticatedIdentity, EventSender, GatewayConfig, GatewayEvent, LinkRole,
    RejectionReason, ResourceIdentifier, ResourceIdentifierError, TenancyMode,
};
use tracing::{debug, info, warn};

use super::StartupError;
use crate::auth::ConnectionAttachments;
use crate::authorization::AuthorizationGate;
use crate::engine::{ErrorCondition, LinkHandle, SessionHandle};
use crate::registry::{Endpoint, EndpointRegistry};

/// How a link attach ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Handed to the endpoint
    Attached(ResourceIdentifier),
    /// The address is not a valid resource identifier
    AddressRejected(ResourceIdentifierError),
    /// No endpoint registered under the resource's endpoint name
    EndpointMissing(ResourceIdentifier),
    /// The identity lacks the required permission
    Unauthorized(ResourceIdentifier),
    /// The connection did not complete SASL
    NotAuthenticated,
}

impl LinkOutcome {
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }

    fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Attached(_) => None,
            Self::AddressRejected(_) => Some(RejectionReason::AddressRejected),
            Self::EndpointMissing(_) => Some(RejectionReason::EndpointMissing),
            Self::Unauthorized(_) => Some(RejectionReason::Unauthorized),
            Self::NotAuthenticated => Some(RejectionReason::NotAuthenticated),
        }
    }
}

/// Builder for a worker's [`ConnectionGateway`]
///
/// The registry is mutable only here; `build` freezes it.
pub struct GatewayBuilder {
    worker: usize,
    container: String,
    tenancy: TenancyMode,
    address_rejection: AddressRejection,
    registry: EndpointRegistry,
    authorization: Arc<dyn AuthorizationGate>,
    events: EventSender,
}

impl GatewayBuilder {
    pub fn new(worker: usize, authorization: Arc<dyn AuthorizationGate>) -> Self {
        Self {
            worker,
            container: String::new(),
            tenancy: TenancyMode::default(),
            address_rejection: AddressRejection::default(),
            registry: EndpointRegistry::new(),
            authorization,
            events: EventSender::disconnected(),
        }
    }

    /// Take tenancy and address rejection mode from configuration
    pub fn config(mut self, config: &GatewayConfig) -> Self {
        self.tenancy = config.tenancy_mode();
        self.address_rejection = config.address_rejection;
        self
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn tenancy(mut self, tenancy: TenancyMode) -> Self {
        self.tenancy = tenancy;
        self
    }

    pub fn address_rejection(mut self, address_rejection: AddressRejection) -> Self {
        self.address_rejection = address_rejection;
        self
    }

    pub fn events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Register an endpoint; a name collision keeps the first one
    pub fn endpoint(&mut self, endpoint: Arc<dyn Endpoint>) -> bool {
        let name = endpoint.name().to_string();
        if self.registry.register(endpoint) {
            return true;
        }
        warn!(
            "[Gateway] Worker {}: multiple endpoints registered for [{}], keeping the first",
            self.worker, name
        );
        self.events.emit(GatewayEvent::EndpointRegistrationRejected {
            worker: self.worker,
            name,
        });
        false
    }

    pub fn with_endpoint(mut self, endpoint: Arc<dyn Endpoint>) -> Self {
        self.endpoint(endpoint);
        self
    }

    pub fn build(self) -> ConnectionGateway {
        ConnectionGateway {
            worker: self.worker,
            container: self.container,
            tenancy: self.tenancy,
            address_rejection: self.address_rejection,
            registry: Arc::new(self.registry),
            authorization: self.authorization,
            events: self.events,
        }
    }
}

/// Link attach protocol of one worker
pub struct ConnectionGateway {
    worker: usize,
    container: String,
    tenancy: TenancyMode,
    address_rejection: AddressRejection,
    registry: Arc<EndpointRegistry>,
    authorization: Arc<dyn AuthorizationGate>,
    events: EventSender,
}

impl ConnectionGateway {
    pub fn builder(worker: usize, authorization: Arc<dyn AuthorizationGate>) -> GatewayBuilder {
        GatewayBuilder::new(worker, authorization)
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Check readiness and start every endpoint
    ///
    /// Missing mandatory endpoints are only reported.
    pub fn start_endpoints(&self) -> Result<(), StartupError> {
        self.registry.readiness_check();
        self.registry
            .start_all()
            .map_err(|name| StartupError::EndpointStart {
                index: self.worker,
                name,
            })
    }

    /// Open a session the remote peer began
    pub fn on_session_open(
        &self,
        attachments: &ConnectionAttachments,
        session: &mut dyn SessionHandle,
    ) {
        if !attachments.is_authenticated() {
            debug!("[Gateway] Closing session on unauthenticated connection");
            session.close();
            return;
        }
        session.open();
    }

    /// Close a session the remote peer ended
    pub fn on_session_close(&self, session: &mut dyn SessionHandle) {
        session.close();
    }

    /// Run the attach protocol for a link opened by the remote peer
    pub async fn attach_link(
        &self,
        attachments: &ConnectionAttachments,
        link: Box<dyn LinkHandle>,
    ) -> LinkOutcome {
        let role = link.role();
        let address = link.remote_address();
        let outcome = self.attach(attachments, role, address.as_deref(), link).await;

        if let Some(reason) = outcome.rejection_reason() {
            self.events.emit(GatewayEvent::LinkRejected {
                worker: self.worker,
                role,
                address,
                reason,
            });
        }
        outcome
    }

    async fn attach(
        &self,
        attachments: &ConnectionAttachments,
        role: LinkRole,
        address: Option<&str>,
        mut link: Box<dyn LinkHandle>,
    ) -> LinkOutcome {
        if !attachments.is_authenticated() {
            debug!("[Gateway] Rejecting {} link on unauthenticated connection", role.as_str());
            link.set_condition(ErrorCondition::unauthorized_access(
                "connection is not authenticated",
            ));
            link.close();
            return LinkOutcome::NotAuthenticated;
        }

        debug!(
            "[Gateway] Client wants to attach {} link to [{}]",
            role.as_str(),
            address.unwrap_or("")
        );

        let resource = match ResourceIdentifier::parse(address.unwrap_or(""), self.tenancy) {
            Ok(resource) => resource,
            Err(e) => {
                debug!("[Gateway] Client provided invalid resource identifier: {}", e);
                self.reject_address(role, link.as_mut(), &e);
                return LinkOutcome::AddressRejected(e);
            }
        };

        let Some(endpoint) = self.registry.lookup(resource.endpoint()) else {
            info!(
                "[Gateway] No endpoint registered for [{}], closing {} link",
                resource.endpoint(),
                role.as_str()
            );
            link.set_condition(ErrorCondition::not_found(format!(
                "no endpoint registered for {}",
                resource.endpoint()
            )));
            link.close();
            return LinkOutcome::EndpointMissing(resource);
        };

        let identity = AuthenticatedIdentity::or_default(attachments.principal());
        let permission = role.required_permission();

        if !self.authorization.check(&identity, &resource, permission).await {
            let message = format!(
                "[{}] is not authorized to attach to [{}]",
                identity.subject(),
                resource
            );
            debug!("[Gateway] {}", message);
            link.set_condition(ErrorCondition::unauthorized_access(message));
            link.close();
            return LinkOutcome::Unauthorized(resource);
        }

        debug!(
            "[Gateway] [{}] may attach {} link to [{}]",
            identity,
            role.as_str(),
            resource
        );
        link.mirror_remote_terminus();
        endpoint.on_link_attach(link, resource.clone());

        self.events.emit(GatewayEvent::LinkAttached {
            worker: self.worker,
            role,
            resource: resource.to_address(),
            subject: identity.subject().to_string(),
        });
        LinkOutcome::Attached(resource)
    }

    fn reject_address(
        &self,
        role: LinkRole,
        link: &mut dyn LinkHandle,
        error: &ResourceIdentifierError,
    ) {
        let with_condition = match (self.address_rejection, role) {
            (AddressRejection::Uniform, _) => true,
            (AddressRejection::Asymmetric, LinkRole::Receiver) => true,
            (AddressRejection::Asymmetric, LinkRole::Sender) => false,
        };
        if with_condition {
            link.set_condition(ErrorCondition::invalid_field(error.to_string()));
        }
        link.close();
    }
}
