//! Domain types and value objects
//!
//! - Resource identifiers and tenancy modes
//! - Identities and permissions
//! - Authorization request messages
//! - Gateway configuration
//! - Gateway events

pub mod authorization;
pub mod config;
mod event;
mod identity;
mod permission;
mod resource;

pub use authorization::AuthorizationRequest;
pub use config::{
    AddressRejection, AuthorizationConfig, ConfigError, CredentialPolicy, GatewayConfig,
    LoggingConfig, SaslConfig,
};
pub use event::{GatewayEvent, LinkRole, RejectionReason};
pub use identity::AuthenticatedIdentity;
pub use permission::Permission;
pub use resource::{ResourceIdentifier, ResourceIdentifierError, TenancyMode};
