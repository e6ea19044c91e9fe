//! Authorization request messages
//!
//! The payload a worker sends to its authorization service before handing a
//! link to an endpoint. The service replies with a plain string body; only
//! the exact literal [`AUTHORIZATION_ALLOWED`] grants access.

use serde::{Deserialize, Serialize};

use super::{AuthenticatedIdentity, Permission, ResourceIdentifier};
use crate::constants::AUTHORIZATION_ALLOWED;

/// `{subject, resource, permission}` as sent to the authorization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub subject: String,
    pub resource: String,
    pub permission: Permission,
}

impl AuthorizationRequest {
    pub fn new(
        identity: &AuthenticatedIdentity,
        resource: &ResourceIdentifier,
        permission: Permission,
    ) -> Self {
        Self {
            subject: identity.subject().to_string(),
            resource: resource.to_address(),
            permission,
        }
    }
}

/// Whether a reply body grants access
pub fn is_allowed(reply: &str) -> bool {
    reply == AUTHORIZATION_ALLOWED
}
