//! Client authentication for the gateway
//!
//! SASL PLAIN negotiation for accepted AMQP connections. The authenticator
//! decodes the client's initial response, verifies the credentials and
//! records the authenticated identity on the connection.

mod authenticator;
mod credentials;
mod plain;

pub use authenticator::{AuthenticatorFactory, PlainAuthenticator};
pub use credentials::{
    password_digest, verifier_for, AcceptAllCredentials, CredentialVerifier, StaticCredentials,
};
pub use plain::{decode_plain, PlainCredentials, PlainDecodeError};

use devgate_core::AuthenticatedIdentity;

/// Connection-scoped storage filled in during SASL negotiation
///
/// Read by every link attach on the connection afterwards.
#[derive(Debug, Clone, Default)]
pub struct ConnectionAttachments {
    principal: Option<AuthenticatedIdentity>,
    authenticated: bool,
}

impl ConnectionAttachments {
    /// Attachments of a connection that completed SASL successfully
    pub fn authenticated(principal: Option<AuthenticatedIdentity>) -> Self {
        Self {
            principal,
            authenticated: true,
        }
    }

    /// Bind the identity established by SASL
    pub fn set_principal(&mut self, principal: AuthenticatedIdentity) {
        self.principal = Some(principal);
    }

    pub fn principal(&self) -> Option<&AuthenticatedIdentity> {
        self.principal.as_ref()
    }

    /// Record the final SASL outcome
    ///
    /// A failed negotiation also drops any identity bound earlier.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
        if !authenticated {
            self.principal = None;
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
