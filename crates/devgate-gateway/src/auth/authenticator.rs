//! PLAIN SASL authenticator, one per accepted connection

use std::sync::Arc;

use devgate_core::constants::{SASL_OAUTHBEARER, SASL_PLAIN};
use devgate_core::{AuthenticatedIdentity, SaslConfig};
use tracing::{debug, info, warn};

use super::credentials::{verifier_for, CredentialVerifier};
use super::plain::decode_plain;
use super::ConnectionAttachments;
use crate::engine::{SaslAuthenticator, SaslOutcome, SaslTransport};

/// Creates a fresh authenticator for every accepted connection
#[derive(Clone)]
pub struct AuthenticatorFactory {
    verifier: Arc<dyn CredentialVerifier>,
}

impl AuthenticatorFactory {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    /// Build from configuration, reporting mechanisms that cannot be offered
    pub fn from_config(config: &SaslConfig) -> Self {
        for mechanism in &config.mechanisms {
            if mechanism == SASL_OAUTHBEARER {
                warn!(
                    "[Auth] SASL mechanism {} is configured but not implemented, offering {} only",
                    SASL_OAUTHBEARER, SASL_PLAIN
                );
            } else if mechanism != SASL_PLAIN {
                warn!("[Auth] Ignoring unknown SASL mechanism [{}]", mechanism);
            }
        }
        if !config.mechanisms.iter().any(|m| m == SASL_PLAIN) {
            warn!("[Auth] {} missing from configured mechanisms, offering it anyway", SASL_PLAIN);
        }

        let verifier = verifier_for(&config.credentials);
        info!("[Auth] PLAIN authentication with {} credentials", verifier.name());
        Self::new(verifier)
    }

    pub fn create(&self) -> PlainAuthenticator {
        PlainAuthenticator::new(self.verifier.clone())
    }
}

/// Server side of SASL PLAIN
///
/// Offers PLAIN only and never lets a client skip SASL. On success the
/// authentication id becomes the connection's principal.
pub struct PlainAuthenticator {
    verifier: Arc<dyn CredentialVerifier>,
    succeeded: bool,
}

impl PlainAuthenticator {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            succeeded: false,
        }
    }

    fn evaluate_plain(
        &self,
        transport: &mut dyn SaslTransport,
        attachments: &mut ConnectionAttachments,
    ) -> bool {
        let response = transport.recv_response();
        let credentials = match decode_plain(&response) {
            Ok(credentials) => credentials,
            Err(e) => {
                debug!("[Auth] Invalid PLAIN response: {}", e);
                return false;
            }
        };

        debug!("[Auth] Client presents credentials of [{}]", credentials.authcid());
        if !self
            .verifier
            .verify(credentials.authcid(), credentials.password())
        {
            return false;
        }

        // An empty authcid binds no identity; attaches fall back to the default subject
        if !credentials.authcid().is_empty() {
            attachments.set_principal(AuthenticatedIdentity::new(credentials.authcid()));
        }
        true
    }
}

impl SaslAuthenticator for PlainAuthenticator {
    fn init(&mut self, transport: &mut dyn SaslTransport) {
        transport.set_server_mode();
        transport.allow_skip(false);
        transport.set_mechanisms(&[SASL_PLAIN]);
    }

    fn process(
        &mut self,
        transport: &mut dyn SaslTransport,
        attachments: &mut ConnectionAttachments,
    ) -> bool {
        let remote = transport.remote_mechanisms();
        let Some(chosen) = remote.first() else {
            return false;
        };
        debug!("[Auth] Client wants to use {} SASL mechanism", chosen);

        self.succeeded = chosen == SASL_PLAIN && self.evaluate_plain(transport, attachments);

        if self.succeeded {
            transport.done(SaslOutcome::Ok);
        } else {
            transport.done(SaslOutcome::Auth);
        }
        true
    }

    fn succeeded(&self) -> bool {
        self.succeeded
    }
}
