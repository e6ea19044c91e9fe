//! Credential verification behind the PLAIN mechanism

use std::collections::HashMap;
use std::sync::Arc;

use devgate_core::CredentialPolicy;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Checks a decoded user name / password pair
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, authcid: &str, password: &str) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Accepts any structurally valid credentials
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllCredentials;

impl CredentialVerifier for AcceptAllCredentials {
    fn verify(&self, authcid: &str, _password: &str) -> bool {
        debug!("[Auth] Accepting credentials of [{}] without verification", authcid);
        true
    }

    fn name(&self) -> &'static str {
        "accept_all"
    }
}

/// Verifies passwords against configured SHA-256 digests
///
/// An empty user table rejects everyone.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    /// Build from a table of user name to hex-encoded SHA-256 password digest
    pub fn new(users: HashMap<String, String>) -> Self {
        let users = users
            .into_iter()
            .map(|(user, digest)| (user, digest.to_ascii_lowercase()))
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, authcid: &str, password: &str) -> bool {
        let Some(expected) = self.users.get(authcid) else {
            debug!("[Auth] Unknown user [{}]", authcid);
            return false;
        };

        let matches = password_digest(password) == *expected;
        if !matches {
            debug!("[Auth] Password mismatch for user [{}]", authcid);
        }
        matches
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Hex-encoded SHA-256 digest of a password, as stored in the user table
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Build the verifier selected by configuration
pub fn verifier_for(policy: &CredentialPolicy) -> Arc<dyn CredentialVerifier> {
    match policy {
        CredentialPolicy::AcceptAll => {
            warn!("[Auth] Credential verification disabled, every PLAIN client is accepted");
            Arc::new(AcceptAllCredentials)
        }
        CredentialPolicy::Static { users } => {
            if users.is_empty() {
                warn!("[Auth] No users configured, every PLAIN client will be rejected");
            }
            Arc::new(StaticCredentials::new(users.clone()))
        }
    }
}
