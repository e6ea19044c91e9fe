//! Authenticated identities
//!
//! The principal established by SASL for one connection. Lives only as long
//! as the connection it was negotiated on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SUBJECT;

/// Principal bound to a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    subject: String,
}

impl AuthenticatedIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    /// Identity used when SASL completed without binding a principal
    pub fn default_subject() -> Self {
        Self::new(DEFAULT_SUBJECT)
    }

    /// Resolve the identity of a connection, falling back to the default subject
    pub fn or_default(identity: Option<&AuthenticatedIdentity>) -> Self {
        identity.cloned().unwrap_or_else(Self::default_subject)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_default_subject(&self) -> bool {
        self.subject == DEFAULT_SUBJECT
    }
}

impl fmt::Display for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)
    }
}
