//! Access control list for the authorization service
//!
//! Rules grant permissions on resource address patterns to subject patterns.
//! Patterns support `*` wildcards. Deny rules take precedence over grants.

use async_trait::async_trait;
use devgate_core::constants::{AUTHORIZATION_ALLOWED, AUTHORIZATION_DENIED};
use devgate_core::{AuthorizationRequest, Permission};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::authorization::AuthorizationService;

/// One access rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Subject pattern
    pub subject: String,
    /// Resource address pattern, e.g. `telemetry/tenant-a/*`
    pub resource: String,
    /// Permissions granted (or denied) by this rule
    pub permissions: Vec<Permission>,
    /// Whether this rule denies instead of grants
    #[serde(default)]
    pub deny: bool,
}

impl AccessRule {
    pub fn grant(
        subject: impl Into<String>,
        resource: impl Into<String>,
        permissions: &[Permission],
    ) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            permissions: permissions.to_vec(),
            deny: false,
        }
    }

    pub fn deny(
        subject: impl Into<String>,
        resource: impl Into<String>,
        permissions: &[Permission],
    ) -> Self {
        Self {
            deny: true,
            ..Self::grant(subject, resource, permissions)
        }
    }

    fn matches(&self, subject: &str, resource: &str, permission: Permission) -> bool {
        self.permissions.contains(&permission)
            && matches_glob(&self.subject, subject)
            && matches_glob(&self.resource, resource)
    }
}

/// Ordered set of access rules
///
/// No matching grant = deny.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    #[serde(default)]
    rules: Vec<AccessRule>,
}

impl AccessControlList {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Check if a subject holds a permission on a resource
    pub fn allows(&self, subject: &str, resource: &str, permission: Permission) -> bool {
        // First check denials
        if self
            .rules
            .iter()
            .any(|rule| rule.deny && rule.matches(subject, resource, permission))
        {
            debug!("[ACL] {} on [{}] denied for [{}] by rule", permission, resource, subject);
            return false;
        }

        // Then check grants
        let allowed = self
            .rules
            .iter()
            .any(|rule| !rule.deny && rule.matches(subject, resource, permission));

        debug!(
            "[ACL] {} on [{}] {} for [{}]",
            permission,
            resource,
            if allowed { "granted" } else { "not granted" },
            subject
        );
        allowed
    }
}

#[async_trait]
impl AuthorizationService for AccessControlList {
    async fn authorize(&self, request: &AuthorizationRequest) -> anyhow::Result<String> {
        let reply = if self.allows(&request.subject, &request.resource, request.permission) {
            AUTHORIZATION_ALLOWED
        } else {
            AUTHORIZATION_DENIED
        };
        Ok(reply.to_string())
    }
}

/// Simple glob matching (supports * wildcard)
fn matches_glob(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == text {
        return true;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        // No wildcard and not equal
        return false;
    }

    let mut remaining = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }

        if i == 0 {
            // First part anchors at the start
            let Some(rest) = remaining.strip_prefix(part) else {
                return false;
            };
            remaining = rest;
        } else if i == parts.len() - 1 {
            // Last part anchors at the end
            return remaining.ends_with(part);
        } else {
            let Some(pos) = remaining.find(part) else {
                return false;
            };
            remaining = &remaining[pos + part.len()..];
        }
    }

    true
}
