//! Resource identifiers
//!
//! Parsed form of a link address. Devices and protocol adapters address
//! resources as `<endpoint>/<tenant>/<deviceId>` when the gateway runs in
//! multi-tenant mode, or as `<endpoint>/<deviceId>` in single-tenant mode
//! where every resource belongs to [`DEFAULT_TENANT`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_TENANT, SEGMENT_DELIMITER};

/// How addresses are mapped onto tenants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenancyMode {
    /// Addresses carry an explicit tenant segment
    #[default]
    MultiTenant,
    /// Addresses omit the tenant; the default tenant is implied
    SingleTenant,
}

impl TenancyMode {
    pub fn from_single_tenant(single_tenant: bool) -> Self {
        if single_tenant {
            Self::SingleTenant
        } else {
            Self::MultiTenant
        }
    }

    pub fn is_single_tenant(&self) -> bool {
        matches!(self, Self::SingleTenant)
    }
}

/// Structural problems with an address
///
/// These never describe business errors (unknown tenant, unknown device);
/// they only say the address cannot be read as a resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceIdentifierError {
    #[error("address is empty")]
    Empty,
    #[error("address [{0}] has an empty endpoint segment")]
    EmptyEndpoint(String),
    #[error("address [{0}] has no tenant segment")]
    MissingTenant(String),
    #[error("address [{0}] has an empty tenant segment")]
    EmptyTenant(String),
    #[error("address [{0}] has an empty device segment")]
    EmptyDevice(String),
    #[error("address [{address}] has {found} segments, at most {max} are allowed")]
    TooManySegments {
        address: String,
        found: usize,
        max: usize,
    },
}

/// Immutable `{endpoint, tenant, device}` triple a link is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    endpoint: String,
    tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
}

impl ResourceIdentifier {
    /// Build an identifier from already validated parts
    pub fn new(
        endpoint: impl Into<String>,
        tenant_id: impl Into<String>,
        device_id: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            tenant_id: tenant_id.into(),
            device_id,
        }
    }

    /// Parse an address under the given tenancy mode
    ///
    /// Multi-tenant: `endpoint/tenant[/device]`.
    /// Single-tenant: `endpoint[/device]`, tenant is [`DEFAULT_TENANT`].
    pub fn parse(address: &str, mode: TenancyMode) -> Result<Self, ResourceIdentifierError> {
        if address.is_empty() {
            return Err(ResourceIdentifierError::Empty);
        }

        let segments: Vec<&str> = address.split(SEGMENT_DELIMITER).collect();
        let endpoint = segments[0];
        if endpoint.is_empty() {
            return Err(ResourceIdentifierError::EmptyEndpoint(address.to_string()));
        }

        match mode {
            TenancyMode::MultiTenant => {
                if segments.len() > 3 {
                    return Err(ResourceIdentifierError::TooManySegments {
                        address: address.to_string(),
                        found: segments.len(),
                        max: 3,
                    });
                }
                let tenant = segments
                    .get(1)
                    .ok_or_else(|| ResourceIdentifierError::MissingTenant(address.to_string()))?;
                if tenant.is_empty() {
                    return Err(ResourceIdentifierError::EmptyTenant(address.to_string()));
                }
                let device = device_segment(address, segments.get(2).copied())?;
                Ok(Self::new(endpoint, *tenant, device))
            }
            TenancyMode::SingleTenant => {
                if segments.len() > 2 {
                    return Err(ResourceIdentifierError::TooManySegments {
                        address: address.to_string(),
                        found: segments.len(),
                        max: 2,
                    });
                }
                let device = device_segment(address, segments.get(1).copied())?;
                Ok(Self::new(endpoint, DEFAULT_TENANT, device))
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Stable string form, `endpoint/tenant[/device]`
    ///
    /// Always includes the tenant, so an identifier parsed in single-tenant
    /// mode serializes with the default tenant spelled out.
    pub fn to_address(&self) -> String {
        self.to_string()
    }
}

fn device_segment(
    address: &str,
    segment: Option<&str>,
) -> Result<Option<String>, ResourceIdentifierError> {
    match segment {
        None => Ok(None),
        Some("") => Err(ResourceIdentifierError::EmptyDevice(address.to_string())),
        Some(device) => Ok(Some(device.to_string())),
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.endpoint, SEGMENT_DELIMITER, self.tenant_id)?;
        if let Some(device) = &self.device_id {
            write!(f, "{}{}", SEGMENT_DELIMITER, device)?;
        }
        Ok(())
    }
}
