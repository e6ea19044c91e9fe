//! Endpoint registry
//!
//! Maps endpoint names to the handlers that take over authorized links.
//! Each worker owns its registry: it is filled during setup and frozen
//! (shared read-only) once the worker starts accepting connections.

use std::collections::HashMap;
use std::sync::Arc;

use devgate_core::constants::MANDATORY_ENDPOINTS;
use devgate_core::ResourceIdentifier;
use tracing::{debug, warn};

use crate::engine::LinkHandle;

/// Handler for links addressed to one endpoint name
pub trait Endpoint: Send + Sync {
    /// Name the endpoint is registered and addressed under
    fn name(&self) -> &str;

    /// Called once before the owning worker accepts connections.
    ///
    /// Returning `false` aborts the worker's startup.
    fn start(&self) -> bool {
        true
    }

    /// Take over an authorized link whose terminus already mirrors the remote one
    fn on_link_attach(&self, link: Box<dyn LinkHandle>, resource: ResourceIdentifier);
}

/// Name to endpoint map, first registration wins
#[derive(Default, Clone)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<dyn Endpoint>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under its name
    ///
    /// Returns `false` and discards `endpoint` when the name is already taken.
    pub fn register(&mut self, endpoint: Arc<dyn Endpoint>) -> bool {
        let name = endpoint.name().to_string();
        if self.endpoints.contains_key(&name) {
            return false;
        }
        debug!("[Registry] Registered endpoint [{}]", name);
        self.endpoints.insert(name, endpoint);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Endpoint>> {
        self.endpoints.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Warn about every mandatory endpoint that is not registered
    ///
    /// Startup proceeds either way; the missing names are returned.
    pub fn readiness_check(&self) -> Vec<&'static str> {
        let missing: Vec<&'static str> = MANDATORY_ENDPOINTS
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect();

        for name in &missing {
            warn!("[Registry] No {} endpoint has been registered", name);
        }
        missing
    }

    /// Start every registered endpoint, returning the name of the first that failed
    pub fn start_all(&self) -> Result<(), String> {
        for name in self.names() {
            let Some(endpoint) = self.endpoints.get(name) else {
                continue;
            };
            if !endpoint.start() {
                return Err(name.to_string());
            }
            debug!("[Registry] Endpoint [{}] started", name);
        }
        Ok(())
    }
}
