//! Well-known names and protocol constants shared by all DevGate crates

/// Delimiter between address segments (`endpoint/tenant/device`)
pub const SEGMENT_DELIMITER: char = '/';

/// Tenant assumed for every address when running in single-tenant mode
pub const DEFAULT_TENANT: &str = "DEFAULT_TENANT";

/// Subject used for connections that completed without an identity binding
pub const DEFAULT_SUBJECT: &str = "gateway-client";

/// Name of the mandatory telemetry endpoint
pub const TELEMETRY_ENDPOINT: &str = "telemetry";

/// Name of the mandatory device registration endpoint
pub const REGISTRATION_ENDPOINT: &str = "registration";

/// Endpoints every worker is expected to register
pub const MANDATORY_ENDPOINTS: [&str; 2] = [TELEMETRY_ENDPOINT, REGISTRATION_ENDPOINT];

/// Reply body of the authorization service that grants access
pub const AUTHORIZATION_ALLOWED: &str = "allowed";

/// Reply body of the authorization service that denies access
pub const AUTHORIZATION_DENIED: &str = "denied";

/// Default prefix of the per-worker authorization service address
pub const DEFAULT_AUTHORIZATION_BASE_ADDRESS: &str = "authorization.in";

/// SASL mechanism implemented by the gateway
pub const SASL_PLAIN: &str = "PLAIN";

/// SASL mechanism that may be declared in configuration but has no implementation
pub const SASL_OAUTHBEARER: &str = "OAUTHBEARER";

/// IANA-assigned AMQP port
pub const DEFAULT_AMQP_PORT: u16 = 5672;

/// Prefix used for rolling log files
pub const LOG_PREFIX: &str = "devgate";

/// Prefix of the environment variables read by the configuration loader
pub const ENV_PREFIX: &str = "DEVGATE_";

/// Container identifier a worker announces on every connection
///
/// Format: `Gateway-<bindAddress>:<port>-<workerIndex>`
pub fn container_id(bind_address: &str, port: u16, worker_index: usize) -> String {
    format!("Gateway-{}:{}-{}", bind_address, port, worker_index)
}

/// Address of the authorization service bound to one worker
///
/// Format: `<baseAddress>.<workerIndex>`
pub fn authorization_address(base_address: &str, worker_index: usize) -> String {
    format!("{}.{}", base_address, worker_index)
}
