//! DevGate Gateway - AMQP 1.0 device gateway core
//!
//! Accepts AMQP connections from devices, authenticates them with SASL
//! PLAIN, authorizes every link attach against a per-worker authorization
//! service and routes authorized links to named endpoints.

pub mod auth;
pub mod authorization;
pub mod engine;
pub mod logging;
pub mod permissions;
pub mod registry;
pub mod server;

pub use auth::{AuthenticatorFactory, ConnectionAttachments, PlainAuthenticator};
pub use authorization::{
    AllowAllGate, AuthorizationChannel, AuthorizationGate, AuthorizationService,
    ChannelAuthorizationGate,
};
pub use engine::{
    ConnectionEvent, ConnectionHandle, EngineConnection, EngineError, ErrorCondition, LinkHandle,
    ProtocolEngine, SaslSession, SessionHandle,
};
pub use logging::{init_tracing, ConnectionTrace};
pub use permissions::{AccessControlList, AccessRule};
pub use registry::{Endpoint, EndpointRegistry};
pub use server::{
    ConnectionGateway, EndpointFactory, GatewayDependencies, GatewayLauncher, GatewayServer,
    LinkOutcome, RunningGateway, RunningWorker, StartupError, WorkerLauncher, WorkerPool,
};
