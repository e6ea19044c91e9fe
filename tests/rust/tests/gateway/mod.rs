//! Gateway integration tests
//!
//! Link attach protocol, SASL PLAIN, endpoint registry, authorization
//! channel and worker pool lifecycle, driven through mock engine handles.

mod authorization;
mod link_attach;
mod registry;
mod sasl;
