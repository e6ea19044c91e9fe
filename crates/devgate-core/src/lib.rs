//! # DevGate Core Library
//!
//! Domain types shared by the gateway and its collaborators.
//!
//! ## Modules
//!
//! - `constants` - Well-known endpoint names, defaults and address formats
//! - `domain` - Resource identifiers, identities, permissions, configuration, events
//! - `event_bus` - Broadcast distribution of gateway events

pub mod constants;
pub mod domain;
pub mod event_bus;

pub use domain::*;
pub use event_bus::{EventBus, EventReceiver, EventSender};
