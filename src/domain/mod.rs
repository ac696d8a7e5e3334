//! Domain layer: the order aggregate, its payment state machine, the typed
//! events that drive it, and the ports the application layer talks to.

pub mod dispute;
pub mod event;
pub mod order;
pub mod ports;
