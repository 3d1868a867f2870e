//! Typed facade over the server's remote-control interface.
//!
//! The transport is pluggable; tests use an in-memory one.

mod client;
mod transport;
mod types;

pub use client::Controller;
pub use transport::{SignalHandler, Transport};
pub use types::{parse_preview_ports, Channel, CompositeMode, ControllerError, PreviewPort};

#[cfg(test)]
mod tests;
