//! Process-control harness for the `gst-switch-srv` audio/video switch.
//!
//! - [`monitor`]: launch a subprocess and block until its output shows a
//!   pattern, with timeouts and clean teardown.
//! - [`server`]: validated server options, command assembly and lifecycle.
//! - [`controller`]: typed remote-control facade over a pluggable transport.
//! - [`fixture`]: scoped server sessions for tests.

pub mod config;
pub mod controller;
pub mod fixture;
pub mod logging;
pub mod monitor;
pub mod server;
