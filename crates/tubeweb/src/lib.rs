//! tubeweb - browser front-end for tubewatch
//!
//! HTML fragments for htmx, a WebSocket push channel fed by the core event
//! bus, and the `tubewatch` command line.

pub mod cli;
pub mod web;

pub use web::{router, serve, AppState};
