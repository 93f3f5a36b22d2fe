//! Client-side orchestration.
//!
//! Owns the session state machine, the telemetry reconciliation fold, and the
//! controller loop that ties the worker transport to presentation layers.
//! UI/CLI layers call into this module only through commands and events.

mod controller;
mod progress;
mod session;

pub(crate) use controller::{run_controller, UiCommand};
