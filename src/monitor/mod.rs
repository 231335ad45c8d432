//! Chat monitoring.
//!
//! This module provides:
//! - Duplicate suppression for recognised codes (`TriggerState`)
//! - A monitoring run and its per-tick pipeline (`MonitorSession`)
//! - The worker thread and Stopped/Running control (`MonitorController`)

pub mod gate;
pub mod runner;
pub mod session;

pub use runner::{MonitorController, MonitorState};
pub use session::MonitorBackends;
