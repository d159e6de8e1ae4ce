//! Node liveness
//!
//! A single background task probes every registered connection on a fixed
//! interval and reaps the ones that stopped answering.

mod monitor;

pub use monitor::{HeartbeatMonitor, SweepReport};
