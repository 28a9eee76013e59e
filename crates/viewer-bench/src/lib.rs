#![doc = include_str!("../README.md")]

pub mod controller;
pub mod dispatch;
pub mod pacing;
pub mod random;
pub mod slots;
pub mod synth;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use controller::{RunPlan, RunReport, RunState, SequenceController};
pub use pacing::Pacing;
pub use transport::{Compression, GrpcTransport, Transport};
pub use viewer_bench_core::{Error, Result};
