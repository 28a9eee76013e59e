//! Error types for the load harness.
//!
//! Every failure the harness can hit is fatal to the run except a missing
//! identifier in a spawn response, which is not an error at all (the slot is
//! simply left unrecorded). The variants therefore map onto the four ways a
//! run can stop:
//!
//! - `InvalidConfig`: a flag or environment value was rejected at startup.
//! - `Connect`: the gRPC channel could not be established.
//! - `Dispatch` / `ResponseMismatch`: a batch failed in flight or came back
//!   malformed.
//! - `Cancelled`: the run deadline or a shutdown signal fired.
//!
//! `SlotOutOfRange` and `SlotAlreadyRecorded` guard the identity table
//! contract and indicate a harness bug rather than a server fault.

use crate::types::{Phase, Slot};
use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Where in the run a batch sits: the mutation round (absent during spawn)
/// and the slot-group index within the phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPosition {
    pub round: Option<usize>,
    pub group: usize,
}

impl BatchPosition {
    pub const fn spawn(group: usize) -> Self {
        Self { round: None, group }
    }

    pub const fn reposition(round: usize, group: usize) -> Self {
        Self {
            round: Some(round),
            group,
        }
    }
}

impl fmt::Display for BatchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.round {
            Some(round) => write!(f, "round {round}, group {}", self.group),
            None => write!(f, "group {}", self.group),
        }
    }
}

/// Unified error type for the load harness.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A configuration value was malformed or out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The channel to the target endpoint could not be established.
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The service or transport rejected a batch.
    #[error("{phase} dispatch failed at {at}: {status}")]
    Dispatch {
        phase: Phase,
        at: BatchPosition,
        status: Box<tonic::Status>,
    },

    /// The service answered with a different number of responses than
    /// requests were sent.
    #[error("{phase} dispatch at {at} returned {actual} responses for {expected} requests")]
    ResponseMismatch {
        phase: Phase,
        at: BatchPosition,
        expected: usize,
        actual: usize,
    },

    /// The run was cancelled while waiting or dispatching.
    #[error("{phase} cancelled at {at}")]
    Cancelled { phase: Phase, at: BatchPosition },

    /// A slot index fell outside the identity table.
    #[error("Slot {slot} out of range (capacity {capacity})")]
    SlotOutOfRange { slot: Slot, capacity: usize },

    /// A spawn outcome was recorded twice for the same slot.
    #[error("Slot {slot} already has a recorded spawn outcome")]
    SlotAlreadyRecorded { slot: Slot },
}

impl Error {
    /// The phase this error interrupted, if it happened mid-run.
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::Dispatch { phase, .. }
            | Self::ResponseMismatch { phase, .. }
            | Self::Cancelled { phase, .. } => Some(*phase),
            Self::InvalidConfig { .. }
            | Self::Connect { .. }
            | Self::SlotOutOfRange { .. }
            | Self::SlotAlreadyRecorded { .. } => None,
        }
    }

    /// Wraps a gRPC status as a dispatch failure.
    pub fn dispatch(phase: Phase, at: BatchPosition, status: tonic::Status) -> Self {
        Self::Dispatch {
            phase,
            at,
            status: Box::new(status),
        }
    }
}
