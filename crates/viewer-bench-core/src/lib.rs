#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

/// gRPC service and message definitions generated from
/// `proto/viewer/v1/viewer.proto`.
///
/// The load engine never touches these directly; it works with the value
/// types in [`types`] and converts at the transport boundary.
pub mod proto {
    #![allow(clippy::all, clippy::pedantic)]
    tonic::include_proto!("viewer.v1");
}
