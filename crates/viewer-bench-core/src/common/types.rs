//! # Harness Value Types
//!
//! The load engine speaks in these types rather than in generated protobuf
//! messages. Conversions to and from [`crate::proto`] live here so the
//! transport is the only place that sees the wire schema.
//!
//! ## Identity
//!
//! - [`Slot`] - logical index `0..N` of one object for the whole run.
//! - [`SlotGroup`] - the contiguous run of slots addressed by one batch.
//!   Group `i` of width `W` owns slots `i*W .. (i+1)*W`, in both phases.
//! - [`ServerObjectId`] - the opaque, non-empty identifier the service
//!   assigns on spawn.
//!
//! ## Payloads
//!
//! - [`CreationPayload`] / [`CreationReceipt`] - one spawn request/response.
//! - [`MutationPayload`] / [`MutationReceipt`] - one reposition
//!   request/response.

use crate::proto;
use bytes::Bytes;
use core::{fmt, ops::Range};

/// The two workload phases of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// One-time bulk object creation.
    Spawn,
    /// Repeated bulk object mutation.
    Reposition,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Reposition => "reposition",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical index identifying one harness-managed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(usize);

impl Slot {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A batch-sized, contiguous range of slots.
///
/// The same group index addresses the same slots in the spawn phase and in
/// every reposition round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotGroup {
    index: usize,
    width: usize,
}

impl SlotGroup {
    pub const fn new(index: usize, width: usize) -> Self {
        Self { index, width }
    }

    pub const fn index(self) -> usize {
        self.index
    }

    pub const fn width(self) -> usize {
        self.width
    }

    /// Slot at `offset` within this group.
    ///
    /// # Panics
    ///
    /// Debug builds panic if `offset >= width`.
    pub const fn slot(self, offset: usize) -> Slot {
        debug_assert!(offset < self.width);
        Slot(self.index * self.width + offset)
    }

    /// Underlying slot indices as a half-open range.
    pub const fn range(self) -> Range<usize> {
        let start = self.index * self.width;
        start..start + self.width
    }

    pub fn slots(self) -> impl Iterator<Item = Slot> {
        self.range().map(Slot)
    }
}

/// Identifier assigned by the service to a spawned object.
///
/// Never empty: [`ServerObjectId::new`] returns `None` for an empty byte
/// sequence so an absent identifier cannot be mistaken for a real one.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServerObjectId(Bytes);

impl ServerObjectId {
    pub fn new(bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }
}

impl fmt::Display for ServerObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ServerObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerObjectId({self})")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Object shapes the harness spawns. The wire enum's `UNSPECIFIED` value has
/// no counterpart here, so it can never be sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Cube,
    Sphere,
}

impl Shape {
    pub const ALL: [Self; 2] = [Self::Cube, Self::Sphere];
}

/// Properties and placement of one object to spawn.
#[derive(Clone, Debug, PartialEq)]
pub struct CreationPayload {
    pub position: Vec3,
    pub size: f32,
    pub color: Rgba,
    pub shape: Shape,
}

/// New position for one previously spawned object.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationPayload {
    pub object_id: ServerObjectId,
    pub position: Vec3,
}

/// Result of one spawn request. `object_id` is `None` when the service
/// omitted the identifier or sent an empty one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreationReceipt {
    pub object_id: Option<ServerObjectId>,
}

/// Result of one reposition request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationReceipt {
    pub success: bool,
}

impl From<Vec3> for proto::Vector3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Rgba> for proto::Rgba {
    fn from(c: Rgba) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

impl From<Shape> for proto::ObjectShape {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Cube => Self::Cube,
            Shape::Sphere => Self::Sphere,
        }
    }
}

impl From<ServerObjectId> for proto::ObjectId {
    fn from(id: ServerObjectId) -> Self {
        Self {
            uuid: Some(proto::Uuid { value: id.0 }),
        }
    }
}

impl From<CreationPayload> for proto::SpawnObjectRequest {
    fn from(payload: CreationPayload) -> Self {
        Self {
            object_properties: Some(proto::ObjectProperties {
                shape: proto::ObjectShape::from(payload.shape).into(),
                size: Some(proto::ObjectSize {
                    value: payload.size,
                }),
                color: Some(proto::ObjectColor {
                    color: Some(proto::object_color::Color::ColorRgba(payload.color.into())),
                }),
            }),
            position: Some(payload.position.into()),
        }
    }
}

impl From<MutationPayload> for proto::SetObjectPositionRequest {
    fn from(payload: MutationPayload) -> Self {
        Self {
            object_id: Some(payload.object_id.into()),
            position: Some(payload.position.into()),
        }
    }
}

impl From<proto::SpawnObjectResponse> for CreationReceipt {
    fn from(resp: proto::SpawnObjectResponse) -> Self {
        let object_id = resp
            .spawned_object_id
            .and_then(|id| id.uuid)
            .and_then(|uuid| ServerObjectId::new(uuid.value));
        Self { object_id }
    }
}

impl From<proto::SetObjectPositionResponse> for MutationReceipt {
    fn from(resp: proto::SetObjectPositionResponse) -> Self {
        Self {
            success: resp.success,
        }
    }
}
