//! Randomized request payloads.
//!
//! Every axis of a position is drawn from `[0, 100)`, sizes from `[0, 10)`,
//! color channels from `[0, 1)` with alpha pinned to `1.0`, and the shape
//! from [`Shape::ALL`], which has no "unspecified" member.

use crate::{dispatch::RequestBatch, random::RandSource};
use viewer_bench_core::{
    BatchPosition,
    types::{
        CreationPayload, MutationPayload, Rgba, ServerObjectId, Shape, Slot, SlotGroup, Vec3,
    },
};

/// Exclusive upper bound of each position axis.
pub const POSITION_BOUND: f32 = 100.0;

/// Exclusive upper bound of an object's size.
pub const SIZE_BOUND: f32 = 10.0;

/// Alpha channel of every spawned object.
pub const ALPHA: f32 = 1.0;

pub struct PayloadSynthesizer<R> {
    rng: R,
}

impl<R: RandSource> PayloadSynthesizer<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn creation(&mut self) -> CreationPayload {
        let position = self.position();
        let size = self.rng.uniform_f32(0.0, SIZE_BOUND);
        let color = Rgba {
            r: self.rng.uniform_f32(0.0, 1.0),
            g: self.rng.uniform_f32(0.0, 1.0),
            b: self.rng.uniform_f32(0.0, 1.0),
            a: ALPHA,
        };
        let shape = Shape::ALL[self.rng.below(Shape::ALL.len())];

        CreationPayload {
            position,
            size,
            color,
            shape,
        }
    }

    /// A fresh random position for the object behind `object_id`.
    pub fn mutation(&mut self, object_id: &ServerObjectId) -> MutationPayload {
        MutationPayload {
            object_id: object_id.clone(),
            position: self.position(),
        }
    }

    /// One creation payload for every slot of `group`.
    pub fn creation_batch(
        &mut self,
        at: BatchPosition,
        group: SlotGroup,
    ) -> RequestBatch<CreationPayload> {
        let mut batch = RequestBatch::with_capacity(at, group.width());
        for slot in group.slots() {
            batch.push(slot, self.creation());
        }
        batch
    }

    /// One mutation payload per recorded identifier, in the order given.
    pub fn mutation_batch<'a>(
        &mut self,
        at: BatchPosition,
        recorded: impl IntoIterator<Item = (Slot, &'a ServerObjectId)>,
    ) -> RequestBatch<MutationPayload> {
        let recorded = recorded.into_iter();
        let mut batch = RequestBatch::with_capacity(at, recorded.size_hint().0);
        for (slot, object_id) in recorded {
            batch.push(slot, self.mutation(object_id));
        }
        batch
    }

    fn position(&mut self) -> Vec3 {
        Vec3 {
            x: self.rng.uniform_f32(0.0, POSITION_BOUND),
            y: self.rng.uniform_f32(0.0, POSITION_BOUND),
            z: self.rng.uniform_f32(0.0, POSITION_BOUND),
        }
    }
}
