//! Two-phase run orchestration.
//!
//! ```text
//! Idle ──▶ Creating ──▶ Mutating{0} ──▶ … ──▶ Mutating{rounds-1} ──▶ Done
//!              │              │                        │
//!              └──────────────┴────────── error ───────┴──────────▶ Failed
//! ```
//!
//! The spawn phase sends `creation_batches` batches of `batch_width`
//! payloads; group `i` owns slots `i*W .. (i+1)*W`. Every reposition round
//! then walks the same groups in the same order, so batch `i` of round `r`
//! always addresses exactly the slots spawned by batch `i`. Batches never
//! overlap in flight, and each one is preceded by the phase's pacing delay.
//!
//! The first error of any kind ends the run: no retry, no rollback of
//! identifiers already recorded, no further batches.


use crate::{
    dispatch::BatchDispatcher,
    pacing::{Pacing, PacingClock},
    random::RandSource,
    slots::IdentitySlotTable,
    synth::PayloadSynthesizer,
    transport::Transport,
};
use core::time::Duration;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use viewer_bench_core::{
    BatchPosition, Error, Result,
    types::{Phase, SlotGroup},
};

/// Shape of a run: how many objects, in how many batches, moved how often.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunPlan {
    pub batch_width: usize,
    pub creation_batches: usize,
    pub rounds: usize,
}

impl RunPlan {
    pub const DEFAULT_BATCH_WIDTH: usize = 100;
    pub const DEFAULT_CREATION_BATCHES: usize = 100;
    pub const DEFAULT_ROUNDS: usize = 1000;

    /// Total number of objects spawned (`creation_batches * batch_width`).
    pub const fn total_slots(&self) -> usize {
        self.creation_batches * self.batch_width
    }

    pub fn groups(&self) -> impl Iterator<Item = SlotGroup> + use<> {
        let width = self.batch_width;
        (0..self.creation_batches).map(move |index| SlotGroup::new(index, width))
    }
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            batch_width: Self::DEFAULT_BATCH_WIDTH,
            creation_batches: Self::DEFAULT_CREATION_BATCHES,
            rounds: Self::DEFAULT_ROUNDS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Creating,
    Mutating { round: usize },
    Done,
    Failed,
}

/// Work performed by a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub state: RunState,
    pub creation_batches: usize,
    pub mutation_batches: usize,
    pub recorded_slots: usize,
    pub skipped_slots: usize,
    /// Reposition batches not sent because their group had no identifiers.
    pub skipped_groups: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Progress {
    creation_batches: usize,
    mutation_batches: usize,
    skipped_groups: usize,
}

pub struct SequenceController<T, R> {
    plan: RunPlan,
    synth: PayloadSynthesizer<R>,
    dispatcher: BatchDispatcher<T>,
    clock: PacingClock,
    table: IdentitySlotTable,
    state: RunState,
}

impl<T: Transport, R: RandSource> SequenceController<T, R> {
    /// Builds an idle controller. `cancel` aborts any in-flight wait or
    /// dispatch and fails the run.
    pub fn new(
        plan: RunPlan,
        pacing: Pacing,
        transport: T,
        rng: R,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            plan,
            synth: PayloadSynthesizer::new(rng),
            dispatcher: BatchDispatcher::new(transport, cancel.clone()),
            clock: PacingClock::new(pacing, cancel),
            table: IdentitySlotTable::new(plan.total_slots()),
            state: RunState::Idle,
        }
    }

    pub const fn state(&self) -> RunState {
        self.state
    }

    pub const fn slots(&self) -> &IdentitySlotTable {
        &self.table
    }

    pub const fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    /// Drives the run to `Done` or `Failed`.
    ///
    /// A controller runs once; calling this again after it has left `Idle`
    /// is rejected without dispatching anything.
    ///
    /// # Errors
    ///
    /// Returns the first error hit by any wait, dispatch, or identifier
    /// record. The controller is left in [`RunState::Failed`].
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.state != RunState::Idle {
            return Err(Error::InvalidConfig {
                reason: format!("controller already ran (state {:?})", self.state),
            });
        }

        let start = Instant::now();
        match self.drive().await {
            Ok(progress) => {
                self.state = RunState::Done;
                Ok(RunReport {
                    state: self.state,
                    creation_batches: progress.creation_batches,
                    mutation_batches: progress.mutation_batches,
                    recorded_slots: self.table.recorded(),
                    skipped_slots: self.table.capacity() - self.table.recorded(),
                    skipped_groups: progress.skipped_groups,
                    elapsed: start.elapsed(),
                })
            }
            Err(err) => {
                let failed_in = self.state;
                self.state = RunState::Failed;
                tracing::error!(state = ?failed_in, error = %err, "Run failed");
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<Progress> {
        let mut progress = Progress::default();

        self.transition(RunState::Creating);
        for group in self.plan.groups() {
            self.spawn_group(group).await?;
            progress.creation_batches += 1;
        }
        tracing::info!(
            recorded = self.table.recorded(),
            capacity = self.table.capacity(),
            "Spawn phase complete"
        );

        let empty_groups = self
            .plan
            .groups()
            .filter(|group| self.table.recorded_in(*group).next().is_none())
            .count();
        if empty_groups > 0 && self.plan.rounds > 0 {
            tracing::warn!(
                empty_groups,
                "Groups without recorded identifiers will be skipped in every round"
            );
        }

        for round in 0..self.plan.rounds {
            self.transition(RunState::Mutating { round });
            for group in self.plan.groups() {
                if self.reposition_group(round, group).await? {
                    progress.mutation_batches += 1;
                } else {
                    progress.skipped_groups += 1;
                }
            }
        }

        Ok(progress)
    }

    async fn spawn_group(&mut self, group: SlotGroup) -> Result<()> {
        let at = BatchPosition::spawn(group.index());
        self.clock.wait(Phase::Spawn, at).await?;

        let batch = self.synth.creation_batch(at, group);
        let responses = self.dispatcher.dispatch_creation(batch).await?;
        for (slot, receipt) in responses {
            self.table.record(slot, receipt.object_id)?;
        }
        Ok(())
    }

    /// Returns `false` when the group had no recorded identifiers and
    /// nothing was sent.
    async fn reposition_group(&mut self, round: usize, group: SlotGroup) -> Result<bool> {
        let at = BatchPosition::reposition(round, group.index());
        if self.table.recorded_in(group).next().is_none() {
            tracing::debug!(round, group = group.index(), "No recorded identifiers; skipping batch");
            return Ok(false);
        }

        self.clock.wait(Phase::Reposition, at).await?;

        let batch = self.synth.mutation_batch(at, self.table.recorded_in(group));
        // Reposition responses are logged by the dispatcher and otherwise
        // dropped; they never feed back into the identity table.
        self.dispatcher.dispatch_mutation(batch).await?;
        Ok(true)
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "State transition");
        if matches!(next, RunState::Creating | RunState::Mutating { round: 0 }) {
            tracing::info!(state = ?next, "Entering phase");
        }
        self.state = next;
    }
}
