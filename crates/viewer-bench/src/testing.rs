//! In-memory [`Transport`] used by the engine's unit tests.

use crate::transport::Transport;
use std::collections::HashSet;
use tokio::time::Instant;
use tonic::Status;
use viewer_bench_core::types::{
    CreationPayload, CreationReceipt, MutationPayload, MutationReceipt, Phase, ServerObjectId,
};

/// Identifier the scripted service hands out for the `index`-th spawn.
pub(crate) fn object_id_for(index: usize) -> Option<ServerObjectId> {
    let mut bytes = vec![0xab];
    bytes.extend_from_slice(&(index as u64).to_be_bytes());
    ServerObjectId::new(bytes)
}

/// Records every batch it receives and answers from a script.
///
/// Spawns are numbered globally in arrival order; the `n`-th spawned object
/// gets [`object_id_for`]`(n)` unless `n` was listed in
/// [`ScriptedTransport::without_ids`].
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    spawn_calls: Vec<Vec<CreationPayload>>,
    mutation_calls: Vec<Vec<MutationPayload>>,
    dispatch_log: Vec<(Phase, Instant)>,
    missing_ids: HashSet<usize>,
    fail_at: Option<(Phase, usize)>,
    hang_at: Option<(Phase, usize)>,
    truncate_to: Option<usize>,
    spawned: usize,
}

impl ScriptedTransport {
    /// Fail the `call`-th (zero-based) batch of `phase`.
    pub(crate) fn fail_at(mut self, phase: Phase, call: usize) -> Self {
        self.fail_at = Some((phase, call));
        self
    }

    /// Never answer the `call`-th (zero-based) batch of `phase`.
    pub(crate) fn hang_at(mut self, phase: Phase, call: usize) -> Self {
        self.hang_at = Some((phase, call));
        self
    }

    /// Answer every batch with at most `len` responses.
    pub(crate) fn truncate_responses(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }

    /// Omit the identifier for these spawn indices.
    pub(crate) fn without_ids(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.missing_ids.extend(indices);
        self
    }

    pub(crate) fn spawn_calls(&self) -> &[Vec<CreationPayload>] {
        &self.spawn_calls
    }

    pub(crate) fn mutation_calls(&self) -> &[Vec<MutationPayload>] {
        &self.mutation_calls
    }

    pub(crate) fn dispatch_log(&self) -> &[(Phase, Instant)] {
        &self.dispatch_log
    }

    async fn check_hang(&self, phase: Phase, call: usize) {
        if self.hang_at == Some((phase, call)) {
            std::future::pending::<()>().await;
        }
    }

    fn check_failure(&self, phase: Phase, call: usize) -> Result<(), Status> {
        if self.fail_at == Some((phase, call)) {
            return Err(Status::unavailable(format!("scripted {phase} failure")));
        }
        Ok(())
    }

    fn truncate<R>(&self, mut receipts: Vec<R>) -> Vec<R> {
        if let Some(len) = self.truncate_to {
            receipts.truncate(len);
        }
        receipts
    }
}

impl Transport for ScriptedTransport {
    async fn send_creation_batch(
        &mut self,
        batch: Vec<CreationPayload>,
    ) -> Result<Vec<CreationReceipt>, Status> {
        let call = self.spawn_calls.len();
        self.dispatch_log.push((Phase::Spawn, Instant::now()));
        self.spawn_calls.push(batch.clone());
        self.check_hang(Phase::Spawn, call).await;
        self.check_failure(Phase::Spawn, call)?;

        let receipts = batch
            .iter()
            .map(|_| {
                let index = self.spawned;
                self.spawned += 1;
                let object_id = if self.missing_ids.contains(&index) {
                    None
                } else {
                    object_id_for(index)
                };
                CreationReceipt { object_id }
            })
            .collect();
        Ok(self.truncate(receipts))
    }

    async fn send_mutation_batch(
        &mut self,
        batch: Vec<MutationPayload>,
    ) -> Result<Vec<MutationReceipt>, Status> {
        let call = self.mutation_calls.len();
        self.dispatch_log.push((Phase::Reposition, Instant::now()));
        self.mutation_calls.push(batch.clone());
        self.check_hang(Phase::Reposition, call).await;
        self.check_failure(Phase::Reposition, call)?;

        let receipts = batch
            .iter()
            .map(|_| MutationReceipt { success: true })
            .collect();
        Ok(self.truncate(receipts))
    }
}
