//! Sends one batch at a time through a [`Transport`] and pairs every
//! response with the slot whose request produced it.
//!
//! A batch either succeeds as a whole or fails as a whole: a transport
//! error, a short or long response, or cancellation all abort it and nothing
//! from it is returned.

use crate::{telemetry, transport::Transport};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use viewer_bench_core::{
    BatchPosition, Error, Result,
    types::{CreationPayload, CreationReceipt, MutationPayload, MutationReceipt, Phase, Slot},
};

/// An ordered group of payloads, each tagged with its slot.
///
/// Built by the synthesizer, owned by the controller, consumed by
/// [`BatchDispatcher`].
#[derive(Clone, Debug, PartialEq)]
pub struct RequestBatch<P> {
    at: BatchPosition,
    slots: Vec<Slot>,
    payloads: Vec<P>,
}

impl<P> RequestBatch<P> {
    pub fn with_capacity(at: BatchPosition, capacity: usize) -> Self {
        Self {
            at,
            slots: Vec::with_capacity(capacity),
            payloads: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, slot: Slot, payload: P) {
        self.slots.push(slot);
        self.payloads.push(payload);
    }

    pub const fn at(&self) -> BatchPosition {
        self.at
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn payloads(&self) -> &[P] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Responses of one batch, positionally aligned with its requests.
pub type ResponseBatch<R> = Vec<(Slot, R)>;

/// Dispatches batches through `T`, honouring the run's cancellation token.
pub struct BatchDispatcher<T> {
    transport: T,
    cancel: CancellationToken,
}

impl<T: Transport> BatchDispatcher<T> {
    pub const fn new(transport: T, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a spawn batch and logs one line per response.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the token fires before or during the call.
    /// - [`Error::Dispatch`] if the transport returns an error status.
    /// - [`Error::ResponseMismatch`] if the response count differs from the
    ///   request count.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(phase = "spawn", group = batch.at().group)
    )]
    pub async fn dispatch_creation(
        &mut self,
        batch: RequestBatch<CreationPayload>,
    ) -> Result<ResponseBatch<CreationReceipt>> {
        let RequestBatch { at, slots, payloads } = batch;
        let receipts = guarded(
            &self.cancel,
            Phase::Spawn,
            at,
            self.transport.send_creation_batch(payloads),
        )
        .await?;
        let responses = pair(Phase::Spawn, at, slots, receipts)?;

        for (slot, receipt) in &responses {
            match &receipt.object_id {
                Some(object_id) => tracing::info!(
                    phase = %Phase::Spawn,
                    group = at.group,
                    slot = slot.get(),
                    %object_id,
                    "Response received"
                ),
                None => tracing::warn!(
                    phase = %Phase::Spawn,
                    group = at.group,
                    slot = slot.get(),
                    "Response received without an object id; slot will not be repositioned"
                ),
            }
        }

        Ok(responses)
    }

    /// Sends a reposition batch and logs one line per response.
    ///
    /// # Errors
    ///
    /// Same as [`BatchDispatcher::dispatch_creation`].
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(phase = "reposition", round = batch.at().round, group = batch.at().group)
    )]
    pub async fn dispatch_mutation(
        &mut self,
        batch: RequestBatch<MutationPayload>,
    ) -> Result<ResponseBatch<MutationReceipt>> {
        let RequestBatch { at, slots, payloads } = batch;
        let receipts = guarded(
            &self.cancel,
            Phase::Reposition,
            at,
            self.transport.send_mutation_batch(payloads),
        )
        .await?;
        let responses = pair(Phase::Reposition, at, slots, receipts)?;

        for (slot, receipt) in &responses {
            if receipt.success {
                tracing::info!(
                    phase = %Phase::Reposition,
                    round = at.round,
                    group = at.group,
                    slot = slot.get(),
                    success = receipt.success,
                    "Response received"
                );
            } else {
                tracing::warn!(
                    phase = %Phase::Reposition,
                    round = at.round,
                    group = at.group,
                    slot = slot.get(),
                    success = receipt.success,
                    "Response received; service reported failure"
                );
            }
        }

        Ok(responses)
    }
}

/// Runs one transport call, racing it against cancellation and mapping the
/// outcome into the harness error space.
async fn guarded<R>(
    cancel: &CancellationToken,
    phase: Phase,
    at: BatchPosition,
    call: impl Future<Output = core::result::Result<Vec<R>, tonic::Status>>,
) -> Result<Vec<R>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { phase, at });
    }

    let start = Instant::now();
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Error::Cancelled { phase, at }),
        outcome = call => outcome,
    };
    let elapsed = start.elapsed();

    match outcome {
        Ok(receipts) => {
            tracing::debug!(
                %phase,
                %at,
                responses = receipts.len(),
                latency_ms = elapsed.as_secs_f64() * 1000.0,
                "Batch dispatched"
            );
            telemetry::record_batch_dispatched(phase, receipts.len() as u64, elapsed);
            Ok(receipts)
        }
        Err(status) => {
            telemetry::increment_dispatch_errors(phase);
            Err(Error::dispatch(phase, at, status))
        }
    }
}

fn pair<R>(
    phase: Phase,
    at: BatchPosition,
    slots: Vec<Slot>,
    receipts: Vec<R>,
) -> Result<ResponseBatch<R>> {
    if slots.len() != receipts.len() {
        telemetry::increment_dispatch_errors(phase);
        return Err(Error::ResponseMismatch {
            phase,
            at,
            expected: slots.len(),
            actual: receipts.len(),
        });
    }
    Ok(slots.into_iter().zip(receipts).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, object_id_for};
    use viewer_bench_core::types::{Rgba, ServerObjectId, Shape, SlotGroup, Vec3};

    fn creation_batch(group: SlotGroup) -> RequestBatch<CreationPayload> {
        let at = BatchPosition::spawn(group.index());
        let mut batch = RequestBatch::with_capacity(at, group.width());
        for slot in group.slots() {
            batch.push(
                slot,
                CreationPayload {
                    position: Vec3::default(),
                    size: 1.0,
                    color: Rgba::default(),
                    shape: Shape::Cube,
                },
            );
        }
        batch
    }

    #[tokio::test]
    async fn pairs_responses_with_originating_slots() {
        let mut dispatcher =
            BatchDispatcher::new(ScriptedTransport::default(), CancellationToken::new());

        let responses = dispatcher
            .dispatch_creation(creation_batch(SlotGroup::new(1, 3)))
            .await
            .unwrap();

        let slots: Vec<_> = responses.iter().map(|(slot, _)| slot.get()).collect();
        assert_eq!(slots, vec![3, 4, 5]);
        // The scripted transport numbers spawns globally from zero.
        assert_eq!(responses[0].1.object_id, object_id_for(0));
    }

    #[tokio::test]
    async fn transport_error_fails_the_whole_batch() {
        let transport = ScriptedTransport::default().fail_at(Phase::Spawn, 0);
        let mut dispatcher = BatchDispatcher::new(transport, CancellationToken::new());

        let err = dispatcher
            .dispatch_creation(creation_batch(SlotGroup::new(0, 4)))
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Dispatch { phase: Phase::Spawn, at, .. } if at == BatchPosition::spawn(0)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn short_response_is_rejected() {
        let transport = ScriptedTransport::default().truncate_responses(1);
        let mut dispatcher = BatchDispatcher::new(transport, CancellationToken::new());

        let mut batch = RequestBatch::with_capacity(BatchPosition::reposition(0, 0), 2);
        for offset in 0..2 {
            batch.push(
                Slot::new(offset),
                MutationPayload {
                    object_id: ServerObjectId::new(vec![0xab, offset as u8 + 1]).unwrap(),
                    position: Vec3::default(),
                },
            );
        }

        let err = dispatcher.dispatch_mutation(batch).await.unwrap_err();
        assert!(
            matches!(
                err,
                Error::ResponseMismatch {
                    phase: Phase::Reposition,
                    expected: 2,
                    actual: 1,
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_a_pending_call() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::default().hang_at(Phase::Spawn, 0);
        let mut dispatcher = BatchDispatcher::new(transport, cancel.clone());

        tokio::spawn(async move {
            tokio::time::sleep(core::time::Duration::from_secs(2)).await;
            cancel.cancel();
        });

        let err = dispatcher
            .dispatch_creation(creation_batch(SlotGroup::new(2, 2)))
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Cancelled { phase: Phase::Spawn, at } if at == BatchPosition::spawn(2)),
            "got {err:?}"
        );
        assert_eq!(dispatcher.transport().spawn_calls().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_skips_the_transport() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut dispatcher = BatchDispatcher::new(ScriptedTransport::default(), cancel);

        let err = dispatcher
            .dispatch_creation(creation_batch(SlotGroup::new(0, 2)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { phase: Phase::Spawn, .. }));
        assert!(dispatcher.transport().spawn_calls().is_empty());
    }
}
