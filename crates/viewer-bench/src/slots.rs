//! Fixed-capacity mapping from [`Slot`] to the identifier the service
//! assigned it.
//!
//! Written only during the spawn phase and read-only afterwards. A slot
//! whose spawn response carried no identifier stays empty and is left out of
//! every reposition batch; nothing ever stands in for a missing identifier.
//! Each slot takes exactly one spawn outcome, present or absent.

use viewer_bench_core::{
    Error, Result,
    types::{ServerObjectId, Slot, SlotGroup},
};

/// What the spawn phase reported for one slot.
#[derive(Clone, Debug)]
enum Entry {
    Unseen,
    /// The response carried no identifier.
    Absent,
    Recorded(ServerObjectId),
}

impl Entry {
    const fn object_id(&self) -> Option<&ServerObjectId> {
        match self {
            Self::Recorded(object_id) => Some(object_id),
            Self::Unseen | Self::Absent => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdentitySlotTable {
    slots: Vec<Entry>,
    recorded: usize,
}

impl IdentitySlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Entry::Unseen; capacity],
            recorded: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding an identifier.
    pub const fn recorded(&self) -> usize {
        self.recorded
    }

    /// Stores the spawn outcome for `slot`. An absent identifier leaves the
    /// slot without an identifier and returns `Ok(false)`. Either way the
    /// slot cannot be recorded again.
    ///
    /// # Errors
    ///
    /// - [`Error::SlotOutOfRange`] if `slot` is beyond the table.
    /// - [`Error::SlotAlreadyRecorded`] if an outcome was already stored for
    ///   `slot`, with or without an identifier.
    pub fn record(&mut self, slot: Slot, object_id: Option<ServerObjectId>) -> Result<bool> {
        let capacity = self.slots.len();
        let entry = self
            .slots
            .get_mut(slot.get())
            .ok_or(Error::SlotOutOfRange { slot, capacity })?;

        if !matches!(entry, Entry::Unseen) {
            return Err(Error::SlotAlreadyRecorded { slot });
        }

        match object_id {
            Some(object_id) => {
                *entry = Entry::Recorded(object_id);
                self.recorded += 1;
                Ok(true)
            }
            None => {
                *entry = Entry::Absent;
                Ok(false)
            }
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&ServerObjectId> {
        self.slots.get(slot.get()).and_then(Entry::object_id)
    }

    /// Recorded identifiers within `group`, in slot order. Slots without an
    /// identifier are skipped.
    pub fn recorded_in(&self, group: SlotGroup) -> impl Iterator<Item = (Slot, &ServerObjectId)> {
        let entries = self.slots.get(group.range()).unwrap_or_default();
        group
            .slots()
            .zip(entries)
            .filter_map(|(slot, entry)| entry.object_id().map(|id| (slot, id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &ServerObjectId)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.object_id().map(|id| (Slot::new(index), id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(byte: u8) -> ServerObjectId {
        ServerObjectId::new(vec![0xab, byte]).unwrap()
    }

    #[test]
    fn absent_identifier_leaves_slot_empty() {
        let mut table = IdentitySlotTable::new(4);
        assert!(!table.record(Slot::new(1), None).unwrap());
        assert!(table.record(Slot::new(2), Some(id(2))).unwrap());

        assert_eq!(table.get(Slot::new(1)), None);
        assert_eq!(table.get(Slot::new(2)), Some(&id(2)));
        assert_eq!(table.recorded(), 1);
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let mut table = IdentitySlotTable::new(2);
        let err = table.record(Slot::new(2), Some(id(0))).unwrap_err();
        assert!(matches!(err, Error::SlotOutOfRange { capacity: 2, .. }));
        assert_eq!(table.get(Slot::new(2)), None);
    }

    #[test]
    fn second_record_for_a_slot_is_rejected() {
        let mut table = IdentitySlotTable::new(2);
        table.record(Slot::new(0), Some(id(1))).unwrap();
        let err = table.record(Slot::new(0), Some(id(2))).unwrap_err();
        assert!(matches!(err, Error::SlotAlreadyRecorded { .. }));
        assert_eq!(table.get(Slot::new(0)), Some(&id(1)));
    }

    #[test]
    fn slot_reported_without_identifier_cannot_be_recorded_again() {
        let mut table = IdentitySlotTable::new(2);
        assert!(!table.record(Slot::new(1), None).unwrap());

        let err = table.record(Slot::new(1), Some(id(1))).unwrap_err();
        assert!(matches!(err, Error::SlotAlreadyRecorded { .. }));
        let err = table.record(Slot::new(1), None).unwrap_err();
        assert!(matches!(err, Error::SlotAlreadyRecorded { .. }));

        assert_eq!(table.get(Slot::new(1)), None);
        assert_eq!(table.recorded(), 0);
    }

    #[test]
    fn recorded_in_skips_gaps_and_stays_within_group() {
        let mut table = IdentitySlotTable::new(6);
        for index in [0, 3, 5] {
            table
                .record(Slot::new(index), Some(id(index as u8)))
                .unwrap();
        }

        let group: Vec<_> = table
            .recorded_in(SlotGroup::new(1, 3))
            .map(|(slot, id)| (slot.get(), id.clone()))
            .collect();
        assert_eq!(group, vec![(3, id(3)), (5, id(5))]);

        // A group past the end of the table is empty rather than a panic.
        assert_eq!(table.recorded_in(SlotGroup::new(5, 3)).count(), 0);
    }

    proptest! {
        #[test]
        fn slot_present_iff_identifier_was_non_empty(
            batches in 1usize..8,
            width in 1usize..8,
            present in proptest::collection::vec(any::<bool>(), 64),
        ) {
            let capacity = batches * width;
            let mut table = IdentitySlotTable::new(capacity);

            for group in (0..batches).map(|g| SlotGroup::new(g, width)) {
                for slot in group.slots() {
                    let object_id = present[slot.get()]
                        .then(|| ServerObjectId::new((slot.get() as u64 + 1).to_be_bytes().to_vec()))
                        .flatten();
                    table.record(slot, object_id).unwrap();
                }
            }

            let expected = present[..capacity].iter().filter(|p| **p).count();
            prop_assert_eq!(table.recorded(), expected);
            prop_assert!(table.recorded() <= capacity);
            for index in 0..capacity {
                prop_assert_eq!(table.get(Slot::new(index)).is_some(), present[index]);
            }

            let mut seen: Vec<_> = table.iter().map(|(slot, _)| slot.get()).collect();
            let total = seen.len();
            seen.dedup();
            prop_assert_eq!(seen.len(), total);
        }
    }
}
