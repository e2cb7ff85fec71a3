//! Fixed-capacity oscillator arena.
//!
//! Slot order matters: the scheduler walks slots from the highest active index
//! down to zero, so a modulator must sit above the oscillator it modulates.
//! [`OscillatorPool::allocate`] enforces that placement and compaction keeps
//! the relative order of surviving oscillators.

use tracing::{debug, trace};

use crate::{
    oscillator::{Field, Oscillator, OscillatorDescriptor, SlotId, Target},
    LaserError, Result,
};

/// Pool size used when none is configured.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct OscillatorPool {
    slots: Vec<Option<Oscillator>>,
    highest_active: Option<usize>,
    next_generation: u64,
}

impl OscillatorPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            highest_active: None,
            next_generation: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.highest_active.is_none()
    }

    /// Upper bound of the evaluation scan; `None` when no slot is active.
    pub fn highest_active_index(&self) -> Option<usize> {
        self.highest_active
    }

    /// Places a descriptor into a free slot.
    ///
    /// An `Attribute` descriptor lands strictly above the slot it modulates.
    /// When no qualifying slot is free the pool is compacted once and the scan
    /// retried before giving up with [`LaserError::CapacityExceeded`].
    pub fn allocate(&mut self, descriptor: &OscillatorDescriptor) -> Result<SlotId> {
        descriptor.validate(self.capacity())?;

        for attempt in 0..2 {
            if attempt == 1 {
                self.compact();
            }

            let mut descriptor = *descriptor;
            if let Target::Attribute { slot, field } = descriptor.target {
                let slot = self.locate(slot).unwrap_or(slot);
                descriptor.target = Target::Attribute { slot, field };
            }

            let floor = match descriptor.target {
                Target::Attribute { slot, .. } => slot.index + 1,
                _ => 0,
            };

            if let Some(index) = (floor..self.capacity()).find(|&i| self.slots[i].is_none()) {
                return Ok(self.place(index, &descriptor));
            }
        }

        Err(LaserError::CapacityExceeded {
            capacity: self.capacity(),
        })
    }

    fn place(&mut self, index: usize, descriptor: &OscillatorDescriptor) -> SlotId {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slots[index] = Some(Oscillator::from_descriptor(descriptor, generation));
        if self.highest_active.map_or(true, |bound| index > bound) {
            self.highest_active = Some(index);
        }
        SlotId::new(index, generation)
    }

    /// Marks the slot inactive. The slot is reusable immediately; gaps are only
    /// closed by [`OscillatorPool::compact`]. Returns false when `slot` no
    /// longer refers to a live oscillator.
    pub fn retire(&mut self, slot: SlotId) -> bool {
        match self.slots.get(slot.index) {
            Some(Some(osc)) if osc.generation == slot.generation => {
                self.retire_index(slot.index);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn retire_index(&mut self, index: usize) {
        if self.slots[index].take().is_none() {
            return;
        }
        trace!(index, "oscillator retired");

        if self.highest_active == Some(index) {
            self.highest_active = (0..index).rev().find(|&i| self.slots[i].is_some());
        }
    }

    /// Moves active oscillators toward index zero, preserving their relative
    /// order, and rewrites attribute references to the moved slots.
    pub fn compact(&mut self) {
        let mut moves = Vec::new();
        let mut write = 0;
        for read in 0..self.slots.len() {
            if self.slots[read].is_none() {
                continue;
            }
            if read != write {
                self.slots[write] = self.slots[read].take();
                moves.push((read, write));
            }
            write += 1;
        }

        if !moves.is_empty() {
            for osc in self.slots.iter_mut().flatten() {
                if let Target::Attribute { slot, .. } = &mut osc.target {
                    if let Some(&(_, to)) = moves.iter().find(|(from, _)| *from == slot.index) {
                        slot.index = to;
                    }
                }
            }
        }

        self.highest_active = write.checked_sub(1);
        debug!(active = write, moved = moves.len(), "compacted oscillator pool");
    }

    /// Current handle of the oscillator `slot` was issued for, following it
    /// through compaction. `None` once it has retired.
    pub fn locate(&self, slot: SlotId) -> Option<SlotId> {
        self.slots.iter().enumerate().find_map(|(index, entry)| match entry {
            Some(osc) if osc.generation == slot.generation => Some(SlotId::new(index, slot.generation)),
            _ => None,
        })
    }

    pub fn get(&self, slot: SlotId) -> Option<&Oscillator> {
        self.slots
            .get(slot.index)
            .and_then(Option::as_ref)
            .filter(|osc| osc.generation == slot.generation)
    }

    /// Iterates live oscillators in ascending slot order.
    pub fn iter_active(&self) -> impl Iterator<Item = (SlotId, &Oscillator)> {
        self.slots.iter().enumerate().filter_map(|(index, entry)| {
            entry
                .as_ref()
                .map(|osc| (SlotId::new(index, osc.generation), osc))
        })
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&Oscillator> {
        self.slots[index].as_ref()
    }

    /// Overwrites `field` of the oscillator behind `slot`; a stale handle is a
    /// no-op.
    pub(crate) fn write_attribute(&mut self, slot: SlotId, field: Field, value: f32) {
        if let Some(Some(osc)) = self.slots.get_mut(slot.index) {
            if osc.generation == slot.generation {
                osc.write_field(field, value);
            }
        }
    }
}

impl Default for OscillatorPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
