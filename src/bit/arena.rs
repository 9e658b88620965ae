//! Generational storage for heap bits
//!
//! Columns hold [`BitId`] handles rather than the bits themselves; a handle
//! goes stale once its bit is removed, and a reused slot never answers to it.

use std::ops::Index;

use super::WeightedBit;

/// Handle to a bit stored in a [`BitArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    bit: Option<WeightedBit>,
}

/// Slot arena owning every live bit of a heap
#[derive(Debug, Default)]
pub struct BitArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl BitArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a bit and return its handle
    pub fn insert(&mut self, bit: WeightedBit) -> BitId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.bit = Some(bit);
            return BitId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            bit: Some(bit),
        });
        BitId {
            index,
            generation: 0,
        }
    }

    /// Look up a bit; `None` for stale handles
    pub fn get(&self, id: BitId) -> Option<&WeightedBit> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.bit.as_ref())
    }

    /// Take a bit out of the arena, invalidating its handle
    pub fn remove(&mut self, id: BitId) -> Option<WeightedBit> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let bit = slot.bit.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(bit)
    }

    /// Number of live bits
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no bit is stored
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl Index<BitId> for BitArena {
    type Output = WeightedBit;

    fn index(&self, id: BitId) -> &WeightedBit {
        match self.get(id) {
            Some(bit) => bit,
            None => panic!("stale bit handle {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit::Provenance;
    use crate::timing::Arrival;

    fn bit(uid: u32) -> WeightedBit {
        WeightedBit::new(0, uid, Arrival::ZERO, Provenance::Input, format!("b_{uid}"))
    }

    #[test]
    fn test_remove_invalidates_handle() {
        let mut arena = BitArena::new();
        let a = arena.insert(bit(0));
        let b = arena.insert(bit(1));
        assert_eq!(arena.len(), 2);

        let removed = arena.remove(a).expect("live handle");
        assert_eq!(removed.uid(), 0);
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());

        // The freed slot is reused under a new generation
        let c = arena.insert(bit(2));
        assert_ne!(a, c);
        assert!(arena.get(a).is_none());
        assert_eq!(arena[c].uid(), 2);
        assert_eq!(arena[b].uid(), 1);
        assert_eq!(arena.len(), 2);
    }
}
