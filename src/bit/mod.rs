//! Weighted bits
//!
//! A bit lives in exactly one column of a heap. Its weight is the column
//! index, its arrival is when the signal driving it settles, and its name is
//! the signal the emitted netlist uses for it.

mod arena;

pub use arena::{BitArena, BitId};

use std::cmp::Ordering;

use crate::timing::{Arrival, Stage, StageClock};

/// Where a bit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub enum Provenance {
    /// Bit of an input vector
    Input,
    /// Inverted bit of an input vector (two's complement handling)
    ComplementedInput,
    /// Constant bit materialized at compression time
    Constant,
    /// Output of a compressor
    Compressor,
    /// Output of an adder
    Adder,
}

/// Single bit stored in a heap column
#[derive(Debug, Clone)]
pub struct WeightedBit {
    weight: usize,
    uid: u32,
    arrival: Arrival,
    provenance: Provenance,
    name: String,
}

impl WeightedBit {
    /// Create a bit; `uid` must be unique within its column
    pub fn new(
        weight: usize,
        uid: u32,
        arrival: Arrival,
        provenance: Provenance,
        name: String,
    ) -> Self {
        Self {
            weight,
            uid,
            arrival,
            provenance,
            name,
        }
    }

    /// Column index
    pub fn weight(&self) -> usize {
        self.weight
    }

    /// Identifier unique within the column
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Arrival time
    pub fn arrival(&self) -> Arrival {
        self.arrival
    }

    /// Arrival cycle
    pub fn cycle(&self) -> u32 {
        self.arrival.cycle
    }

    /// Arrival critical path
    pub fn critical_path(&self) -> f64 {
        self.arrival.critical_path
    }

    /// Origin of the bit
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Signal name in the emitted netlist
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage at which the bit becomes usable
    pub fn stage(&self, clock: &StageClock) -> Stage {
        clock.stage_of(self.arrival)
    }

    /// Compare by arrival time
    pub fn cmp_arrival(&self, other: &WeightedBit) -> Ordering {
        self.arrival.cmp(&other.arrival)
    }
}
