//! Compression profiling
//!
//! Counts what compression built and how column heights evolved, and keeps
//! the diagnostics raised while collecting bits.

mod snapshot;

pub use snapshot::{BitSnapshot, ColumnSnapshot, HeapSnapshot};

use crate::timing::{Arrival, Stage};

/// Non-fatal events recorded while bits were added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct Diagnostics {
    /// Bits dropped because their weight was at or above the heap width
    pub dropped_bits: usize,
    /// Constant bits dropped for the same reason
    pub dropped_constants: usize,
    /// Vectors that extended past the heap width
    pub truncated_vectors: usize,
}

impl Diagnostics {
    /// Whether anything was dropped
    pub fn is_clean(&self) -> bool {
        self.dropped_bits == 0 && self.dropped_constants == 0
    }
}

/// How the last rows were turned into the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub enum FinalAddition {
    /// At most one bit per column was left; no adder
    Concatenation,
    /// Single two-input adder
    Binary {
        /// Adder width
        width: usize,
    },
    /// Two-input adder split into carry-select chunks
    CarrySelect {
        /// Total width
        width: usize,
        /// Number of chunks
        chunks: usize,
    },
    /// Three-input adder
    Ternary {
        /// Adder width
        width: usize,
    },
}

/// Record of one compression run
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct CompressionProfile {
    /// Bits in the heap when compression started, constants included
    pub initial_bits: usize,
    /// Tallest column when compression started
    pub initial_height: usize,
    /// Compression rounds run (compressor and adder-tree rounds)
    pub rounds: usize,
    /// Tallest column after each round, keyed by the round's stage
    pub timeline: Vec<(Stage, usize)>,
    /// Compressors instantiated
    pub compressors: usize,
    /// Tail adders applied on the low columns
    pub tail_adders: usize,
    /// Adders instantiated by the adder tree
    pub tree_adders: usize,
    /// Low columns published directly as result chunks
    pub lsb_chunks: usize,
    /// Final addition, once compression finished
    pub final_addition: Option<FinalAddition>,
    /// Arrival of the result signal
    pub result_arrival: Option<Arrival>,
}

impl CompressionProfile {
    pub(crate) fn record_round(&mut self, stage: Stage, height: usize) {
        self.rounds += 1;
        self.timeline.push((stage, height));
    }

    /// Whether no round ever left a column taller than it found the heap
    pub fn heights_monotonic(&self) -> bool {
        let mut previous = self.initial_height;
        for &(_, height) in &self.timeline {
            if height > previous {
                return false;
            }
            previous = height;
        }
        true
    }

    /// Units instantiated, adders of every kind included
    pub fn units(&self) -> usize {
        let final_units = match self.final_addition {
            Some(FinalAddition::Binary { .. }) | Some(FinalAddition::Ternary { .. }) => 1,
            // two adders and a mux per chunk past the first
            Some(FinalAddition::CarrySelect { chunks, .. }) => 1 + 3 * chunks.saturating_sub(1),
            _ => 0,
        };
        self.compressors + self.tail_adders + self.tree_adders + final_units
    }

    /// Generate report
    pub fn report(&self) -> String {
        let final_addition = match self.final_addition {
            None => "pending".to_string(),
            Some(FinalAddition::Concatenation) => "concatenation".to_string(),
            Some(FinalAddition::Binary { width }) => format!("{width}-bit adder"),
            Some(FinalAddition::CarrySelect { width, chunks }) => {
                format!("{width}-bit carry-select adder in {chunks} chunks")
            }
            Some(FinalAddition::Ternary { width }) => format!("{width}-bit ternary adder"),
        };
        let arrival = self
            .result_arrival
            .map(|a| format!("cycle {} + {:.3}ns", a.cycle, a.critical_path * 1e9))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "Initial: {} bits, max height {}\nRounds: {}\nUnits:\n  Compressors: {}\n  Tail adders: {}\n  Tree adders: {}\n  LSB chunks: {}\nFinal addition: {}\nResult arrival: {}",
            self.initial_bits,
            self.initial_height,
            self.rounds,
            self.compressors,
            self.tail_adders,
            self.tree_adders,
            self.lsb_chunks,
            final_addition,
            arrival,
        )
    }
}
