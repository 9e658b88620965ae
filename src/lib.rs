//! # Weighted-bit heaps for arithmetic generators
//!
//! A bit heap collects single bits, each carrying a weight (a power of two)
//! and an arrival time, and reduces them to one binary number using a
//! timing-driven schedule of compressors and adders.
//!
//! ## Pipeline
//!
//! 1. **Collect**: vectors, single bits and constants are added to per-weight
//!    columns kept sorted by arrival time.
//! 2. **Compress**: at each stage the scheduler applies the largest compressors
//!    that fit on the bits available, or a carry-propagating adder on the low
//!    columns when that finishes before the remaining bits arrive.
//! 3. **Final add**: the last two (or three) rows are summed by a wide adder
//!    and the result is published as a single signal.
//!
//! Every signal and unit produced along the way is handed to an
//! [`EmissionSink`]. The [`NetlistRecorder`] sink can evaluate the emitted
//! netlist, which is how the test-suite checks that compression preserves the
//! arithmetic value of the heap.
//!
//! ## Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use bitheap::{GenericTarget, HeapConfig, InputValues, NetlistRecorder, TimingContext, WeightedBitHeap};
//!
//! # fn main() -> Result<(), bitheap::BitHeapError> {
//! let target = Arc::new(GenericTarget::default());
//! let mut ctx = TimingContext::new(target.as_ref());
//! let mut heap = WeightedBitHeap::new(HeapConfig::new(5), target, NetlistRecorder::new())?;
//!
//! heap.add_unsigned_bit_vector(&ctx, 0, "a", 4)?;
//! heap.add_unsigned_bit_vector(&ctx, 0, "b", 4)?;
//! let sum = heap.compress(&mut ctx)?.clone();
//!
//! let inputs = InputValues::new().with("a", 5u32).with("b", 3u32);
//! let values = heap.sink().evaluate(&inputs).expect("netlist evaluates");
//! assert_eq!(sum.unsigned(&values), Some(8u32.into()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod bit;        // Weighted bits and their storage arena
pub mod timing;     // Arrival times, stage clock and technology models
pub mod compressor; // Compressor shapes and catalog
pub mod emit;       // Emission sinks: netlist recorder and VHDL writer
pub mod heap;       // The weighted-bit heap and its insertion surface
pub mod scheduler;  // Compression rounds, adder tree and final addition
pub mod profile;    // Compression profiling and heap snapshots

// Re-exports for convenience
pub use bit::{BitArena, BitId, Provenance, WeightedBit};
pub use compressor::{CompressorCatalog, CompressorShape};
pub use emit::{
    Declaration, Definition, EmissionSink, InputValues, Instance, NetlistError, NetlistRecorder,
    Operand, SignalValues, UnitKind, VhdlWriter,
};
pub use heap::{BitSource, FinalSum, HeapConfig, WeightedBitHeap};
pub use profile::{CompressionProfile, Diagnostics, FinalAddition, HeapSnapshot};
pub use scheduler::{AdderTreeRound, CompressionMode, CompressorRound, Progress, ReductionStrategy};
pub use timing::{Arrival, GenericTarget, Stage, StageClock, TechnologyModel, TimingContext};

use thiserror::Error;

/// Signed weight accepted by the public insertion surface.
///
/// Negative weights are rejected with [`BitHeapError::NegativeWeight`];
/// internally columns are addressed with `usize`.
pub type Weight = i32;

/// Errors raised while building or compressing a bit heap
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BitHeapError {
    /// Insertion at a negative weight
    #[error("{operation}: negative weight {weight}")]
    NegativeWeight {
        /// Operation that was refused
        operation: &'static str,
        /// Offending weight
        weight: Weight,
    },

    /// Constant that does not fit in the heap's width
    #[error("constant of {bits} bits at weight {weight} exceeds heap width {max_weight}")]
    OversizedConstant {
        /// Bit length of the constant
        bits: u64,
        /// Weight of the constant's least significant bit
        weight: Weight,
        /// Heap width
        max_weight: usize,
    },

    /// A column below the populated range was found empty during LSB concatenation
    #[error("empty column at weight {weight} below populated columns")]
    EmptyLowColumn {
        /// Weight of the empty column
        weight: usize,
    },

    /// The catalog lacks a shape the scheduler requires
    #[error("compressor catalog has no {0} shape")]
    MissingShape(String),

    /// A compressor shape that cannot be built on the target
    #[error("invalid compressor shape ({h0},{h1}): {reason}")]
    InvalidShape {
        /// Bits taken from the lower column
        h0: usize,
        /// Bits taken from the upper column
        h1: usize,
        /// Why the shape was refused
        reason: &'static str,
    },

    /// Rounds stopped reducing although every bit is available
    #[error("no reduction possible at stage {stage} with max column height {height}")]
    NoProgress {
        /// Stage of the stalled round
        stage: u64,
        /// Maximum column height at that point
        height: usize,
    },

    /// Compression was requested twice on the same heap
    #[error("heap {0} was already compressed")]
    AlreadyCompressed(String),

    /// Invalid heap or target configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Broken internal invariant (column ordering, arena bookkeeping)
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

/// Coarse classification of [`BitHeapError`] for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something the heap refuses
    InvalidInput,
    /// Compression could not be completed
    Scheduling,
    /// Misuse of the heap life cycle
    State,
    /// A bug inside the crate
    Internal,
}

impl BitHeapError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NegativeWeight { .. }
            | Self::OversizedConstant { .. }
            | Self::InvalidShape { .. }
            | Self::InvalidConfig(_) => ErrorKind::InvalidInput,
            Self::EmptyLowColumn { .. } | Self::MissingShape(_) | Self::NoProgress { .. } => {
                ErrorKind::Scheduling
            }
            Self::AlreadyCompressed(_) => ErrorKind::State,
            Self::InternalInvariantViolation(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = BitHeapError::NegativeWeight {
            operation: "add_bit",
            weight: -1,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "add_bit: negative weight -1");

        let err = BitHeapError::NoProgress { stage: 3, height: 4 };
        assert_eq!(err.kind(), ErrorKind::Scheduling);
    }
}
