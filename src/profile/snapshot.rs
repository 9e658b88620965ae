//! Point-in-time view of a heap's columns

use std::fmt::Write as _;

use crate::bit::Provenance;
use crate::timing::Arrival;

/// One bit as seen by a snapshot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct BitSnapshot {
    /// Signal name
    pub name: String,
    /// Arrival time
    pub arrival: Arrival,
    /// Origin
    pub provenance: Provenance,
}

/// One column, bits in arrival order
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct ColumnSnapshot {
    /// Column weight
    pub weight: usize,
    /// Bits, earliest first
    pub bits: Vec<BitSnapshot>,
}

/// Copy of a heap's columns for inspection or plotting
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct HeapSnapshot {
    /// Heap name
    pub name: String,
    /// Heap width
    pub max_weight: usize,
    /// Lowest column still being compressed
    pub min_weight: usize,
    /// Columns `0..max_weight`
    pub columns: Vec<ColumnSnapshot>,
    /// Pending constant, binary, most significant bit first
    pub constant: String,
}

impl HeapSnapshot {
    /// Height of every column
    pub fn heights(&self) -> Vec<usize> {
        self.columns.iter().map(|c| c.bits.len()).collect()
    }

    /// Tallest column
    pub fn max_height(&self) -> usize {
        self.heights().into_iter().max().unwrap_or(0)
    }

    /// Dot diagram, most significant column on the left
    ///
    /// `o` marks an input bit, `c` a constant, `x` a compressor or adder output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} [{}..{}) constant={}",
            self.name, self.min_weight, self.max_weight, self.constant
        );
        for row in 0..self.max_height() {
            let line: String = self
                .columns
                .iter()
                .rev()
                .map(|column| match column.bits.get(row).map(|b| b.provenance) {
                    None => '.',
                    Some(Provenance::Input) | Some(Provenance::ComplementedInput) => 'o',
                    Some(Provenance::Constant) => 'c',
                    Some(Provenance::Compressor) | Some(Provenance::Adder) => 'x',
                })
                .collect();
            let _ = writeln!(out, "{line}");
        }
        out
    }
}
