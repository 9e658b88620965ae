//! Adder-tree rounds
//!
//! Each round pairs rows with carry-propagating adders: an adder takes one bit
//! per column over the populated range for its first operand, one more bit per
//! column where columns still hold two for its second, and a third bit of its
//! lowest column as carry-in. Sums join the heap when the round ends, so a
//! round roughly halves the height.

use crate::emit::EmissionSink;
use crate::heap::{AdderRole, AdderSpan, WeightedBitHeap};
use crate::timing::{Stage, TimingContext};
use crate::BitHeapError;

use super::{Progress, ReductionStrategy};

/// One level of a binary adder tree
#[derive(Debug, Clone, Default)]
pub struct AdderTreeRound;

impl AdderTreeRound {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

impl ReductionStrategy for AdderTreeRound {
    fn reduce<S: EmissionSink>(
        &mut self,
        heap: &mut WeightedBitHeap<S>,
        ctx: &mut TimingContext,
        _stage: Stage,
    ) -> Result<Progress, BitHeapError> {
        let rows = heap.max_height();
        if rows <= 1 {
            return Ok(Progress::Finished);
        }
        heap.defer_outputs();
        let paired = pair_rows(heap, ctx, rows);
        heap.flush_pending();
        paired?;
        Ok(Progress::Reduced)
    }
}

fn pair_rows<S: EmissionSink>(
    heap: &mut WeightedBitHeap<S>,
    ctx: &mut TimingContext,
    rows: usize,
) -> Result<(), BitHeapError> {
    for _ in 0..rows / 2 {
        let lo = heap.min_weight();
        let heights = heap.heights();
        let top = heights.len();
        let Some(right) = (lo..top).find(|&w| heights[w] >= 2) else {
            break;
        };
        let top2 = (lo..top).rev().find(|&w| heights[w] >= 2).unwrap_or(right);
        let top1 = (lo..top).rev().find(|&w| heights[w] >= 1).unwrap_or(top2);
        // with more than two rows the single bits above the pairs wait for a later adder
        let left = if rows > 2 { top2 } else { top1 };
        let counts = (right..=left)
            .map(|w| heights[w].min(if w <= top2 { 2 } else { 1 }))
            .collect();
        let span = AdderSpan {
            lsb: right,
            counts,
            carry_in: heights[right] >= 3,
        };
        heap.apply_adder(ctx, &span, AdderRole::Tree)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::emit::{InputValues, NetlistRecorder};
    use crate::heap::HeapConfig;
    use crate::timing::GenericTarget;

    #[test]
    fn test_round_halves_rows() {
        let target = Arc::new(GenericTarget::default());
        let mut ctx = TimingContext::new(target.as_ref());
        let mut heap =
            WeightedBitHeap::new(HeapConfig::new(6), target, NetlistRecorder::new()).unwrap();
        for vector in ["a", "b", "c", "d"] {
            heap.add_unsigned_bit_vector(&ctx, 0, vector, 4).unwrap();
        }

        let mut round = AdderTreeRound::new();
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Reduced);
        assert_eq!(heap.profile().tree_adders, 2);
        assert_eq!(heap.max_height(), 2);

        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Reduced);
        assert_eq!(heap.max_height(), 1);
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Finished);

        let inputs = InputValues::new()
            .with("a", 15u32)
            .with("b", 9u32)
            .with("c", 6u32)
            .with("d", 11u32);
        let values = heap.sink().evaluate(&inputs).unwrap();
        let total: u32 = (0..6)
            .flat_map(|w| heap.column_bits(w).map(move |bit| (w, bit.name().to_string())))
            .map(|(w, name)| {
                let bit = values.get(&name).map_or(0, |v| u32::from(v.bit(0)));
                bit << w
            })
            .sum();
        assert_eq!(total, 41);
    }
}
