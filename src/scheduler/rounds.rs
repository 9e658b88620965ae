//! Compressor rounds

use crate::compressor::CompressorShape;
use crate::emit::EmissionSink;
use crate::heap::{AdderRole, AdderSpan, WeightedBitHeap};
use crate::timing::{Stage, TimingContext};
use crate::BitHeapError;

use super::{Progress, ReductionStrategy};

/// One stage of greedy compression
///
/// The round first publishes finished low columns, then tries a tail adder
/// on the low columns, then applies catalog shapes best first while enough
/// usable bits remain. Columns are scanned from the most significant down,
/// so the outputs of a shape land on columns whose consumption this round
/// is already known; a shape is skipped when one of its output columns
/// would end the round taller than the heap was when the round started.
#[derive(Debug, Clone)]
pub struct CompressorRound {
    tail_adder: bool,
}

impl CompressorRound {
    /// Round with the tail-adder heuristic enabled
    pub fn new() -> Self {
        Self { tail_adder: true }
    }

    /// Enable or disable the tail-adder heuristic
    pub fn with_tail_adder(mut self, enabled: bool) -> Self {
        self.tail_adder = enabled;
        self
    }

    fn compress_available<S: EmissionSink>(
        &self,
        heap: &mut WeightedBitHeap<S>,
        ctx: &mut TimingContext,
        stage: Stage,
        limit: usize,
    ) -> Result<bool, BitHeapError> {
        let mut reduced = false;
        if self.tail_adder {
            let counts = heap.available_counts(stage);
            if let Some(span) = tail_adder_span(heap, &counts) {
                heap.apply_adder(ctx, &span, AdderRole::Tail)?;
                reduced = true;
            }
        }

        let mut counts = heap.available_counts(stage);
        let shapes: Vec<CompressorShape> = heap.catalog().shapes().to_vec();
        let top = heap.max_weight();
        for (index, shape) in shapes.iter().enumerate() {
            for column in (heap.min_weight()..top).rev() {
                if shape.h1() > 0 && column + 1 >= top {
                    continue;
                }
                while counts[column] >= shape.h0()
                    && (shape.h1() == 0 || counts[column + 1] >= shape.h1())
                    && outputs_fit(heap, column, shape, limit)
                {
                    heap.apply_compressor(ctx, column, index)?;
                    counts[column] -= shape.h0();
                    if shape.h1() > 0 {
                        counts[column + 1] -= shape.h1();
                    }
                    reduced = true;
                }
            }
        }
        Ok(reduced)
    }
}

impl ReductionStrategy for CompressorRound {
    fn reduce<S: EmissionSink>(
        &mut self,
        heap: &mut WeightedBitHeap<S>,
        ctx: &mut TimingContext,
        stage: Stage,
    ) -> Result<Progress, BitHeapError> {
        let limit = heap.max_height();
        let concatenated = heap.concatenate_lsb_columns()?;
        heap.defer_outputs();
        let reduced = self.compress_available(heap, ctx, stage, limit);
        heap.flush_pending();
        Ok(if reduced? || concatenated {
            Progress::Reduced
        } else {
            Progress::Waiting
        })
    }
}

/// Whether applying `shape` at `column` keeps every output column at most
/// `limit` bits high, counting stored bits and outputs queued this round
fn outputs_fit<S: EmissionSink>(
    heap: &WeightedBitHeap<S>,
    column: usize,
    shape: &CompressorShape,
    limit: usize,
) -> bool {
    (column..column + shape.output_width())
        .take_while(|&w| w < heap.max_weight())
        .all(|w| {
            let consumed = match w - column {
                0 => shape.h0(),
                1 => shape.h1(),
                _ => 0,
            };
            heap.projected_height(w).saturating_sub(consumed) < limit
        })
}

/// Widest run of low columns worth summing with a carry-propagating adder now
///
/// Starting at `min_weight`, columns holding exactly two usable bits extend
/// the run. The run is accepted up to the highest column where the adder
/// would finish before the earliest later bit of the run arrives, and only
/// if it spans two columns or more; a column with no later bit never fills
/// further and does not bound the adder. The carry column above the run
/// must be shorter than the tallest column, so the round never raises the
/// heap's height.
pub(crate) fn tail_adder_span<S: EmissionSink>(
    heap: &WeightedBitHeap<S>,
    counts: &[usize],
) -> Option<AdderSpan> {
    let target = heap.target();
    let period = target.clock_period();
    let lsb = heap.min_weight();
    let top = heap.max_weight();
    let max_height = heap.max_height();
    let mut latest = f64::NEG_INFINITY;
    let mut earliest_pending = f64::INFINITY;
    let mut msb = None;

    let mut column = lsb;
    while column < top && counts[column] == 2 {
        let Some(last) = heap.arrival_at(column, 1) else {
            break;
        };
        latest = latest.max(last.seconds(period));
        if let Some(next) = heap.arrival_at(column, 2) {
            earliest_pending = earliest_pending.min(next.seconds(period));
        }
        let span = column - lsb + 1;
        let carry_fits = column + 1 >= top || heap.projected_height(column + 1) < max_height;
        if span >= 2 && carry_fits && latest + target.adder_delay(span) < earliest_pending {
            msb = Some(column);
        }
        column += 1;
    }

    msb.map(|msb| AdderSpan {
        lsb,
        counts: vec![2; msb - lsb + 1],
        carry_in: false,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::emit::NetlistRecorder;
    use crate::heap::HeapConfig;
    use crate::timing::{Arrival, GenericTarget};

    fn heap(max_weight: usize) -> (WeightedBitHeap, TimingContext) {
        let target = Arc::new(GenericTarget::default());
        let ctx = TimingContext::new(target.as_ref());
        let heap = WeightedBitHeap::new(HeapConfig::new(max_weight), target, NetlistRecorder::new())
            .unwrap();
        (heap, ctx)
    }

    #[test]
    fn test_round_uses_only_available_bits() {
        let (mut heap, mut ctx) = heap(4);
        for vector in ["a", "b", "c"] {
            heap.add_unsigned_bit_vector(&ctx, 0, vector, 1).unwrap();
        }
        ctx.set_arrival(Arrival::new(2, 0.0));
        heap.add_unsigned_bit_vector(&ctx, 0, "d", 1).unwrap();

        let mut round = CompressorRound::new().with_tail_adder(false);
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Reduced);
        // the full adder consumed a, b, c; d and the sum bit remain in column 0
        assert_eq!(heap.heights(), vec![2, 1, 0, 0]);
        assert_eq!(heap.profile().compressors, 1);
    }

    #[test]
    fn test_waiting_when_nothing_usable() {
        let (mut heap, mut ctx) = heap(4);
        ctx.set_arrival(Arrival::new(1, 0.0));
        for vector in ["a", "b", "c"] {
            heap.add_unsigned_bit_vector(&ctx, 0, vector, 2).unwrap();
        }
        let mut round = CompressorRound::new();
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Waiting);
        assert_eq!(heap.heights(), vec![3, 3, 0, 0]);
    }

    #[test]
    fn test_tail_adder_span() {
        let (mut heap, mut ctx) = heap(4);
        heap.add_unsigned_bit_vector(&ctx, 0, "a", 3).unwrap();
        heap.add_unsigned_bit_vector(&ctx, 0, "b", 2).unwrap();
        ctx.set_arrival(Arrival::new(2, 0.0));
        heap.add_unsigned_bit_vector(&ctx, 0, "c", 3).unwrap();

        let counts = heap.available_counts(0);
        assert_eq!(counts, vec![2, 2, 1, 0]);
        let span = tail_adder_span(&heap, &counts).expect("adder fits before the late bits");
        // column 2 has a single usable bit and ends the run
        assert_eq!(span.lsb, 0);
        assert_eq!(span.counts, vec![2, 2]);
        assert!(!span.carry_in);
    }

    #[test]
    fn test_no_tail_adder_over_single_bits() {
        let (mut heap, mut ctx) = heap(8);
        heap.add_unsigned_bit_vector(&ctx, 0, "a", 4).unwrap();
        ctx.set_arrival(Arrival::new(5, 0.0));
        for vector in ["b", "c", "d"] {
            heap.add_unsigned_bit_vector(&ctx, 0, vector, 4).unwrap();
        }
        let counts = heap.available_counts(0);
        assert_eq!(counts, vec![1, 1, 1, 1, 0, 0, 0, 0]);
        assert!(tail_adder_span(&heap, &counts).is_none());

        let mut round = CompressorRound::new();
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Waiting);
        assert_eq!(heap.profile().tail_adders, 0);
    }

    #[test]
    fn test_tail_adder_stops_below_tallest_column() {
        let (mut heap, mut ctx) = heap(4);
        heap.add_unsigned_bit_vector(&ctx, 0, "a", 2).unwrap();
        heap.add_unsigned_bit_vector(&ctx, 0, "b", 2).unwrap();
        ctx.set_arrival(Arrival::new(2, 0.0));
        heap.add_unsigned_bit_vector(&ctx, 0, "c", 1).unwrap();
        heap.add_unsigned_bit_vector(&ctx, 1, "d", 1).unwrap();
        for vector in ["e", "f", "g"] {
            heap.add_unsigned_bit_vector(&ctx, 2, vector, 1).unwrap();
        }

        // column 2 is the tallest; a carry into it would make it taller
        assert_eq!(heap.heights(), vec![3, 3, 3, 0]);
        let counts = heap.available_counts(0);
        assert_eq!(counts, vec![2, 2, 0, 0]);
        assert!(tail_adder_span(&heap, &counts).is_none());
    }

    #[test]
    fn test_tail_adder_over_settled_columns() {
        let (mut heap, ctx) = heap(4);
        heap.add_unsigned_bit_vector(&ctx, 0, "a", 3).unwrap();
        heap.add_unsigned_bit_vector(&ctx, 0, "b", 3).unwrap();
        let counts = heap.available_counts(0);
        let span = tail_adder_span(&heap, &counts).expect("nothing else will arrive");
        assert_eq!(span.counts, vec![2, 2, 2]);
    }

    #[test]
    fn test_tail_adder_columns_are_published_next_round() {
        let (mut heap, mut ctx) = heap(6);
        heap.add_unsigned_bit_vector(&ctx, 0, "a", 3).unwrap();
        heap.add_unsigned_bit_vector(&ctx, 0, "b", 3).unwrap();
        heap.add_constant_one_bit(3).unwrap();
        heap.materialize_constants();
        for vector in ["c", "d", "e"] {
            heap.add_unsigned_bit_vector(&ctx, 4, vector, 1).unwrap();
        }
        assert_eq!(heap.heights(), vec![2, 2, 2, 1, 3, 0]);

        let mut round = CompressorRound::new();
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Reduced);
        assert_eq!(heap.profile().tail_adders, 1);
        assert_eq!(heap.heights(), vec![1, 1, 1, 2, 1, 1]);

        round.reduce(&mut heap, &mut ctx, 1).unwrap();
        assert_eq!(heap.min_weight(), 3);
    }

    #[test]
    fn test_shapes_skip_columns_that_would_grow() {
        let (mut heap, mut ctx) = heap(6);
        for vector in ["a", "b", "c", "d"] {
            heap.add_unsigned_bit_vector(&ctx, 0, vector, 1).unwrap();
        }
        ctx.set_arrival(Arrival::new(5, 0.0));
        for vector in ["e", "f", "g", "h"] {
            heap.add_unsigned_bit_vector(&ctx, 1, vector, 1).unwrap();
        }

        // any compressor on column 0 would push column 1 past four bits
        let mut round = CompressorRound::new();
        assert_eq!(round.reduce(&mut heap, &mut ctx, 0).unwrap(), Progress::Waiting);
        assert_eq!(heap.heights(), vec![4, 4, 0, 0, 0, 0]);

        let late = heap.stage_clock().stage_of(Arrival::new(5, 0.0));
        assert_eq!(round.reduce(&mut heap, &mut ctx, late).unwrap(), Progress::Reduced);
        assert!(heap.max_height() <= 4);
        assert_eq!(heap.profile().compressors, 2);
    }
}
