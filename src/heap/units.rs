//! Applying compressors and adders to the columns

use tracing::trace;

use super::{FinalSum, WeightedBitHeap};
use crate::bit::{Provenance, WeightedBit};
use crate::emit::{Definition, EmissionSink, Instance, Operand, UnitKind};
use crate::profile::FinalAddition;
use crate::timing::{Arrival, TimingContext};
use crate::BitHeapError;

/// Bits consumed by a carry-propagating adder
///
/// `counts[i]` bits (at most two) are taken from column `lsb + i`; the first
/// feeds the X operand and the second the Y operand. With `carry_in`, one
/// more bit of column `lsb` drives the carry input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AdderSpan {
    pub lsb: usize,
    pub counts: Vec<usize>,
    pub carry_in: bool,
}

impl AdderSpan {
    pub fn msb(&self) -> usize {
        self.lsb + self.counts.len().saturating_sub(1)
    }

    /// Operand width, including the carry-out position
    pub fn width(&self) -> usize {
        self.counts.len() + 1
    }
}

/// Why an adder is built; selects the profile counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdderRole {
    Tail,
    Tree,
}

fn bit_operand(bit: Option<WeightedBit>, latest: &mut Option<Arrival>) -> Operand {
    match bit {
        Some(bit) => {
            *latest = (*latest).max(Some(bit.arrival()));
            Operand::Signal(bit.name().to_string())
        }
        None => Operand::Zero,
    }
}

impl<S: EmissionSink> WeightedBitHeap<S> {
    /// Replace the earliest bits of `column` (and `column + 1`) by a compressor
    ///
    /// The compressor starts when its latest input arrives and takes one
    /// elementary delay; its outputs land on `column..column + output_width`.
    pub(crate) fn apply_compressor(
        &mut self,
        ctx: &mut TimingContext,
        column: usize,
        shape_index: usize,
    ) -> Result<(), BitHeapError> {
        let shape = self
            .catalog
            .shape(shape_index)
            .ok_or_else(|| BitHeapError::MissingShape(format!("#{shape_index}")))?;
        if shape.h1() > 0 && column + 1 >= self.max_weight {
            return Err(BitHeapError::InternalInvariantViolation(format!(
                "two-column compressor {shape} at top column {column}"
            )));
        }
        if self.column_height(column) < shape.h0() || self.column_height(column + 1) < shape.h1() {
            return Err(BitHeapError::InternalInvariantViolation(format!(
                "compressor {shape} does not fit at column {column}"
            )));
        }

        let mut latest = None;
        let mut ports = Vec::with_capacity(2);
        for (offset, count) in [(0, shape.h0()), (1, shape.h1())] {
            if count == 0 {
                continue;
            }
            let operands: Vec<Operand> = (0..count)
                .map(|_| {
                    let bit = self.pop_front(column + offset);
                    bit_operand(bit, &mut latest)
                })
                .collect();
            ports.push(operands);
        }
        let latest = latest.unwrap_or_else(|| ctx.arrival());
        ctx.set_arrival(latest);
        ctx.advance_critical_path(self.target.elementary_delay());

        let k = self.counters.compressor;
        self.counters.compressor += 1;
        let mut inputs = Vec::with_capacity(ports.len());
        for (port, operands) in ports.into_iter().enumerate() {
            let signal = format!("{}_cmp{k}_in{port}", self.name);
            self.declare(signal.clone(), operands.len(), Definition::Concat(operands), latest);
            inputs.push(Operand::Signal(signal));
        }
        let output = format!("{}_cmp{k}_out", self.name);
        let arrival = ctx.arrival();
        self.sink.instantiate(Instance {
            name: format!("{}_cmp{k}", self.name),
            unit: UnitKind::Compressor(shape),
            inputs,
            output: output.clone(),
            output_width: shape.output_width(),
            arrival,
        });
        for index in 0..shape.output_width() {
            self.push_bit(
                column + index,
                arrival,
                Provenance::Compressor,
                Definition::Slice {
                    source: output.clone(),
                    index,
                },
            );
        }
        self.catalog.mark_used(shape_index);
        self.profile.compressors += 1;
        trace!(heap = %self.name, column, %shape, cycle = arrival.cycle, "compressor");
        Ok(())
    }

    /// Replace the bits described by `span` by a ripple-carry adder
    ///
    /// The sum lands on `lsb..=msb + 1`, one bit per column.
    pub(crate) fn apply_adder(
        &mut self,
        ctx: &mut TimingContext,
        span: &AdderSpan,
        role: AdderRole,
    ) -> Result<(), BitHeapError> {
        if span.counts.is_empty() || span.msb() >= self.max_weight {
            return Err(BitHeapError::InternalInvariantViolation(format!(
                "adder span {}..={} outside the heap",
                span.lsb,
                span.msb()
            )));
        }
        let width = span.width();
        let mut latest = None;
        let mut x = Vec::with_capacity(width);
        let mut y = Vec::with_capacity(width);
        for (offset, &count) in span.counts.iter().enumerate() {
            let column = span.lsb + offset;
            let first = if count >= 1 { self.pop_front(column) } else { None };
            let second = if count >= 2 { self.pop_front(column) } else { None };
            x.push(bit_operand(first, &mut latest));
            y.push(bit_operand(second, &mut latest));
        }
        x.push(Operand::Zero);
        y.push(Operand::Zero);
        let carry = if span.carry_in {
            let bit = self.pop_front(span.lsb);
            bit_operand(bit, &mut latest)
        } else {
            Operand::Zero
        };

        let latest = latest.unwrap_or_else(|| ctx.arrival());
        ctx.set_arrival(latest);
        ctx.advance_critical_path(self.target.local_wire_delay() + self.target.adder_delay(width));

        let k = self.counters.adder;
        self.counters.adder += 1;
        let x_name = format!("{}_add{k}_x", self.name);
        let y_name = format!("{}_add{k}_y", self.name);
        let output = format!("{}_add{k}_s", self.name);
        self.declare(x_name.clone(), width, Definition::Concat(x), latest);
        self.declare(y_name.clone(), width, Definition::Concat(y), latest);
        let arrival = ctx.arrival();
        self.sink.instantiate(Instance {
            name: format!("{}_add{k}", self.name),
            unit: UnitKind::Adder { width },
            inputs: vec![Operand::Signal(x_name), Operand::Signal(y_name), carry],
            output: output.clone(),
            output_width: width,
            arrival,
        });
        for index in 0..width {
            self.push_bit(
                span.lsb + index,
                arrival,
                Provenance::Adder,
                Definition::Slice {
                    source: output.clone(),
                    index,
                },
            );
        }
        match role {
            AdderRole::Tail => self.profile.tail_adders += 1,
            AdderRole::Tree => self.profile.tree_adders += 1,
        }
        trace!(heap = %self.name, lsb = span.lsb, msb = span.msb(), ?role, cycle = arrival.cycle, "adder");
        Ok(())
    }

    /// Publish the run of single-bit columns starting at `min_weight` as a result chunk
    ///
    /// Returns whether `min_weight` moved. An empty column below populated
    /// ones is an error; an empty column with nothing above ends the run.
    pub(crate) fn concatenate_lsb_columns(&mut self) -> Result<bool, BitHeapError> {
        let start = self.min_weight;
        let mut end = start;
        while end < self.max_weight {
            match self.columns[end].len() {
                1 => end += 1,
                0 => {
                    if self.columns[end..].iter().any(|c| !c.is_empty()) {
                        return Err(BitHeapError::EmptyLowColumn { weight: end });
                    }
                    break;
                }
                _ => break,
            }
        }
        if end == start {
            return Ok(false);
        }

        let mut latest = None;
        let operands: Vec<Operand> = (start..end)
            .map(|column| {
                let bit = self.pop_front(column);
                bit_operand(bit, &mut latest)
            })
            .collect();
        let signal = format!("{}_lsb{}", self.name, self.counters.chunk);
        self.counters.chunk += 1;
        self.declare(
            signal.clone(),
            end - start,
            Definition::Concat(operands),
            latest.unwrap_or(Arrival::ZERO),
        );
        self.chunks
            .extend((0..end - start).map(|index| Operand::slice(signal.as_str(), index)));
        self.min_weight = end;
        self.profile.lsb_chunks += 1;
        trace!(heap = %self.name, start, end, "lsb chunk");
        Ok(true)
    }

    /// Pop the earliest bit of a column as an operand ('0' when empty)
    pub(crate) fn pop_operand(&mut self, column: usize, latest: &mut Option<Arrival>) -> Operand {
        let bit = self.pop_front(column);
        bit_operand(bit, latest)
    }

    /// Fill empty columns between the lowest and highest populated ones with
    /// constant '0' bits, and start the result with '0' for the columns below
    pub(crate) fn fill_interior_gaps(&mut self) {
        let mut populated = (0..self.max_weight).filter(|&w| !self.columns[w].is_empty());
        let Some(lowest) = populated.next() else {
            return;
        };
        let highest = populated.last().unwrap_or(lowest);
        for column in lowest..=highest {
            if self.columns[column].is_empty() {
                self.push_bit(column, Arrival::ZERO, Provenance::Constant, Definition::Constant(false));
            }
        }
        self.chunks = vec![Operand::Zero; lowest];
        self.min_weight = lowest;
    }

    /// Take the remaining bit (or '0') of every column from `min_weight` up
    pub(crate) fn take_single_row(&mut self) -> Vec<Operand> {
        (self.min_weight..self.max_weight)
            .map(|column| {
                let bit = self.pop_front(column);
                let mut latest = None;
                bit_operand(bit, &mut latest)
            })
            .collect()
    }

    /// Declare the result signal: finished chunks followed by `tail`
    pub(crate) fn publish_result(
        &mut self,
        ctx: &TimingContext,
        tail: Vec<Operand>,
        addition: FinalAddition,
    ) -> Result<(), BitHeapError> {
        if self.bit_count() != 0 {
            return Err(BitHeapError::InternalInvariantViolation(format!(
                "{} bits left in the heap after the final addition",
                self.bit_count()
            )));
        }
        let mut bits = std::mem::take(&mut self.chunks);
        bits.extend(tail);
        let signal = format!("CompressionResult_{}", self.name);
        let arrival = ctx.arrival();
        self.declare(signal.clone(), bits.len(), Definition::Concat(bits.clone()), arrival);
        self.min_weight = self.max_weight;
        self.profile.final_addition = Some(addition);
        self.profile.result_arrival = Some(arrival);
        self.result = Some(FinalSum {
            signal,
            bits,
            max_weight: self.max_weight,
            arrival,
        });
        Ok(())
    }
}
