//! Final addition of the last rows

use crate::emit::{Definition, EmissionSink, Instance, Operand, UnitKind};
use crate::heap::WeightedBitHeap;
use crate::profile::FinalAddition;
use crate::timing::{Arrival, TimingContext};
use crate::BitHeapError;

impl<S: EmissionSink> WeightedBitHeap<S> {
    /// Sum the rows left after compressor rounds
    ///
    /// Two rows go to a binary adder; three rows are only left on targets
    /// with ternary adders.
    pub(super) fn finish_rows(&mut self, ctx: &mut TimingContext) -> Result<(), BitHeapError> {
        self.concatenate_lsb_columns()?;
        let height = self.max_height();
        if height == 3 && self.target().supports_ternary_adders() {
            return self.ternary_final_add(ctx);
        }
        if height > 2 {
            return Err(BitHeapError::InternalInvariantViolation(format!(
                "final addition started with {height} rows"
            )));
        }
        if height <= 1 {
            return self.finish_by_concatenation(ctx);
        }
        self.binary_final_add(ctx)
    }

    /// Take up to `rows` bits from every column from `min_weight` up
    ///
    /// Returns one operand vector per row and the latest arrival taken.
    fn take_rows(&mut self, rows: usize) -> (Vec<Vec<Operand>>, Option<Arrival>) {
        let mut latest = None;
        let mut taken = vec![Vec::new(); rows];
        for column in self.min_weight()..self.max_weight() {
            for row in taken.iter_mut() {
                let operand = self.pop_operand(column, &mut latest);
                row.push(operand);
            }
        }
        (taken, latest)
    }

    fn final_adder(
        &mut self,
        ctx: &mut TimingContext,
        label: String,
        mut x: Vec<Operand>,
        mut y: Vec<Operand>,
        carry: Operand,
        start: Arrival,
    ) -> (String, usize) {
        x.push(Operand::Zero);
        y.push(Operand::Zero);
        let width = x.len();
        let x_name = format!("{label}_x");
        let y_name = format!("{label}_y");
        self.declare(x_name.clone(), width, Definition::Concat(x), start);
        self.declare(y_name.clone(), width, Definition::Concat(y), start);
        ctx.set_arrival(start);
        ctx.advance_critical_path(self.target().local_wire_delay() + self.target().adder_delay(width));
        let output = format!("{label}_s");
        self.instantiate(Instance {
            name: label,
            unit: UnitKind::Adder { width },
            inputs: vec![Operand::Signal(x_name), Operand::Signal(y_name), carry],
            output: output.clone(),
            output_width: width,
            arrival: ctx.arrival(),
        });
        (output, width)
    }

    /// Two-row final adder, split into carry-select chunks on targets with a
    /// maximum adder width
    fn binary_final_add(&mut self, ctx: &mut TimingContext) -> Result<(), BitHeapError> {
        let (mut rows, latest) = self.take_rows(2);
        let y = rows.pop().unwrap_or_default();
        let x = rows.pop().unwrap_or_default();
        let start = latest.unwrap_or_else(|| ctx.arrival());
        let width = x.len();

        let chunk = match self.target().max_adder_width() {
            Some(chunk) if width > chunk => chunk,
            _ => {
                let label = format!("{}_final", self.name());
                let (output, out_width) = self.final_adder(ctx, label, x, y, Operand::Zero, start);
                let tail = (0..out_width).map(|i| Operand::slice(output.as_str(), i)).collect();
                return self.publish_result(ctx, tail, FinalAddition::Binary { width: out_width });
            }
        };

        let mut tail = Vec::with_capacity(width + 1);
        let mut carry: Option<(Operand, Arrival)> = None;
        let mut chunks = 0;
        for (index, (xs, ys)) in x.chunks(chunk).zip(y.chunks(chunk)).enumerate() {
            chunks += 1;
            let len = xs.len();
            let label = format!("{}_final{index}", self.name());
            match carry.take() {
                None => {
                    let (output, _) =
                        self.final_adder(ctx, label, xs.to_vec(), ys.to_vec(), Operand::Zero, start);
                    tail.extend((0..len).map(|i| Operand::slice(output.as_str(), i)));
                    carry = Some((Operand::slice(output.as_str(), len), ctx.arrival()));
                }
                Some((carry_bit, carry_arrival)) => {
                    let (sum0, w) = self.final_adder(
                        ctx,
                        format!("{label}_c0"),
                        xs.to_vec(),
                        ys.to_vec(),
                        Operand::Zero,
                        start,
                    );
                    let (sum1, _) = self.final_adder(
                        ctx,
                        format!("{label}_c1"),
                        xs.to_vec(),
                        ys.to_vec(),
                        Operand::One,
                        start,
                    );
                    ctx.set_arrival(ctx.arrival().max(carry_arrival));
                    ctx.advance_critical_path(
                        self.target().local_wire_delay() + self.target().lut_delay(),
                    );
                    let selected = format!("{label}_sel");
                    self.instantiate(Instance {
                        name: format!("{label}_mux"),
                        unit: UnitKind::Mux { width: w },
                        inputs: vec![carry_bit, Operand::Signal(sum0), Operand::Signal(sum1)],
                        output: selected.clone(),
                        output_width: w,
                        arrival: ctx.arrival(),
                    });
                    tail.extend((0..len).map(|i| Operand::slice(selected.as_str(), i)));
                    carry = Some((Operand::slice(selected.as_str(), len), ctx.arrival()));
                }
            }
        }
        if let Some((carry_bit, arrival)) = carry {
            tail.push(carry_bit);
            ctx.set_arrival(arrival);
        }
        self.publish_result(
            ctx,
            tail,
            FinalAddition::CarrySelect {
                width: width + 1,
                chunks,
            },
        )
    }

    /// Three-row final adder for targets with efficient ternary adders
    ///
    /// The adder is two bits wider than the rows; only the lower of the two
    /// carry bits joins the result, the upper one is zero modulo `2^max_weight`.
    fn ternary_final_add(&mut self, ctx: &mut TimingContext) -> Result<(), BitHeapError> {
        let (rows, latest) = self.take_rows(3);
        let start = latest.unwrap_or_else(|| ctx.arrival());
        let label = format!("{}_final", self.name());
        let mut inputs = Vec::with_capacity(3);
        let mut width = 0;
        for (row, mut operands) in rows.into_iter().enumerate() {
            operands.extend([Operand::Zero, Operand::Zero]);
            width = operands.len();
            let name = format!("{label}_in{row}");
            self.declare(name.clone(), width, Definition::Concat(operands), start);
            inputs.push(Operand::Signal(name));
        }
        ctx.set_arrival(start);
        ctx.advance_critical_path(
            self.target().local_wire_delay() + self.target().ternary_adder_delay(width),
        );
        let output = format!("{label}_s");
        self.instantiate(Instance {
            name: label,
            unit: UnitKind::TernaryAdder { width },
            inputs,
            output: output.clone(),
            output_width: width,
            arrival: ctx.arrival(),
        });
        let tail = (0..width - 1).map(|i| Operand::slice(output.as_str(), i)).collect();
        self.publish_result(ctx, tail, FinalAddition::Ternary { width })
    }
}
