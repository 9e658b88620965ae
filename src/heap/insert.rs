//! Adding bits, vectors and constants
//!
//! Everything is accumulated modulo `2^max_weight`: bits at or above the heap
//! width are dropped (never wrapped) and counted in the diagnostics.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;
use tracing::{info, warn};

use super::WeightedBitHeap;
use crate::bit::{BitId, Provenance};
use crate::emit::{Definition, EmissionSink};
use crate::timing::{Arrival, TimingContext};
use crate::{BitHeapError, Weight};

/// Driver of a bit added with [`WeightedBitHeap::add_bit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitSource<'a> {
    /// Bit `index` of input vector `vector`
    Input {
        /// Vector name
        vector: &'a str,
        /// Bit index
        index: usize,
    },
    /// Inverted bit `index` of input vector `vector`
    ComplementedInput {
        /// Vector name
        vector: &'a str,
        /// Bit index
        index: usize,
    },
    /// Constant driver; prefer the constant accumulator for known values
    Constant(bool),
}

impl BitSource<'_> {
    fn provenance(&self) -> Provenance {
        match self {
            BitSource::Input { .. } => Provenance::Input,
            BitSource::ComplementedInput { .. } => Provenance::ComplementedInput,
            BitSource::Constant(_) => Provenance::Constant,
        }
    }

    fn definition(&self) -> Definition {
        match *self {
            BitSource::Input { vector, index } => Definition::Input {
                vector: vector.to_string(),
                index,
                complemented: false,
            },
            BitSource::ComplementedInput { vector, index } => Definition::Input {
                vector: vector.to_string(),
                index,
                complemented: true,
            },
            BitSource::Constant(bit) => Definition::Constant(bit),
        }
    }
}

impl<S: EmissionSink> WeightedBitHeap<S> {
    /// Reject compressed heaps and negative weights; nothing is mutated on error
    fn checked_weight(&self, operation: &'static str, weight: Weight) -> Result<usize, BitHeapError> {
        self.ensure_collecting()?;
        usize::try_from(weight).map_err(|_| BitHeapError::NegativeWeight { operation, weight })
    }

    /// Store one bit; a column found out of arrival order afterwards is fatal
    fn store(
        &mut self,
        ctx: &TimingContext,
        weight: usize,
        source: BitSource<'_>,
    ) -> Result<Option<BitId>, BitHeapError> {
        if weight >= self.max_weight {
            self.diagnostics.dropped_bits += 1;
            warn!(heap = %self.name, weight, max_weight = self.max_weight, "dropping bit outside the heap");
            return Ok(None);
        }
        let id = self.push_bit(weight, ctx.arrival(), source.provenance(), source.definition());
        self.check_column(weight)?;
        Ok(id)
    }

    /// Add one bit at `weight`, arriving at the cursor's time
    ///
    /// Returns `None` when the weight is at or above the heap width and the bit
    /// was dropped.
    pub fn add_bit(
        &mut self,
        ctx: &TimingContext,
        weight: Weight,
        source: BitSource<'_>,
    ) -> Result<Option<BitId>, BitHeapError> {
        let weight = self.checked_weight("add_bit", weight)?;
        self.store(ctx, weight, source)
    }

    /// Add `2^weight` to the constant accumulator
    pub fn add_constant_one_bit(&mut self, weight: Weight) -> Result<(), BitHeapError> {
        let weight = self.checked_weight("add_constant_one_bit", weight)?;
        if weight >= self.max_weight {
            self.diagnostics.dropped_constants += 1;
            warn!(heap = %self.name, weight, "dropping constant bit outside the heap");
            return Ok(());
        }
        self.accumulate(BigInt::one() << weight);
        Ok(())
    }

    /// Subtract `2^weight` from the constant accumulator
    pub fn sub_constant_one_bit(&mut self, weight: Weight) -> Result<(), BitHeapError> {
        let weight = self.checked_weight("sub_constant_one_bit", weight)?;
        if weight >= self.max_weight {
            self.diagnostics.dropped_constants += 1;
            warn!(heap = %self.name, weight, "dropping constant bit outside the heap");
            return Ok(());
        }
        self.accumulate(-(BigInt::one() << weight));
        Ok(())
    }

    /// Add `value * 2^weight` to the constant accumulator
    ///
    /// Negative values are accepted and reduced modulo `2^max_weight`. A
    /// non-negative value whose bits reach past the heap width is refused.
    pub fn add_constant(&mut self, weight: Weight, value: &BigInt) -> Result<(), BitHeapError> {
        let shift = self.checked_weight("add_constant", weight)?;
        if value.sign() == Sign::Plus && value.bits() + shift as u64 > self.max_weight as u64 {
            return Err(BitHeapError::OversizedConstant {
                bits: value.bits(),
                weight,
                max_weight: self.max_weight,
            });
        }
        if shift >= self.max_weight {
            // only a negative value can get here; it is a multiple of 2^max_weight
            return Ok(());
        }
        self.accumulate(value << shift);
        Ok(())
    }

    /// Add `2^max_weight - 2^from`, the sign extension of a bit at `from`
    fn add_sign_extension(&mut self, from: usize) {
        if from < self.max_weight {
            let ones = (BigInt::one() << self.max_weight) - (BigInt::one() << from);
            self.accumulate(ones);
        }
    }

    fn accumulate(&mut self, delta: BigInt) {
        let modulus = BigInt::one() << self.max_weight;
        let mut sum = (BigInt::from(std::mem::take(&mut self.constant_bits)) + delta) % &modulus;
        if sum.sign() == Sign::Minus {
            sum += &modulus;
        }
        let (_, magnitude) = sum.into_parts();
        self.constant_bits = magnitude;
    }

    fn note_truncation(&mut self, operation: &'static str, weight: usize, width: usize) {
        if weight + width > self.max_weight {
            self.diagnostics.truncated_vectors += 1;
            info!(
                heap = %self.name,
                operation,
                weight,
                width,
                max_weight = self.max_weight,
                "vector extends past the heap width; upper bits dropped"
            );
        }
    }

    fn add_vector_bits(
        &mut self,
        ctx: &TimingContext,
        weight: usize,
        vector: &str,
        width: usize,
        complemented: impl Fn(usize) -> bool,
    ) -> Result<(), BitHeapError> {
        for index in 0..width {
            let source = if complemented(index) {
                BitSource::ComplementedInput { vector, index }
            } else {
                BitSource::Input { vector, index }
            };
            self.store(ctx, weight + index, source)?;
        }
        Ok(())
    }

    /// Add the unsigned vector `vector[width-1:0]` shifted to `weight`
    pub fn add_unsigned_bit_vector(
        &mut self,
        ctx: &TimingContext,
        weight: Weight,
        vector: &str,
        width: usize,
    ) -> Result<(), BitHeapError> {
        let weight = self.checked_weight("add_unsigned_bit_vector", weight)?;
        self.note_truncation("add_unsigned_bit_vector", weight, width);
        self.add_vector_bits(ctx, weight, vector, width, |_| false)?;
        Ok(())
    }

    /// Add the two's complement vector `vector[width-1:0]` shifted to `weight`
    ///
    /// The sign bit is inserted inverted and the constant accumulator absorbs
    /// the correction, so no sign extension bits are created.
    pub fn add_signed_bit_vector(
        &mut self,
        ctx: &TimingContext,
        weight: Weight,
        vector: &str,
        width: usize,
    ) -> Result<(), BitHeapError> {
        let weight = self.checked_weight("add_signed_bit_vector", weight)?;
        if width == 0 {
            return Ok(());
        }
        self.note_truncation("add_signed_bit_vector", weight, width);
        let sign = width - 1;
        self.add_vector_bits(ctx, weight, vector, width, |index| index == sign)?;
        self.add_sign_extension(weight + sign);
        Ok(())
    }

    /// Subtract the unsigned vector `vector[width-1:0]` shifted to `weight`
    pub fn subtract_unsigned_bit_vector(
        &mut self,
        ctx: &TimingContext,
        weight: Weight,
        vector: &str,
        width: usize,
    ) -> Result<(), BitHeapError> {
        let weight = self.checked_weight("subtract_unsigned_bit_vector", weight)?;
        if width == 0 {
            return Ok(());
        }
        self.note_truncation("subtract_unsigned_bit_vector", weight, width);
        self.add_vector_bits(ctx, weight, vector, width, |_| true)?;
        if weight < self.max_weight {
            self.accumulate(BigInt::one() << weight);
        }
        self.add_sign_extension(weight + width);
        Ok(())
    }

    /// Subtract the two's complement vector `vector[width-1:0]` shifted to `weight`
    pub fn subtract_signed_bit_vector(
        &mut self,
        ctx: &TimingContext,
        weight: Weight,
        vector: &str,
        width: usize,
    ) -> Result<(), BitHeapError> {
        let weight = self.checked_weight("subtract_signed_bit_vector", weight)?;
        if width == 0 {
            return Ok(());
        }
        self.note_truncation("subtract_signed_bit_vector", weight, width);
        let sign = width - 1;
        self.add_vector_bits(ctx, weight, vector, width, |index| index != sign)?;
        if weight < self.max_weight {
            self.accumulate(BigInt::one() << weight);
        }
        self.add_sign_extension(weight + sign);
        Ok(())
    }

    /// Turn the constant accumulator into constant-1 bits at cycle 0
    pub(crate) fn materialize_constants(&mut self) {
        let constant = std::mem::take(&mut self.constant_bits);
        for weight in 0..self.max_weight {
            if constant.bit(weight as u64) {
                self.push_bit(
                    weight,
                    Arrival::ZERO,
                    Provenance::Constant,
                    Definition::Constant(true),
                );
            }
        }
    }

    /// Value of the constant accumulator
    pub fn constant_value(&self) -> BigUint {
        self.constant_bits.clone()
    }
}
