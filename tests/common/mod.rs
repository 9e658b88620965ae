#![allow(dead_code)]

use std::sync::Arc;

use bitheap::{
    BitHeapError, CompressionMode, FinalSum, GenericTarget, HeapConfig, InputValues,
    NetlistRecorder, TimingContext, WeightedBitHeap,
};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

/// How an operand enters the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Unsigned,
    Signed,
    SubUnsigned,
    SubSigned,
}

/// A vector operand together with the value it carries in a test
#[derive(Debug, Clone)]
pub struct Operand {
    pub name: String,
    pub sign: Sign,
    pub weight: i32,
    pub width: usize,
    pub value: u64,
}

impl Operand {
    pub fn new(name: &str, sign: Sign, weight: i32, width: usize, value: u64) -> Self {
        Self {
            name: name.to_string(),
            sign,
            weight,
            width,
            value,
        }
    }

    /// Arithmetic contribution of the operand, sign convention applied
    pub fn contribution(&self) -> BigInt {
        let mask = (1u128 << self.width) - 1;
        let raw = self.value as u128 & mask;
        let mut value = BigInt::from(raw);
        let signed = matches!(self.sign, Sign::Signed | Sign::SubSigned);
        if signed && self.width > 0 && (raw >> (self.width - 1)) & 1 == 1 {
            value -= BigInt::one() << self.width;
        }
        let value = value << self.weight as usize;
        match self.sign {
            Sign::Unsigned | Sign::Signed => value,
            Sign::SubUnsigned | Sign::SubSigned => -value,
        }
    }
}

/// Heap bound to a netlist recorder with its timing cursor
pub struct Harness {
    pub heap: WeightedBitHeap,
    pub ctx: TimingContext,
    pub operands: Vec<Operand>,
    pub constants: Vec<(i32, BigInt)>,
}

impl Harness {
    pub fn new(max_weight: usize, mode: CompressionMode) -> Self {
        Self::with_target(max_weight, mode, GenericTarget::default())
    }

    pub fn with_target(max_weight: usize, mode: CompressionMode, target: GenericTarget) -> Self {
        let target = Arc::new(target);
        let ctx = TimingContext::new(target.as_ref());
        let config = HeapConfig::new(max_weight).with_mode(mode);
        let heap = WeightedBitHeap::new(config, target, NetlistRecorder::new())
            .expect("heap configuration is valid");
        Self {
            heap,
            ctx,
            operands: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn add(&mut self, operand: Operand) -> Result<(), BitHeapError> {
        let Operand {
            ref name,
            sign,
            weight,
            width,
            ..
        } = operand;
        match sign {
            Sign::Unsigned => self.heap.add_unsigned_bit_vector(&self.ctx, weight, name, width),
            Sign::Signed => self.heap.add_signed_bit_vector(&self.ctx, weight, name, width),
            Sign::SubUnsigned => {
                self.heap
                    .subtract_unsigned_bit_vector(&self.ctx, weight, name, width)
            }
            Sign::SubSigned => self.heap.subtract_signed_bit_vector(&self.ctx, weight, name, width),
        }?;
        self.operands.push(operand);
        Ok(())
    }

    pub fn add_constant(&mut self, weight: i32, value: i64) -> Result<(), BitHeapError> {
        let value = BigInt::from(value);
        self.heap.add_constant(weight, &value)?;
        self.constants.push((weight, value));
        Ok(())
    }

    /// Arithmetic sum of everything added, modulo `2^max_weight`
    pub fn expected(&self) -> BigUint {
        let mut total: BigInt = self.operands.iter().map(Operand::contribution).sum();
        for (weight, value) in &self.constants {
            total += value << *weight as usize;
        }
        reduce(&total, self.heap.max_weight())
    }

    pub fn inputs(&self) -> InputValues {
        self.operands
            .iter()
            .fold(InputValues::new(), |inputs, op| inputs.with(op.name.clone(), op.value))
    }

    /// Compress and evaluate the netlist for the operand values
    pub fn run(&mut self) -> Result<(FinalSum, BigUint), BitHeapError> {
        let sum = self.heap.compress(&mut self.ctx)?.clone();
        let values = self
            .heap
            .sink()
            .evaluate(&self.inputs())
            .expect("netlist evaluates");
        let value = sum.unsigned(&values).expect("result is declared");
        Ok((sum, value))
    }
}

pub fn reduce(value: &BigInt, width: usize) -> BigUint {
    let modulus = BigInt::one() << width;
    let mut reduced = value % &modulus;
    if reduced < BigInt::zero() {
        reduced += &modulus;
    }
    reduced.to_biguint().expect("reduced value is non-negative")
}
