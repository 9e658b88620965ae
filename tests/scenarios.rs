//! Worked examples over every compression mode

mod common;

use bitheap::{CompressionMode, CompressorShape, GenericTarget};
use common::{Harness, Operand, Sign};
use num_bigint::{BigInt, BigUint};
use test_case::test_case;

#[test_case(CompressionMode::CompressorTree ; "compressor tree")]
#[test_case(CompressionMode::AdderTree ; "adder tree")]
#[test_case(CompressionMode::Hybrid ; "hybrid")]
fn five_plus_three_is_eight(mode: CompressionMode) {
    let mut harness = Harness::new(8, mode);
    harness
        .add(Operand::new("x", Sign::Unsigned, 0, 3, 0b101))
        .unwrap();
    harness.add_constant(0, 3).unwrap();
    let (sum, value) = harness.run().unwrap();
    assert_eq!(value, BigUint::from(8u32));
    assert_eq!(sum.signal, "CompressionResult_bh");
}

#[test_case(CompressionMode::CompressorTree ; "compressor tree")]
#[test_case(CompressionMode::AdderTree ; "adder tree")]
#[test_case(CompressionMode::Hybrid ; "hybrid")]
fn signed_minus_one_stays_minus_one(mode: CompressionMode) {
    let mut harness = Harness::new(6, mode);
    harness
        .add(Operand::new("x", Sign::Signed, 0, 3, 0b111))
        .unwrap();
    let sum = harness.heap.compress(&mut harness.ctx).unwrap().clone();
    let values = harness.heap.sink().evaluate(&harness.inputs()).unwrap();
    assert_eq!(sum.signed(&values), Some(BigInt::from(-1)));
    assert_eq!(sum.unsigned(&values), Some(BigUint::from(63u32)));
}

#[test]
fn three_ones_use_the_full_adder() {
    let mut harness = Harness::new(4, CompressionMode::CompressorTree);
    for name in ["a", "b", "c"] {
        harness.add(Operand::new(name, Sign::Unsigned, 0, 1, 1)).unwrap();
    }
    let (_, value) = harness.run().unwrap();
    assert_eq!(value, BigUint::from(3u32));
    assert!(harness.heap.catalog().was_used(CompressorShape::FULL_ADDER));
}

#[test_case(GenericTarget::default() ; "four input luts")]
#[test_case(GenericTarget::six_input() ; "six input luts")]
#[test_case(GenericTarget::default().with_ternary_adders(true) ; "ternary final adder")]
#[test_case(GenericTarget::default().with_max_adder_width(Some(3)) ; "carry select")]
#[test_case(GenericTarget::default().with_pipelining(false) ; "combinational")]
fn eight_by_eight_multiplier(target: GenericTarget) {
    // partial products of 8x8 bits, each inserted as a one-bit vector
    let (a, b) = (0xb7u64, 0x5du64);
    let mut harness = Harness::with_target(16, CompressionMode::CompressorTree, target);
    for i in 0..8 {
        for j in 0..8 {
            let bit = (a >> i) & (b >> j) & 1;
            let name = format!("pp_{i}_{j}");
            harness
                .add(Operand::new(&name, Sign::Unsigned, (i + j) as i32, 1, bit))
                .unwrap();
        }
    }
    let (_, value) = harness.run().unwrap();
    assert_eq!(value, BigUint::from(a * b));
    assert!(harness.heap.profile().compressors > 0);
}

#[test]
fn subtraction_wraps_modulo_the_width() {
    let mut harness = Harness::new(8, CompressionMode::CompressorTree);
    harness.add(Operand::new("a", Sign::Unsigned, 0, 8, 17)).unwrap();
    harness.add(Operand::new("b", Sign::SubUnsigned, 0, 8, 20)).unwrap();
    harness.add(Operand::new("c", Sign::SubSigned, 2, 4, 0b1110)).unwrap();
    let (sum, value) = harness.run().unwrap();
    // 17 - 20 - (-2 * 4) = 5
    assert_eq!(value, BigUint::from(5u32));
    let values = harness.heap.sink().evaluate(&harness.inputs()).unwrap();
    assert_eq!(sum.signed(&values), Some(BigInt::from(5)));
}

#[test]
fn single_row_needs_no_units() {
    let mut harness = Harness::new(6, CompressionMode::CompressorTree);
    harness.add(Operand::new("a", Sign::Unsigned, 1, 4, 0b1011)).unwrap();
    let (sum, value) = harness.run().unwrap();
    assert_eq!(value, BigUint::from(22u32));
    assert_eq!(sum.width(), 6);
    assert_eq!(harness.heap.profile().units(), 0);
    assert_eq!(harness.heap.sink().instances().count(), 0);
}
