//! Insertion surface: rejection, truncation and the constant accumulator

mod common;

use bitheap::{BitHeapError, BitSource, CompressionMode, ErrorKind, Provenance};
use common::{Harness, Operand, Sign};
use num_bigint::{BigInt, BigUint};

fn harness(max_weight: usize) -> Harness {
    Harness::new(max_weight, CompressionMode::CompressorTree)
}

#[test]
fn negative_weights_are_rejected_without_side_effects() {
    let mut h = harness(8);
    h.heap.add_constant(0, &BigInt::from(5)).unwrap();
    let before = (h.heap.heights(), h.heap.constant_value());

    let ctx = h.ctx.clone();
    let results = [
        h.heap
            .add_bit(&ctx, -1, BitSource::Input { vector: "a", index: 0 })
            .map(|_| ()),
        h.heap.add_constant_one_bit(-2),
        h.heap.sub_constant_one_bit(-3),
        h.heap.add_constant(-1, &BigInt::from(3)),
        h.heap.add_unsigned_bit_vector(&ctx, -1, "a", 4),
        h.heap.add_signed_bit_vector(&ctx, -1, "a", 4),
        h.heap.subtract_unsigned_bit_vector(&ctx, -1, "a", 4),
        h.heap.subtract_signed_bit_vector(&ctx, -1, "a", 4),
    ];
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, BitHeapError::NegativeWeight { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert_eq!((h.heap.heights(), h.heap.constant_value()), before);
}

#[test]
fn bits_at_the_heap_width_are_dropped_not_wrapped() {
    let mut h = harness(6);
    let ctx = h.ctx.clone();
    let dropped = h
        .heap
        .add_bit(&ctx, 6, BitSource::Input { vector: "a", index: 0 })
        .unwrap();
    assert!(dropped.is_none());
    assert_eq!(h.heap.bit_count(), 0);
    assert_eq!(h.heap.diagnostics().dropped_bits, 1);

    let kept = h
        .heap
        .add_bit(&ctx, 5, BitSource::Input { vector: "a", index: 1 })
        .unwrap();
    assert!(kept.is_some());
    assert_eq!(h.heap.column_height(5), 1);
    assert_eq!(h.heap.diagnostics().dropped_bits, 1);
}

#[test]
fn truncated_vectors_keep_their_low_bits() {
    let mut h = harness(6);
    h.add(Operand::new("a", Sign::Unsigned, 3, 5, 0b11111)).unwrap();
    assert_eq!(h.heap.heights(), vec![0, 0, 0, 1, 1, 1]);
    assert_eq!(h.heap.diagnostics().dropped_bits, 2);
    assert_eq!(h.heap.diagnostics().truncated_vectors, 1);
    assert!(!h.heap.diagnostics().is_clean());

    let (_, value) = h.run().unwrap();
    assert_eq!(value, BigUint::from(0b111000u32));
}

#[test]
fn constants_accumulate_modulo_the_width() {
    let mut h = harness(4);
    h.heap.add_constant_one_bit(0).unwrap();
    h.heap.add_constant_one_bit(3).unwrap();
    assert_eq!(h.heap.constant_value(), BigUint::from(9u32));

    h.heap.sub_constant_one_bit(1).unwrap();
    assert_eq!(h.heap.constant_value(), BigUint::from(7u32));

    h.heap.add_constant(0, &BigInt::from(-8)).unwrap();
    assert_eq!(h.heap.constant_value(), BigUint::from(15u32));

    h.heap.add_constant_one_bit(4).unwrap();
    assert_eq!(h.heap.constant_value(), BigUint::from(15u32));
    assert_eq!(h.heap.diagnostics().dropped_constants, 1);
    assert_eq!(h.heap.bit_count(), 0);
}

#[test]
fn oversized_constants_are_refused() {
    let mut h = harness(4);
    let err = h.heap.add_constant(2, &BigInt::from(5)).unwrap_err();
    assert_eq!(
        err,
        BitHeapError::OversizedConstant {
            bits: 3,
            weight: 2,
            max_weight: 4
        }
    );
    assert!(h.heap.add_constant(2, &BigInt::from(3)).is_ok());
    assert!(h.heap.add_constant(7, &BigInt::from(0)).is_ok());
    assert_eq!(h.heap.constant_value(), BigUint::from(12u32));
}

#[test]
fn signed_vectors_insert_the_sign_bit_complemented() {
    let mut h = harness(8);
    h.add(Operand::new("s", Sign::Signed, 1, 4, 0)).unwrap();
    let sign = h.heap.column_bits(4).next().unwrap();
    assert_eq!(sign.provenance(), Provenance::ComplementedInput);
    let low = h.heap.column_bits(1).next().unwrap();
    assert_eq!(low.provenance(), Provenance::Input);
    // 2^8 - 2^4, the sign extension of the complemented sign bit
    assert_eq!(h.heap.constant_value(), BigUint::from(240u32));
}

#[test]
fn insertion_after_compression_is_refused() {
    let mut h = harness(4);
    h.add(Operand::new("a", Sign::Unsigned, 0, 2, 3)).unwrap();
    h.run().unwrap();
    assert!(h.heap.is_compressed());

    let ctx = h.ctx.clone();
    let err = h.heap.add_unsigned_bit_vector(&ctx, 0, "b", 2).unwrap_err();
    assert_eq!(err, BitHeapError::AlreadyCompressed("bh".to_string()));
    assert_eq!(err.kind(), ErrorKind::State);
}
