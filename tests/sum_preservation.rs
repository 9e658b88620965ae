//! Compression preserves the arithmetic value of the heap

mod common;

use bitheap::{CompressionMode, GenericTarget};
use common::{Harness, Operand, Sign};
use proptest::prelude::*;

fn sign() -> impl Strategy<Value = Sign> {
    prop_oneof![
        Just(Sign::Unsigned),
        Just(Sign::Signed),
        Just(Sign::SubUnsigned),
        Just(Sign::SubSigned),
    ]
}

fn mode() -> impl Strategy<Value = CompressionMode> {
    prop_oneof![
        Just(CompressionMode::CompressorTree),
        Just(CompressionMode::AdderTree),
        Just(CompressionMode::Hybrid),
    ]
}

fn target() -> impl Strategy<Value = GenericTarget> {
    (
        prop_oneof![Just(GenericTarget::default()), Just(GenericTarget::six_input())],
        any::<bool>(),
        prop::option::of(2usize..8),
    )
        .prop_map(|(base, ternary, max_adder_width)| {
            base.with_ternary_adders(ternary)
                .with_max_adder_width(max_adder_width)
        })
}

/// (sign, weight, width, value, arrival cycle)
fn operands() -> impl Strategy<Value = Vec<(Sign, i32, usize, u64, u32)>> {
    prop::collection::vec((sign(), 0i32..6, 1usize..10, any::<u64>(), 0u32..3), 1..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn compression_preserves_the_sum(
        max_weight in 4usize..16,
        mode in mode(),
        target in target(),
        ops in operands(),
        constant in -100i64..8,
    ) {
        let mut harness = Harness::with_target(max_weight, mode, target);
        for (i, (sign, weight, width, value, cycle)) in ops.into_iter().enumerate() {
            harness.ctx.set_cycle(cycle);
            harness
                .add(Operand::new(&format!("v{i}"), sign, weight, width, value))
                .expect("non-negative weights are accepted");
        }
        harness.add_constant(0, constant).expect("negative constants are reduced");

        let expected = harness.expected();
        let (sum, value) = harness.run().expect("compression succeeds");
        prop_assert_eq!(value, expected);
        prop_assert!(sum.width() >= max_weight);
        prop_assert_eq!(harness.heap.bit_count(), 0);
    }

    #[test]
    fn columns_stay_sorted_by_arrival(
        arrivals in prop::collection::vec((0i32..5, 0u32..4, 0.0f64..2e-9), 1..40),
    ) {
        let mut harness = Harness::new(5, CompressionMode::CompressorTree);
        for (i, (weight, cycle, cp)) in arrivals.into_iter().enumerate() {
            harness.ctx.set_cycle(cycle);
            harness.ctx.set_critical_path(cp);
            harness
                .heap
                .add_bit(&harness.ctx, weight, bitheap::BitSource::Input { vector: "x", index: i })
                .expect("weight is in range");
        }
        prop_assert!(harness.heap.check_columns().is_ok());
        for weight in 0..5 {
            let bits: Vec<_> = harness.heap.column_bits(weight).map(|b| b.arrival()).collect();
            prop_assert!(bits.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }

    #[test]
    fn round_heights_never_grow(
        rows in prop::collection::vec((0u32..4, 0u64..1024), 3..12),
        width in 2usize..10,
        mode in mode(),
    ) {
        // rows land on a pipelined target at staggered cycles
        let mut harness = Harness::new(width + 4, mode);
        for (row, (cycle, value)) in rows.into_iter().enumerate() {
            harness.ctx.set_cycle(cycle);
            harness
                .add(Operand::new(&format!("r{row}"), Sign::Unsigned, 0, width, value))
                .expect("vector fits");
        }
        let expected = harness.expected();
        let (_, value) = harness.run().expect("compression succeeds");
        prop_assert_eq!(value, expected);
        prop_assert!(harness.heap.profile().heights_monotonic());
    }
}
