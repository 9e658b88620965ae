//! Compression scheduling
//!
//! [`WeightedBitHeap::compress`] turns the collected bits into one number.
//! Rounds step through stages: a round at stage `s` only touches bits usable
//! at `s`, and the bits it produces join the heap when the round ends.
//!
//! | mode             | rounds                               | finish                       |
//! |------------------|--------------------------------------|------------------------------|
//! | `CompressorTree` | compressors until height <= 2        | two-row adder                |
//! |                  | (<= 3 on targets with ternary adders)| (ternary adder on three rows)|
//! | `Hybrid`         | compressors until height <= max `h0` | adder tree                   |
//! | `AdderTree`      | none                                 | adder tree                   |

mod adder_tree;
mod final_add;
mod rounds;

pub use adder_tree::AdderTreeRound;
pub use rounds::CompressorRound;

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, info_span};

use crate::bit::WeightedBit;
use crate::emit::{EmissionSink, Operand};
use crate::heap::{FinalSum, WeightedBitHeap};
use crate::profile::FinalAddition;
use crate::timing::{Stage, TimingContext};
use crate::BitHeapError;

/// Reduction strategy of a heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Timing-driven compressor rounds, then a two-row final adder
    #[default]
    CompressorTree,
    /// Binary tree of carry-propagating adders
    AdderTree,
    /// Compressor rounds down to the tallest compressor input, then an adder tree
    Hybrid,
}

impl CompressionMode {
    /// Short lowercase name
    pub fn label(&self) -> &'static str {
        match self {
            CompressionMode::CompressorTree => "compressor-tree",
            CompressionMode::AdderTree => "adder-tree",
            CompressionMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CompressionMode {
    type Err = BitHeapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compressor-tree" | "compressors" => Ok(CompressionMode::CompressorTree),
            "adder-tree" | "adders" => Ok(CompressionMode::AdderTree),
            "hybrid" => Ok(CompressionMode::Hybrid),
            other => Err(BitHeapError::InvalidConfig(format!(
                "unknown compression mode {other:?}"
            ))),
        }
    }
}

/// Outcome of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Bits were consumed or finished columns were published
    Reduced,
    /// Nothing usable at this stage
    Waiting,
    /// The heap is down to one row
    Finished,
}

/// One kind of compression round
pub trait ReductionStrategy {
    /// Run one round at `stage`
    fn reduce<S: EmissionSink>(
        &mut self,
        heap: &mut WeightedBitHeap<S>,
        ctx: &mut TimingContext,
        stage: Stage,
    ) -> Result<Progress, BitHeapError>;
}

impl<S: EmissionSink> WeightedBitHeap<S> {
    /// Compress the heap and publish its value as a single signal
    ///
    /// The constant accumulator is materialized first, empty columns between
    /// populated ones are filled with '0', then the heap's mode drives the
    /// reduction. The cursor ends at the result's arrival time. A heap can
    /// only be compressed once.
    pub fn compress(&mut self, ctx: &mut TimingContext) -> Result<&FinalSum, BitHeapError> {
        self.ensure_collecting()?;
        let span = info_span!("compress", heap = %self.name());
        let _guard = span.enter();

        self.materialize_constants();
        let initial_bits = self.bit_count();
        let initial_height = self.max_height();
        {
            let profile = self.profile_mut();
            profile.initial_bits = initial_bits;
            profile.initial_height = initial_height;
        }
        info!(
            bits = initial_bits,
            height = initial_height,
            mode = %self.mode(),
            "compressing"
        );

        let Some(first) = self.earliest_bit().map(WeightedBit::arrival) else {
            let zeros = vec![Operand::Zero; self.max_weight()];
            self.publish_result(ctx, zeros, FinalAddition::Concatenation)?;
            return self.final_sum();
        };
        self.fill_interior_gaps();
        ctx.set_arrival(first);

        if self.max_height() <= 1 {
            self.finish_by_concatenation(ctx)?;
            return self.final_sum();
        }

        let stage = self.stage_clock().stage_of(first);
        match self.mode() {
            CompressionMode::CompressorTree => {
                let rows = if self.target().supports_ternary_adders() { 3 } else { 2 };
                self.run_compressor_rounds(ctx, stage, rows)?;
                self.finish_rows(ctx)?;
            }
            CompressionMode::Hybrid => {
                let limit = self.catalog().max_input_height();
                self.run_compressor_rounds(ctx, stage, limit)?;
                self.run_adder_tree(ctx)?;
            }
            CompressionMode::AdderTree => self.run_adder_tree(ctx)?,
        }

        let result = self.final_sum()?;
        info!(
            width = result.width(),
            cycle = result.arrival.cycle,
            critical_path = result.arrival.critical_path,
            "compressed"
        );
        Ok(result)
    }

    fn final_sum(&self) -> Result<&FinalSum, BitHeapError> {
        self.result().ok_or_else(|| {
            BitHeapError::InternalInvariantViolation("compression produced no result".to_string())
        })
    }

    /// Compressor rounds until no column is taller than `limit`
    fn run_compressor_rounds(
        &mut self,
        ctx: &mut TimingContext,
        mut stage: Stage,
        limit: usize,
    ) -> Result<Stage, BitHeapError> {
        let mut round = CompressorRound::new();
        while self.max_height() > limit {
            let progress = round.reduce(self, ctx, stage)?;
            self.record_round(stage);
            debug!(stage, height = self.max_height(), ?progress, "compressor round");
            if progress == Progress::Waiting {
                if self.all_available(stage) {
                    return Err(BitHeapError::NoProgress {
                        stage,
                        height: self.max_height(),
                    });
                }
                stage = self.next_available_stage(stage);
            } else {
                stage += 1;
            }
        }
        Ok(stage)
    }

    /// Earliest stage after `stage` at which some stored bit becomes usable
    fn next_available_stage(&self, stage: Stage) -> Stage {
        let clock = *self.stage_clock();
        (self.min_weight()..self.max_weight())
            .flat_map(|w| self.column_bits(w))
            .map(|bit| bit.stage(&clock))
            .filter(|&s| s > stage)
            .min()
            .unwrap_or(stage + 1)
    }

    /// Adder-tree rounds until one row is left
    fn run_adder_tree(&mut self, ctx: &mut TimingContext) -> Result<(), BitHeapError> {
        self.concatenate_lsb_columns()?;
        let mut round = AdderTreeRound::new();
        let limit = 4 * self.max_weight() + self.max_height();
        for _ in 0..limit {
            let stage = self.stage_clock().stage_of(ctx.arrival());
            match round.reduce(self, ctx, stage)? {
                Progress::Finished => return self.finish_by_concatenation(ctx),
                progress => {
                    self.record_round(stage);
                    debug!(stage, height = self.max_height(), ?progress, "adder tree round");
                }
            }
        }
        Err(BitHeapError::NoProgress {
            stage: self.stage_clock().stage_of(ctx.arrival()),
            height: self.max_height(),
        })
    }

    /// Publish the remaining single row as the result
    fn finish_by_concatenation(&mut self, ctx: &mut TimingContext) -> Result<(), BitHeapError> {
        if let Some(latest) = self
            .latest_bit(self.min_weight(), self.max_weight())
            .map(WeightedBit::arrival)
        {
            ctx.sync_to(latest);
        }
        let tail = self.take_single_row();
        self.publish_result(ctx, tail, FinalAddition::Concatenation)
    }
}
