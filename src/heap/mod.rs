//! The weighted-bit heap
//!
//! Columns `0..max_weight` each hold bits of one weight, sorted by arrival
//! time (earliest first, ties in insertion order). Constants are kept apart
//! in an exact accumulator and only turned into bits when compression starts.

mod config;
mod insert;
mod units;

pub use config::HeapConfig;
pub use insert::BitSource;

pub(crate) use units::{AdderRole, AdderSpan};

use std::collections::VecDeque;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use tracing::debug;

use crate::bit::{BitArena, BitId, Provenance, WeightedBit};
use crate::compressor::CompressorCatalog;
use crate::emit::{
    Declaration, Definition, EmissionSink, Instance, NetlistRecorder, Operand, SignalValues,
};
use crate::profile::{BitSnapshot, ColumnSnapshot, CompressionProfile, Diagnostics, HeapSnapshot};
use crate::scheduler::CompressionMode;
use crate::timing::{Arrival, Stage, StageClock, TechnologyModel};
use crate::BitHeapError;

/// The compressed value of a heap
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSum {
    /// Name of the result signal
    pub signal: String,
    /// Result bits, least significant first
    pub bits: Vec<Operand>,
    /// Heap width; only the low `max_weight` bits are meaningful
    pub max_weight: usize,
    /// When the result settles
    pub arrival: Arrival,
}

impl FinalSum {
    /// Width of the result signal (at least `max_weight`)
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Result modulo `2^max_weight`, read from evaluated signal values
    pub fn unsigned(&self, values: &SignalValues) -> Option<BigUint> {
        let modulus = BigUint::one() << self.max_weight;
        values.get(&self.signal).map(|value| value % modulus)
    }

    /// Result as a `max_weight`-bit two's complement number
    pub fn signed(&self, values: &SignalValues) -> Option<BigInt> {
        let value = self.unsigned(values)?;
        let negative = self.max_weight > 0 && value.bit(self.max_weight as u64 - 1);
        let value = BigInt::from(value);
        Some(if negative {
            value - (BigInt::one() << self.max_weight)
        } else {
            value
        })
    }
}

/// Names handed to emitted units
#[derive(Debug, Default)]
struct UnitCounters {
    compressor: usize,
    adder: usize,
    chunk: usize,
}

/// A bit heap bound to a technology model and an emission sink
#[derive(Debug)]
pub struct WeightedBitHeap<S: EmissionSink = NetlistRecorder> {
    name: String,
    max_weight: usize,
    /// Columns below this weight are final and live in `chunks`
    min_weight: usize,
    mode: CompressionMode,
    target: Arc<dyn TechnologyModel>,
    clock: StageClock,
    catalog: CompressorCatalog,
    arena: BitArena,
    columns: Vec<VecDeque<BitId>>,
    uids: Vec<u32>,
    constant_bits: BigUint,
    sink: S,
    counters: UnitCounters,
    /// Result bits of the finished low columns, least significant first
    chunks: Vec<Operand>,
    /// Outputs produced during the current round
    pending: Vec<WeightedBit>,
    deferring: bool,
    diagnostics: Diagnostics,
    profile: CompressionProfile,
    profile_rounds: bool,
    result: Option<FinalSum>,
}

impl<S: EmissionSink> WeightedBitHeap<S> {
    /// Create an empty heap using every compressor the target's LUTs can host
    pub fn new(
        config: HeapConfig,
        target: Arc<dyn TechnologyModel>,
        sink: S,
    ) -> Result<Self, BitHeapError> {
        let catalog = CompressorCatalog::for_lut_width(target.lut_width())?;
        Self::with_catalog(config, target, catalog, sink)
    }

    /// Create an empty heap with an explicit compressor catalog
    pub fn with_catalog(
        config: HeapConfig,
        target: Arc<dyn TechnologyModel>,
        catalog: CompressorCatalog,
        sink: S,
    ) -> Result<Self, BitHeapError> {
        config.validate()?;
        if catalog.lut_width() > target.lut_width() {
            return Err(BitHeapError::InvalidConfig(format!(
                "catalog built for {}-input LUTs, target has {}",
                catalog.lut_width(),
                target.lut_width()
            )));
        }
        let clock = StageClock::new(target.as_ref());
        let max_weight = config.max_weight;
        debug!(
            heap = %config.name,
            max_weight,
            shapes = catalog.len(),
            stages_per_cycle = clock.stages_per_cycle(),
            "created bit heap"
        );
        Ok(Self {
            name: config.name,
            max_weight,
            min_weight: 0,
            mode: config.mode,
            target,
            clock,
            catalog,
            arena: BitArena::new(),
            columns: vec![VecDeque::new(); max_weight],
            uids: vec![0; max_weight],
            constant_bits: BigUint::zero(),
            sink,
            counters: UnitCounters::default(),
            chunks: Vec::new(),
            pending: Vec::new(),
            deferring: false,
            diagnostics: Diagnostics::default(),
            profile: CompressionProfile::default(),
            profile_rounds: config.profile_rounds,
            result: None,
        })
    }

    /// Heap name, the prefix of every emitted signal
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of columns
    pub fn max_weight(&self) -> usize {
        self.max_weight
    }

    /// Lowest column still being compressed
    pub fn min_weight(&self) -> usize {
        self.min_weight
    }

    /// Reduction strategy
    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Technology model
    pub fn target(&self) -> &dyn TechnologyModel {
        self.target.as_ref()
    }

    /// Stage clock derived from the target
    pub fn stage_clock(&self) -> &StageClock {
        &self.clock
    }

    /// Compressor catalog, with usage flags
    pub fn catalog(&self) -> &CompressorCatalog {
        &self.catalog
    }

    /// Emission sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Emission sink, mutably
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the heap, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Drop counters collected while adding bits
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Compression profile
    pub fn profile(&self) -> &CompressionProfile {
        &self.profile
    }

    /// Result, once compressed
    pub fn result(&self) -> Option<&FinalSum> {
        self.result.as_ref()
    }

    /// Whether [`compress`](Self::compress) has completed
    pub fn is_compressed(&self) -> bool {
        self.result.is_some()
    }

    /// Pending constant, reduced modulo `2^max_weight`
    pub fn constant_bits(&self) -> &BigUint {
        &self.constant_bits
    }

    /// Bits in column `weight` (0 outside the heap)
    pub fn column_height(&self, weight: usize) -> usize {
        self.columns.get(weight).map_or(0, VecDeque::len)
    }

    /// Height of every column
    pub fn heights(&self) -> Vec<usize> {
        self.columns.iter().map(VecDeque::len).collect()
    }

    /// Tallest column
    pub fn max_height(&self) -> usize {
        self.columns.iter().map(VecDeque::len).max().unwrap_or(0)
    }

    /// Bits currently stored in columns
    pub fn bit_count(&self) -> usize {
        self.arena.len()
    }

    /// Bits of a column, earliest first
    pub fn column_bits(&self, weight: usize) -> impl Iterator<Item = &WeightedBit> + '_ {
        self.columns
            .get(weight)
            .into_iter()
            .flatten()
            .map(|&id| &self.arena[id])
    }

    /// Latest-arriving bit over columns `lo..=hi`
    pub fn latest_bit(&self, lo: usize, hi: usize) -> Option<&WeightedBit> {
        (lo..=hi.min(self.max_weight.saturating_sub(1)))
            .filter_map(|w| self.columns[w].back())
            .map(|&id| &self.arena[id])
            .max_by(|a, b| a.cmp_arrival(b))
    }

    /// Earliest-arriving bit in the heap
    pub fn earliest_bit(&self) -> Option<&WeightedBit> {
        self.columns
            .iter()
            .filter_map(VecDeque::front)
            .map(|&id| &self.arena[id])
            .min_by(|a, b| a.cmp_arrival(b))
    }

    /// Copy of the current columns
    pub fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot {
            name: self.name.clone(),
            max_weight: self.max_weight,
            min_weight: self.min_weight,
            columns: (0..self.max_weight)
                .map(|weight| ColumnSnapshot {
                    weight,
                    bits: self
                        .column_bits(weight)
                        .map(|bit| BitSnapshot {
                            name: bit.name().to_string(),
                            arrival: bit.arrival(),
                            provenance: bit.provenance(),
                        })
                        .collect(),
                })
                .collect(),
            constant: self.constant_bits.to_str_radix(2),
        }
    }

    /// Verify that every column is sorted by arrival and every handle is live
    pub fn check_columns(&self) -> Result<(), BitHeapError> {
        for weight in 0..self.max_weight {
            self.check_column(weight)?;
        }
        Ok(())
    }

    fn check_column(&self, weight: usize) -> Result<(), BitHeapError> {
        let mut previous: Option<Arrival> = None;
        for &id in &self.columns[weight] {
            let bit = self.arena.get(id).ok_or_else(|| {
                BitHeapError::InternalInvariantViolation(format!(
                    "stale handle in column {weight}"
                ))
            })?;
            if bit.weight() != weight {
                return Err(BitHeapError::InternalInvariantViolation(format!(
                    "bit {} of weight {} stored in column {weight}",
                    bit.name(),
                    bit.weight()
                )));
            }
            if previous.map_or(false, |p| p > bit.arrival()) {
                return Err(BitHeapError::InternalInvariantViolation(format!(
                    "column {weight} out of arrival order at {}",
                    bit.name()
                )));
            }
            previous = Some(bit.arrival());
        }
        Ok(())
    }

    pub(crate) fn ensure_collecting(&self) -> Result<(), BitHeapError> {
        if self.result.is_some() {
            return Err(BitHeapError::AlreadyCompressed(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn declare(&mut self, name: String, width: usize, definition: Definition, arrival: Arrival) {
        self.sink.declare(Declaration {
            name,
            width,
            definition,
            arrival,
        });
    }

    pub(crate) fn profile_mut(&mut self) -> &mut CompressionProfile {
        &mut self.profile
    }

    pub(crate) fn instantiate(&mut self, instance: Instance) {
        self.sink.instantiate(instance);
    }

    /// Create a bit, declare its signal and store it (or queue it while deferring).
    ///
    /// Returns `None` when the weight is outside the heap or the bit was queued.
    pub(crate) fn push_bit(
        &mut self,
        weight: usize,
        arrival: Arrival,
        provenance: Provenance,
        definition: Definition,
    ) -> Option<BitId> {
        if weight >= self.max_weight {
            return None;
        }
        let uid = self.uids[weight];
        self.uids[weight] += 1;
        let name = format!("{}_w{}_{}", self.name, weight, uid);
        self.declare(name.clone(), 1, definition, arrival);
        let bit = WeightedBit::new(weight, uid, arrival, provenance, name);
        if self.deferring {
            self.pending.push(bit);
            None
        } else {
            Some(self.insert_sorted(bit))
        }
    }

    fn insert_sorted(&mut self, bit: WeightedBit) -> BitId {
        let weight = bit.weight();
        let arrival = bit.arrival();
        let id = self.arena.insert(bit);
        let arena = &self.arena;
        let column = &mut self.columns[weight];
        let position = column.partition_point(|&other| arena[other].arrival() <= arrival);
        column.insert(position, id);
        id
    }

    /// Remove the earliest bit of a column
    pub(crate) fn pop_front(&mut self, weight: usize) -> Option<WeightedBit> {
        let id = self.columns.get_mut(weight)?.pop_front()?;
        self.arena.remove(id)
    }

    /// Arrival of the `k`-th bit (0-based) of a column
    pub(crate) fn arrival_at(&self, weight: usize, k: usize) -> Option<Arrival> {
        self.columns
            .get(weight)?
            .get(k)
            .map(|&id| self.arena[id].arrival())
    }

    /// Per column, how many bits are usable at `stage`
    pub(crate) fn available_counts(&self, stage: Stage) -> Vec<usize> {
        let clock = self.clock;
        self.columns
            .iter()
            .enumerate()
            .map(|(weight, column)| {
                if weight < self.min_weight {
                    0
                } else {
                    column.partition_point(|&id| clock.stage_of(self.arena[id].arrival()) <= stage)
                }
            })
            .collect()
    }

    /// Whether every stored bit is usable at `stage`
    pub(crate) fn all_available(&self, stage: Stage) -> bool {
        self.columns
            .iter()
            .filter_map(VecDeque::back)
            .all(|&id| self.clock.stage_of(self.arena[id].arrival()) <= stage)
    }

    /// Stored bits of a column plus the outputs queued for it this round
    pub(crate) fn projected_height(&self, weight: usize) -> usize {
        let queued = self.pending.iter().filter(|bit| bit.weight() == weight).count();
        self.column_height(weight) + queued
    }

    /// Queue produced bits until [`flush_pending`](Self::flush_pending)
    pub(crate) fn defer_outputs(&mut self) {
        self.deferring = true;
    }

    /// Store queued bits and stop queueing
    pub(crate) fn flush_pending(&mut self) {
        self.deferring = false;
        let pending = std::mem::take(&mut self.pending);
        for bit in pending {
            self.insert_sorted(bit);
        }
    }

    pub(crate) fn record_round(&mut self, stage: Stage) {
        let height = self.max_height();
        if self.profile_rounds {
            self.profile.record_round(stage, height);
        } else {
            self.profile.rounds += 1;
        }
    }
}
