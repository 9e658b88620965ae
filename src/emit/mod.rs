//! Emission sinks
//!
//! The heap never builds hardware text itself. It announces every signal it
//! defines ([`Declaration`]) and every arithmetic unit it instantiates
//! ([`Instance`]) to an [`EmissionSink`], in dependency order.

mod netlist;
mod vhdl;

pub use netlist::{InputValues, NetlistError, NetlistEvent, NetlistRecorder, SignalValues};
pub use vhdl::VhdlWriter;

use crate::compressor::CompressorShape;
use crate::timing::Arrival;

/// Value read by a declaration or a unit port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Constant '0'
    Zero,
    /// Constant '1'
    One,
    /// Whole signal, at its declared width
    Signal(String),
    /// One bit of a signal
    Slice {
        /// Signal read
        signal: String,
        /// Bit index
        index: usize,
    },
}

impl Operand {
    /// Whole-signal operand
    pub fn signal(name: impl Into<String>) -> Self {
        Operand::Signal(name.into())
    }

    /// Single-bit operand
    pub fn slice(signal: impl Into<String>, index: usize) -> Self {
        Operand::Slice {
            signal: signal.into(),
            index,
        }
    }
}

/// How a declared signal is driven
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Bit `index` of the input vector `vector`, optionally inverted
    Input {
        /// Input vector name
        vector: String,
        /// Bit index in the vector
        index: usize,
        /// Whether the bit is inverted
        complemented: bool,
    },
    /// Constant bit
    Constant(bool),
    /// Bit `index` of another signal
    Slice {
        /// Source signal
        source: String,
        /// Bit index
        index: usize,
    },
    /// Concatenation, least significant operand first
    Concat(Vec<Operand>),
}

/// A named signal defined by the heap
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Signal name
    pub name: String,
    /// Width in bits
    pub width: usize,
    /// Driver
    pub definition: Definition,
    /// When the signal settles
    pub arrival: Arrival,
}

/// Kind of an instantiated unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Parallel counter; inputs `[X0]` or `[X0, X1]`, output its bit count
    Compressor(CompressorShape),
    /// Carry-propagating adder; inputs `[X, Y, Cin]`
    Adder {
        /// Operand and result width
        width: usize,
    },
    /// Three-input adder; inputs `[X, Y, Z]`
    TernaryAdder {
        /// Operand and result width
        width: usize,
    },
    /// Two-way multiplexer; inputs `[Sel, A, B]`, selects `B` when `Sel` is '1'
    Mux {
        /// Data width
        width: usize,
    },
}

/// An instantiated unit
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Instance label
    pub name: String,
    /// What is instantiated
    pub unit: UnitKind,
    /// Input ports, in the order documented on [`UnitKind`]
    pub inputs: Vec<Operand>,
    /// Output signal name
    pub output: String,
    /// Output width
    pub output_width: usize,
    /// When the output settles
    pub arrival: Arrival,
}

/// Receiver of the heap's emitted structure
pub trait EmissionSink {
    /// A signal has been defined
    fn declare(&mut self, declaration: Declaration);

    /// A unit has been instantiated; its output signal is declared by this call
    fn instantiate(&mut self, instance: Instance);
}

impl<T: EmissionSink + ?Sized> EmissionSink for &mut T {
    fn declare(&mut self, declaration: Declaration) {
        (**self).declare(declaration);
    }

    fn instantiate(&mut self, instance: Instance) {
        (**self).instantiate(instance);
    }
}

/// Fan out to two sinks
impl<A: EmissionSink, B: EmissionSink> EmissionSink for (A, B) {
    fn declare(&mut self, declaration: Declaration) {
        self.0.declare(declaration.clone());
        self.1.declare(declaration);
    }

    fn instantiate(&mut self, instance: Instance) {
        self.0.instantiate(instance.clone());
        self.1.instantiate(instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_sink_fans_out() {
        let mut sinks = (NetlistRecorder::new(), VhdlWriter::new());
        sinks.declare(Declaration {
            name: "s".into(),
            width: 1,
            definition: Definition::Constant(true),
            arrival: Arrival::ZERO,
        });
        assert_eq!(sinks.0.declarations().count(), 1);
        assert!(sinks.1.render().contains("s <= '1';"));
    }
}
