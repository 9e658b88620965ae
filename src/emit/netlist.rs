//! In-memory netlist with a bit-accurate evaluator

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use thiserror::Error;

use super::{Declaration, Definition, EmissionSink, Instance, Operand, UnitKind};

/// Errors raised while evaluating a recorded netlist
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetlistError {
    /// No value was supplied for an input vector
    #[error("no value supplied for input vector {0}")]
    UnknownInput(String),

    /// A signal was read before being defined
    #[error("signal {0} read before definition")]
    UndefinedSignal(String),

    /// A unit received the wrong number of inputs
    #[error("instance {instance} expects {expected} inputs, got {found}")]
    Arity {
        /// Instance label
        instance: String,
        /// Inputs required
        expected: usize,
        /// Inputs given
        found: usize,
    },
}

/// One recorded emission
#[derive(Debug, Clone, PartialEq)]
pub enum NetlistEvent {
    /// Signal definition
    Declare(Declaration),
    /// Unit instantiation
    Instantiate(Instance),
}

/// Sink that keeps every emission for inspection and evaluation
#[derive(Debug, Clone, Default)]
pub struct NetlistRecorder {
    events: Vec<NetlistEvent>,
}

/// Values of the input vectors, as unsigned bit patterns
#[derive(Debug, Clone, Default)]
pub struct InputValues {
    vectors: HashMap<String, BigUint>,
}

impl InputValues {
    /// No inputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vector value (builder style)
    pub fn with(mut self, vector: impl Into<String>, value: impl Into<BigUint>) -> Self {
        self.set(vector, value);
        self
    }

    /// Set a vector value
    pub fn set(&mut self, vector: impl Into<String>, value: impl Into<BigUint>) {
        self.vectors.insert(vector.into(), value.into());
    }

    fn bit(&self, vector: &str, index: usize) -> Result<bool, NetlistError> {
        self.vectors
            .get(vector)
            .map(|value| value.bit(index as u64))
            .ok_or_else(|| NetlistError::UnknownInput(vector.to_string()))
    }
}

/// Signal values computed by [`NetlistRecorder::evaluate`]
#[derive(Debug, Clone, Default)]
pub struct SignalValues {
    values: HashMap<String, (BigUint, usize)>,
}

impl SignalValues {
    /// Value of a signal
    pub fn get(&self, name: &str) -> Option<&BigUint> {
        self.values.get(name).map(|(value, _)| value)
    }

    /// Declared width of a signal
    pub fn width(&self, name: &str) -> Option<usize> {
        self.values.get(name).map(|(_, width)| *width)
    }

    /// Number of evaluated signals
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was evaluated
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, name: &str, value: BigUint, width: usize) {
        let masked = value & mask(width);
        self.values.insert(name.to_string(), (masked, width));
    }

    fn signal(&self, name: &str) -> Result<&(BigUint, usize), NetlistError> {
        self.values
            .get(name)
            .ok_or_else(|| NetlistError::UndefinedSignal(name.to_string()))
    }

    /// Value and width of an operand
    fn operand(&self, operand: &Operand) -> Result<(BigUint, usize), NetlistError> {
        Ok(match operand {
            Operand::Zero => (BigUint::zero(), 1),
            Operand::One => (BigUint::one(), 1),
            Operand::Signal(name) => self.signal(name)?.clone(),
            Operand::Slice { signal, index } => {
                let (value, _) = self.signal(signal)?;
                (BigUint::from(value.bit(*index as u64) as u8), 1)
            }
        })
    }

    fn value(&self, operand: &Operand) -> Result<BigUint, NetlistError> {
        self.operand(operand).map(|(value, _)| value)
    }
}

fn mask(width: usize) -> BigUint {
    (BigUint::one() << width) - BigUint::one()
}

impl NetlistRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every emission, in order
    pub fn events(&self) -> &[NetlistEvent] {
        &self.events
    }

    /// Recorded declarations
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.events.iter().filter_map(|event| match event {
            NetlistEvent::Declare(declaration) => Some(declaration),
            NetlistEvent::Instantiate(_) => None,
        })
    }

    /// Recorded instances
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.events.iter().filter_map(|event| match event {
            NetlistEvent::Instantiate(instance) => Some(instance),
            NetlistEvent::Declare(_) => None,
        })
    }

    /// Find a declaration by signal name
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations().find(|d| d.name == name)
    }

    /// Evaluate every signal in emission order
    pub fn evaluate(&self, inputs: &InputValues) -> Result<SignalValues, NetlistError> {
        let mut values = SignalValues::default();
        for event in &self.events {
            match event {
                NetlistEvent::Declare(declaration) => {
                    let value = match &declaration.definition {
                        Definition::Input {
                            vector,
                            index,
                            complemented,
                        } => BigUint::from((inputs.bit(vector, *index)? != *complemented) as u8),
                        Definition::Constant(bit) => BigUint::from(*bit as u8),
                        Definition::Slice { source, index } => {
                            values.value(&Operand::slice(source.as_str(), *index))?
                        }
                        Definition::Concat(operands) => {
                            let mut acc = BigUint::zero();
                            let mut shift = 0;
                            for operand in operands {
                                let (value, width) = values.operand(operand)?;
                                acc |= value << shift;
                                shift += width;
                            }
                            acc
                        }
                    };
                    values.insert(&declaration.name, value, declaration.width);
                }
                NetlistEvent::Instantiate(instance) => {
                    let value = evaluate_instance(instance, &values)?;
                    values.insert(&instance.output, value, instance.output_width);
                }
            }
        }
        Ok(values)
    }
}

fn evaluate_instance(instance: &Instance, values: &SignalValues) -> Result<BigUint, NetlistError> {
    let expected = match instance.unit {
        UnitKind::Compressor(shape) if shape.is_single_column() => 1,
        UnitKind::Compressor(_) => 2,
        UnitKind::Adder { .. } | UnitKind::TernaryAdder { .. } | UnitKind::Mux { .. } => 3,
    };
    if instance.inputs.len() != expected {
        return Err(NetlistError::Arity {
            instance: instance.name.clone(),
            expected,
            found: instance.inputs.len(),
        });
    }
    let inputs = instance
        .inputs
        .iter()
        .map(|operand| values.value(operand))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match instance.unit {
        UnitKind::Compressor(_) => inputs
            .iter()
            .enumerate()
            .map(|(column, value)| BigUint::from(value.count_ones()) << column)
            .sum(),
        UnitKind::Adder { .. } | UnitKind::TernaryAdder { .. } => inputs.into_iter().sum(),
        UnitKind::Mux { .. } => {
            if inputs[0].bit(0) {
                inputs[2].clone()
            } else {
                inputs[1].clone()
            }
        }
    })
}

impl EmissionSink for NetlistRecorder {
    fn declare(&mut self, declaration: Declaration) {
        self.events.push(NetlistEvent::Declare(declaration));
    }

    fn instantiate(&mut self, instance: Instance) {
        self.events.push(NetlistEvent::Instantiate(instance));
    }
}
