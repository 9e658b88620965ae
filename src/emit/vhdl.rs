//! VHDL text rendering

use std::collections::BTreeSet;
use std::fmt::Write as _;

use super::{Declaration, Definition, EmissionSink, Instance, Operand, UnitKind};
use crate::timing::Arrival;

/// Sink that renders emissions as a VHDL architecture body
///
/// Compressors become component instances (the entities are listed but not
/// generated); adders and multiplexers become concurrent assignments.
#[derive(Debug, Clone, Default)]
pub struct VhdlWriter {
    declarations: Vec<String>,
    body: Vec<String>,
    components: BTreeSet<String>,
}

fn vhdl_type(width: usize, vector: bool) -> String {
    if width == 1 && !vector {
        "std_logic".to_string()
    } else {
        format!("std_logic_vector({} downto 0)", width.saturating_sub(1))
    }
}

fn operand(op: &Operand) -> String {
    match op {
        Operand::Zero => "'0'".to_string(),
        Operand::One => "'1'".to_string(),
        Operand::Signal(name) => name.clone(),
        Operand::Slice { signal, index } => format!("{signal}({index})"),
    }
}

fn timing_note(arrival: Arrival) -> String {
    format!("-- cycle={} cp={:.3}ns", arrival.cycle, arrival.critical_path * 1e9)
}

impl VhdlWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Component entities referenced so far
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Render the collected declarations and statements
    pub fn render(&self) -> String {
        let mut out = String::new();
        for component in &self.components {
            let _ = writeln!(out, "-- uses component {component}");
        }
        for line in &self.declarations {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out, "begin");
        for line in &self.body {
            let _ = writeln!(out, "{line}");
        }
        out
    }

    fn signal(&mut self, name: &str, width: usize, vector: bool) {
        self.declarations
            .push(format!("signal {name} : {};", vhdl_type(width, vector)));
    }
}

impl EmissionSink for VhdlWriter {
    fn declare(&mut self, declaration: Declaration) {
        let Declaration {
            name,
            width,
            definition,
            arrival,
        } = declaration;
        let (expression, vector) = match &definition {
            Definition::Input {
                vector,
                index,
                complemented: false,
            } => (format!("{vector}({index})"), false),
            Definition::Input {
                vector,
                index,
                complemented: true,
            } => (format!("not {vector}({index})"), false),
            Definition::Constant(bit) => ((if *bit { "'1'" } else { "'0'" }).to_string(), false),
            Definition::Slice { source, index } => (format!("{source}({index})"), false),
            Definition::Concat(operands) => {
                // VHDL concatenation is written most significant first
                let parts: Vec<String> = operands.iter().rev().map(operand).collect();
                (parts.join(" & "), true)
            }
        };
        self.signal(&name, width, vector);
        self.body
            .push(format!("   {name} <= {expression}; {}", timing_note(arrival)));
    }

    fn instantiate(&mut self, instance: Instance) {
        self.signal(&instance.output, instance.output_width, true);
        let inputs: Vec<String> = instance.inputs.iter().map(operand).collect();
        let note = timing_note(instance.arrival);
        let output = &instance.output;
        match instance.unit {
            UnitKind::Compressor(shape) => {
                let entity = shape.entity_name();
                let ports: Vec<String> = inputs
                    .iter()
                    .enumerate()
                    .map(|(i, input)| format!("X{i} => {input}"))
                    .collect();
                self.body.push(format!(
                    "   {}: {entity}\n      port map ( {}, R => {output}); {note}",
                    instance.name,
                    ports.join(", "),
                ));
                self.components.insert(entity);
            }
            UnitKind::Adder { .. } | UnitKind::TernaryAdder { .. } => {
                self.body.push(format!(
                    "   {output} <= {}; {note}",
                    inputs.join(" + ")
                ));
            }
            UnitKind::Mux { .. } => {
                self.body.push(format!(
                    "   {output} <= {} when {} = '1' else {}; {note}",
                    inputs[2], inputs[0], inputs[1]
                ));
            }
        }
    }
}
