use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bitheap::{
    CompressionMode, CompressorCatalog, GenericTarget, HeapConfig, InputValues, NetlistRecorder,
    TimingContext, VhdlWriter, WeightedBitHeap,
};
use clap::{Args, Parser, Subcommand};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bitheap", about = "Timing-aware bit heap compression")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a heap from operands, compress it and print the schedule.
    Sum {
        /// Heap width in bits; the sum is computed modulo 2^width.
        #[arg(long)]
        width: usize,
        /// Operand `NAME:BITS[@WEIGHT]`, added unsigned.
        #[arg(long = "add")]
        unsigned: Vec<String>,
        /// Operand `NAME:BITS[@WEIGHT]`, added as two's complement.
        #[arg(long = "add-signed")]
        signed: Vec<String>,
        /// Operand `NAME:BITS[@WEIGHT]`, subtracted unsigned.
        #[arg(long = "sub")]
        subtracted: Vec<String>,
        /// Operand `NAME:BITS[@WEIGHT]`, subtracted as two's complement.
        #[arg(long = "sub-signed")]
        subtracted_signed: Vec<String>,
        /// Constant `VALUE[@WEIGHT]`; may be negative.
        #[arg(long = "constant", allow_hyphen_values = true)]
        constants: Vec<String>,
        /// Input value `NAME=VALUE`; the netlist is evaluated and checked against the operands.
        #[arg(long = "eval")]
        values: Vec<String>,
        /// Reduction strategy: compressor-tree, adder-tree or hybrid.
        #[arg(long, default_value = "compressor-tree")]
        mode: CompressionMode,
        /// Print the generated VHDL.
        #[arg(long)]
        vhdl: bool,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the compressor shapes available for a LUT width.
    Catalog {
        /// LUT input count.
        #[arg(long, default_value_t = 6)]
        lut: usize,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// LUT input count.
    #[arg(long, default_value_t = 4)]
    lut: usize,
    /// Target frequency in MHz.
    #[arg(long, default_value_t = 400.0)]
    frequency: f64,
    /// Disable register insertion.
    #[arg(long)]
    combinational: bool,
    /// Allow a ternary final adder.
    #[arg(long)]
    ternary: bool,
    /// Split final adders wider than this many bits.
    #[arg(long)]
    max_adder_width: Option<usize>,
}

impl TargetArgs {
    fn build(&self) -> Result<GenericTarget> {
        let base = if self.lut >= 6 {
            GenericTarget::six_input()
        } else {
            GenericTarget::default()
        };
        let target = base
            .with_lut_width(self.lut)
            .with_frequency(self.frequency * 1e6)
            .with_pipelining(!self.combinational)
            .with_ternary_adders(self.ternary)
            .with_max_adder_width(self.max_adder_width);
        target.validate().context("invalid target")?;
        Ok(target)
    }
}

/// Operand parsed from `NAME:BITS[@WEIGHT]`
#[derive(Debug)]
struct OperandSpec {
    name: String,
    bits: usize,
    weight: i32,
}

fn parse_operand(spec: &str) -> Result<OperandSpec> {
    let (body, weight) = match spec.split_once('@') {
        Some((body, weight)) => (body, weight.parse().with_context(|| format!("bad weight in {spec}"))?),
        None => (spec, 0),
    };
    let Some((name, bits)) = body.split_once(':') else {
        bail!("operand {spec} is not NAME:BITS[@WEIGHT]");
    };
    let bits = bits.parse().with_context(|| format!("bad width in {spec}"))?;
    Ok(OperandSpec {
        name: name.to_string(),
        bits,
        weight,
    })
}

fn parse_constant(spec: &str) -> Result<(BigInt, i32)> {
    let (value, weight) = match spec.split_once('@') {
        Some((value, weight)) => (value, weight.parse().with_context(|| format!("bad weight in {spec}"))?),
        None => (spec, 0),
    };
    let value = value.parse().with_context(|| format!("bad constant {spec}"))?;
    Ok((value, weight))
}

fn parse_values(specs: &[String]) -> Result<HashMap<String, BigUint>> {
    let mut inputs = HashMap::new();
    for spec in specs {
        let Some((name, value)) = spec.split_once('=') else {
            bail!("value {spec} is not NAME=VALUE");
        };
        let value: BigUint = value.parse().with_context(|| format!("bad value in {spec}"))?;
        inputs.insert(name.to_string(), value);
    }
    Ok(inputs)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sum {
            width,
            unsigned,
            signed,
            subtracted,
            subtracted_signed,
            constants,
            values,
            mode,
            vhdl,
            target,
        } => {
            let operands = Operands {
                unsigned,
                signed,
                subtracted,
                subtracted_signed,
                constants,
            };
            run_sum(width, &operands, &values, mode, vhdl, &target)?
        }
        Commands::Catalog { lut } => run_catalog(lut)?,
    }

    Ok(())
}

#[derive(Debug)]
struct Operands {
    unsigned: Vec<String>,
    signed: Vec<String>,
    subtracted: Vec<String>,
    subtracted_signed: Vec<String>,
    constants: Vec<String>,
}

impl Operands {
    /// Every vector operand with its sign convention, in insertion order
    fn parse(&self) -> Result<Vec<(OperandKind, OperandSpec)>> {
        let groups = [
            (OperandKind::Unsigned, &self.unsigned),
            (OperandKind::Signed, &self.signed),
            (OperandKind::SubtractUnsigned, &self.subtracted),
            (OperandKind::SubtractSigned, &self.subtracted_signed),
        ];
        let mut names = HashSet::new();
        let mut parsed = Vec::new();
        for (kind, specs) in groups {
            for spec in specs {
                let op = parse_operand(spec)?;
                if !names.insert(op.name.clone()) {
                    bail!("operand {} given twice", op.name);
                }
                parsed.push((kind, op));
            }
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    Unsigned,
    Signed,
    SubtractUnsigned,
    SubtractSigned,
}

/// Arithmetic sum of the operands for the given input values, modulo `2^width`
fn expected_sum(
    width: usize,
    operands: &[(OperandKind, OperandSpec)],
    constants: &[(BigInt, i32)],
    inputs: &HashMap<String, BigUint>,
) -> Result<BigUint> {
    let mut total = BigInt::zero();
    for (kind, op) in operands {
        let raw = inputs
            .get(&op.name)
            .with_context(|| format!("no --eval value for operand {}", op.name))?;
        let mask = (BigUint::one() << op.bits) - BigUint::one();
        let mut value = BigInt::from(raw & &mask);
        let signed = matches!(kind, OperandKind::Signed | OperandKind::SubtractSigned);
        if signed && op.bits > 0 && raw.bit(op.bits as u64 - 1) {
            value -= BigInt::one() << op.bits;
        }
        let shifted = shift(value, op.weight);
        match kind {
            OperandKind::Unsigned | OperandKind::Signed => total += shifted,
            OperandKind::SubtractUnsigned | OperandKind::SubtractSigned => total -= shifted,
        }
    }
    for (value, weight) in constants {
        total += shift(value.clone(), *weight);
    }
    let modulus = BigInt::one() << width;
    let reduced = ((total % &modulus) + &modulus) % &modulus;
    reduced
        .to_biguint()
        .context("reduced sum is negative")
}

fn shift(value: BigInt, weight: i32) -> BigInt {
    if weight >= 0 {
        value << weight as usize
    } else {
        value >> weight.unsigned_abs() as usize
    }
}

fn run_sum(
    width: usize,
    operands: &Operands,
    values: &[String],
    mode: CompressionMode,
    vhdl: bool,
    target_args: &TargetArgs,
) -> Result<()> {
    let target = Arc::new(target_args.build()?);
    let mut ctx = TimingContext::new(target.as_ref());
    let config = HeapConfig::new(width).with_mode(mode);
    let mut heap = WeightedBitHeap::new(config, target, (NetlistRecorder::new(), VhdlWriter::new()))
        .context("failed to create heap")?;

    let vectors = operands.parse()?;
    for (kind, op) in &vectors {
        match kind {
            OperandKind::Unsigned => heap.add_unsigned_bit_vector(&ctx, op.weight, &op.name, op.bits),
            OperandKind::Signed => heap.add_signed_bit_vector(&ctx, op.weight, &op.name, op.bits),
            OperandKind::SubtractUnsigned => {
                heap.subtract_unsigned_bit_vector(&ctx, op.weight, &op.name, op.bits)
            }
            OperandKind::SubtractSigned => {
                heap.subtract_signed_bit_vector(&ctx, op.weight, &op.name, op.bits)
            }
        }
        .with_context(|| format!("failed to add operand {}", op.name))?;
    }
    let mut constants = Vec::with_capacity(operands.constants.len());
    for spec in &operands.constants {
        let (value, weight) = parse_constant(spec)?;
        heap.add_constant(weight, &value)
            .with_context(|| format!("failed to add constant {spec}"))?;
        constants.push((value, weight));
    }

    println!("{}", heap.snapshot().render());
    let sum = heap.compress(&mut ctx).context("compression failed")?.clone();

    println!("{}", heap.profile().report());
    let used: Vec<String> = heap
        .catalog()
        .used_shapes()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Shapes used: {}", if used.is_empty() { "none".to_string() } else { used.join(" ") });
    let diagnostics = heap.diagnostics();
    if !diagnostics.is_clean() {
        println!(
            "Dropped: {} bits, {} constant bits",
            diagnostics.dropped_bits, diagnostics.dropped_constants
        );
    }

    let (recorder, writer) = heap.into_sink();
    if vhdl {
        println!("{}", writer.render());
    }
    if values.is_empty() {
        return Ok(());
    }

    let raw = parse_values(values)?;
    let mut inputs = InputValues::new();
    for (name, value) in &raw {
        inputs.set(name.as_str(), value.clone());
    }
    let evaluated = recorder.evaluate(&inputs).context("evaluation failed")?;
    let unsigned = sum.unsigned(&evaluated).context("result signal missing")?;
    let signed = sum.signed(&evaluated).context("result signal missing")?;
    let expected = expected_sum(width, &vectors, &constants, &raw)?;
    println!("{} = {} (signed {}), expected {}", sum.signal, unsigned, signed, expected);
    if unsigned != expected {
        bail!("netlist computes {unsigned}, operands sum to {expected}");
    }
    Ok(())
}

fn run_catalog(lut: usize) -> Result<()> {
    let catalog = CompressorCatalog::for_lut_width(lut).context("failed to build catalog")?;
    println!("shape\tinputs\toutputs\teliminated");
    for shape in catalog.shapes() {
        println!(
            "{}\t{}\t{}\t{}",
            shape,
            shape.inputs(),
            shape.output_width(),
            shape.eliminated()
        );
    }
    Ok(())
}
