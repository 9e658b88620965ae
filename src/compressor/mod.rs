//! Compressor shapes and the per-target catalog
//!
//! A shape `(h0, h1)` consumes `h0` bits of weight `w` and `h1` bits of
//! weight `w+1`, and produces the binary count `popcount(h0) + 2*popcount(h1)`
//! on `output_width` bits of weights `w..`. The catalog lists every shape a
//! single LUT level can host, best first.

use std::fmt;

use bitvec::prelude::*;

use crate::BitHeapError;

/// Widest compressor output handled by the scheduler
pub const MAX_OUTPUT_WIDTH: usize = 3;

/// Number of bits needed to write `value` in binary (0 needs none)
fn bit_length(value: usize) -> usize {
    (usize::BITS - value.leading_zeros()) as usize
}

/// Generalized parallel counter over two adjacent columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressorShape {
    h0: usize,
    h1: usize,
}

impl CompressorShape {
    /// The (3,0) full adder every catalog contains
    pub const FULL_ADDER: CompressorShape = CompressorShape { h0: 3, h1: 0 };

    /// Validate a shape for LUTs of `lut_width` inputs
    pub fn new(h0: usize, h1: usize, lut_width: usize) -> Result<Self, BitHeapError> {
        let shape = Self { h0, h1 };
        let reason = if h0 < 3 {
            Some("needs at least three bits in the low column")
        } else if h1 > h0 {
            Some("high column taller than low column")
        } else if h0 + h1 > lut_width {
            Some("more inputs than a LUT provides")
        } else if shape.output_width() > MAX_OUTPUT_WIDTH {
            Some("output wider than three bits")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(BitHeapError::InvalidShape { h0, h1, reason }),
            None => Ok(shape),
        }
    }

    /// Bits consumed from the low column
    pub fn h0(&self) -> usize {
        self.h0
    }

    /// Bits consumed from the high column
    pub fn h1(&self) -> usize {
        self.h1
    }

    /// Bits consumed from column `i` (0 or 1)
    pub fn column_size(&self, i: usize) -> usize {
        match i {
            0 => self.h0,
            1 => self.h1,
            _ => 0,
        }
    }

    /// Total inputs
    pub fn inputs(&self) -> usize {
        self.h0 + self.h1
    }

    /// Largest value the shape can output
    pub fn max_value(&self) -> usize {
        self.h0 + 2 * self.h1
    }

    /// Bits needed to write [`max_value`](Self::max_value)
    pub fn output_width(&self) -> usize {
        bit_length(self.max_value())
    }

    /// Bits removed from the heap by one application
    pub fn eliminated(&self) -> usize {
        self.inputs().saturating_sub(self.output_width())
    }

    /// Whether the shape reads a single column
    pub fn is_single_column(&self) -> bool {
        self.h1 == 0
    }

    /// Entity name of the compressor in HDL output
    pub fn entity_name(&self) -> String {
        format!("Compressor_{}{}_{}", self.h1, self.h0, self.output_width())
    }
}

impl fmt::Display for CompressorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}):{}", self.h0, self.h1, self.output_width())
    }
}

/// Ordered list of usable shapes with per-shape usage flags
#[derive(Debug, Clone)]
pub struct CompressorCatalog {
    shapes: Vec<CompressorShape>,
    used: BitVec,
    lut_width: usize,
}

impl CompressorCatalog {
    /// Enumerate every valid shape for LUTs of `lut_width` inputs
    ///
    /// Shapes are sorted by bits eliminated, then by inputs consumed (both
    /// descending), then prefer single-column shapes.
    pub fn for_lut_width(lut_width: usize) -> Result<Self, BitHeapError> {
        let mut shapes = Vec::new();
        for h0 in 3..=lut_width {
            for h1 in 0..=h0 {
                if let Ok(shape) = CompressorShape::new(h0, h1, lut_width) {
                    shapes.push(shape);
                }
            }
        }
        Self::from_shapes(shapes, lut_width)
    }

    /// Build a catalog from explicit shapes
    ///
    /// Every shape is revalidated and the list is put in catalog order;
    /// the full adder is mandatory.
    pub fn from_shapes(
        mut shapes: Vec<CompressorShape>,
        lut_width: usize,
    ) -> Result<Self, BitHeapError> {
        for shape in &shapes {
            CompressorShape::new(shape.h0, shape.h1, lut_width)?;
        }
        shapes.sort_by(|a, b| {
            b.eliminated()
                .cmp(&a.eliminated())
                .then(b.inputs().cmp(&a.inputs()))
                .then(a.h1.cmp(&b.h1))
        });
        shapes.dedup();
        if !shapes.contains(&CompressorShape::FULL_ADDER) {
            return Err(BitHeapError::MissingShape(
                CompressorShape::FULL_ADDER.to_string(),
            ));
        }
        let used = bitvec![0; shapes.len()];
        Ok(Self {
            shapes,
            used,
            lut_width,
        })
    }

    /// Shapes, best first
    pub fn shapes(&self) -> &[CompressorShape] {
        &self.shapes
    }

    /// Shape at `index`
    pub fn shape(&self, index: usize) -> Option<CompressorShape> {
        self.shapes.get(index).copied()
    }

    /// Number of shapes
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the catalog is empty (never true for a built catalog)
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// LUT width the catalog was built for
    pub fn lut_width(&self) -> usize {
        self.lut_width
    }

    /// Position of a shape
    pub fn position(&self, shape: CompressorShape) -> Option<usize> {
        self.shapes.iter().position(|s| *s == shape)
    }

    /// Position of the full adder
    pub fn full_adder_index(&self) -> Result<usize, BitHeapError> {
        self.position(CompressorShape::FULL_ADDER).ok_or_else(|| {
            BitHeapError::MissingShape(CompressorShape::FULL_ADDER.to_string())
        })
    }

    /// Tallest low column any shape consumes
    pub fn max_input_height(&self) -> usize {
        self.shapes.iter().map(|s| s.h0).max().unwrap_or(3)
    }

    /// Record that the shape at `index` was instantiated
    pub fn mark_used(&mut self, index: usize) {
        if index < self.used.len() {
            self.used.set(index, true);
        }
    }

    /// Whether a shape was instantiated
    pub fn was_used(&self, shape: CompressorShape) -> bool {
        self.position(shape)
            .map(|idx| self.used[idx])
            .unwrap_or(false)
    }

    /// Shapes instantiated so far, in catalog order
    pub fn used_shapes(&self) -> Vec<CompressorShape> {
        self.used
            .iter_ones()
            .map(|idx| self.shapes[idx])
            .collect()
    }
}
