use crate::scheduler::CompressionMode;
use crate::BitHeapError;

/// Heap parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Number of columns; the result is computed modulo `2^max_weight`
    pub max_weight: usize,
    /// Prefix of every signal the heap emits
    pub name: String,
    /// Reduction strategy
    pub mode: CompressionMode,
    /// Record the per-round height timeline
    pub profile_rounds: bool,
}

impl HeapConfig {
    /// Heap of `max_weight` columns named `bh`, compressor-tree mode
    pub fn new(max_weight: usize) -> Self {
        Self {
            max_weight,
            name: "bh".to_string(),
            mode: CompressionMode::default(),
            profile_rounds: true,
        }
    }

    /// Set the signal prefix; heaps sharing a netlist need distinct names
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reduction strategy
    pub fn with_mode(mut self, mode: CompressionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable the per-round timeline
    pub fn with_round_profiling(mut self, enabled: bool) -> Self {
        self.profile_rounds = enabled;
        self
    }

    /// Reject unusable parameters
    pub fn validate(&self) -> Result<(), BitHeapError> {
        if self.max_weight == 0 {
            return Err(BitHeapError::InvalidConfig(
                "heap width must be at least 1".to_string(),
            ));
        }
        let identifier = self
            .name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
            && self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !identifier {
            return Err(BitHeapError::InvalidConfig(format!(
                "heap name {:?} is not a valid identifier",
                self.name
            )));
        }
        Ok(())
    }
}
