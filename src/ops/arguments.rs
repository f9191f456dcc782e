//! Argument sources of operators and their priority resolution.

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::ops::sequence;

/// Variable names of the three positional operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandRefs {
    pub start: String,
    pub stop: String,
    pub delta: String,
    /// The stop operand is a rank marker: the sequence is `[start, start + 1)`
    /// by 1 whatever the stop and delta values are
    pub rank_marker_stop: bool,
}

impl OperandRefs {
    pub fn new(start: &str, stop: &str, delta: &str) -> Self {
        Self {
            start: start.to_string(),
            stop: stop.to_string(),
            delta: delta.to_string(),
            rank_marker_stop: false,
        }
    }

    pub fn with_rank_marker_stop(mut self, rank_marker_stop: bool) -> Self {
        self.rank_marker_stop = rank_marker_stop;
        self
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.start, &self.stop, &self.delta]
    }
}

/// The argument source selected for one shape inference or compute call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgumentSource {
    Integer { start: i64, stop: i64, step: i64 },
    Float { start: f64, stop: f64, step: f64 },
    /// Scalars read from the referenced variables' arrays
    Tensor { start: f64, stop: f64, step: f64 },
}

impl ArgumentSource {
    /// Number of elements of the sequence described by this source
    pub fn sequence_length(&self, limit: usize) -> Result<usize> {
        match *self {
            ArgumentSource::Integer { start, stop, step } => {
                sequence::sequence_length_with_limit(start, stop, step, limit)
            }
            ArgumentSource::Float { start, stop, step }
            | ArgumentSource::Tensor { start, stop, step } => {
                sequence::sequence_length_with_limit(start, stop, step, limit)
            }
        }
    }

    /// Whether every element is a whole number: start and step have no
    /// fractional part
    pub fn is_integral(&self) -> bool {
        match *self {
            ArgumentSource::Integer { .. } => true,
            ArgumentSource::Float { start, step, .. }
            | ArgumentSource::Tensor { start, step, .. } => start.fract() == 0.0 && step.fract() == 0.0,
        }
    }

    /// Values of the sequence described by this source
    pub fn sequence_values(&self, limit: usize) -> Result<Vec<f64>> {
        match *self {
            ArgumentSource::Integer { start, stop, step } => {
                sequence::sequence_values(start, stop, step, limit)
            }
            ArgumentSource::Float { start, stop, step }
            | ArgumentSource::Tensor { start, stop, step } => {
                sequence::sequence_values(start, stop, step, limit)
            }
        }
    }
}

/// Argument storage shared by operators taking a start/stop/step triple.
///
/// Any combination of slots may be populated; [`ArgumentSlots::resolve`]
/// decides which one is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSlots {
    pub integer_args: Option<[i64; 3]>,
    pub float_args: Option<[f64; 3]>,
    pub input_refs: Option<OperandRefs>,
}

impl ArgumentSlots {
    pub fn is_empty(&self) -> bool {
        self.integer_args.is_none() && self.float_args.is_none() && self.input_refs.is_none()
    }

    /// Warn if more than one argument source is populated. Called once when
    /// an operator commits its slots; [`ArgumentSlots::resolve`] only logs
    /// the choice at debug level.
    pub fn warn_if_inconsistent(&self, owner: &str) {
        if self.populated_count() > 1 {
            log::warn!(
                "{} has {} argument sources populated; resolving by priority",
                owner,
                self.populated_count()
            );
        }
    }

    fn populated_count(&self) -> usize {
        [
            self.integer_args.is_some(),
            self.float_args.is_some(),
            self.input_refs.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count()
    }

    /// Pick the active argument source: integer attributes, then float
    /// attributes, then tensor inputs whose arrays the graph already holds.
    ///
    /// Returns `Ok(None)` while nothing usable is populated. Several populated
    /// sources are resolved by that order and reported with a warning, or
    /// rejected when the graph's options ask for strict sources.
    pub fn resolve(&self, owner: &str, graph: &Graph) -> Result<Option<ArgumentSource>> {
        if self.populated_count() > 1 {
            if graph.options().strict_argument_sources {
                return Err(Error::InconsistentArgumentSources(owner.to_string()));
            }
            log::debug!(
                "{} has {} argument sources populated; using {}",
                owner,
                self.populated_count(),
                if self.integer_args.is_some() { "integer arguments" } else { "float arguments" }
            );
        }

        if let Some([start, stop, step]) = self.integer_args {
            return Ok(Some(ArgumentSource::Integer { start, stop, step }));
        }

        if let Some([start, stop, step]) = self.float_args {
            return Ok(Some(ArgumentSource::Float { start, stop, step }));
        }

        if let Some(refs) = &self.input_refs {
            let [start, stop, step] = refs.names().map(|name| graph.array_for(name));
            let arrays = match (start?, stop?, step?) {
                (Some(start), Some(stop), Some(step)) => [start, stop, step],
                _ => return Ok(None),
            };
            let [start, stop, step] = arrays.map(|array| array.scalar_f64());
            let start = start?;
            if refs.rank_marker_stop {
                return Ok(Some(ArgumentSource::Tensor {
                    start,
                    stop: start + 1.0,
                    step: 1.0,
                }));
            }
            return Ok(Some(ArgumentSource::Tensor {
                start,
                stop: stop?,
                step: step?,
            }));
        }

        Ok(None)
    }
}
