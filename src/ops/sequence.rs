//! Element count and values of `start..stop` by `step` sequences.
//!
//! Sequences are enumerated by repeatedly accumulating `step` into an `f64`
//! cursor, never by closed-form division, so counts near the `stop` boundary
//! follow floating-point accumulation: `0.0..1.0` by `0.3` has four elements
//! because the fourth cursor value is `0.9000000000000001`. Integer arguments
//! go through the same `f64` cursor and are exact up to 2^53.

use num_traits::ToPrimitive;

use crate::error::{Error, Result};

/// Longest sequence enumerated unless configured otherwise
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = i32::MAX as usize;

/// Count the elements produced by advancing `start` toward `stop` by `step`.
pub fn sequence_length<T: ToPrimitive>(start: T, stop: T, step: T) -> Result<usize> {
    sequence_length_with_limit(start, stop, step, DEFAULT_MAX_SEQUENCE_LENGTH)
}

/// Like [`sequence_length`], failing with [`Error::SequenceTooLong`] past `limit` elements.
pub fn sequence_length_with_limit<T: ToPrimitive>(
    start: T,
    stop: T,
    step: T,
    limit: usize,
) -> Result<usize> {
    SequenceBounds::new(start, stop, step)?.walk(limit, |_| {})
}

/// Enumerate the sequence values with the same accumulation as the count.
pub fn sequence_values<T: ToPrimitive>(start: T, stop: T, step: T, limit: usize) -> Result<Vec<f64>> {
    let mut values = Vec::new();
    SequenceBounds::new(start, stop, step)?.walk(limit, |e| values.push(e))?;
    Ok(values)
}

#[derive(Debug, Clone, Copy)]
struct SequenceBounds {
    start: f64,
    stop: f64,
    step: f64,
}

impl SequenceBounds {
    fn new<T: ToPrimitive>(start: T, stop: T, step: T) -> Result<Self> {
        let start = to_finite(start, "start")?;
        let stop = to_finite(stop, "stop")?;
        let step = to_finite(step, "step")?;
        let bounds = Self { start, stop, step };

        // Rejected before enumerating: a zero step never moves, and an
        // ascending sequence only ever adds `step`.
        if start != stop && (step == 0.0 || (start < stop && step < 0.0)) {
            return Err(bounds.non_terminating());
        }

        Ok(bounds)
    }

    /// Visit every element in order and return how many there were
    fn walk(&self, limit: usize, mut visit: impl FnMut(f64)) -> Result<usize> {
        let mut count = 0usize;
        let mut e = self.start;

        if self.start > self.stop {
            while e > self.stop {
                self.check_limit(count, limit)?;
                visit(e);
                count += 1;
                let next = if self.step > 0.0 { e - self.step } else { e + self.step };
                if next == e {
                    return Err(self.non_terminating());
                }
                e = next;
            }
        } else {
            while e < self.stop {
                self.check_limit(count, limit)?;
                visit(e);
                count += 1;
                let next = e + self.step;
                if next == e {
                    return Err(self.non_terminating());
                }
                e = next;
            }
        }

        Ok(count)
    }

    fn check_limit(&self, count: usize, limit: usize) -> Result<()> {
        if count >= limit {
            return Err(Error::SequenceTooLong {
                start: self.start,
                stop: self.stop,
                step: self.step,
                limit,
            });
        }
        Ok(())
    }

    fn non_terminating(&self) -> Error {
        Error::NonTerminatingSequence {
            start: self.start,
            stop: self.stop,
            step: self.step,
        }
    }
}

fn to_finite<T: ToPrimitive>(value: T, what: &str) -> Result<f64> {
    match value.to_f64() {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(Error::InvalidArgument(format!("Sequence {} must be finite, got {}", what, v))),
        None => Err(Error::InvalidArgument(format!("Sequence {} is not representable as f64", what))),
    }
}
