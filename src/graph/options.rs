use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ops::sequence::DEFAULT_MAX_SEQUENCE_LENGTH;

/// Options controlling graph import and shape inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Node names that mark a range end operand as an index count rather than
    /// an explicit bound (compared case-insensitively)
    pub rank_marker_names: Vec<String>,
    /// Reject operators with more than one populated argument source instead
    /// of resolving them by priority
    pub strict_argument_sources: bool,
    /// Upper bound on the number of elements a sequence may enumerate
    pub max_sequence_length: usize,
    /// Abort the whole import on the first node that fails
    pub fail_fast: bool,
    /// Store an output array, not only its shape, for operators resolved at import
    pub materialize_outputs: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            rank_marker_names: vec!["Rank".to_string()],
            strict_argument_sources: false,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            fail_fast: false,
            materialize_outputs: true,
        }
    }
}

impl ImportOptions {
    /// Create a new import options object
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the rank marker node names
    pub fn set_rank_marker_names(mut self, names: &[&str]) -> Self {
        self.rank_marker_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Enable or disable strict argument source validation
    pub fn set_strict_argument_sources(mut self, strict: bool) -> Self {
        self.strict_argument_sources = strict;
        self
    }

    /// Set the maximum sequence length
    pub fn set_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    /// Enable or disable aborting on the first failed node
    pub fn set_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Enable or disable output array materialization
    pub fn set_materialize_outputs(mut self, materialize: bool) -> Self {
        self.materialize_outputs = materialize;
        self
    }

    /// True if `name` marks an index-count end operand
    pub fn is_rank_marker(&self, name: &str) -> bool {
        self.rank_marker_names
            .iter()
            .any(|marker| marker.eq_ignore_ascii_case(name))
    }
}
