use std::collections::HashMap;
use std::fmt::{self, Debug};

use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::model::{ForeignGraph, ForeignNode};
use crate::parser::constant_extractor::ConstantExtractor;
use super::range::Range;
use super::tensor::{Shape, Tensor};

/// Execution category of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum OpType {
    /// Operator with its own shape function and argument handling
    Custom,
}

/// Foreign-graph state available to an operator while it imports itself
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
    pub foreign: &'a ForeignGraph,
    pub extractor: &'a dyn ConstantExtractor,
}

/// Trait for implementing graph operators
pub trait Operator: Send + Sync + Debug {
    /// Instance name, also the name of the first output variable
    fn name(&self) -> &str;

    fn op_name(&self) -> &'static str;

    /// Numeric opcode shared with the native executioner
    fn op_num(&self) -> i32;

    fn op_type(&self) -> OpType;

    fn tensorflow_name(&self) -> &'static str;

    fn onnx_name(&self) -> &'static str;

    fn output_names(&self) -> Vec<String>;

    /// Initialize from a foreign node.
    ///
    /// Either finalizes the arguments (recording output shapes and arrays in
    /// `graph`) or records deferred references for later resolution. On error
    /// neither the operator nor the graph is modified.
    fn init_from_foreign(
        &mut self,
        node: &ForeignNode,
        graph: &mut Graph,
        context: ImportContext<'_>,
    ) -> Result<()>;

    /// Infer output shapes; empty while they cannot be determined yet
    fn calculate_output_shape(&self, graph: &Graph) -> Result<Vec<Shape>>;

    /// Produce the output values
    fn compute(&self, graph: &Graph) -> Result<Vec<Tensor>>;

    /// Variables this operator still reads its arguments from
    fn deferred_inputs(&self) -> Vec<String> {
        Vec::new()
    }
}

type OperatorFactory = fn(&ForeignNode) -> Box<dyn Operator>;

fn create_range(node: &ForeignNode) -> Box<dyn Operator> {
    Box::new(Range::for_node(node))
}

/// Registry of importable operators keyed by foreign op name
#[derive(Default)]
pub struct OperatorRegistry {
    factories: HashMap<String, OperatorFactory>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl OperatorRegistry {
    /// Create a new operator registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an operator factory
    pub fn register_operator(&mut self, op: &str, factory: OperatorFactory) -> Result<()> {
        if self.factories.contains_key(op) {
            return Err(Error::UnsupportedFeature(format!(
                "Operator {} is already registered", op
            )));
        }

        self.factories.insert(op.to_string(), factory);
        Ok(())
    }

    pub fn is_supported(&self, op: &str) -> bool {
        self.factories.contains_key(op)
    }

    /// Initialize the registry with standard operators
    pub fn initialize_standard_operators() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(Range::TENSORFLOW_NAME.to_string(), create_range);
        registry
    }

    /// Create an uninitialized operator for a foreign node
    pub fn create_operator_for_node(&self, node: &ForeignNode) -> Result<Box<dyn Operator>> {
        self.factories
            .get(&node.op)
            .map(|factory| factory(node))
            .ok_or_else(|| {
                Error::UnsupportedFeature(format!(
                    "Operator {} (node {}) not found in registry",
                    node.op, node.name
                ))
            })
    }
}
