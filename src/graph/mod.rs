//! Internal graph: variables, the operators producing them, and the worklist
//! of operators whose arguments are still deferred.

pub mod options;
pub mod pending;

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::ops::registry::Operator;
use crate::ops::tensor::{Shape, Tensor};

use options::ImportOptions;
use pending::PendingResolutions;

/// Index of a variable in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(pub usize);

/// Named value slot; shape and array become known independently
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub shape: Option<Shape>,
    pub array: Option<Tensor>,
}

/// Outcome of one pass over the deferred worklist
#[derive(Debug, Default)]
pub struct Resolution {
    /// Outputs finalized during the pass, in dependency order
    pub resolved: Vec<String>,
    /// Operators whose resolved arguments were rejected; they leave the worklist
    pub failed: Vec<(String, Error)>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.failed.is_empty()
    }
}

pub struct Graph {
    options: ImportOptions,
    variables: Vec<Variable>,
    index: HashMap<String, VariableId>,
    operators: Vec<Box<dyn Operator>>,
    /// Output variable -> index of the producing operator
    producers: HashMap<VariableId, usize>,
    pending: PendingResolutions,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("variables", &self.variables.len())
            .field("operators", &self.operators.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl Graph {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            variables: Vec::new(),
            index: HashMap::new(),
            operators: Vec::new(),
            producers: HashMap::new(),
            pending: PendingResolutions::new(),
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Register a variable, returning the existing one if the name is taken
    pub fn add_variable(&mut self, name: &str) -> VariableId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }

        let id = VariableId(self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            shape: None,
            array: None,
        });
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn variable_id(&self, name: &str) -> Result<VariableId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|id| &self.variables[id.0])
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Variable> {
        let id = self.variable_id(name)?;
        Ok(&mut self.variables[id.0])
    }

    pub fn shape_for(&self, name: &str) -> Result<Option<&Shape>> {
        let id = self.variable_id(name)?;
        Ok(self.variables[id.0].shape.as_ref())
    }

    pub fn put_shape(&mut self, name: &str, shape: Shape) -> Result<()> {
        self.variable_mut(name)?.shape = Some(shape);
        Ok(())
    }

    pub fn array_for(&self, name: &str) -> Result<Option<&Tensor>> {
        let id = self.variable_id(name)?;
        Ok(self.variables[id.0].array.as_ref())
    }

    /// Associate an array with a variable; its shape becomes the variable's shape
    pub fn put_array(&mut self, name: &str, array: Tensor) -> Result<()> {
        let variable = self.variable_mut(name)?;
        variable.shape = Some(array.shape.clone());
        variable.array = Some(array);
        Ok(())
    }

    /// Whether the shape of a variable can be relied on, e.g. by a scheduler
    /// deciding if its producer may run
    pub fn is_shape_known(&self, name: &str) -> bool {
        self.variable(name).map_or(false, |v| v.shape.is_some())
    }

    /// Supply the value of a placeholder
    pub fn feed(&mut self, name: &str, value: Tensor) -> Result<()> {
        if self.index.get(name).map_or(false, |id| self.producers.contains_key(id)) {
            return Err(Error::InvalidArgument(format!(
                "Variable {} is produced by an operator and cannot be fed", name
            )));
        }

        log::debug!("Feeding variable {} with shape {:?}", name, value.shape);
        self.put_array(name, value.with_name(name))
    }

    /// Take ownership of an imported operator.
    ///
    /// Its output variables are created if needed. An operator that still has
    /// deferred inputs and whose outputs have no shape yet is queued for
    /// [`Graph::resolve_pending`].
    pub fn add_operator(&mut self, operator: Box<dyn Operator>) -> Result<()> {
        let op_index = self.operators.len();
        let outputs: Vec<VariableId> = operator
            .output_names()
            .iter()
            .map(|name| self.add_variable(name))
            .collect();

        for output in &outputs {
            if let Some(&other) = self.producers.get(output) {
                return Err(Error::InvalidGraph(format!(
                    "Variable {} is already produced by operator {}",
                    self.variables[output.0].name,
                    self.operators[other].name()
                )));
            }
        }

        let deferred = operator.deferred_inputs();
        if !deferred.is_empty() {
            let inputs = deferred
                .iter()
                .map(|name| self.variable_id(name))
                .collect::<Result<Vec<_>>>()?;

            for &output in &outputs {
                if self.variables[output.0].shape.is_none() {
                    self.pending.enqueue(output, op_index, &inputs);
                }
            }
        }

        for output in outputs {
            self.producers.insert(output, op_index);
        }
        self.operators.push(operator);
        Ok(())
    }

    pub fn operators(&self) -> impl Iterator<Item = &dyn Operator> {
        self.operators.iter().map(|op| op.as_ref())
    }

    pub fn operator_for_output(&self, name: &str) -> Option<&dyn Operator> {
        let id = self.index.get(name)?;
        self.producers
            .get(id)
            .map(|&op_index| self.operators[op_index].as_ref())
    }

    /// Names of the operator outputs still waiting on deferred references
    pub fn pending_outputs(&self) -> Vec<&str> {
        self.pending
            .outputs()
            .map(|id| self.variables[id.0].name.as_str())
            .collect()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.index
            .get(name)
            .map_or(false, |&id| self.pending.is_pending(id))
    }

    /// Finalize every pending operator whose referenced variables now hold
    /// arrays, in dependency order.
    ///
    /// Operators that remain undeterminable stay pending. An operator that
    /// fails on its resolved arguments is dropped from the worklist and
    /// reported in [`Resolution::failed`] without stopping the pass. The only
    /// error returned is a cycle among deferred references.
    pub fn resolve_pending(&mut self) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for (output, op_index) in self.pending.resolution_order()? {
            if !self.pending.is_pending(output) {
                // settled together with a sibling output of the same operator
                continue;
            }

            let finalized = match self.finalize_operator(op_index) {
                Ok(finalized) => finalized,
                Err(e) => {
                    let name = self.operators[op_index].name().to_string();
                    log::warn!("Deferred operator {} failed to resolve: {}", name, e);
                    self.complete_outputs(op_index)?;
                    resolution.failed.push((name, e));
                    continue;
                }
            };

            if finalized {
                resolution.resolved.extend(self.complete_outputs(op_index)?);
            }
        }

        log::debug!(
            "Resolved {} deferred outputs, {} failed, {} still pending",
            resolution.resolved.len(),
            resolution.failed.len(),
            self.pending.len()
        );
        Ok(resolution)
    }

    /// Remove an operator's outputs from the worklist, returning their names
    fn complete_outputs(&mut self, op_index: usize) -> Result<Vec<String>> {
        let outputs = self.operators[op_index].output_names();
        for name in &outputs {
            let id = self.variable_id(name)?;
            self.pending.complete(id);
        }
        Ok(outputs)
    }

    /// Record shapes (and arrays, when materializing) for an operator's
    /// outputs. Returns false if the operator cannot infer its shape yet.
    fn finalize_operator(&mut self, op_index: usize) -> Result<bool> {
        let operator = &self.operators[op_index];
        let shapes = operator.calculate_output_shape(self)?;
        if shapes.is_empty() {
            return Ok(false);
        }

        let outputs = operator.output_names();
        let arrays = if self.options.materialize_outputs {
            Some(operator.compute(self)?)
        } else {
            None
        };

        for (i, (name, shape)) in outputs.iter().zip(shapes).enumerate() {
            match arrays.as_ref().and_then(|arrays| arrays.get(i)) {
                Some(array) => self.put_array(name, array.clone())?,
                None => self.put_shape(name, shape)?,
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::range::Range;
    use crate::ops::tensor::DataType;

    #[test]
    fn test_variable_registration_is_idempotent() {
        let mut graph = Graph::default();
        let a = graph.add_variable("a");
        assert_eq!(graph.add_variable("a"), a);
        assert_ne!(graph.add_variable("b"), a);
        assert_eq!(graph.variables().count(), 2);
    }

    #[test]
    fn test_unknown_variables() {
        let mut graph = Graph::default();
        assert!(matches!(graph.shape_for("x"), Err(Error::UnknownVariable(_))));
        assert!(matches!(
            graph.put_array("x", Tensor::scalar(1.0, DataType::Float32)),
            Err(Error::UnknownVariable(_))
        ));
        assert!(!graph.is_shape_known("x"));
    }

    #[test]
    fn test_put_array_records_shape() {
        let mut graph = Graph::default();
        graph.add_variable("x");
        assert!(!graph.is_shape_known("x"));
        graph.put_array("x", Tensor::new(&[2, 3], DataType::Float32)).unwrap();
        assert_eq!(graph.shape_for("x").unwrap(), Some(&vec![2, 3]));
        assert!(graph.is_shape_known("x"));
    }

    #[test]
    fn test_operator_outputs_cannot_be_fed() {
        let mut graph = Graph::default();
        graph.add_operator(Box::new(Range::new("r", 0.0, 3.0, 1.0))).unwrap();
        assert!(graph.operator_for_output("r").is_some());
        assert!(matches!(
            graph.feed("r", Tensor::scalar(1.0, DataType::Float64)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_duplicate_producer_is_rejected() {
        let mut graph = Graph::default();
        graph.add_operator(Box::new(Range::new("r", 0.0, 3.0, 1.0))).unwrap();
        assert!(matches!(
            graph.add_operator(Box::new(Range::new("r", 0.0, 4.0, 1.0))),
            Err(Error::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_deferred_operator_resolves_after_feeding() {
        let mut graph = Graph::default();
        for name in ["start", "limit", "delta"] {
            graph.add_variable(name);
        }
        graph.add_operator(Box::new(Range::deferred("r", "start", "limit", "delta"))).unwrap();
        assert_eq!(graph.pending_outputs(), vec!["r"]);

        graph.feed("start", Tensor::scalar(0.0, DataType::Float64)).unwrap();
        graph.feed("limit", Tensor::scalar(5.0, DataType::Float64)).unwrap();
        // delta still missing
        assert!(graph.resolve_pending().unwrap().is_empty());
        assert!(graph.is_pending("r"));

        graph.feed("delta", Tensor::scalar(2.0, DataType::Float64)).unwrap();
        assert_eq!(graph.resolve_pending().unwrap().resolved, vec!["r".to_string()]);
        assert!(!graph.is_pending("r"));
        assert_eq!(graph.shape_for("r").unwrap(), Some(&vec![3]));
        let values: Vec<f64> = graph.array_for("r").unwrap().unwrap().data.iter().copied().collect();
        assert_eq!(values, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_failed_operator_leaves_worklist() {
        let mut graph = Graph::default();
        for name in ["zero", "five", "one"] {
            graph.add_variable(name);
        }
        graph.add_operator(Box::new(Range::deferred("bad", "zero", "five", "zero"))).unwrap();
        graph.add_operator(Box::new(Range::deferred("good", "zero", "five", "one"))).unwrap();

        graph.feed("zero", Tensor::scalar(0.0, DataType::Float64)).unwrap();
        graph.feed("five", Tensor::scalar(5.0, DataType::Float64)).unwrap();
        graph.feed("one", Tensor::scalar(1.0, DataType::Float64)).unwrap();

        let resolution = graph.resolve_pending().unwrap();
        assert_eq!(resolution.resolved, vec!["good".to_string()]);
        assert_eq!(resolution.failed.len(), 1);
        assert_eq!(resolution.failed[0].0, "bad");
        assert!(matches!(resolution.failed[0].1, Error::NonTerminatingSequence { .. }));

        assert!(graph.pending_outputs().is_empty());
        assert!(!graph.is_shape_known("bad"));
        assert_eq!(graph.shape_for("good").unwrap(), Some(&vec![5]));
        // a second pass has nothing left to do
        assert!(graph.resolve_pending().unwrap().is_empty());
    }

    #[test]
    fn test_shape_only_resolution() {
        let mut graph = Graph::new(ImportOptions::default().set_materialize_outputs(false));
        for name in ["a", "b", "c"] {
            graph.add_variable(name);
            graph.feed(name, Tensor::scalar(1.0, DataType::Float64)).unwrap();
        }
        graph.feed("b", Tensor::scalar(4.0, DataType::Float64)).unwrap();
        graph.add_operator(Box::new(Range::deferred("r", "a", "b", "c"))).unwrap();

        assert_eq!(graph.resolve_pending().unwrap().resolved, vec!["r".to_string()]);
        assert_eq!(graph.shape_for("r").unwrap(), Some(&vec![3]));
        assert!(graph.array_for("r").unwrap().is_none());
    }
}
