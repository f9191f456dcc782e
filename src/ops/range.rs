use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::model::{Attribute, ForeignNode};
use crate::parser::binder::{Binding, DeferredImportBinder};

use super::arguments::{ArgumentSlots, ArgumentSource, OperandRefs};
use super::registry::{ImportContext, OpType, Operator};
use super::tensor::{DataType, Shape, Tensor};

/// Attribute selecting the element type of the generated sequence
const INDEX_TYPE_ATTRIBUTE: &str = "Tidx";

/// Range operator, generating `start, start + delta, ...` up to but excluding `stop`
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    name: String,
    args: ArgumentSlots,
    output_type: DataType,
}

impl Range {
    pub const OP_NAME: &'static str = "range";
    pub const OP_NUM: i32 = 4;
    pub const TENSORFLOW_NAME: &'static str = "Range";
    pub const ONNX_NAME: &'static str = "Range";

    /// Create a range with float arguments
    pub fn new(name: &str, from: f64, to: f64, delta: f64) -> Self {
        Self {
            name: name.to_string(),
            args: ArgumentSlots {
                float_args: Some([from, to, delta]),
                ..Default::default()
            },
            output_type: DataType::Float64,
        }
    }

    /// Create a range with integer arguments
    pub fn with_integer_args(name: &str, start: i64, stop: i64, step: i64) -> Self {
        Self {
            name: name.to_string(),
            args: ArgumentSlots {
                integer_args: Some([start, stop, step]),
                ..Default::default()
            },
            output_type: DataType::Int64,
        }
    }

    /// Create a range reading its arguments from three graph variables
    pub fn deferred(name: &str, start: &str, stop: &str, delta: &str) -> Self {
        Self {
            name: name.to_string(),
            args: ArgumentSlots {
                input_refs: Some(OperandRefs::new(start, stop, delta)),
                ..Default::default()
            },
            output_type: DataType::Float64,
        }
    }

    /// Uninitialized range for a foreign node, awaiting `init_from_foreign`
    pub fn for_node(node: &ForeignNode) -> Self {
        let output_type = match node.attribute(INDEX_TYPE_ATTRIBUTE) {
            Some(Attribute::Type(dt)) if dt.is_integer() || dt.is_floating_point() => *dt,
            _ => DataType::Float64,
        };

        Self {
            name: node.name.clone(),
            args: ArgumentSlots::default(),
            output_type,
        }
    }

    pub fn arguments(&self) -> &ArgumentSlots {
        &self.args
    }

    pub fn arguments_mut(&mut self) -> &mut ArgumentSlots {
        &mut self.args
    }

    pub fn output_type(&self) -> DataType {
        self.output_type
    }

    /// The argument source shape inference would use right now
    pub fn argument_source(&self, graph: &Graph) -> Result<Option<ArgumentSource>> {
        self.args.resolve(&self.name, graph)
    }

    /// Resolve the active source, rejecting fractional start or step values
    /// for an integer output type
    fn typed_source(&self, args: &ArgumentSlots, graph: &Graph) -> Result<Option<ArgumentSource>> {
        let source = args.resolve(&self.name, graph)?;
        if let Some(source) = &source {
            if self.output_type.is_integer() && !source.is_integral() {
                return Err(Error::InvalidArgument(format!(
                    "{} produces {} values but its arguments {:?} are not integral",
                    self.name, self.output_type, source
                )));
            }
        }
        Ok(source)
    }

    fn shape_for(&self, args: &ArgumentSlots, graph: &Graph) -> Result<Option<Shape>> {
        match self.typed_source(args, graph)? {
            Some(source) => {
                let length = source.sequence_length(graph.options().max_sequence_length)?;
                Ok(Some(vec![length]))
            }
            None => Ok(None),
        }
    }

    fn values_for(&self, args: &ArgumentSlots, graph: &Graph) -> Result<Tensor> {
        let source = self.typed_source(args, graph)?.ok_or_else(|| {
            Error::InvalidArgument(format!("Arguments of {} are not resolved yet", self.name))
        })?;

        let values = source.sequence_values(graph.options().max_sequence_length)?;
        let length = values.len();
        Ok(Tensor::from_vec(values, &[length], self.output_type)?.with_name(&self.name))
    }

    /// Stage the output shape and array for concrete arguments without
    /// touching the graph
    fn stage_output(&self, args: &ArgumentSlots, graph: &Graph) -> Result<StagedOutput> {
        if graph.variable(&self.name).map_or(false, |v| v.array.is_some()) {
            return Ok(StagedOutput::Existing);
        }

        let shape = self
            .shape_for(args, graph)?
            .ok_or_else(|| Error::import(&self.name, "resolved arguments produced no shape"))?;

        if let Some(recorded) = graph.variable(&self.name).and_then(|v| v.shape.as_ref()) {
            if *recorded != shape {
                return Err(Error::import(
                    &self.name,
                    format!("recorded output shape {:?} conflicts with inferred {:?}", recorded, shape),
                ));
            }
        }

        if graph.options().materialize_outputs {
            Ok(StagedOutput::Array(self.values_for(args, graph)?))
        } else {
            Ok(StagedOutput::Shape(shape))
        }
    }
}

enum StagedOutput {
    Existing,
    Shape(Shape),
    Array(Tensor),
}

impl Operator for Range {
    fn name(&self) -> &str {
        &self.name
    }

    fn op_name(&self) -> &'static str {
        Self::OP_NAME
    }

    fn op_num(&self) -> i32 {
        Self::OP_NUM
    }

    fn op_type(&self) -> OpType {
        OpType::Custom
    }

    fn tensorflow_name(&self) -> &'static str {
        Self::TENSORFLOW_NAME
    }

    fn onnx_name(&self) -> &'static str {
        Self::ONNX_NAME
    }

    fn output_names(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn init_from_foreign(
        &mut self,
        node: &ForeignNode,
        graph: &mut Graph,
        context: ImportContext<'_>,
    ) -> Result<()> {
        if node.op != Self::TENSORFLOW_NAME {
            return Err(Error::import(
                &node.name,
                format!("expected a {} node, got {}", Self::TENSORFLOW_NAME, node.op),
            ));
        }

        match DeferredImportBinder::bind(node, graph, context)? {
            Binding::Resolved([from, to, delta]) => {
                let staged_args = ArgumentSlots {
                    float_args: Some([from, to, delta]),
                    input_refs: None,
                    ..self.args.clone()
                };
                let output = self.stage_output(&staged_args, graph)?;

                // Nothing below can fail except on an unknown variable, which
                // add_variable rules out
                self.args = staged_args;
                self.args.warn_if_inconsistent(&self.name);
                graph.add_variable(&self.name);
                match output {
                    StagedOutput::Existing => {}
                    StagedOutput::Shape(shape) => graph.put_shape(&self.name, shape)?,
                    StagedOutput::Array(array) => graph.put_array(&self.name, array)?,
                }
            }
            Binding::Deferred(refs) => {
                self.args.input_refs = Some(refs);
                self.args.warn_if_inconsistent(&self.name);
            }
        }

        Ok(())
    }

    fn calculate_output_shape(&self, graph: &Graph) -> Result<Vec<Shape>> {
        Ok(self.shape_for(&self.args, graph)?.into_iter().collect())
    }

    fn compute(&self, graph: &Graph) -> Result<Vec<Tensor>> {
        Ok(vec![self.values_for(&self.args, graph)?])
    }

    fn deferred_inputs(&self) -> Vec<String> {
        self.args
            .input_refs
            .as_ref()
            .map(|refs| refs.names().iter().map(|name| name.to_string()).collect())
            .unwrap_or_default()
    }
}
