//! Binding of operand nodes for operators imported from a foreign graph.
//!
//! Operands whose values are embedded constants are read immediately. If any
//! operand is only known by reference (a placeholder, or the output of another
//! operator) the binder hands back the internal variable names instead, and
//! the graph resolves them later.

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::model::{node_name, ForeignGraph, ForeignNode};
use crate::ops::arguments::OperandRefs;
use crate::ops::registry::ImportContext;

/// Positional operands of a start/stop/step operator
pub const RANGE_OPERAND_POSITIONS: [&str; 3] = ["start", "stop", "delta"];

/// Outcome of binding a node's three operands
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Concrete `[start, stop, step]`
    Resolved([f64; 3]),
    /// Variables to read the arguments from once they hold values
    Deferred(OperandRefs),
}

pub struct DeferredImportBinder;

impl DeferredImportBinder {
    /// Find the operand nodes of `node` in a single ordered scan of the
    /// foreign graph. The first node with a matching name wins and the scan
    /// stops once every operand is found.
    pub fn locate_operands<'g, const N: usize>(
        node: &ForeignNode,
        foreign: &'g ForeignGraph,
        positions: [&'static str; N],
    ) -> Result<[&'g ForeignNode; N]> {
        let mut references = [""; N];
        for (i, &position) in positions.iter().enumerate() {
            references[i] = node
                .inputs
                .get(i)
                .map(|input| node_name(input))
                .ok_or_else(|| Error::MissingOperand {
                    node: node.name.clone(),
                    position,
                    input: String::new(),
                })?;
        }

        let mut found: [Option<&'g ForeignNode>; N] = [None; N];
        for candidate in &foreign.nodes {
            for (slot, reference) in found.iter_mut().zip(references) {
                if slot.is_none() && candidate.name == reference {
                    *slot = Some(candidate);
                }
            }
            if found.iter().all(Option::is_some) {
                break;
            }
        }

        let mut located = Vec::with_capacity(N);
        for (i, slot) in found.into_iter().enumerate() {
            match slot {
                Some(operand) => located.push(operand),
                None => {
                    return Err(Error::MissingOperand {
                        node: node.name.clone(),
                        position: positions[i],
                        input: node.inputs[i].clone(),
                    })
                }
            }
        }

        log::trace!(
            "Located operands of {}: {:?}",
            node.name,
            located.iter().map(|n| n.name.as_str()).collect::<Vec<_>>()
        );

        located
            .try_into()
            .map_err(|_| Error::import(&node.name, "operand count changed during lookup"))
    }

    /// Bind the start/stop/delta operands of `node`.
    ///
    /// Resolves to concrete arguments when all three operands are constants.
    /// An end operand named like a rank marker describes an index count, so it
    /// binds to `[start, start + 1, 1]`. Otherwise the operands' variable names
    /// are returned for deferred resolution.
    pub fn bind(node: &ForeignNode, graph: &Graph, context: ImportContext<'_>) -> Result<Binding> {
        let [start, stop, delta] =
            Self::locate_operands(node, context.foreign, RANGE_OPERAND_POSITIONS)?;

        let extract = |operand: &ForeignNode| {
            context
                .extractor
                .extract(operand, context.foreign)
                .map_err(|e| {
                    Error::import(&node.name, format!("cannot read constant {}: {}", operand.name, e))
                })
        };
        let scalar = |tensor: crate::ops::tensor::Tensor| {
            tensor
                .scalar_f64()
                .map_err(|e| Error::import(&node.name, e.to_string()))
        };

        if let (Some(from), Some(to), Some(step)) = (extract(start)?, extract(stop)?, extract(delta)?) {
            let from = scalar(from)?;
            if graph.options().is_rank_marker(&stop.name) {
                return Ok(Binding::Resolved([from, from + 1.0, 1.0]));
            }
            return Ok(Binding::Resolved([from, scalar(to)?, scalar(step)?]));
        }

        for operand in [start, stop, delta] {
            graph.variable_id(&operand.name)?;
        }

        log::debug!(
            "Deferring arguments of {} until {}, {} and {} hold values",
            node.name, start.name, stop.name, delta.name
        );
        let refs = OperandRefs::new(&start.name, &stop.name, &delta.name)
            .with_rank_marker_stop(graph.options().is_rank_marker(&stop.name));
        Ok(Binding::Deferred(refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::options::ImportOptions;
    use crate::model::{Attribute, ConstTensor, DataType, TensorPayload};
    use crate::parser::constant_extractor::{ValueAttributeExtractor, VALUE_ATTRIBUTE};

    fn constant(name: &str, value: f64) -> ForeignNode {
        ForeignNode::new(name, "Const", &[]).with_attribute(
            VALUE_ATTRIBUTE,
            Attribute::Tensor(ConstTensor {
                data_type: DataType::Float64,
                dims: vec![],
                payload: TensorPayload::Double(vec![value]),
            }),
        )
    }

    fn graph_for(foreign: &ForeignGraph) -> Graph {
        let mut graph = Graph::new(ImportOptions::default());
        for node in &foreign.nodes {
            graph.add_variable(&node.name);
        }
        graph
    }

    fn context(foreign: &ForeignGraph) -> ImportContext<'_> {
        ImportContext {
            foreign,
            extractor: &ValueAttributeExtractor,
        }
    }

    #[test]
    fn test_all_constant_operands_resolve() {
        let range = ForeignNode::new("r", "Range", &["s", "l:0", "d"]);
        let foreign = ForeignGraph::new(vec![
            constant("s", 2.0),
            constant("l", 8.0),
            constant("d", 3.0),
            range.clone(),
        ]);
        let graph = graph_for(&foreign);

        let binding = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap();
        assert_eq!(binding, Binding::Resolved([2.0, 8.0, 3.0]));
    }

    #[test]
    fn test_rank_marker_end_operand() {
        let range = ForeignNode::new("r", "Range", &["s", "Rank", "d"]);
        let foreign = ForeignGraph::new(vec![
            constant("s", 3.0),
            constant("Rank", 40.0),
            constant("d", 7.0),
            range.clone(),
        ]);
        let graph = graph_for(&foreign);

        let binding = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap();
        assert_eq!(binding, Binding::Resolved([3.0, 4.0, 1.0]));
    }

    #[test]
    fn test_placeholder_operand_defers() {
        let range = ForeignNode::new("r", "Range", &["s", "l", "d"]);
        let foreign = ForeignGraph::new(vec![
            constant("s", 0.0),
            constant("l", 8.0),
            ForeignNode::new("d", "Placeholder", &[]),
            range.clone(),
        ]);
        let graph = graph_for(&foreign);

        let binding = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap();
        assert_eq!(binding, Binding::Deferred(OperandRefs::new("s", "l", "d")));
    }

    #[test]
    fn test_deferred_rank_marker_is_recorded() {
        let range = ForeignNode::new("r", "Range", &["s", "Rank", "d"]);
        let foreign = ForeignGraph::new(vec![
            ForeignNode::new("s", "Placeholder", &[]),
            constant("Rank", 40.0),
            constant("d", 7.0),
            range.clone(),
        ]);
        let graph = graph_for(&foreign);

        let binding = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap();
        assert_eq!(
            binding,
            Binding::Deferred(OperandRefs::new("s", "Rank", "d").with_rank_marker_stop(true))
        );
    }

    #[test]
    fn test_deferred_operand_needs_variable() {
        let range = ForeignNode::new("r", "Range", &["s", "l", "d"]);
        let foreign = ForeignGraph::new(vec![
            constant("s", 0.0),
            constant("l", 8.0),
            ForeignNode::new("d", "Placeholder", &[]),
            range.clone(),
        ]);
        let graph = Graph::default();

        let err = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap_err();
        assert!(matches!(err, Error::UnknownVariable(ref name) if name == "s"));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let range = ForeignNode::new("r", "Range", &["s", "l", "d"]);
        let foreign = ForeignGraph::new(vec![
            constant("s", 1.0),
            constant("s", 100.0),
            constant("l", 5.0),
            constant("d", 1.0),
            range.clone(),
        ]);
        let graph = graph_for(&foreign);

        let binding = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap();
        assert_eq!(binding, Binding::Resolved([1.0, 5.0, 1.0]));
    }

    #[test]
    fn test_missing_operand_names_position() {
        let range = ForeignNode::new("r", "Range", &["s", "nowhere", "d"]);
        let foreign = ForeignGraph::new(vec![constant("s", 0.0), constant("d", 1.0), range.clone()]);
        let graph = graph_for(&foreign);

        let err = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap_err();
        assert!(err.is_import_error());
        assert!(matches!(
            err,
            Error::MissingOperand { position: "stop", ref input, .. } if input == "nowhere"
        ));
    }

    #[test]
    fn test_too_few_inputs() {
        let range = ForeignNode::new("r", "Range", &["s", "l"]);
        let foreign = ForeignGraph::new(vec![constant("s", 0.0), constant("l", 1.0), range.clone()]);
        let graph = graph_for(&foreign);

        let err = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap_err();
        assert!(matches!(err, Error::MissingOperand { position: "delta", .. }));
    }

    #[test]
    fn test_malformed_constant_is_import_error() {
        let broken = ForeignNode::new("d", "Const", &[]).with_attribute(
            VALUE_ATTRIBUTE,
            Attribute::Tensor(ConstTensor {
                data_type: DataType::Float32,
                dims: vec![],
                payload: TensorPayload::Raw(vec![1, 2, 3]),
            }),
        );
        let range = ForeignNode::new("r", "Range", &["s", "l", "d"]);
        let foreign = ForeignGraph::new(vec![constant("s", 0.0), constant("l", 1.0), broken, range.clone()]);
        let graph = graph_for(&foreign);

        let err = DeferredImportBinder::bind(&range, &graph, context(&foreign)).unwrap_err();
        assert!(matches!(err, Error::Import { ref node, .. } if node == "r"));
    }
}
