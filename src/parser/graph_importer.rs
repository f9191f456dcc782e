use crate::error::{Error, Result};
use crate::graph::options::ImportOptions;
use crate::graph::Graph;
use crate::model::{Attribute, ForeignGraph, ForeignNode};
use crate::ops::registry::{ImportContext, OperatorRegistry};

use super::constant_extractor::{ConstantExtractor, ValueAttributeExtractor};

/// Ops that only provide values and are never built into operators
pub const SOURCE_OPS: [&str; 4] = ["Const", "Placeholder", "PlaceholderWithDefault", "NoOp"];

const SHAPE_ATTRIBUTE: &str = "shape";

/// Result of importing a foreign graph
#[derive(Debug)]
pub struct ImportOutcome {
    pub graph: Graph,
    /// Nodes that could not be imported, with the reason
    pub failures: Vec<(String, Error)>,
}

impl ImportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_for(&self, node: &str) -> Option<&Error> {
        self.failures
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, error)| error)
    }
}

/// Builds an internal graph from a foreign one
pub struct GraphImporter {
    options: ImportOptions,
    registry: OperatorRegistry,
    extractor: Box<dyn ConstantExtractor>,
}

impl GraphImporter {
    /// Importer with the standard operators and the `value` attribute extractor
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            registry: OperatorRegistry::initialize_standard_operators(),
            extractor: Box::new(ValueAttributeExtractor),
        }
    }

    pub fn with_registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_extractor<E: ConstantExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import every node of `foreign`.
    ///
    /// Constants and placeholders become variables, everything else is built
    /// through the registry. Nodes that fail are collected in the outcome
    /// unless `fail_fast` is set. Deferred operators whose operands were
    /// resolved by other operators during the import are finalized before
    /// returning; those that fail then are recorded like any other node.
    pub fn import(&self, foreign: &ForeignGraph) -> Result<ImportOutcome> {
        let mut graph = Graph::new(self.options.clone());
        let mut failures = Vec::new();

        for node in &foreign.nodes {
            graph.add_variable(&node.name);
        }

        for node in &foreign.nodes {
            if let Err(e) = self.import_value(node, foreign, &mut graph) {
                self.record_failure(&mut failures, &node.name, &node.op, e)?;
            }
        }

        let context = ImportContext {
            foreign,
            extractor: self.extractor.as_ref(),
        };

        let mut operator_count = 0;
        for node in foreign.nodes.iter().filter(|n| !SOURCE_OPS.contains(&n.op.as_str())) {
            match self.import_operator(node, &mut graph, context) {
                Ok(()) => operator_count += 1,
                Err(e) => self.record_failure(&mut failures, &node.name, &node.op, e)?,
            }
        }

        let resolution = graph.resolve_pending()?;
        for (name, e) in resolution.failed {
            let op = foreign.node(&name).map_or("", |n| n.op.as_str());
            self.record_failure(&mut failures, &name, op, e)?;
        }

        log::info!(
            "Imported {} nodes: {} operators, {} resolved after import, {} pending, {} failed",
            foreign.nodes.len(),
            operator_count,
            resolution.resolved.len(),
            graph.pending_outputs().len(),
            failures.len()
        );

        Ok(ImportOutcome { graph, failures })
    }

    /// Record the constant value or declared shape of a node
    fn import_value(&self, node: &ForeignNode, foreign: &ForeignGraph, graph: &mut Graph) -> Result<()> {
        // duplicate names keep the first node's value
        if graph.is_shape_known(&node.name) {
            return Ok(());
        }

        match self.extractor.extract(node, foreign) {
            Ok(Some(value)) => graph.put_array(&node.name, value),
            Ok(None) => match node.attribute(SHAPE_ATTRIBUTE) {
                Some(Attribute::Shape(Some(dims))) if dims.iter().all(|&d| d >= 0) => {
                    graph.put_shape(&node.name, dims.iter().map(|&d| d as usize).collect())
                }
                _ => Ok(()),
            },
            Err(e) => Err(Error::import(&node.name, format!("cannot read constant: {}", e))),
        }
    }

    fn import_operator(
        &self,
        node: &ForeignNode,
        graph: &mut Graph,
        context: ImportContext<'_>,
    ) -> Result<()> {
        let mut operator = self.registry.create_operator_for_node(node)?;
        operator.init_from_foreign(node, graph, context)?;
        graph.add_operator(operator)
    }

    fn record_failure(
        &self,
        failures: &mut Vec<(String, Error)>,
        node: &str,
        op: &str,
        error: Error,
    ) -> Result<()> {
        if self.options.fail_fast {
            return Err(error);
        }

        log::warn!("Skipping node {} ({}): {}", node, op, error);
        failures.push((node.to_string(), error));
        Ok(())
    }
}

impl Default for GraphImporter {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}
