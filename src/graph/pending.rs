use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::error::{Error, Result};

use super::VariableId;

/// Operators waiting for their referenced variables to hold concrete values.
///
/// Each pending operator output depends on the operand variables it
/// references; resolution visits outputs in dependency order so chains of
/// deferred operators settle in a single pass.
#[derive(Debug, Default)]
pub struct PendingResolutions {
    dependencies: DiGraphMap<VariableId, ()>,
    /// Pending output variable -> index of the producing operator
    waiting: BTreeMap<VariableId, usize>,
}

impl PendingResolutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `output` (produced by operator `op_index`) waits on `inputs`
    pub fn enqueue(&mut self, output: VariableId, op_index: usize, inputs: &[VariableId]) {
        self.dependencies.add_node(output);
        for &input in inputs {
            self.dependencies.add_edge(input, output, ());
        }
        self.waiting.insert(output, op_index);
    }

    /// Drop `output` from the worklist once its producer has been finalized
    pub fn complete(&mut self, output: VariableId) {
        self.waiting.remove(&output);
        self.dependencies.remove_node(output);
    }

    pub fn is_pending(&self, output: VariableId) -> bool {
        self.waiting.contains_key(&output)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn outputs(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.waiting.keys().copied()
    }

    /// Pending outputs with their producing operators, operands before dependents
    pub fn resolution_order(&self) -> Result<Vec<(VariableId, usize)>> {
        let order = toposort(&self.dependencies, None).map_err(|cycle| {
            Error::InvalidGraph(format!(
                "Deferred references form a cycle through variable {}",
                cycle.node_id().0
            ))
        })?;

        Ok(order
            .into_iter()
            .filter_map(|var| self.waiting.get(&var).map(|&op| (var, op)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_follows_dependencies() {
        let mut pending = PendingResolutions::new();
        // output 5 depends on output 4, which depends on placeholder 1
        pending.enqueue(VariableId(5), 1, &[VariableId(4), VariableId(2)]);
        pending.enqueue(VariableId(4), 0, &[VariableId(1), VariableId(2), VariableId(3)]);

        let order = pending.resolution_order().unwrap();
        assert_eq!(order, vec![(VariableId(4), 0), (VariableId(5), 1)]);
        assert_eq!(pending.len(), 2);

        pending.complete(VariableId(4));
        assert!(!pending.is_pending(VariableId(4)));
        assert!(pending.is_pending(VariableId(5)));
        assert_eq!(pending.resolution_order().unwrap(), vec![(VariableId(5), 1)]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut pending = PendingResolutions::new();
        pending.enqueue(VariableId(0), 0, &[VariableId(1)]);
        pending.enqueue(VariableId(1), 1, &[VariableId(0)]);
        assert!(matches!(pending.resolution_order(), Err(Error::InvalidGraph(_))));
    }
}
