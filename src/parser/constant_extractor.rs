use crate::error::{Error, Result};
use crate::model::{Attribute, ForeignGraph, ForeignNode};
use crate::ops::tensor::Tensor;

/// Attribute holding the payload of constant nodes
pub const VALUE_ATTRIBUTE: &str = "value";

/// Reads the constant value embedded in a foreign node, if it has one
pub trait ConstantExtractor: Send + Sync {
    /// `Ok(None)` for nodes that are not constant-valued, such as placeholders
    fn extract(&self, node: &ForeignNode, foreign: &ForeignGraph) -> Result<Option<Tensor>>;
}

/// Extracts the tensor stored in a node's `value` attribute
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueAttributeExtractor;

impl ConstantExtractor for ValueAttributeExtractor {
    fn extract(&self, node: &ForeignNode, _foreign: &ForeignGraph) -> Result<Option<Tensor>> {
        match node.attribute(VALUE_ATTRIBUTE) {
            Some(Attribute::Tensor(constant)) => {
                let tensor = Tensor::from_const(constant)?;
                Ok(Some(tensor.with_name(&node.name)))
            }
            Some(other) => Err(Error::InvalidArgument(format!(
                "Attribute {} of node {} is not a tensor: {:?}",
                VALUE_ATTRIBUTE, node.name, other
            ))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstTensor, DataType, TensorPayload};

    #[test]
    fn test_const_node_yields_tensor() {
        let node = ForeignNode::new("c", "Const", &[]).with_attribute(
            VALUE_ATTRIBUTE,
            Attribute::Tensor(ConstTensor {
                data_type: DataType::Float32,
                dims: vec![],
                payload: TensorPayload::Float(vec![2.5]),
            }),
        );
        let graph = ForeignGraph::new(vec![node.clone()]);

        let tensor = ValueAttributeExtractor.extract(&node, &graph).unwrap().unwrap();
        assert_eq!(tensor.name.as_deref(), Some("c"));
        assert_eq!(tensor.scalar_f64().unwrap(), 2.5);
    }

    #[test]
    fn test_placeholder_has_no_constant() {
        let node = ForeignNode::new("p", "Placeholder", &[]);
        let graph = ForeignGraph::new(vec![node.clone()]);
        assert!(ValueAttributeExtractor.extract(&node, &graph).unwrap().is_none());
    }

    #[test]
    fn test_non_tensor_value_is_an_error() {
        let node = ForeignNode::new("c", "Const", &[]).with_attribute(VALUE_ATTRIBUTE, Attribute::Int(3));
        let graph = ForeignGraph::new(vec![node.clone()]);
        assert!(ValueAttributeExtractor.extract(&node, &graph).is_err());
    }
}
