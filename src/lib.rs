pub mod error;
pub mod graph;
pub mod model;
pub mod ops;
pub mod parser;
pub mod proto;

// Re-export commonly used types
pub use error::{Error, Result};
pub use graph::options::ImportOptions;
pub use graph::{Graph, Resolution, Variable, VariableId};
pub use model::{Attribute, ConstTensor, DataType, ForeignGraph, ForeignNode, TensorPayload};
pub use ops::range::Range;
pub use ops::registry::{Operator, OperatorRegistry};
pub use ops::tensor::Tensor;
pub use parser::{GraphImporter, GraphLoader, ImportOutcome};
