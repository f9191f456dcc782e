pub mod arguments;
pub mod range;
pub mod registry;
pub mod sequence;
pub mod tensor;

pub mod prelude {
    pub use super::arguments::{ArgumentSlots, ArgumentSource, OperandRefs};
    pub use super::range::Range;
    pub use super::registry::{Operator, OperatorRegistry};
    pub use super::tensor::{DataType, Shape, Tensor};
}

pub use arguments::{ArgumentSlots, ArgumentSource, OperandRefs};
pub use range::Range;
pub use registry::{ImportContext, OpType, Operator, OperatorRegistry};
pub use tensor::{DataType, Shape, Tensor};
