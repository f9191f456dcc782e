use std::collections::HashMap;

use strum_macros::{Display, EnumString};

/// Element data types shared by foreign constants and runtime tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum DataType {
    Undefined,
    Float32,
    Float64,
    Float16,
    BFloat16,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Bool,
    String,
}

impl DataType {
    /// Map a foreign `DataType` enumeration value
    pub fn from_proto(proto_type: i32) -> Self {
        use crate::proto::DataType as Dt;

        match Dt::from_i32(proto_type) {
            Some(Dt::DtFloat) => DataType::Float32,
            Some(Dt::DtDouble) => DataType::Float64,
            Some(Dt::DtHalf) => DataType::Float16,
            Some(Dt::DtBfloat16) => DataType::BFloat16,
            Some(Dt::DtInt8) => DataType::Int8,
            Some(Dt::DtInt16) => DataType::Int16,
            Some(Dt::DtInt32) => DataType::Int32,
            Some(Dt::DtInt64) => DataType::Int64,
            Some(Dt::DtUint8) => DataType::Uint8,
            Some(Dt::DtUint16) => DataType::Uint16,
            Some(Dt::DtUint32) => DataType::Uint32,
            Some(Dt::DtUint64) => DataType::Uint64,
            Some(Dt::DtBool) => DataType::Bool,
            Some(Dt::DtString) => DataType::String,
            Some(Dt::DtInvalid) | None => DataType::Undefined,
        }
    }

    /// Get the size in bytes of one element in a packed payload
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            DataType::Float64 | DataType::Int64 | DataType::Uint64 => Some(8),
            DataType::Float32 | DataType::Int32 | DataType::Uint32 => Some(4),
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 | DataType::Uint16 => Some(2),
            DataType::Int8 | DataType::Uint8 | DataType::Bool => Some(1),
            DataType::String | DataType::Undefined => None,
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            DataType::Float32 | DataType::Float64 | DataType::Float16 | DataType::BFloat16
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Uint8
                | DataType::Uint16
                | DataType::Uint32
                | DataType::Uint64
        )
    }
}

/// Values carried by a constant tensor, in whichever encoding the producer chose
#[derive(Debug, Clone, PartialEq)]
pub enum TensorPayload {
    /// Packed little-endian element bytes
    Raw(Vec<u8>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    /// 16-bit float bit patterns widened to i32
    Half(Vec<i32>),
    Empty,
}

/// Constant tensor embedded in a foreign node attribute
#[derive(Debug, Clone, PartialEq)]
pub struct ConstTensor {
    pub data_type: DataType,
    /// Dimensions, `-1` for unknown. Empty for scalars.
    pub dims: Vec<i64>,
    pub payload: TensorPayload,
}

/// Foreign node attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    String(String),
    Int(i64),
    Float(f32),
    Bool(bool),
    Type(DataType),
    /// `None` when the rank is unknown
    Shape(Option<Vec<i64>>),
    Tensor(ConstTensor),

    // List types
    Strings(Vec<String>),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Bools(Vec<bool>),
    Types(Vec<DataType>),
}

/// Node of the foreign graph
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignNode {
    pub name: String,
    pub op: String,
    /// Input references by name, possibly with `^` or `:N` decorations
    pub inputs: Vec<String>,
    pub device: String,
    pub attributes: HashMap<String, Attribute>,
}

impl ForeignNode {
    pub fn new(name: &str, op: &str, inputs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            op: op.to_string(),
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
            device: String::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: Attribute) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// Already-parsed foreign graph, nodes in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignGraph {
    pub nodes: Vec<ForeignNode>,
    pub producer_version: i32,
}

impl ForeignGraph {
    pub fn new(nodes: Vec<ForeignNode>) -> Self {
        Self {
            nodes,
            producer_version: 0,
        }
    }

    /// First node with the given name
    pub fn node(&self, name: &str) -> Option<&ForeignNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Strip the control-dependency prefix and output port from an input reference
///
/// `"^init"` becomes `"init"`, `"range/start:0"` becomes `"range/start"`.
pub fn node_name(reference: &str) -> &str {
    let name = reference.strip_prefix('^').unwrap_or(reference);
    match name.rsplit_once(':') {
        Some((base, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_name_normalization() {
        assert_eq!(node_name("range/start"), "range/start");
        assert_eq!(node_name("range/start:0"), "range/start");
        assert_eq!(node_name("^init"), "init");
        assert_eq!(node_name("split:12"), "split");
        assert_eq!(node_name("odd:name"), "odd:name");
    }

    #[test]
    fn test_data_type_from_proto() {
        assert_eq!(DataType::from_proto(1), DataType::Float32);
        assert_eq!(DataType::from_proto(9), DataType::Int64);
        assert_eq!(DataType::from_proto(19), DataType::Float16);
        assert_eq!(DataType::from_proto(1000), DataType::Undefined);
        assert_eq!("Int32".parse::<DataType>().unwrap(), DataType::Int32);
        assert_eq!(DataType::Float64.to_string(), "Float64");
    }

    #[test]
    fn test_first_node_by_name_wins() {
        let graph = ForeignGraph::new(vec![
            ForeignNode::new("a", "Const", &[]),
            ForeignNode::new("a", "Placeholder", &[]),
        ]);
        assert_eq!(graph.node("a").map(|n| n.op.as_str()), Some("Const"));
        assert!(graph.node("b").is_none());
    }
}
