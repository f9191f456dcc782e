use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::{Buf, Bytes};
use prost::Message;

use crate::error::{Error, Result};
use crate::model::{Attribute, ConstTensor, DataType, ForeignGraph, ForeignNode, TensorPayload};
use crate::proto::attr_value::{ListValue, Value};
use crate::proto::{AttrValue, GraphDef, NodeDef, TensorProto, TensorShapeProto};

/// Loader for serialized foreign graphs
pub struct GraphLoader;

impl GraphLoader {
    /// Load a foreign graph from a file path
    pub fn load_graph(path: &Path) -> Result<ForeignGraph> {
        let mut file = File::open(path).map_err(|e| {
            Error::ModelLoadError(path.to_path_buf(), format!("Failed to open file: {}", e))
        })?;

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).map_err(|e| {
            Error::ModelLoadError(path.to_path_buf(), format!("Failed to read file: {}", e))
        })?;

        log::debug!("Read {} bytes of graph from {}", buffer.len(), path.display());
        Self::load_graph_from_bytes(Bytes::from(buffer))
    }

    /// Load a foreign graph from serialized bytes
    pub fn load_graph_from_bytes<B: Buf>(data: B) -> Result<ForeignGraph> {
        let graph_def = Self::deserialize_graph_def(data)?;
        Self::convert_proto_to_internal(graph_def)
    }

    /// Deserialize protobuf bytes into a GraphDef
    pub fn deserialize_graph_def<B: Buf>(data: B) -> Result<GraphDef> {
        GraphDef::decode(data).map_err(Error::ProtobufError)
    }

    /// Convert a protobuf graph to the internal representation
    pub fn convert_proto_to_internal(proto: GraphDef) -> Result<ForeignGraph> {
        let producer_version = proto.versions.as_ref().map_or(0, |v| v.producer);

        let nodes = proto
            .node
            .into_iter()
            .map(Self::convert_node_def)
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Converted foreign graph with {} nodes (producer version {})",
            nodes.len(),
            producer_version
        );

        Ok(ForeignGraph {
            nodes,
            producer_version,
        })
    }

    fn convert_node_def(node: NodeDef) -> Result<ForeignNode> {
        if node.name.is_empty() {
            return Err(Error::InvalidGraph(format!("Node of op {} has no name", node.op)));
        }

        let mut attributes = HashMap::with_capacity(node.attr.len());
        for (name, value) in &node.attr {
            match Self::convert_attr_value(value) {
                Ok(Some(attribute)) => {
                    attributes.insert(name.clone(), attribute);
                }
                Ok(None) => {
                    log::warn!("Attribute {} of node {} has no value, skipping", name, node.name);
                }
                Err(e) => {
                    return Err(Error::InvalidGraph(format!(
                        "Attribute {} of node {}: {}", name, node.name, e
                    )))
                }
            }
        }

        Ok(ForeignNode {
            name: node.name,
            op: node.op,
            inputs: node.input,
            device: node.device,
            attributes,
        })
    }

    fn convert_attr_value(attr: &AttrValue) -> Result<Option<Attribute>> {
        let attribute = match &attr.value {
            None => return Ok(None),
            Some(Value::S(bytes)) => Attribute::String(String::from_utf8_lossy(bytes).into_owned()),
            Some(Value::I(i)) => Attribute::Int(*i),
            Some(Value::F(f)) => Attribute::Float(*f),
            Some(Value::B(b)) => Attribute::Bool(*b),
            Some(Value::Type(t)) => Attribute::Type(DataType::from_proto(*t)),
            Some(Value::Shape(shape)) => Attribute::Shape(Self::convert_shape(shape)),
            Some(Value::Tensor(tensor)) => Attribute::Tensor(Self::convert_tensor_proto(tensor)?),
            Some(Value::List(list)) => Self::convert_list_value(list),
        };

        Ok(Some(attribute))
    }

    /// Lists carry a single populated field; an empty list becomes an empty
    /// integer list
    fn convert_list_value(list: &ListValue) -> Attribute {
        if !list.s.is_empty() {
            Attribute::Strings(
                list.s
                    .iter()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect(),
            )
        } else if !list.f.is_empty() {
            Attribute::Floats(list.f.clone())
        } else if !list.b.is_empty() {
            Attribute::Bools(list.b.clone())
        } else if !list.r#type.is_empty() {
            Attribute::Types(list.r#type.iter().map(|&t| DataType::from_proto(t)).collect())
        } else {
            Attribute::Ints(list.i.clone())
        }
    }

    fn convert_shape(shape: &TensorShapeProto) -> Option<Vec<i64>> {
        if shape.unknown_rank {
            None
        } else {
            Some(shape.dim.iter().map(|d| d.size).collect())
        }
    }

    /// Convert a TensorProto to a constant tensor
    fn convert_tensor_proto(tensor: &TensorProto) -> Result<ConstTensor> {
        let data_type = DataType::from_proto(tensor.dtype);

        let dims = match tensor.tensor_shape.as_ref().map(Self::convert_shape) {
            Some(Some(dims)) => dims,
            Some(None) => {
                return Err(Error::UnsupportedFeature(
                    "Constant tensor of unknown rank".to_string(),
                ))
            }
            None => Vec::new(),
        };

        let payload = if !tensor.tensor_content.is_empty() {
            TensorPayload::Raw(tensor.tensor_content.clone())
        } else {
            match data_type {
                DataType::Float32 => TensorPayload::Float(tensor.float_val.clone()),
                DataType::Float64 => TensorPayload::Double(tensor.double_val.clone()),
                DataType::Int64 => TensorPayload::Int64(tensor.int64_val.clone()),
                DataType::Int32
                | DataType::Int16
                | DataType::Int8
                | DataType::Uint16
                | DataType::Uint8 => TensorPayload::Int32(tensor.int_val.clone()),
                DataType::Uint32 => {
                    TensorPayload::Int64(tensor.uint32_val.iter().map(|&v| v as i64).collect())
                }
                DataType::Uint64 => {
                    TensorPayload::Double(tensor.uint64_val.iter().map(|&v| v as f64).collect())
                }
                DataType::Bool => TensorPayload::Bool(tensor.bool_val.clone()),
                DataType::Float16 | DataType::BFloat16 => TensorPayload::Half(tensor.half_val.clone()),
                DataType::String | DataType::Undefined => TensorPayload::Empty,
            }
        };

        Ok(ConstTensor {
            data_type,
            dims,
            payload,
        })
    }
}
