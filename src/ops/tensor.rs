use std::fmt;

use half::{bf16, f16};
use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};
use crate::model::{ConstTensor, TensorPayload};

pub use crate::model::DataType;

/// Shape of a tensor
pub type Shape = Vec<usize>;

/// Tensor struct for runtime computation
#[derive(Clone, PartialEq)]
pub struct Tensor {
    pub name: Option<String>,
    pub data_type: DataType,
    pub shape: Shape,
    // Values are held as f64 whatever the logical type; every supported
    // integer type up to 2^53 is exact in this representation
    pub data: ArrayD<f64>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor {{ name: {:?}, data_type: {:?}, shape: {:?} }}",
               self.name, self.data_type, self.shape)
    }
}

impl Tensor {
    /// Create a zero-filled tensor
    pub fn new(shape: &[usize], data_type: DataType) -> Self {
        Self {
            name: None,
            data_type,
            shape: shape.to_vec(),
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    /// Create a rank-0 tensor holding one value
    pub fn scalar(value: f64, data_type: DataType) -> Self {
        Self {
            name: None,
            data_type,
            shape: Vec::new(),
            data: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    /// Create a tensor from a flat value vector
    pub fn from_vec(values: Vec<f64>, shape: &[usize], data_type: DataType) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| Error::InvalidArgument(format!("Shape mismatch: {}", e)))?;

        Ok(Self {
            name: None,
            data_type,
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a flat (row-major) index
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        self.data.iter().nth(index).copied()
    }

    /// First element, the value of a scalar operand
    pub fn scalar_f64(&self) -> Result<f64> {
        self.get_f64(0).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Expected a scalar value but tensor {:?} is empty",
                self.name.as_deref().unwrap_or("<unnamed>")
            ))
        })
    }

    /// Decode a constant tensor embedded in a foreign graph
    pub fn from_const(tensor: &ConstTensor) -> Result<Self> {
        if tensor.data_type == DataType::String || tensor.data_type == DataType::Undefined {
            return Err(Error::UnsupportedFeature(format!(
                "Constant of type {} cannot be read as numbers", tensor.data_type
            )));
        }

        let mut shape = Vec::with_capacity(tensor.dims.len());
        for &dim in &tensor.dims {
            if dim < 0 {
                return Err(Error::InvalidArgument(format!(
                    "Constant has unknown dimension {} in {:?}", dim, tensor.dims
                )));
            }
            shape.push(dim as usize);
        }

        let count = element_count(&shape)?;
        let values = match &tensor.payload {
            TensorPayload::Raw(bytes) => decode_raw(bytes, count, tensor.data_type)?,
            TensorPayload::Float(v) => expand(v.iter().map(|&x| x as f64).collect(), count)?,
            TensorPayload::Double(v) => expand(v.clone(), count)?,
            TensorPayload::Int32(v) => expand(v.iter().map(|&x| x as f64).collect(), count)?,
            TensorPayload::Int64(v) => expand(v.iter().map(|&x| x as f64).collect(), count)?,
            TensorPayload::Bool(v) => {
                expand(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(), count)?
            }
            TensorPayload::Half(v) => {
                let widened = v
                    .iter()
                    .map(|&bits| half_to_f64(bits as u16, tensor.data_type))
                    .collect::<Result<Vec<_>>>()?;
                expand(widened, count)?
            }
            TensorPayload::Empty => vec![0.0; count],
        };

        Self::from_vec(values, &shape, tensor.data_type)
    }
}

/// Largest element count a constant may declare
pub const MAX_CONSTANT_ELEMENTS: usize = 1 << 28;

fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |count, &dim| count.checked_mul(dim))
        .filter(|&count| count <= MAX_CONSTANT_ELEMENTS)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Constant shape {:?} exceeds {} elements", shape, MAX_CONSTANT_ELEMENTS
            ))
        })
}

/// Apply the value-list convention of the foreign format: an empty list is all
/// zeros and a short list repeats its last value.
fn expand(mut values: Vec<f64>, count: usize) -> Result<Vec<f64>> {
    if values.len() > count {
        return Err(Error::InvalidArgument(format!(
            "Constant holds {} values but its shape has {} elements", values.len(), count
        )));
    }

    let fill = values.last().copied().unwrap_or(0.0);
    values.resize(count, fill);
    Ok(values)
}

fn decode_raw(bytes: &[u8], count: usize, data_type: DataType) -> Result<Vec<f64>> {
    let size = data_type.size_in_bytes().ok_or_else(|| {
        Error::UnsupportedFeature(format!("Packed content of type {} is not supported", data_type))
    })?;

    let expected = count.checked_mul(size).ok_or_else(|| {
        Error::InvalidArgument(format!("Byte size of {} elements overflows", count))
    })?;
    if bytes.len() != expected {
        return Err(Error::InvalidArgument(format!(
            "Tensor data size mismatch. Expected {} bytes but got {}",
            expected, bytes.len()
        )));
    }

    bytes
        .chunks_exact(size)
        .map(|chunk| decode_element(chunk, data_type))
        .collect()
}

fn decode_element(chunk: &[u8], data_type: DataType) -> Result<f64> {
    let value = match data_type {
        DataType::Float32 => f32::from_le_bytes(to_array(chunk)?) as f64,
        DataType::Float64 => f64::from_le_bytes(to_array(chunk)?),
        DataType::Float16 | DataType::BFloat16 => {
            half_to_f64(u16::from_le_bytes(to_array(chunk)?), data_type)?
        }
        DataType::Int8 => chunk[0] as i8 as f64,
        DataType::Uint8 => chunk[0] as f64,
        DataType::Bool => if chunk[0] != 0 { 1.0 } else { 0.0 },
        DataType::Int16 => i16::from_le_bytes(to_array(chunk)?) as f64,
        DataType::Uint16 => u16::from_le_bytes(to_array(chunk)?) as f64,
        DataType::Int32 => i32::from_le_bytes(to_array(chunk)?) as f64,
        DataType::Uint32 => u32::from_le_bytes(to_array(chunk)?) as f64,
        DataType::Int64 => i64::from_le_bytes(to_array(chunk)?) as f64,
        DataType::Uint64 => u64::from_le_bytes(to_array(chunk)?) as f64,
        DataType::String | DataType::Undefined => {
            return Err(Error::UnsupportedFeature(format!(
                "Cannot decode element of type {}", data_type
            )))
        }
    };

    Ok(value)
}

fn to_array<const N: usize>(chunk: &[u8]) -> Result<[u8; N]> {
    chunk
        .try_into()
        .map_err(|_| Error::InvalidArgument(format!("Expected {} bytes, got {}", N, chunk.len())))
}

fn half_to_f64(bits: u16, data_type: DataType) -> Result<f64> {
    match data_type {
        DataType::Float16 => Ok(f16::from_bits(bits).to_f64()),
        DataType::BFloat16 => Ok(bf16::from_bits(bits).to_f64()),
        other => Err(Error::InvalidArgument(format!(
            "16-bit float values found in a constant of type {}", other
        ))),
    }
}
