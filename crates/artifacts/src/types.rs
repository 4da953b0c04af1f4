//! Core array types shared by the codec and the key tree

use crate::{ArtifactError, Result};

/// Fixed-width element types understood by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DType {
    /// Little-endian type descriptor as written into array headers.
    pub fn descr(self) -> &'static str {
        match self {
            DType::Bool => "|b1",
            DType::U8 => "|u1",
            DType::I8 => "|i1",
            DType::U16 => "<u2",
            DType::I16 => "<i2",
            DType::U32 => "<u4",
            DType::I32 => "<i4",
            DType::U64 => "<u8",
            DType::I64 => "<i8",
            DType::F32 => "<f4",
            DType::F64 => "<f8",
        }
    }

    pub fn from_descr(descr: &str) -> Option<Self> {
        Some(match descr {
            "|b1" => DType::Bool,
            "|u1" => DType::U8,
            "|i1" => DType::I8,
            "<u2" => DType::U16,
            "<i2" => DType::I16,
            "<u4" => DType::U32,
            "<i4" => DType::I32,
            "<u8" => DType::U64,
            "<i8" => DType::I64,
            "<f4" => DType::F32,
            "<f8" => DType::F64,
            _ => return None,
        })
    }

    /// Element width in bytes
    pub fn size(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }
}

/// A Rust scalar that can be stored in an [`NdArray`].
pub trait Element: Copy {
    const DTYPE: DType;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `DTYPE.size()` long.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! numeric_element {
    ($($t:ty => $dtype:expr),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = $dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

numeric_element! {
    u8 => DType::U8,
    i8 => DType::I8,
    u16 => DType::U16,
    i16 => DType::I16,
    u32 => DType::U32,
    i32 => DType::I32,
    u64 => DType::U64,
    i64 => DType::I64,
    f32 => DType::F32,
    f64 => DType::F64,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Element type and dimensions of an encoded array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayHeader {
    pub dtype: DType,
    pub shape: Vec<usize>,
}

impl ArrayHeader {
    pub fn descr(&self) -> &'static str {
        self.dtype.descr()
    }

    /// Payload size implied by `shape * element_size`, `None` on overflow.
    pub fn payload_len(&self) -> Option<usize> {
        element_count(&self.shape)?.checked_mul(self.dtype.size())
    }
}

/// Homogeneous N-dimensional array, row-major, little-endian bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl NdArray {
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let expected = element_count(&shape)
            .ok_or_else(|| ArtifactError::ShapeMismatch(format!("shape {shape:?} overflows")))?;
        if expected != values.len() {
            return Err(ArtifactError::ShapeMismatch(format!(
                "shape {shape:?} holds {expected} elements, got {}",
                values.len()
            )));
        }

        let mut data = Vec::with_capacity(values.len() * T::DTYPE.size());
        for v in values {
            v.write_le(&mut data);
        }

        Ok(Self { dtype: T::DTYPE, shape, data })
    }

    /// One-dimensional array over `values`.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.size());
        for v in values {
            v.write_le(&mut data);
        }
        Self { dtype: T::DTYPE, shape: vec![values.len()], data }
    }

    /// Zero-dimensional array holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut data = Vec::with_capacity(T::DTYPE.size());
        value.write_le(&mut data);
        Self { dtype: T::DTYPE, shape: Vec::new(), data }
    }

    /// Wrap raw little-endian bytes, checking them against `header`.
    pub fn from_raw(header: ArrayHeader, data: Vec<u8>) -> Result<Self> {
        match header.payload_len() {
            Some(len) if len == data.len() => Ok(Self {
                dtype: header.dtype,
                shape: header.shape,
                data,
            }),
            Some(len) => Err(ArtifactError::ShapeMismatch(format!(
                "{} {:?} needs {len} bytes, got {}",
                header.dtype.descr(),
                header.shape,
                data.len()
            ))),
            None => Err(ArtifactError::ShapeMismatch(format!(
                "shape {:?} overflows",
                header.shape
            ))),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> ArrayHeader {
        ArrayHeader {
            dtype: self.dtype,
            shape: self.shape.clone(),
        }
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(ArtifactError::ShapeMismatch(format!(
                "array holds {}, requested {}",
                self.dtype.descr(),
                T::DTYPE.descr()
            )));
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.size())
            .map(T::read_le)
            .collect())
    }
}

fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}
