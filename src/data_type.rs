use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use zarrs::{array::data_type, metadata::v3::MetadataV3};

/// Element type of an array dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl DataType {
    /// Size of a single element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Int64 => "int64",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }

    /// Zarr V3 data type metadata for this type.
    pub fn to_zarr_metadata(&self) -> MetadataV3 {
        let data_type = match self {
            DataType::UInt8 => data_type::uint8(),
            DataType::Int8 => data_type::int8(),
            DataType::Int16 => data_type::int16(),
            DataType::UInt16 => data_type::uint16(),
            DataType::Int32 => data_type::int32(),
            DataType::UInt32 => data_type::uint32(),
            DataType::Int64 => data_type::int64(),
            DataType::UInt64 => data_type::uint64(),
            DataType::Float32 => data_type::float32(),
            DataType::Float64 => data_type::float64(),
        };
        let data_type_name = data_type
            .name_v3()
            .map_or_else(|| self.name().to_string(), Cow::into_owned);
        let data_type_configuration = data_type.configuration_v3();
        if data_type_configuration.is_empty() {
            MetadataV3::new(data_type_name)
        } else {
            MetadataV3::new_with_configuration(data_type_name, data_type_configuration)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let out = match s {
            "int8" => DataType::Int8,
            "uint8" => DataType::UInt8,
            "int16" => DataType::Int16,
            "uint16" => DataType::UInt16,
            "int32" => DataType::Int32,
            "uint32" => DataType::UInt32,
            "int64" => DataType::Int64,
            "uint64" => DataType::UInt64,
            "float32" => DataType::Float32,
            "float64" => DataType::Float64,
            s => return Err(crate::Error::general(format!("unsupported data type: {s}"))),
        };
        Ok(out)
    }
}

/// Rust element types with a corresponding [DataType].
pub trait Element: Copy + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Append the native-endian bytes of `self` to `out`.
    fn extend_bytes(&self, out: &mut Vec<u8>);

    /// The value as `f64`, rounding 64-bit integers to the nearest representable value.
    fn to_f64(&self) -> f64;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn extend_bytes(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }

            fn to_f64(&self) -> f64 {
                *self as f64
            }
        }
    };
}

impl_element!(i8, Int8);
impl_element!(u8, UInt8);
impl_element!(i16, Int16);
impl_element!(u16, UInt16);
impl_element!(i32, Int32);
impl_element!(u32, UInt32);
impl_element!(i64, Int64);
impl_element!(u64, UInt64);
impl_element!(f32, Float32);
impl_element!(f64, Float64);

/// Pack elements into a native-endian byte vector.
pub fn elements_to_bytes<T: Element>(elements: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(elements.len() * T::DATA_TYPE.size());
    for el in elements {
        el.extend_bytes(&mut out);
    }
    out
}
