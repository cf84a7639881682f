use std::fmt;

use serde::{Deserialize, Serialize};
use zarrs::{
    array::{
        ArrayMetadataV3, FillValueMetadata,
        codec::{BytesCodec, Bz2Codec, Bz2CompressionLevel, GzipCodec, ZstdCodec},
    },
    metadata::v3::MetadataV3,
    plugin::{ExtensionName, ZarrVersion},
};
use zarrs_codec::CodecTraits;

use crate::dataset_info::DatasetInfo;

use super::{fmt_summary, validate_dataset_shapes};

/// Zarr chunk compression.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "method")]
pub enum ZarrCompression {
    Gzip {
        /// Default 1. Must be in the range 0..=9.
        #[serde(default = "default_gzip_level")]
        level: u32,
    },
    Bz2 {
        /// Default 9. Must be in the range 1..=9.
        #[serde(default = "default_bz2_level")]
        level: u32,
    },
    Zstd {
        /// Default 3.
        #[serde(default = "default_zstd_level")]
        level: i32,
        #[serde(default)]
        checksum: bool,
    },
}

fn default_gzip_level() -> u32 {
    1
}

fn default_bz2_level() -> u32 {
    9
}

fn default_zstd_level() -> i32 {
    3
}

impl Default for ZarrCompression {
    fn default() -> Self {
        Self::Gzip {
            level: default_gzip_level(),
        }
    }
}

/// Codec metadata with the codec's registered V3 name and its configuration.
fn codec_metadata<C: CodecTraits + ExtensionName>(codec: &C, fallback_name: &str) -> MetadataV3 {
    let zarr_version = ZarrVersion::V3;
    let name = codec
        .name(zarr_version)
        .unwrap_or_else(|| fallback_name.to_string().into());
    if let Some(config) =
        codec.configuration(zarr_version, &zarrs_codec::CodecMetadataOptions::default())
    {
        MetadataV3::new_with_configuration(name, config)
    } else {
        MetadataV3::new(name)
    }
}

impl ZarrCompression {
    pub fn method(&self) -> &'static str {
        match self {
            ZarrCompression::Gzip { .. } => "gzip",
            ZarrCompression::Bz2 { .. } => "bz2",
            ZarrCompression::Zstd { .. } => "zstd",
        }
    }

    /// Metadata of the bytes-to-bytes codec implementing this compression.
    pub fn to_codec_metadata(&self) -> crate::Result<MetadataV3> {
        match *self {
            ZarrCompression::Gzip { level } => {
                let codec = GzipCodec::new(level).map_err(crate::Error::wrap)?;
                Ok(codec_metadata(&codec, "gzip"))
            }
            ZarrCompression::Bz2 { level } => {
                let codec = Bz2Codec::new(
                    Bz2CompressionLevel::new(level)
                        .map_err(|n| crate::Error::general(format!("invalid bz2 level {n}")))?,
                );
                Ok(codec_metadata(&codec, "numcodecs.bz2"))
            }
            ZarrCompression::Zstd { level, checksum } => {
                if !(-131072..=22).contains(&level) {
                    return Err(crate::Error::general(format!(
                        "invalid zstd compression level {level}"
                    )));
                }
                Ok(codec_metadata(&ZstdCodec::new(level, checksum), "zstd"))
            }
        }
    }
}

impl fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZarrCompression::Gzip { level } | ZarrCompression::Bz2 { level } => {
                write!(f, "{} (level {level})", self.method())
            }
            ZarrCompression::Zstd { level, .. } => write!(f, "{} (level {level})", self.method()),
        }
    }
}

/// I/O configuration of a dataset written to Zarr.
///
/// Deserializing validates the shapes and compression like [ZarrDatasetIOConfiguration::new].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawZarrDatasetIOConfiguration")]
pub struct ZarrDatasetIOConfiguration {
    pub dataset_info: DatasetInfo,
    pub chunk_shape: Vec<u64>,
    pub buffer_shape: Vec<u64>,
    /// None for an uncompressed dataset.
    pub compression: Option<ZarrCompression>,
}

#[derive(Deserialize)]
struct RawZarrDatasetIOConfiguration {
    dataset_info: DatasetInfo,
    chunk_shape: Vec<u64>,
    buffer_shape: Vec<u64>,
    compression: Option<ZarrCompression>,
}

impl TryFrom<RawZarrDatasetIOConfiguration> for ZarrDatasetIOConfiguration {
    type Error = crate::Error;

    fn try_from(value: RawZarrDatasetIOConfiguration) -> Result<Self, Self::Error> {
        let out = Self {
            dataset_info: value.dataset_info,
            chunk_shape: value.chunk_shape,
            buffer_shape: value.buffer_shape,
            compression: value.compression,
        };
        out.validate()?;
        Ok(out)
    }
}

impl ZarrDatasetIOConfiguration {
    /// Configuration with the default (gzip) compression.
    pub fn new(
        dataset_info: DatasetInfo,
        chunk_shape: Vec<u64>,
        buffer_shape: Vec<u64>,
    ) -> crate::Result<Self> {
        let out = Self {
            dataset_info,
            chunk_shape,
            buffer_shape,
            compression: Some(ZarrCompression::default()),
        };
        out.validate()?;
        Ok(out)
    }

    pub fn with_compression(mut self, compression: Option<ZarrCompression>) -> crate::Result<Self> {
        if let Some(c) = &compression {
            c.to_codec_metadata()?;
        }
        self.compression = compression;
        Ok(self)
    }

    pub fn validate(&self) -> crate::Result<()> {
        validate_dataset_shapes(&self.dataset_info, &self.chunk_shape, &self.buffer_shape)?;
        if let Some(c) = &self.compression {
            c.to_codec_metadata()?;
        }
        Ok(())
    }

    /// Zarr V3 metadata of the array this configuration creates.
    pub fn to_array_metadata(&self) -> crate::Result<ArrayMetadataV3> {
        self.try_into()
    }
}

impl fmt::Display for ZarrDatasetIOConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compression = self
            .compression
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        fmt_summary(
            f,
            &self.dataset_info,
            &self.chunk_shape,
            &self.buffer_shape,
            &compression,
        )
    }
}

#[derive(Serialize)]
struct RegularChunkGridConfiguration<'a> {
    chunk_shape: &'a [u64],
}

fn convert_chunk_grid(chunk_shape: &[u64]) -> crate::Result<MetadataV3> {
    if chunk_shape.contains(&0) {
        return Err(crate::Error::invalid_shape("zero chunk size"));
    }
    let out = MetadataV3::new_with_serializable_configuration(
        "regular".to_string(),
        &RegularChunkGridConfiguration { chunk_shape },
    )?;
    Ok(out)
}

fn convert_fill_value() -> FillValueMetadata {
    FillValueMetadata::Number(serde_json::Number::from(0))
}

impl TryFrom<&ZarrDatasetIOConfiguration> for ArrayMetadataV3 {
    type Error = crate::Error;

    fn try_from(value: &ZarrDatasetIOConfiguration) -> Result<Self, Self::Error> {
        let shape = value.dataset_info.full_shape.clone();
        let chunk_grid = convert_chunk_grid(&value.chunk_shape)?;
        let data_type = value.dataset_info.dtype.to_zarr_metadata();
        let fill_value = convert_fill_value();

        let mut codecs = vec![codec_metadata(&BytesCodec::little(), "bytes")];
        if let Some(compression) = &value.compression {
            codecs.push(compression.to_codec_metadata()?);
        }

        let mut attributes = serde_json::Map::new();
        attributes.insert(
            "object_id".to_string(),
            serde_json::Value::String(value.dataset_info.object_id.clone()),
        );
        let out = Self::new(shape, chunk_grid, data_type, fill_value, codecs)
            .with_attributes(attributes);
        Ok(out)
    }
}
