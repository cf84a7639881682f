use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset_info::DatasetInfo;

use super::{fmt_summary, validate_dataset_shapes};

const FILTER_DEFLATE: u32 = 1;
const FILTER_SHUFFLE: u32 = 2;
const FILTER_FLETCHER32: u32 = 3;
const FILTER_SZIP: u32 = 4;
const FILTER_BZIP2: u32 = 307;
const FILTER_LZF: u32 = 32000;
const FILTER_LZ4: u32 = 32004;
const FILTER_ZSTD: u32 = 32015;

/// SZIP entropy coding option mask.
const SZIP_EC_OPTION_MASK: u32 = 4;
/// SZIP nearest-neighbour option mask.
const SZIP_NN_OPTION_MASK: u32 = 32;

/// HDF5 chunk compression.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "method")]
pub enum Hdf5Compression {
    Gzip {
        /// Default 4. Must be in the range 0..=9.
        #[serde(default = "default_gzip_level")]
        level: u8,
    },
    Lzf,
    Szip {
        /// Nearest-neighbour preprocessing if true, entropy coding otherwise.
        #[serde(default)]
        nearest_neighbour: bool,
        /// Default 16. Must be even and at most 32.
        #[serde(default = "default_szip_pixels_per_block")]
        pixels_per_block: u8,
    },
    Bzip2 {
        /// Default 9. Must be in the range 1..=9.
        #[serde(default = "default_bzip2_block_size")]
        block_size: u8,
    },
    Lz4,
    Zstd {
        /// Default 3. Must be in the range 1..=22.
        #[serde(default = "default_zstd_level")]
        level: u8,
    },
}

fn default_gzip_level() -> u8 {
    4
}

fn default_szip_pixels_per_block() -> u8 {
    16
}

fn default_bzip2_block_size() -> u8 {
    9
}

fn default_zstd_level() -> u8 {
    3
}

impl Default for Hdf5Compression {
    fn default() -> Self {
        Self::Gzip {
            level: default_gzip_level(),
        }
    }
}

impl Hdf5Compression {
    pub fn method(&self) -> &'static str {
        match self {
            Hdf5Compression::Gzip { .. } => "gzip",
            Hdf5Compression::Lzf => "lzf",
            Hdf5Compression::Szip { .. } => "szip",
            Hdf5Compression::Bzip2 { .. } => "bzip2",
            Hdf5Compression::Lz4 => "lz4",
            Hdf5Compression::Zstd { .. } => "zstd",
        }
    }

    /// The HDF5 filter implementing this compression.
    pub fn to_filter(&self) -> crate::Result<Hdf5Filter> {
        let filter = match *self {
            Hdf5Compression::Gzip { level } => {
                if level > 9 {
                    return Err(crate::Error::general(format!(
                        "invalid gzip compression level {level}"
                    )));
                }
                Hdf5Filter::new(FILTER_DEFLATE, "deflate", vec![u32::from(level)])
            }
            Hdf5Compression::Lzf => Hdf5Filter::new(FILTER_LZF, "lzf", vec![]),
            Hdf5Compression::Szip {
                nearest_neighbour,
                pixels_per_block,
            } => {
                if pixels_per_block == 0 || pixels_per_block % 2 != 0 || pixels_per_block > 32 {
                    return Err(crate::Error::general(format!(
                        "invalid szip pixels per block {pixels_per_block}"
                    )));
                }
                let mask = if nearest_neighbour {
                    SZIP_NN_OPTION_MASK
                } else {
                    SZIP_EC_OPTION_MASK
                };
                Hdf5Filter::new(FILTER_SZIP, "szip", vec![mask, u32::from(pixels_per_block)])
            }
            Hdf5Compression::Bzip2 { block_size } => {
                if !(1..=9).contains(&block_size) {
                    return Err(crate::Error::general(format!(
                        "invalid bzip2 block size {block_size}"
                    )));
                }
                Hdf5Filter::new(FILTER_BZIP2, "bzip2", vec![u32::from(block_size)])
            }
            Hdf5Compression::Lz4 => Hdf5Filter::new(FILTER_LZ4, "lz4", vec![]),
            Hdf5Compression::Zstd { level } => {
                if !(1..=22).contains(&level) {
                    return Err(crate::Error::general(format!(
                        "invalid zstd compression level {level}"
                    )));
                }
                Hdf5Filter::new(FILTER_ZSTD, "zstd", vec![u32::from(level)])
            }
        };
        Ok(filter)
    }
}

impl fmt::Display for Hdf5Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hdf5Compression::Gzip { level } | Hdf5Compression::Zstd { level } => {
                write!(f, "{} (level {level})", self.method())
            }
            Hdf5Compression::Bzip2 { block_size } => {
                write!(f, "{} (block size {block_size})", self.method())
            }
            _ => f.write_str(self.method()),
        }
    }
}

/// One entry of an HDF5 filter pipeline, as passed to the library creating the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hdf5Filter {
    pub id: u32,
    pub name: String,
    pub client_data: Vec<u32>,
}

impl Hdf5Filter {
    fn new(id: u32, name: &str, client_data: Vec<u32>) -> Self {
        Self {
            id,
            name: name.to_string(),
            client_data,
        }
    }
}

/// I/O configuration of a dataset written to HDF5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHdf5DatasetIOConfiguration")]
pub struct Hdf5DatasetIOConfiguration {
    pub dataset_info: DatasetInfo,
    pub chunk_shape: Vec<u64>,
    pub buffer_shape: Vec<u64>,
    /// None for an uncompressed dataset.
    pub compression: Option<Hdf5Compression>,
    pub shuffle: bool,
    pub fletcher32: bool,
}

/// Unvalidated form of [Hdf5DatasetIOConfiguration] as read from a serialized configuration.
#[derive(Deserialize)]
struct RawHdf5DatasetIOConfiguration {
    dataset_info: DatasetInfo,
    chunk_shape: Vec<u64>,
    buffer_shape: Vec<u64>,
    compression: Option<Hdf5Compression>,
    #[serde(default)]
    shuffle: bool,
    #[serde(default)]
    fletcher32: bool,
}

impl TryFrom<RawHdf5DatasetIOConfiguration> for Hdf5DatasetIOConfiguration {
    type Error = crate::Error;

    fn try_from(value: RawHdf5DatasetIOConfiguration) -> Result<Self, Self::Error> {
        let out = Self {
            dataset_info: value.dataset_info,
            chunk_shape: value.chunk_shape,
            buffer_shape: value.buffer_shape,
            compression: value.compression,
            shuffle: value.shuffle,
            fletcher32: value.fletcher32,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Hdf5DatasetIOConfiguration {
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
            compression: Some(Hdf5Compression::default()),
            shuffle: false,
            fletcher32: false,
        };
        out.validate()?;
        Ok(out)
    }

    pub fn with_compression(mut self, compression: Option<Hdf5Compression>) -> crate::Result<Self> {
        if let Some(c) = &compression {
            c.to_filter()?;
        }
        self.compression = compression;
        Ok(self)
    }

    pub fn validate(&self) -> crate::Result<()> {
        validate_dataset_shapes(&self.dataset_info, &self.chunk_shape, &self.buffer_shape)?;
        if let Some(c) = &self.compression {
            c.to_filter()?;
        }
        Ok(())
    }

    /// Filters in application order: shuffle, compression, checksum.
    pub fn filter_pipeline(&self) -> crate::Result<Vec<Hdf5Filter>> {
        let mut filters = Vec::new();
        if self.shuffle {
            filters.push(Hdf5Filter::new(
                FILTER_SHUFFLE,
                "shuffle",
                vec![self.dataset_info.dtype.size() as u32],
            ));
        }
        if let Some(c) = &self.compression {
            filters.push(c.to_filter()?);
        }
        if self.fletcher32 {
            filters.push(Hdf5Filter::new(FILTER_FLETCHER32, "fletcher32", vec![]));
        }
        Ok(filters)
    }
}

impl fmt::Display for Hdf5DatasetIOConfiguration {
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
