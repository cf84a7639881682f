//! Per-dataset and per-write I/O configuration records.
use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::chunking::{clamped_bytes, format_shape, num_elements, validate_buffer_shape};
use crate::dataset_info::DatasetInfo;

mod hdf5;
mod zarr;

pub use hdf5::{Hdf5Compression, Hdf5DatasetIOConfiguration, Hdf5Filter};
pub use zarr::{ZarrCompression, ZarrDatasetIOConfiguration};

/// Storage backend of an NWB file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Hdf5,
    Zarr,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Hdf5 => "hdf5",
            Backend::Zarr => "zarr",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hdf5" => Ok(Backend::Hdf5),
            "zarr" => Ok(Backend::Zarr),
            s => Err(crate::Error::general(format!(
                "unknown backend '{s}', expected 'hdf5' or 'zarr'"
            ))),
        }
    }
}

/// Format a byte count with decimal units, e.g. `10.00 MB`.
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

pub(crate) fn validate_dataset_shapes(
    dataset_info: &DatasetInfo,
    chunk_shape: &[u64],
    buffer_shape: &[u64],
) -> crate::Result<()> {
    validate_buffer_shape(&dataset_info.full_shape, chunk_shape, buffer_shape).map_err(|e| {
        crate::Error::invalid_shape(format!("{}: {e}", dataset_info.location_in_file))
    })
}

pub(crate) fn fmt_summary(
    f: &mut fmt::Formatter<'_>,
    dataset_info: &DatasetInfo,
    chunk_shape: &[u64],
    buffer_shape: &[u64],
    compression: &str,
) -> fmt::Result {
    let itemsize = dataset_info.dtype.size();
    write!(f, "{}", dataset_info.header())?;
    writeln!(f, "  dtype: {}", dataset_info.dtype)?;
    writeln!(
        f,
        "  full shape of source array: {}",
        format_shape(&dataset_info.full_shape)
    )?;
    writeln!(
        f,
        "  full size of source array: {}",
        human_readable_size(dataset_info.nbytes())
    )?;
    writeln!(f)?;
    writeln!(f, "  buffer shape: {}", format_shape(buffer_shape))?;
    writeln!(
        f,
        "  expected RAM usage: {}",
        human_readable_size(clamped_bytes(
            buffer_shape,
            &dataset_info.full_shape,
            itemsize
        ))
    )?;
    writeln!(f)?;
    writeln!(f, "  chunk shape: {}", format_shape(chunk_shape))?;
    writeln!(
        f,
        "  disk space usage per chunk: {}",
        human_readable_size(num_elements(chunk_shape).saturating_mul(itemsize as u64))
    )?;
    writeln!(f)?;
    write!(f, "  compression method: {compression}")
}

/// I/O configuration of a single dataset for one of the supported backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatasetIOConfiguration {
    Hdf5(Hdf5DatasetIOConfiguration),
    Zarr(ZarrDatasetIOConfiguration),
}

impl From<Hdf5DatasetIOConfiguration> for DatasetIOConfiguration {
    fn from(value: Hdf5DatasetIOConfiguration) -> Self {
        Self::Hdf5(value)
    }
}

impl From<ZarrDatasetIOConfiguration> for DatasetIOConfiguration {
    fn from(value: ZarrDatasetIOConfiguration) -> Self {
        Self::Zarr(value)
    }
}

impl DatasetIOConfiguration {
    /// Default configuration of a dataset for `backend`.
    pub fn new(
        backend: Backend,
        dataset_info: DatasetInfo,
        chunk_shape: Vec<u64>,
        buffer_shape: Vec<u64>,
    ) -> crate::Result<Self> {
        let out = match backend {
            Backend::Hdf5 => {
                Hdf5DatasetIOConfiguration::new(dataset_info, chunk_shape, buffer_shape)?.into()
            }
            Backend::Zarr => {
                ZarrDatasetIOConfiguration::new(dataset_info, chunk_shape, buffer_shape)?.into()
            }
        };
        Ok(out)
    }

    pub fn backend(&self) -> Backend {
        match self {
            DatasetIOConfiguration::Hdf5(_) => Backend::Hdf5,
            DatasetIOConfiguration::Zarr(_) => Backend::Zarr,
        }
    }

    pub fn dataset_info(&self) -> &DatasetInfo {
        match self {
            DatasetIOConfiguration::Hdf5(c) => &c.dataset_info,
            DatasetIOConfiguration::Zarr(c) => &c.dataset_info,
        }
    }

    pub fn location_in_file(&self) -> &str {
        &self.dataset_info().location_in_file
    }

    pub fn chunk_shape(&self) -> &[u64] {
        match self {
            DatasetIOConfiguration::Hdf5(c) => &c.chunk_shape,
            DatasetIOConfiguration::Zarr(c) => &c.chunk_shape,
        }
    }

    pub fn buffer_shape(&self) -> &[u64] {
        match self {
            DatasetIOConfiguration::Hdf5(c) => &c.buffer_shape,
            DatasetIOConfiguration::Zarr(c) => &c.buffer_shape,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        match self {
            DatasetIOConfiguration::Hdf5(c) => c.validate(),
            DatasetIOConfiguration::Zarr(c) => c.validate(),
        }
    }
}

impl fmt::Display for DatasetIOConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetIOConfiguration::Hdf5(c) => fmt::Display::fmt(c, f),
            DatasetIOConfiguration::Zarr(c) => fmt::Display::fmt(c, f),
        }
    }
}

/// All dataset configurations of one write, keyed by location in file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfiguration {
    pub backend: Backend,
    pub dataset_configurations: BTreeMap<String, DatasetIOConfiguration>,
}

impl BackendConfiguration {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            dataset_configurations: BTreeMap::new(),
        }
    }

    /// Add a dataset configuration.
    ///
    /// Returns false (and keeps the existing entry) if the location is already configured.
    pub fn insert(&mut self, configuration: DatasetIOConfiguration) -> crate::Result<bool> {
        if configuration.backend() != self.backend {
            return Err(crate::Error::BackendMismatch {
                detected: configuration.backend(),
                specified: self.backend,
            });
        }
        let location = configuration.location_in_file().to_string();
        if self.dataset_configurations.contains_key(&location) {
            log::warn!("dataset at '{location}' is already configured; ignoring duplicate");
            return Ok(false);
        }
        self.dataset_configurations.insert(location, configuration);
        Ok(true)
    }

    pub fn get(&self, location_in_file: &str) -> Option<&DatasetIOConfiguration> {
        self.dataset_configurations.get(location_in_file)
    }

    pub fn get_mut(&mut self, location_in_file: &str) -> Option<&mut DatasetIOConfiguration> {
        self.dataset_configurations.get_mut(location_in_file)
    }

    pub fn len(&self) -> usize {
        self.dataset_configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_configurations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetIOConfiguration> {
        self.dataset_configurations.values()
    }

    /// Check every dataset configuration and that all belong to this backend.
    pub fn validate(&self) -> crate::Result<()> {
        for (location, configuration) in &self.dataset_configurations {
            if configuration.backend() != self.backend {
                return Err(crate::Error::BackendMismatch {
                    detected: configuration.backend(),
                    specified: self.backend,
                });
            }
            if configuration.location_in_file() != location {
                return Err(crate::Error::general(format!(
                    "configuration for '{}' is stored under '{location}'",
                    configuration.location_in_file()
                )));
            }
            configuration.validate()?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a configuration.
    pub fn from_json(s: &str) -> crate::Result<Self> {
        let out: Self = serde_json::from_str(s)?;
        out.validate()?;
        Ok(out)
    }
}

impl fmt::Display for BackendConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("{} dataset configurations", self.backend.name().to_uppercase());
        writeln!(f)?;
        writeln!(f, "{title}")?;
        write!(f, "{}", "-".repeat(title.len()))?;
        for configuration in self.dataset_configurations.values() {
            writeln!(f)?;
            write!(f, "{configuration}")?;
        }
        Ok(())
    }
}
