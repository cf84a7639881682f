use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunking::{format_shape, num_elements};
use crate::data_type::DataType;

/// Identity, location, shape and type of one dataset in an NWB file.
///
/// Hashable, so it can key collections of configuration targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// UUID of the neurodata object owning the dataset.
    pub object_id: String,
    /// Path of the dataset within the file, e.g. `acquisition/TestElectricalSeries/data`.
    pub location_in_file: String,
    pub dataset_name: String,
    pub full_shape: Vec<u64>,
    pub dtype: DataType,
}

impl DatasetInfo {
    pub fn new(
        object_id: impl Into<String>,
        location_in_file: impl Into<String>,
        full_shape: Vec<u64>,
        dtype: DataType,
    ) -> Self {
        let location_in_file = location_in_file.into();
        let dataset_name = location_in_file
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            object_id: object_id.into(),
            location_in_file,
            dataset_name,
            full_shape,
            dtype,
        }
    }

    pub fn num_elements(&self) -> u64 {
        num_elements(&self.full_shape)
    }

    /// Size of the full dataset in bytes.
    pub fn nbytes(&self) -> u64 {
        self.num_elements().saturating_mul(self.dtype.size() as u64)
    }

    /// The location followed by an underline of the same width.
    pub(crate) fn header(&self) -> String {
        let underline = "-".repeat(self.location_in_file.chars().count());
        format!("\n{}\n{underline}\n", self.location_in_file)
    }
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  full_shape: {}\n  dtype: {}",
            self.header(),
            format_shape(&self.full_shape),
            self.dtype
        )
    }
}
