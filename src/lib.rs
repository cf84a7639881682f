pub mod chunking;
pub mod configuration;
pub mod data_type;
pub mod dataset_configuration;
pub mod dataset_info;
mod error;
pub mod iterator;
pub mod nwbfile;
pub mod recording;
pub mod ttl;
pub mod write;

pub use zarrs;

pub use configuration::{Backend, BackendConfiguration, DatasetIOConfiguration};
pub use data_type::DataType;
pub use dataset_configuration::{
    configure_backend, get_default_backend_configuration, get_default_dataset_io_configurations,
};
pub use dataset_info::DatasetInfo;
pub use error::{Error, Result};
