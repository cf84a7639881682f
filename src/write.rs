//! Writing configured datasets to a Zarr store.
use std::sync::Arc;

use zarrs::array::{Array, ArrayBytes, ArrayMetadata};
use zarrs::storage::ReadableWritableStorageTraits;

use crate::chunking::format_shape;
use crate::configuration::{
    Backend, DatasetIOConfiguration, ZarrDatasetIOConfiguration, human_readable_size,
};
use crate::iterator::GenericDataChunkIterator;
use crate::nwbfile::{FieldData, NwbFile};

/// Create the array described by `configuration` at `path` and fill it from `iterator`.
pub fn write_dataset<TStorage: ?Sized + ReadableWritableStorageTraits + 'static>(
    storage: Arc<TStorage>,
    path: &str,
    configuration: &ZarrDatasetIOConfiguration,
    mut iterator: GenericDataChunkIterator,
) -> crate::Result<Array<TStorage>> {
    configuration.validate()?;
    let info = &configuration.dataset_info;
    if iterator.maxshape() != info.full_shape.as_slice() || iterator.dtype() != info.dtype {
        return Err(crate::Error::invalid_shape(format!(
            "'{}' is configured as {} {} but the data is {} {}",
            info.location_in_file,
            format_shape(&info.full_shape),
            info.dtype,
            format_shape(iterator.maxshape()),
            iterator.dtype()
        )));
    }

    let metadata = ArrayMetadata::V3(configuration.to_array_metadata()?);
    let array = Array::new_with_metadata(storage, path, metadata)?;
    array.store_metadata()?;

    iterator.reset();
    let mut n_buffers = 0u64;
    for chunk in iterator {
        let chunk = chunk?;
        array.store_array_subset(&chunk.subset(), ArrayBytes::new_flen(chunk.data.to_vec()))?;
        n_buffers += 1;
    }
    log::info!(
        "wrote {} ({}) to '{path}' in {n_buffers} buffers",
        info.location_in_file,
        human_readable_size(info.nbytes())
    );
    Ok(array)
}

/// Write every configured field of `nwbfile` at `/<location_in_file>` in `storage`.
///
/// Returns the number of datasets written. Fields configured for HDF5 are rejected.
pub fn write_configured_datasets<TStorage: ?Sized + ReadableWritableStorageTraits + 'static>(
    nwbfile: &NwbFile,
    storage: Arc<TStorage>,
) -> crate::Result<usize> {
    let mut written = 0;
    for (location, field) in nwbfile.fields() {
        let FieldData::Configured(configured) = field.data else {
            continue;
        };
        match &configured.configuration {
            DatasetIOConfiguration::Zarr(configuration) => {
                write_dataset(
                    Arc::clone(&storage),
                    &format!("/{location}"),
                    configuration,
                    configured.iterator.clone(),
                )?;
                written += 1;
            }
            other => {
                return Err(crate::Error::BackendMismatch {
                    detected: other.backend(),
                    specified: Backend::Zarr,
                });
            }
        }
    }
    Ok(written)
}
