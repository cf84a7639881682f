//! Detect the datasets of an NWB document that need I/O configuration.
use std::collections::{BTreeSet, HashSet};

use crate::chunking::{
    DEFAULT_CHUNK_BYTES, DEFAULT_CONFIGURATION_BUFFER_BYTES, default_buffer_shape, format_shape,
};
use crate::configuration::{Backend, BackendConfiguration, DatasetIOConfiguration};
use crate::dataset_info::DatasetInfo;
use crate::iterator::{GenericDataChunkIterator, IteratorOptions};
use crate::nwbfile::{ConfiguredDataset, Field, FieldData, FileHandle, NwbFile};

/// Resolve the target backend, and the file being appended to if any.
fn resolve_backend(
    nwbfile: &NwbFile,
    backend: Option<Backend>,
) -> crate::Result<(Backend, Option<FileHandle>)> {
    let read_io = nwbfile.read_io();
    let appending = read_io.filter(|io| io.mode.is_append());

    let Some(backend) = backend.or(appending.map(|io| io.file.backend)) else {
        return Err(match read_io {
            None => crate::Error::MissingBackend,
            Some(io) => crate::Error::BackendRequired { mode: io.mode },
        });
    };

    if let Some(io) = appending {
        if io.file.backend != backend {
            return Err(crate::Error::BackendMismatch {
                detected: io.file.backend,
                specified: backend,
            });
        }
    }
    Ok((backend, appending.map(|io| io.file.clone())))
}

/// Whether a field must not be configured, logging the reason.
fn skip_field(
    location: &str,
    field: &Field<'_>,
    backend: Backend,
    existing_file: Option<&FileHandle>,
) -> bool {
    if let Some(file) = existing_file {
        if field.data.is_written_to(backend, file) {
            log::debug!("skipping '{location}': already written to the file being appended to");
            return true;
        }
    }
    match field.data {
        // image series in external mode hold their frames in separate files
        FieldData::InMemory(array) if !field.is_column && array.is_empty() => {
            log::debug!("skipping '{location}': zero-size array");
            true
        }
        FieldData::Configured(_) => {
            log::debug!("skipping '{location}': already configured");
            true
        }
        _ => false,
    }
}

/// Configuration of a single field with the backend's default compression.
fn field_configuration(
    backend: Backend,
    location: &str,
    field: &Field<'_>,
) -> crate::Result<DatasetIOConfiguration> {
    let full_shape = field.data.maxshape();
    let dtype = field.data.dtype();
    let dataset_info = DatasetInfo::new(field.object_id, location, full_shape.clone(), dtype);

    let (chunk_shape, buffer_shape) = match field.data {
        FieldData::Iterator(it) => (it.chunk_shape().to_vec(), it.buffer_shape().to_vec()),
        data => {
            let chunk_shape = data.source().default_chunk_shape(DEFAULT_CHUNK_BYTES)?;
            let buffer_shape = default_buffer_shape(
                &full_shape,
                &chunk_shape,
                dtype.size(),
                DEFAULT_CONFIGURATION_BUFFER_BYTES,
            )?;
            (chunk_shape, buffer_shape)
        }
    };
    DatasetIOConfiguration::new(backend, dataset_info, chunk_shape, buffer_shape)
}

/// Default I/O configurations of every dataset in `nwbfile` that can be configured.
///
/// `backend` may be omitted only when the document was read from a file open for appending,
/// in which case that file's backend is used. Datasets already stored in that file,
/// zero-size time series fields and already-configured fields are not yielded.
///
/// Backend errors are returned before iteration starts;
/// errors configuring an individual dataset are yielded in its place.
pub fn get_default_dataset_io_configurations(
    nwbfile: &NwbFile,
    backend: Option<Backend>,
) -> crate::Result<impl Iterator<Item = crate::Result<DatasetIOConfiguration>> + '_> {
    let (backend, existing_file) = resolve_backend(nwbfile, backend)?;
    let mut seen: HashSet<DatasetInfo> = HashSet::new();

    Ok(nwbfile
        .fields()
        .into_iter()
        .filter(move |(location, field)| {
            !skip_field(location, field, backend, existing_file.as_ref())
        })
        .filter_map(move |(location, field)| {
            match field_configuration(backend, &location, &field) {
                Ok(configuration) => seen
                    .insert(configuration.dataset_info().clone())
                    .then_some(Ok(configuration)),
                Err(e) => Some(Err(e)),
            }
        }))
}

/// Collect the default dataset configurations into a [BackendConfiguration].
pub fn get_default_backend_configuration(
    nwbfile: &NwbFile,
    backend: Option<Backend>,
) -> crate::Result<BackendConfiguration> {
    let (resolved, _) = resolve_backend(nwbfile, backend)?;
    let mut out = BackendConfiguration::new(resolved);
    for configuration in get_default_dataset_io_configurations(nwbfile, backend)? {
        out.insert(configuration?)?;
    }
    log::info!(
        "configured {} {resolved} datasets",
        out.dataset_configurations.len()
    );
    Ok(out)
}

/// Wrap every field of `nwbfile` named in `backend_configuration` with its configuration.
///
/// Returns the number of fields configured.
pub fn configure_backend(
    nwbfile: &mut NwbFile,
    backend_configuration: &BackendConfiguration,
) -> crate::Result<usize> {
    backend_configuration.validate()?;
    let backend = backend_configuration.backend;
    let existing_file = nwbfile
        .read_io()
        .filter(|io| io.mode.is_append())
        .map(|io| io.file.clone());

    let mut applied = BTreeSet::new();
    for field in nwbfile.fields_mut() {
        let Some(configuration) = backend_configuration.get(&field.location_in_file) else {
            continue;
        };
        if let Some(file) = &existing_file {
            if field.data.is_written_to(backend, file) {
                log::debug!(
                    "not configuring '{}': already written to the file being appended to",
                    field.location_in_file
                );
                continue;
            }
        }

        let full_shape = &configuration.dataset_info().full_shape;
        if &field.data.maxshape() != full_shape {
            return Err(crate::Error::invalid_shape(format!(
                "'{}' has shape {} but is configured for {}",
                field.location_in_file,
                format_shape(&field.data.maxshape()),
                format_shape(full_shape)
            )));
        }
        if configuration.dataset_info().object_id != field.object_id {
            log::warn!(
                "configuration for '{}' was made for object {}, applying it to object {}",
                field.location_in_file,
                configuration.dataset_info().object_id,
                field.object_id
            );
        }

        let chunk_shape = configuration.chunk_shape().to_vec();
        let buffer_shape = configuration.buffer_shape().to_vec();
        let iterator = match &*field.data {
            FieldData::Iterator(it) => it.with_shapes(chunk_shape, buffer_shape)?,
            FieldData::Configured(c) => c.iterator.with_shapes(chunk_shape, buffer_shape)?,
            data => GenericDataChunkIterator::new(
                data.source(),
                IteratorOptions::default()
                    .with_chunk_shape(chunk_shape)
                    .with_buffer_shape(buffer_shape),
            )?,
        };
        *field.data = FieldData::Configured(ConfiguredDataset {
            iterator,
            configuration: configuration.clone(),
        });
        applied.insert(field.location_in_file);
    }

    for location in backend_configuration.dataset_configurations.keys() {
        if !applied.contains(location) {
            log::debug!("no dataset found at configured location '{location}'");
        }
    }
    Ok(applied.len())
}
