//! In-memory NWB document model.
//!
//! Only the parts relevant to dataset I/O are represented: neurodata objects,
//! their array fields, and the file (if any) the document was read from.
use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::configuration::{Backend, DatasetIOConfiguration};
use crate::data_type::DataType;
use crate::iterator::{DataSource, GenericDataChunkIterator, InMemoryArray};

/// Mode a file was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoMode {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "r+")]
    ReadWrite,
    #[serde(rename = "a")]
    Append,
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "w-")]
    WriteNew,
}

impl IoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IoMode::Read => "r",
            IoMode::ReadWrite => "r+",
            IoMode::Append => "a",
            IoMode::Write => "w",
            IoMode::WriteNew => "w-",
        }
    }

    /// Whether new datasets may be added to the file (`r+` or `a`).
    pub fn is_append(&self) -> bool {
        matches!(self, IoMode::ReadWrite | IoMode::Append)
    }
}

impl fmt::Display for IoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IoMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let out = match s {
            "r" => IoMode::Read,
            "r+" => IoMode::ReadWrite,
            "a" => IoMode::Append,
            "w" => IoMode::Write,
            "w-" | "x" => IoMode::WriteNew,
            s => return Err(crate::Error::general(format!("invalid io mode '{s}'"))),
        };
        Ok(out)
    }
}

/// Identity of a file on disk (or a store) of a given backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub backend: Backend,
    pub path: PathBuf,
}

impl FileHandle {
    pub fn new(backend: Backend, path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            path: path.into(),
        }
    }
}

/// The file a document was read from and the mode it is open in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadIo {
    pub file: FileHandle,
    pub mode: IoMode,
}

/// A dataset already materialized in a file.
#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub file: FileHandle,
    pub source: Arc<dyn DataSource>,
}

/// A field wrapped with explicit I/O settings, ready to be written.
#[derive(Debug, Clone)]
pub struct ConfiguredDataset {
    pub iterator: GenericDataChunkIterator,
    pub configuration: DatasetIOConfiguration,
}

/// Contents of an array field of a neurodata object.
#[derive(Debug, Clone)]
pub enum FieldData {
    InMemory(InMemoryArray),
    Iterator(GenericDataChunkIterator),
    Stored(StoredDataset),
    Configured(ConfiguredDataset),
}

impl From<InMemoryArray> for FieldData {
    fn from(value: InMemoryArray) -> Self {
        Self::InMemory(value)
    }
}

impl From<GenericDataChunkIterator> for FieldData {
    fn from(value: GenericDataChunkIterator) -> Self {
        Self::Iterator(value)
    }
}

impl From<StoredDataset> for FieldData {
    fn from(value: StoredDataset) -> Self {
        Self::Stored(value)
    }
}

impl FieldData {
    /// The underlying readable array.
    pub fn source(&self) -> Arc<dyn DataSource> {
        match self {
            FieldData::InMemory(a) => Arc::new(a.clone()),
            FieldData::Iterator(it) => Arc::clone(it.source()),
            FieldData::Stored(s) => Arc::clone(&s.source),
            FieldData::Configured(c) => Arc::clone(c.iterator.source()),
        }
    }

    pub fn maxshape(&self) -> Vec<u64> {
        match self {
            FieldData::InMemory(a) => a.shape().to_vec(),
            FieldData::Iterator(it) => it.maxshape().to_vec(),
            FieldData::Stored(s) => s.source.maxshape(),
            FieldData::Configured(c) => c.iterator.maxshape().to_vec(),
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            FieldData::InMemory(a) => a.dtype(),
            FieldData::Iterator(it) => it.dtype(),
            FieldData::Stored(s) => s.source.dtype(),
            FieldData::Configured(c) => c.iterator.dtype(),
        }
    }

    /// Whether this is a dataset stored in `file` by `backend`.
    pub fn is_written_to(&self, backend: Backend, file: &FileHandle) -> bool {
        match self {
            FieldData::Stored(s) => s.file.backend == backend && &s.file == file,
            _ => false,
        }
    }
}

/// Time series (or any extension of it) with a `data` and an optional `timestamps` field.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub data: FieldData,
    pub timestamps: Option<FieldData>,
}

impl TimeSeries {
    pub fn new(data: impl Into<FieldData>) -> Self {
        Self {
            data: data.into(),
            timestamps: None,
        }
    }

    pub fn with_timestamps(mut self, timestamps: impl Into<FieldData>) -> Self {
        self.timestamps = Some(timestamps.into());
        self
    }
}

/// A single column of a [DynamicTable].
#[derive(Debug, Clone)]
pub struct VectorData {
    pub object_id: String,
    pub name: String,
    pub data: FieldData,
}

impl VectorData {
    pub fn new(name: impl Into<String>, data: impl Into<FieldData>) -> Self {
        Self {
            object_id: Uuid::new_v4().to_string(),
            name: name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DynamicTable {
    pub columns: Vec<VectorData>,
}

impl DynamicTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, column: VectorData) -> Self {
        self.columns.push(column);
        self
    }
}

#[derive(Debug, Clone)]
pub enum NeurodataKind {
    TimeSeries(TimeSeries),
    DynamicTable(DynamicTable),
}

/// A named object within the document hierarchy.
#[derive(Debug, Clone)]
pub struct NeurodataObject {
    pub object_id: String,
    pub name: String,
    /// Location of the containing group, e.g. `acquisition` or `processing/ecephys`.
    pub parent: String,
    pub kind: NeurodataKind,
}

impl NeurodataObject {
    pub fn new(parent: impl Into<String>, name: impl Into<String>, kind: NeurodataKind) -> Self {
        Self {
            object_id: Uuid::new_v4().to_string(),
            name: name.into(),
            parent: parent.into(),
            kind,
        }
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = object_id.into();
        self
    }

    /// Path of this object within the file.
    pub fn location(&self) -> String {
        let parent = self.parent.trim_matches('/');
        if parent.is_empty() {
            self.name.clone()
        } else {
            format!("{parent}/{}", self.name)
        }
    }
}

/// One array field of the document and where it lives.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub object_id: &'a str,
    /// True for dynamic table columns, false for time series fields.
    pub is_column: bool,
    pub data: &'a FieldData,
}

/// A mutable view of one array field and where it lives.
#[derive(Debug)]
pub struct FieldMut<'a> {
    pub object_id: &'a str,
    pub location_in_file: String,
    pub data: &'a mut FieldData,
}

/// An in-memory NWB document.
#[derive(Debug, Clone, Default)]
pub struct NwbFile {
    objects: Vec<NeurodataObject>,
    read_io: Option<ReadIo>,
}

impl NwbFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document read from `file` opened in `mode`.
    pub fn read_from(file: FileHandle, mode: IoMode) -> Self {
        Self {
            objects: Vec::new(),
            read_io: Some(ReadIo { file, mode }),
        }
    }

    pub fn read_io(&self) -> Option<&ReadIo> {
        self.read_io.as_ref()
    }

    pub fn add_object(&mut self, object: NeurodataObject) -> &NeurodataObject {
        self.objects.push(object);
        &self.objects[self.objects.len() - 1]
    }

    pub fn add_time_series(
        &mut self,
        parent: &str,
        name: &str,
        time_series: TimeSeries,
    ) -> &NeurodataObject {
        self.add_object(NeurodataObject::new(
            parent,
            name,
            NeurodataKind::TimeSeries(time_series),
        ))
    }

    pub fn add_acquisition(&mut self, name: &str, time_series: TimeSeries) -> &NeurodataObject {
        self.add_time_series("acquisition", name, time_series)
    }

    pub fn add_dynamic_table(
        &mut self,
        parent: &str,
        name: &str,
        table: DynamicTable,
    ) -> &NeurodataObject {
        self.add_object(NeurodataObject::new(
            parent,
            name,
            NeurodataKind::DynamicTable(table),
        ))
    }

    pub fn objects(&self) -> &[NeurodataObject] {
        &self.objects
    }

    pub fn get(&self, location: &str) -> Option<&NeurodataObject> {
        self.objects.iter().find(|o| o.location() == location)
    }

    /// Every array field of every object with its location, in document order.
    pub fn fields(&self) -> Vec<(String, Field<'_>)> {
        let mut out = Vec::new();
        for object in &self.objects {
            let location = object.location();
            match &object.kind {
                NeurodataKind::TimeSeries(ts) => {
                    let fields = std::iter::once(("data", &ts.data))
                        .chain(ts.timestamps.as_ref().map(|t| ("timestamps", t)));
                    for (field_name, data) in fields {
                        out.push((
                            format!("{location}/{field_name}"),
                            Field {
                                object_id: &object.object_id,
                                is_column: false,
                                data,
                            },
                        ));
                    }
                }
                NeurodataKind::DynamicTable(table) => {
                    for column in &table.columns {
                        out.push((
                            format!("{location}/{}/data", column.name),
                            Field {
                                object_id: &column.object_id,
                                is_column: true,
                                data: &column.data,
                            },
                        ));
                    }
                }
            }
        }
        out
    }

    /// Every array field of every object, in document order.
    pub fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        let mut out = Vec::new();
        for object in self.objects.iter_mut() {
            let location = object.location();
            match &mut object.kind {
                NeurodataKind::TimeSeries(ts) => {
                    out.push(FieldMut {
                        object_id: &object.object_id,
                        location_in_file: format!("{location}/data"),
                        data: &mut ts.data,
                    });
                    if let Some(timestamps) = ts.timestamps.as_mut() {
                        out.push(FieldMut {
                            object_id: &object.object_id,
                            location_in_file: format!("{location}/timestamps"),
                            data: timestamps,
                        });
                    }
                }
                NeurodataKind::DynamicTable(table) => {
                    for column in table.columns.iter_mut() {
                        out.push(FieldMut {
                            object_id: &column.object_id,
                            location_in_file: format!("{location}/{}/data", column.name),
                            data: &mut column.data,
                        });
                    }
                }
            }
        }
        out
    }
}
