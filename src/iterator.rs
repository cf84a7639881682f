//! Buffered iteration over large arrays.
//!
//! A [GenericDataChunkIterator] walks the buffer grid of a [DataSource] in C order,
//! reading one buffer-sized selection at a time so that a writer never needs the
//! whole array in memory.
use std::{fmt::Debug, ops::Range, sync::Arc};

use bytes::Bytes;
use zarrs::array::ArraySubset;

use crate::chunking::{
    DEFAULT_BUFFER_BYTES, DEFAULT_CHUNK_BYTES, default_buffer_shape, format_shape,
    hypercube_chunk_shape, num_elements, validate_buffer_shape, validate_chunk_shape,
};
use crate::data_type::{DataType, Element, elements_to_bytes};

/// A readable array of known shape and element type.
pub trait DataSource: Debug + Send + Sync {
    /// Full shape of the array.
    fn maxshape(&self) -> Vec<u64>;

    fn dtype(&self) -> DataType;

    /// Read the elements within `selection` (one half-open range per axis)
    /// as C-order, native-endian bytes.
    fn get_data(&self, selection: &[Range<u64>]) -> crate::Result<Bytes>;

    /// Chunk shape used when only a chunk byte budget is given.
    fn default_chunk_shape(&self, chunk_bytes: u64) -> crate::Result<Vec<u64>> {
        hypercube_chunk_shape(&self.maxshape(), self.dtype().size(), chunk_bytes)
    }
}

/// Check that `selection` lies within an array of `maxshape`.
pub(crate) fn check_selection(maxshape: &[u64], selection: &[Range<u64>]) -> crate::Result<()> {
    if selection.len() != maxshape.len() {
        return Err(crate::Error::invalid_shape(format!(
            "selection has {} dimensions but the array has {}",
            selection.len(),
            maxshape.len()
        )));
    }
    for (axis, (r, &m)) in selection.iter().zip(maxshape).enumerate() {
        if r.start > r.end || r.end > m {
            return Err(crate::Error::invalid_shape(format!(
                "selection {}..{} is out of bounds for axis {axis} of shape {}",
                r.start,
                r.end,
                format_shape(maxshape)
            )));
        }
    }
    Ok(())
}

/// An array held in memory as C-order, native-endian bytes.
#[derive(Debug, Clone)]
pub struct InMemoryArray {
    shape: Vec<u64>,
    dtype: DataType,
    data: Bytes,
}

impl InMemoryArray {
    pub fn new(shape: Vec<u64>, dtype: DataType, data: impl Into<Bytes>) -> crate::Result<Self> {
        let data = data.into();
        let expected = num_elements(&shape).saturating_mul(dtype.size() as u64);
        if data.len() as u64 != expected {
            return Err(crate::Error::invalid_shape(format!(
                "{} bytes of {dtype} data do not fill shape {} ({expected} bytes)",
                data.len(),
                format_shape(&shape)
            )));
        }
        Ok(Self { shape, dtype, data })
    }

    pub fn from_elements<T: Element>(shape: Vec<u64>, elements: &[T]) -> crate::Result<Self> {
        Self::new(shape, T::DATA_TYPE, elements_to_bytes(elements))
    }

    /// A zero-length array, as used by image series whose frames live in external files.
    pub fn empty(dtype: DataType) -> Self {
        Self {
            shape: vec![0],
            dtype,
            data: Bytes::new(),
        }
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn num_elements(&self) -> u64 {
        num_elements(&self.shape)
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }
}

impl DataSource for InMemoryArray {
    fn maxshape(&self) -> Vec<u64> {
        self.shape.clone()
    }

    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn get_data(&self, selection: &[Range<u64>]) -> crate::Result<Bytes> {
        check_selection(&self.shape, selection)?;
        let ndim = self.shape.len();
        if ndim == 0 {
            return Ok(self.data.clone());
        }
        let itemsize = self.dtype.size();
        let sel_shape: Vec<u64> = selection.iter().map(|r| r.end - r.start).collect();
        let total = num_elements(&sel_shape) as usize * itemsize;
        if total == 0 {
            return Ok(Bytes::new());
        }

        let mut strides = vec![1u64; ndim];
        for axis in (0..ndim - 1).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }

        // copy contiguous runs along the last axis
        let run = sel_shape[ndim - 1] as usize * itemsize;
        let mut out = Vec::with_capacity(total);
        let mut index: Vec<u64> = selection.iter().map(|r| r.start).collect();
        loop {
            let offset = index
                .iter()
                .zip(&strides)
                .map(|(i, s)| i * s)
                .sum::<u64>() as usize
                * itemsize;
            out.extend_from_slice(&self.data[offset..offset + run]);

            let mut axis = ndim - 1;
            loop {
                if axis == 0 {
                    return Ok(Bytes::from(out));
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < selection[axis].end {
                    break;
                }
                index[axis] = selection[axis].start;
            }
        }
    }
}

/// How the chunk shape of an iterator is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkShapeSpec {
    /// Let the source pick a shape no larger than this many bytes.
    Bytes(u64),
    Shape(Vec<u64>),
}

/// How the buffer shape of an iterator is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferShapeSpec {
    /// Use the largest whole number of chunks whose data fits in this many bytes.
    Bytes(u64),
    /// Must be a multiple of the chunk shape along every axis.
    Shape(Vec<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorOptions {
    pub chunk: ChunkShapeSpec,
    pub buffer: BufferShapeSpec,
    /// Log progress at info level rather than debug.
    pub display_progress: bool,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            chunk: ChunkShapeSpec::Bytes(DEFAULT_CHUNK_BYTES),
            buffer: BufferShapeSpec::Bytes(DEFAULT_BUFFER_BYTES),
            display_progress: false,
        }
    }
}

impl IteratorOptions {
    pub fn with_chunk_bytes(mut self, bytes: u64) -> Self {
        self.chunk = ChunkShapeSpec::Bytes(bytes);
        self
    }

    pub fn with_chunk_shape(mut self, shape: Vec<u64>) -> Self {
        self.chunk = ChunkShapeSpec::Shape(shape);
        self
    }

    pub fn with_buffer_bytes(mut self, bytes: u64) -> Self {
        self.buffer = BufferShapeSpec::Bytes(bytes);
        self
    }

    pub fn with_buffer_shape(mut self, shape: Vec<u64>) -> Self {
        self.buffer = BufferShapeSpec::Shape(shape);
        self
    }

    pub fn with_display_progress(mut self, display_progress: bool) -> Self {
        self.display_progress = display_progress;
        self
    }
}

/// One buffer's worth of data and where it belongs in the full array.
#[derive(Debug, Clone)]
pub struct DataChunk {
    pub selection: Vec<Range<u64>>,
    pub data: Bytes,
}

impl DataChunk {
    pub fn shape(&self) -> Vec<u64> {
        self.selection.iter().map(|r| r.end - r.start).collect()
    }

    pub fn subset(&self) -> ArraySubset {
        ArraySubset::new_with_ranges(&self.selection)
    }
}

/// Iterator yielding buffer-sized [DataChunk]s of a [DataSource].
#[derive(Debug, Clone)]
pub struct GenericDataChunkIterator {
    source: Arc<dyn DataSource>,
    maxshape: Vec<u64>,
    dtype: DataType,
    chunk_shape: Vec<u64>,
    buffer_shape: Vec<u64>,
    /// Number of buffers along each axis.
    grid: Vec<u64>,
    num_buffers: u64,
    position: u64,
    display_progress: bool,
}

impl GenericDataChunkIterator {
    pub fn new(source: Arc<dyn DataSource>, options: IteratorOptions) -> crate::Result<Self> {
        let maxshape = source.maxshape();
        if maxshape.is_empty() {
            return Err(crate::Error::invalid_shape(
                "cannot iterate over a scalar dataset",
            ));
        }
        let dtype = source.dtype();

        let chunk_shape = match options.chunk {
            ChunkShapeSpec::Shape(shape) => {
                validate_chunk_shape(&maxshape, &shape)?;
                shape
            }
            ChunkShapeSpec::Bytes(bytes) => source.default_chunk_shape(bytes)?,
        };
        let buffer_shape = match options.buffer {
            BufferShapeSpec::Shape(shape) => {
                validate_buffer_shape(&maxshape, &chunk_shape, &shape)?;
                shape
            }
            BufferShapeSpec::Bytes(bytes) => {
                default_buffer_shape(&maxshape, &chunk_shape, dtype.size(), bytes)?
            }
        };

        let grid: Vec<u64> = maxshape
            .iter()
            .zip(&buffer_shape)
            .map(|(&m, &b)| m.div_ceil(b))
            .collect();
        let num_buffers = num_elements(&grid);
        log::debug!(
            "iterating over {} {dtype} array in {num_buffers} buffers of {} (chunks of {})",
            format_shape(&maxshape),
            format_shape(&buffer_shape),
            format_shape(&chunk_shape)
        );

        Ok(Self {
            source,
            maxshape,
            dtype,
            chunk_shape,
            buffer_shape,
            grid,
            num_buffers,
            position: 0,
            display_progress: options.display_progress,
        })
    }

    /// A fresh iterator over the same source with different shapes.
    pub fn with_shapes(&self, chunk_shape: Vec<u64>, buffer_shape: Vec<u64>) -> crate::Result<Self> {
        Self::new(
            Arc::clone(&self.source),
            IteratorOptions {
                chunk: ChunkShapeSpec::Shape(chunk_shape),
                buffer: BufferShapeSpec::Shape(buffer_shape),
                display_progress: self.display_progress,
            },
        )
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn maxshape(&self) -> &[u64] {
        &self.maxshape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    pub fn buffer_shape(&self) -> &[u64] {
        &self.buffer_shape
    }

    pub fn num_buffers(&self) -> u64 {
        self.num_buffers
    }

    /// Rewind to the first buffer.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Selection of the buffer at `index` in C order over the buffer grid.
    pub fn buffer_selection(&self, index: u64) -> Option<Vec<Range<u64>>> {
        if index >= self.num_buffers {
            return None;
        }
        let mut remainder = index;
        let mut selection = vec![0..0; self.grid.len()];
        for axis in (0..self.grid.len()).rev() {
            let i = remainder % self.grid[axis];
            remainder /= self.grid[axis];
            let start = i * self.buffer_shape[axis];
            let end = (start + self.buffer_shape[axis]).min(self.maxshape[axis]);
            selection[axis] = start..end;
        }
        Some(selection)
    }
}

impl Iterator for GenericDataChunkIterator {
    type Item = crate::Result<DataChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let selection = self.buffer_selection(self.position)?;
        self.position += 1;
        if self.display_progress {
            log::info!("reading buffer {}/{}", self.position, self.num_buffers);
        } else {
            log::debug!("reading buffer {}/{}", self.position, self.num_buffers);
        }
        Some(
            self.source
                .get_data(&selection)
                .map(|data| DataChunk { selection, data }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.num_buffers - self.position).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
