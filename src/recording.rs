//! Multi-channel electrophysiology recordings as iterator sources.
use std::{fmt::Debug, ops::Range, sync::Arc};

use bytes::Bytes;

use crate::chunking::electrical_series_chunk_shape;
use crate::data_type::DataType;
use crate::iterator::{DataSource, GenericDataChunkIterator, IteratorOptions, check_selection};

/// A recording of one or more segments, each a `(frames, channels)` trace matrix.
pub trait Recording: Debug + Send + Sync {
    fn num_channels(&self) -> u64;

    fn num_segments(&self) -> usize;

    fn num_samples(&self, segment_index: usize) -> crate::Result<u64>;

    fn dtype(&self) -> DataType;

    /// Read frames `frames` of channels `channels` as C-order `(frames, channels)` bytes.
    fn get_traces(
        &self,
        segment_index: usize,
        frames: Range<u64>,
        channels: Range<u64>,
    ) -> crate::Result<Bytes>;
}

/// One segment of a [Recording], exposed as a 2D [DataSource].
#[derive(Debug, Clone)]
pub struct RecordingDataSource {
    recording: Arc<dyn Recording>,
    segment_index: usize,
    num_frames: u64,
}

impl RecordingDataSource {
    pub fn new(recording: Arc<dyn Recording>, segment_index: usize) -> crate::Result<Self> {
        if segment_index >= recording.num_segments() {
            return Err(crate::Error::general(format!(
                "segment index {segment_index} out of range for a recording with {} segments",
                recording.num_segments()
            )));
        }
        let num_frames = recording.num_samples(segment_index)?;
        Ok(Self {
            recording,
            segment_index,
            num_frames,
        })
    }

    pub fn segment_index(&self) -> usize {
        self.segment_index
    }
}

impl DataSource for RecordingDataSource {
    fn maxshape(&self) -> Vec<u64> {
        vec![self.num_frames, self.recording.num_channels()]
    }

    fn dtype(&self) -> DataType {
        self.recording.dtype()
    }

    fn get_data(&self, selection: &[Range<u64>]) -> crate::Result<Bytes> {
        check_selection(&self.maxshape(), selection)?;
        self.recording.get_traces(
            self.segment_index,
            selection[0].clone(),
            selection[1].clone(),
        )
    }

    fn default_chunk_shape(&self, chunk_bytes: u64) -> crate::Result<Vec<u64>> {
        electrical_series_chunk_shape(
            self.num_frames,
            self.recording.num_channels(),
            self.dtype().size(),
            chunk_bytes,
        )
    }
}

/// Iterator over one segment of a recording, chunked as an electrical series by default.
pub fn recording_data_chunk_iterator(
    recording: Arc<dyn Recording>,
    segment_index: usize,
    options: IteratorOptions,
) -> crate::Result<GenericDataChunkIterator> {
    let source = RecordingDataSource::new(recording, segment_index)?;
    GenericDataChunkIterator::new(Arc::new(source), options)
}
