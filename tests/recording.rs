use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use nwb_dataset_io::data_type::elements_to_bytes;
use nwb_dataset_io::iterator::{DataSource, IteratorOptions};
use nwb_dataset_io::recording::{Recording, RecordingDataSource, recording_data_chunk_iterator};
use nwb_dataset_io::{DataType, Result};

fn init_logger() {
    env_logger::try_init().ok();
}

/// Traces whose value at `(frame, channel)` is `frame * 1000 + channel`, wrapping.
#[derive(Debug)]
struct SyntheticRecording {
    num_channels: u64,
    segment_lengths: Vec<u64>,
}

impl SyntheticRecording {
    fn value(frame: u64, channel: u64) -> i16 {
        (frame * 1000 + channel) as i16
    }
}

impl Recording for SyntheticRecording {
    fn num_channels(&self) -> u64 {
        self.num_channels
    }

    fn num_segments(&self) -> usize {
        self.segment_lengths.len()
    }

    fn num_samples(&self, segment_index: usize) -> Result<u64> {
        Ok(self.segment_lengths[segment_index])
    }

    fn dtype(&self) -> DataType {
        DataType::Int16
    }

    fn get_traces(
        &self,
        _segment_index: usize,
        frames: Range<u64>,
        channels: Range<u64>,
    ) -> Result<Bytes> {
        let values: Vec<i16> = frames
            .flat_map(|f| channels.clone().map(move |c| Self::value(f, c)))
            .collect();
        Ok(elements_to_bytes(&values).into())
    }
}

fn recording() -> Arc<dyn Recording> {
    Arc::new(SyntheticRecording {
        num_channels: 100,
        segment_lengths: vec![1_000, 500],
    })
}

#[test]
fn recording_source_shape() {
    init_logger();
    let source = RecordingDataSource::new(recording(), 1).expect("segment exists");
    assert_eq!(source.segment_index(), 1);
    assert_eq!(source.maxshape(), vec![500, 100]);
    assert_eq!(source.dtype(), DataType::Int16);
    assert_eq!(
        source.default_chunk_shape(10_000_000).expect("chunk"),
        vec![500, 64]
    );
}

#[test]
fn missing_segment() {
    init_logger();
    assert!(RecordingDataSource::new(recording(), 2).is_err());
}

#[test]
fn default_iterator_uses_electrical_series_chunks() {
    init_logger();
    let iterator =
        recording_data_chunk_iterator(recording(), 0, IteratorOptions::default()).expect("iterator");
    assert_eq!(iterator.chunk_shape(), &[1_000, 64]);
    assert_eq!(iterator.buffer_shape(), &[1_000, 128]);
    assert_eq!(iterator.num_buffers(), 1);

    let chunks: Vec<_> = iterator
        .collect::<Result<Vec<_>>>()
        .expect("read all buffers");
    assert_eq!(chunks[0].shape(), vec![1_000, 100]);
    assert_eq!(chunks[0].data.len(), 1_000 * 100 * 2);
}

#[test]
fn buffered_recording() {
    init_logger();
    let iterator = recording_data_chunk_iterator(
        recording(),
        0,
        IteratorOptions::default()
            .with_chunk_bytes(12_800)
            .with_buffer_shape(vec![200, 64]),
    )
    .expect("iterator");
    assert_eq!(iterator.chunk_shape(), &[100, 64]);
    assert_eq!(iterator.num_buffers(), 10);

    let last = iterator.last().expect("ten buffers").expect("readable");
    assert_eq!(last.selection, vec![800..1_000, 64..100]);
    let first_value = i16::from_ne_bytes([last.data[0], last.data[1]]);
    assert_eq!(first_value, SyntheticRecording::value(800, 64));
    assert_eq!(last.data.len(), 200 * 36 * 2);
}
