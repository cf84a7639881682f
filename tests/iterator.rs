use std::sync::Arc;

use nwb_dataset_io::iterator::{
    DataChunk, DataSource, GenericDataChunkIterator, InMemoryArray, IteratorOptions,
};
use nwb_dataset_io::{DataType, Error};

fn init_logger() {
    env_logger::try_init().ok();
}

/// A `(5, 4)` int32 array holding `0..20` in C order.
fn counting_array() -> Arc<dyn DataSource> {
    let values: Vec<i32> = (0..20).collect();
    Arc::new(InMemoryArray::from_elements(vec![5, 4], &values).expect("valid array"))
}

fn decode_i32(chunk: &DataChunk) -> Vec<i32> {
    chunk
        .data
        .chunks_exact(4)
        .map(|b| i32::from_ne_bytes(b.try_into().expect("4 bytes")))
        .collect()
}

fn collect(iterator: GenericDataChunkIterator) -> Vec<DataChunk> {
    iterator
        .collect::<Result<Vec<_>, _>>()
        .expect("read all buffers")
}

#[test]
fn row_buffers() {
    init_logger();
    let iterator = GenericDataChunkIterator::new(
        counting_array(),
        IteratorOptions::default()
            .with_chunk_shape(vec![2, 2])
            .with_buffer_shape(vec![2, 4]),
    )
    .expect("valid shapes");
    assert_eq!(iterator.num_buffers(), 3);
    assert_eq!(iterator.size_hint(), (3, Some(3)));

    let chunks = collect(iterator);
    let selections: Vec<_> = chunks.iter().map(|c| c.selection.clone()).collect();
    assert_eq!(
        selections,
        vec![vec![0..2, 0..4], vec![2..4, 0..4], vec![4..5, 0..4]]
    );
    assert_eq!(chunks[2].shape(), vec![1, 4]);
    assert_eq!(decode_i32(&chunks[2]), vec![16, 17, 18, 19]);

    let subset = chunks[2].subset();
    assert_eq!(subset.start(), &[4, 0]);
    assert_eq!(subset.shape(), &[1, 4]);
}

#[test]
fn buffers_in_c_order() {
    init_logger();
    let iterator = GenericDataChunkIterator::new(
        counting_array(),
        IteratorOptions::default()
            .with_chunk_shape(vec![2, 2])
            .with_buffer_shape(vec![4, 2]),
    )
    .expect("valid shapes");

    let chunks = collect(iterator);
    let selections: Vec<_> = chunks.iter().map(|c| c.selection.clone()).collect();
    assert_eq!(
        selections,
        vec![
            vec![0..4, 0..2],
            vec![0..4, 2..4],
            vec![4..5, 0..2],
            vec![4..5, 2..4],
        ]
    );
    assert_eq!(decode_i32(&chunks[1]), vec![2, 3, 6, 7, 10, 11, 14, 15]);
    assert_eq!(decode_i32(&chunks[3]), vec![18, 19]);
}

#[test]
fn every_element_exactly_once() {
    init_logger();
    for (chunk, buffer) in [
        (vec![1, 1], vec![1, 1]),
        (vec![2, 3], vec![4, 3]),
        (vec![3, 4], vec![6, 4]),
        (vec![5, 4], vec![5, 4]),
    ] {
        let iterator = GenericDataChunkIterator::new(
            counting_array(),
            IteratorOptions::default()
                .with_chunk_shape(chunk)
                .with_buffer_shape(buffer),
        )
        .expect("valid shapes");

        let mut seen = vec![0u32; 20];
        for chunk in collect(iterator) {
            let values = decode_i32(&chunk);
            let mut values = values.iter();
            for row in chunk.selection[0].clone() {
                for col in chunk.selection[1].clone() {
                    let value = *values.next().expect("value for each element");
                    assert_eq!(value as u64, row * 4 + col);
                    seen[value as usize] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "{seen:?}");
    }
}

#[test]
fn default_options_read_small_array_at_once() {
    init_logger();
    let iterator =
        GenericDataChunkIterator::new(counting_array(), IteratorOptions::default()).expect("iterator");
    assert_eq!(iterator.chunk_shape(), &[5, 4]);
    assert_eq!(iterator.buffer_shape(), &[5, 4]);
    assert_eq!(iterator.dtype(), DataType::Int32);

    let chunks = collect(iterator);
    assert_eq!(chunks.len(), 1);
    assert_eq!(decode_i32(&chunks[0]), (0..20).collect::<Vec<_>>());
}

#[test]
fn reset_rewinds() {
    init_logger();
    let mut iterator = GenericDataChunkIterator::new(
        counting_array(),
        IteratorOptions::default()
            .with_chunk_shape(vec![1, 4])
            .with_buffer_shape(vec![1, 4])
            .with_display_progress(true),
    )
    .expect("valid shapes");
    assert_eq!(iterator.by_ref().count(), 5);
    assert!(iterator.next().is_none());

    iterator.reset();
    let first = iterator.next().expect("first buffer").expect("readable");
    assert_eq!(decode_i32(&first), vec![0, 1, 2, 3]);
}

#[test]
fn with_shapes_keeps_source() {
    init_logger();
    let iterator =
        GenericDataChunkIterator::new(counting_array(), IteratorOptions::default()).expect("iterator");
    let reshaped = iterator.with_shapes(vec![1, 2], vec![2, 2]).expect("valid shapes");
    assert_eq!(reshaped.maxshape(), &[5, 4]);
    assert_eq!(reshaped.num_buffers(), 6);
    assert!(Arc::ptr_eq(iterator.source(), reshaped.source()));
}

#[test]
fn invalid_shapes_are_rejected() {
    init_logger();
    for (chunk, buffer) in [
        (vec![2, 2], vec![3, 2]),
        (vec![2, 2], vec![8, 4]),
        (vec![6, 2], vec![6, 2]),
        (vec![2], vec![2]),
    ] {
        let err = GenericDataChunkIterator::new(
            counting_array(),
            IteratorOptions::default()
                .with_chunk_shape(chunk.clone())
                .with_buffer_shape(buffer.clone()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)), "{chunk:?} {buffer:?}");
    }
}

#[test]
fn zero_size_array_yields_nothing() {
    init_logger();
    let iterator = GenericDataChunkIterator::new(
        Arc::new(InMemoryArray::empty(DataType::UInt8)),
        IteratorOptions::default(),
    )
    .expect("iterator");
    assert_eq!(iterator.num_buffers(), 0);
    assert_eq!(iterator.count(), 0);
}

#[test]
fn in_memory_array_checks_length() {
    init_logger();
    let err = InMemoryArray::new(vec![3, 3], DataType::Float32, vec![0u8; 32]).unwrap_err();
    assert!(matches!(err, Error::InvalidShape(_)));

    let array = InMemoryArray::new(vec![3, 3], DataType::Float32, vec![0u8; 36]).expect("array");
    assert_eq!(array.num_elements(), 9);
    assert!(array.get_data(&[0..4, 0..3]).is_err());
}
