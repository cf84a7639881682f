use nwb_dataset_io::ttl::{event_times_from_frames, falling_frames_from_ttl, rising_frames_from_ttl};

const PULSES: [i16; 8] = [0, 0, 5, 5, 0, 0, 5, 0];

#[test]
fn transitions_with_midpoint_threshold() {
    assert_eq!(rising_frames_from_ttl(&PULSES, None), vec![2, 6]);
    assert_eq!(falling_frames_from_ttl(&PULSES, None), vec![4, 7]);
}

#[test]
fn transitions_with_explicit_threshold() {
    let trace = [0.1f32, 0.9, 2.0, 0.9, 2.5, 0.0];
    assert_eq!(rising_frames_from_ttl(&trace, Some(1.0)), vec![2, 4]);
    assert_eq!(falling_frames_from_ttl(&trace, Some(1.0)), vec![3, 5]);
    assert_eq!(rising_frames_from_ttl(&trace, Some(0.5)), vec![1]);
}

#[test]
fn flat_trace_has_no_events() {
    assert!(rising_frames_from_ttl(&[3u8; 10], None).is_empty());
    assert!(rising_frames_from_ttl::<u8>(&[], None).is_empty());
}

#[test]
fn event_times() {
    let timestamps: Vec<f64> = (0..8).map(|i| f64::from(i) * 0.5).collect();
    let frames = rising_frames_from_ttl(&PULSES, None);
    assert_eq!(
        event_times_from_frames(&frames, &timestamps).expect("frames in range"),
        vec![1.0, 3.0]
    );
    assert!(event_times_from_frames(&[8], &timestamps).is_err());
}

#[test]
fn sixty_four_bit_traces() {
    let trace: Vec<i64> = PULSES.iter().map(|&v| i64::from(v) - 3).collect();
    assert_eq!(rising_frames_from_ttl(&trace, None), vec![2, 6]);

    let trace = [0u64, 1 << 40, 1 << 40, 0];
    assert_eq!(rising_frames_from_ttl(&trace, None), vec![1]);
    assert_eq!(falling_frames_from_ttl(&trace, None), vec![3]);
}
