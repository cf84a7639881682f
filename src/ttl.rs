//! Event detection on TTL pulse traces.
use crate::data_type::Element;

fn binarize<T: Element>(trace: &[T], threshold: Option<f64>) -> Vec<bool> {
    let values = trace.iter().map(Element::to_f64);
    let threshold = threshold.unwrap_or_else(|| {
        let (min, max) = values
            .clone()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        (min + max) / 2.0
    });
    values.map(|v| v > threshold).collect()
}

fn transitions(states: &[bool], to_high: bool) -> Vec<usize> {
    states
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] != to_high && w[1] == to_high)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Frames at which the trace goes from low to high.
///
/// The trace is high where it exceeds `threshold`,
/// which defaults to the midpoint between its minimum and maximum.
pub fn rising_frames_from_ttl<T: Element>(trace: &[T], threshold: Option<f64>) -> Vec<usize> {
    transitions(&binarize(trace, threshold), true)
}

/// Frames at which the trace goes from high to low.
pub fn falling_frames_from_ttl<T: Element>(trace: &[T], threshold: Option<f64>) -> Vec<usize> {
    transitions(&binarize(trace, threshold), false)
}

/// Look up the times of `frames` in `timestamps`.
pub fn event_times_from_frames(frames: &[usize], timestamps: &[f64]) -> crate::Result<Vec<f64>> {
    frames
        .iter()
        .map(|&frame| {
            timestamps.get(frame).copied().ok_or_else(|| {
                crate::Error::general(format!(
                    "frame {frame} is out of range for {} timestamps",
                    timestamps.len()
                ))
            })
        })
        .collect()
}
