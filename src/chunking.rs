//! Chunk and buffer shape heuristics.
//!
//! Chunk shapes are bounded by a byte budget for a single compressed chunk on disk;
//! buffer shapes are bounded by a byte budget for the in-memory region handed to a writer
//! on each iteration, and are always a whole number of chunks along every axis.

/// Default upper bound on the size of a single chunk (10 MB).
pub const DEFAULT_CHUNK_BYTES: u64 = 10_000_000;
/// Default upper bound on the size of a single iteration buffer (1 GB).
pub const DEFAULT_BUFFER_BYTES: u64 = 1_000_000_000;
/// Default buffer budget used when inferring dataset configurations (0.5 GB).
pub const DEFAULT_CONFIGURATION_BUFFER_BYTES: u64 = 500_000_000;
/// Electrical series chunks never span more than this many channels.
pub const MAX_CHUNK_CHANNELS: u64 = 64;

/// Number of elements in an array of the given shape, saturating on overflow.
pub fn num_elements(shape: &[u64]) -> u64 {
    shape.iter().fold(1u64, |acc, &n| acc.saturating_mul(n))
}

/// Format a shape like a tuple, e.g. `(1800000, 384)`.
pub fn format_shape(shape: &[u64]) -> String {
    let parts: Vec<String> = shape.iter().map(u64::to_string).collect();
    if parts.len() == 1 {
        format!("({},)", parts[0])
    } else {
        format!("({})", parts.join(", "))
    }
}

/// Smallest whole number of chunks covering `axis_len`; zero-length axes count as one element.
pub(crate) fn chunks_along(axis_len: u64, chunk_len: u64) -> u64 {
    axis_len.max(1).div_ceil(chunk_len)
}

/// Compute a chunk shape whose axes keep roughly the proportions of `maxshape`.
///
/// The result never exceeds `maxshape` (with zero-length axes treated as length 1),
/// and its size in bytes does not exceed `chunk_bytes` unless a single element already does.
pub fn hypercube_chunk_shape(
    maxshape: &[u64],
    itemsize: usize,
    chunk_bytes: u64,
) -> crate::Result<Vec<u64>> {
    if maxshape.is_empty() {
        return Err(crate::Error::invalid_shape("cannot chunk a scalar dataset"));
    }
    if chunk_bytes == 0 {
        return Err(crate::Error::general(
            "chunk byte budget must be greater than zero",
        ));
    }
    if itemsize == 0 {
        return Err(crate::Error::general("item size must be greater than zero"));
    }
    let itemsize = itemsize as u64;
    let maxshape: Vec<u64> = maxshape.iter().map(|&n| n.max(1)).collect();
    let min_axis = maxshape.iter().copied().min().unwrap_or(1);

    // axis ratios relative to the shortest axis
    let mut ratios: Vec<u64> = maxshape.iter().map(|&n| n / min_axis).collect();
    let mut prod_ratios = num_elements(&ratios);
    while prod_ratios.saturating_mul(itemsize) > chunk_bytes && prod_ratios != 1 {
        let non_unit_min = ratios
            .iter()
            .copied()
            .filter(|&r| r != 1)
            .min()
            .unwrap_or(1);
        for r in ratios.iter_mut().filter(|r| **r != 1) {
            *r /= non_unit_min;
        }
        prod_ratios = num_elements(&ratios);
    }

    let shape_for = |k: u64| -> Vec<u64> {
        ratios
            .iter()
            .zip(&maxshape)
            .map(|(&r, &m)| k.saturating_mul(r).min(m))
            .collect()
    };
    let fits = |shape: &[u64]| num_elements(shape).saturating_mul(itemsize) <= chunk_bytes;

    let ndim = ratios.len() as f64;
    let scale = chunk_bytes as f64 / (prod_ratios as f64 * itemsize as f64);
    let mut k = (scale.powf(ndim.recip()).floor() as u64).max(1);
    let mut chunk = shape_for(k);

    // float rounding may land one step either side of the true root
    while k > 1 && !fits(&chunk) {
        k -= 1;
        chunk = shape_for(k);
    }
    let bigger = shape_for(k + 1);
    if bigger != chunk && fits(&bigger) {
        chunk = bigger;
    }
    Ok(chunk)
}

/// Chunk shape for `(frames, channels)` electrical series data.
///
/// Chunks span at most [MAX_CHUNK_CHANNELS] channels and as many frames as the budget allows.
pub fn electrical_series_chunk_shape(
    number_of_frames: u64,
    number_of_channels: u64,
    itemsize: usize,
    chunk_bytes: u64,
) -> crate::Result<Vec<u64>> {
    if chunk_bytes == 0 {
        return Err(crate::Error::general(
            "chunk byte budget must be greater than zero",
        ));
    }
    if itemsize == 0 {
        return Err(crate::Error::general("item size must be greater than zero"));
    }
    let chunk_channels = number_of_channels.clamp(1, MAX_CHUNK_CHANNELS);
    let frames_in_budget = chunk_bytes / (itemsize as u64 * chunk_channels);
    let chunk_frames = number_of_frames.min(frames_in_budget).max(1);
    Ok(vec![chunk_frames, chunk_channels])
}

/// Check that `chunk_shape` is usable for an array of `maxshape`.
pub fn validate_chunk_shape(maxshape: &[u64], chunk_shape: &[u64]) -> crate::Result<()> {
    if chunk_shape.len() != maxshape.len() {
        return Err(crate::Error::invalid_shape(format!(
            "chunk shape {} has a different number of dimensions than full shape {}",
            format_shape(chunk_shape),
            format_shape(maxshape)
        )));
    }
    for (axis, (&c, &m)) in chunk_shape.iter().zip(maxshape).enumerate() {
        if c == 0 {
            return Err(crate::Error::invalid_shape(format!(
                "chunk shape {} is zero along axis {axis}",
                format_shape(chunk_shape)
            )));
        }
        if c > m.max(1) {
            return Err(crate::Error::invalid_shape(format!(
                "chunk shape {} exceeds full shape {} along axis {axis}",
                format_shape(chunk_shape),
                format_shape(maxshape)
            )));
        }
    }
    Ok(())
}

/// Check that `buffer_shape` is a whole number of chunks along each axis,
/// and no larger than the whole number of chunks covering `maxshape`.
pub fn validate_buffer_shape(
    maxshape: &[u64],
    chunk_shape: &[u64],
    buffer_shape: &[u64],
) -> crate::Result<()> {
    validate_chunk_shape(maxshape, chunk_shape)?;
    if buffer_shape.len() != maxshape.len() {
        return Err(crate::Error::invalid_shape(format!(
            "buffer shape {} has a different number of dimensions than full shape {}",
            format_shape(buffer_shape),
            format_shape(maxshape)
        )));
    }
    for (axis, ((&b, &c), &m)) in buffer_shape.iter().zip(chunk_shape).zip(maxshape).enumerate() {
        if b == 0 || b % c != 0 {
            return Err(crate::Error::invalid_shape(format!(
                "buffer shape {} is not a multiple of chunk shape {} along axis {axis}",
                format_shape(buffer_shape),
                format_shape(chunk_shape)
            )));
        }
        if b / c > chunks_along(m, c) {
            return Err(crate::Error::invalid_shape(format!(
                "buffer shape {} exceeds full shape {} along axis {axis}",
                format_shape(buffer_shape),
                format_shape(maxshape)
            )));
        }
    }
    Ok(())
}

/// Compute a buffer shape made of whole chunks whose yielded data fits `buffer_bytes`.
///
/// Buffers grow uniformly first, then greedily along each axis in order,
/// so the leading (usually time) axis takes any remaining budget.
pub fn default_buffer_shape(
    maxshape: &[u64],
    chunk_shape: &[u64],
    itemsize: usize,
    buffer_bytes: u64,
) -> crate::Result<Vec<u64>> {
    validate_chunk_shape(maxshape, chunk_shape)?;
    if itemsize == 0 {
        return Err(crate::Error::general("item size must be greater than zero"));
    }
    let itemsize = itemsize as u64;
    let chunk_bytes = num_elements(chunk_shape).saturating_mul(itemsize);
    if chunk_bytes > buffer_bytes {
        return Err(crate::Error::general(format!(
            "chunk shape {} ({chunk_bytes} bytes) does not fit in a buffer of {buffer_bytes} bytes",
            format_shape(chunk_shape)
        )));
    }

    let ndim = chunk_shape.len() as u32;
    let limits: Vec<u64> = maxshape
        .iter()
        .zip(chunk_shape)
        .map(|(&m, &c)| chunks_along(m, c))
        .collect();

    let scale = buffer_bytes as f64 / chunk_bytes as f64;
    let mut k = (scale.powf(f64::from(ndim).recip()).floor() as u64).max(1);
    while k > 1 && k.saturating_pow(ndim).saturating_mul(chunk_bytes) > buffer_bytes {
        k -= 1;
    }
    let mut multiples: Vec<u64> = limits.iter().map(|&l| k.min(l)).collect();

    let yielded = |multiples: &[u64], skip: usize| -> u64 {
        multiples
            .iter()
            .zip(chunk_shape)
            .zip(maxshape)
            .enumerate()
            .filter(|(axis, _)| *axis != skip)
            .fold(itemsize, |acc, (_, ((&n, &c), &m))| {
                acc.saturating_mul((n * c).min(m.max(1)))
            })
    };

    for axis in 0..multiples.len() {
        let rest = yielded(&multiples, axis);
        let full = maxshape[axis].max(1);
        if full.saturating_mul(rest) <= buffer_bytes {
            multiples[axis] = limits[axis];
        } else {
            let fit = buffer_bytes / rest / chunk_shape[axis];
            multiples[axis] = multiples[axis].max(fit.min(limits[axis]));
        }
    }

    Ok(multiples
        .iter()
        .zip(chunk_shape)
        .map(|(&n, &c)| n * c)
        .collect())
}

/// Size in bytes of the data actually covered by `shape` within `maxshape`.
pub(crate) fn clamped_bytes(shape: &[u64], maxshape: &[u64], itemsize: usize) -> u64 {
    shape
        .iter()
        .zip(maxshape)
        .fold(itemsize as u64, |acc, (&s, &m)| acc.saturating_mul(s.min(m)))
}
