//! Fixed-point conversions between dense gradient tensors and the integer
//! exchange format the aggregation map works on.

/// Quantizes `grads` into a fresh exchange buffer.
///
/// See [`quantize_into`] for the conversion rules.
pub fn quantize(grads: &[f32], scale: f32, total_len: usize) -> Vec<i32> {
    let mut buf = Vec::new();
    quantize_into(&mut buf, grads, scale, total_len);
    buf
}

/// Quantizes `grads` into `buf`, reusing its allocation.
///
/// Each gradient is multiplied by `scale`, clamped to the signed 32-bit
/// range and truncated; the buffer is zero-padded to exactly `total_len`
/// elements (`fragment_size * gradient_size`).
///
/// # Panics
/// Panics if `grads` is longer than `total_len`; over-length input is a
/// caller contract violation, not an error path.
pub fn quantize_into(buf: &mut Vec<i32>, grads: &[f32], scale: f32, total_len: usize) {
    assert!(
        grads.len() <= total_len,
        "gradient tensor ({}) longer than the exchange buffer ({total_len})",
        grads.len(),
    );

    buf.clear();
    buf.extend(
        grads
            .iter()
            .map(|g| (g * scale).clamp(i32::MIN as f32, i32::MAX as f32) as i32),
    );
    buf.resize(total_len, 0);
}

/// Maps an aggregated exchange buffer back to averaged gradients.
///
/// Divides by `scale * world_size` and writes the leading `out.len()`
/// elements back into the flat gradient slice; the zero padding beyond the
/// tensor length is ignored.
///
/// # Panics
/// Panics if `buf` is shorter than `out`; the exchange buffer always covers
/// the full tensor by construction.
pub fn dequantize(buf: &[i32], scale: f32, world_size: u32, out: &mut [f32]) {
    assert!(buf.len() >= out.len(), "exchange buffer shorter than tensor");

    let divisor = scale * world_size as f32;
    for (g, v) in out.iter_mut().zip(buf) {
        *g = *v as f32 / divisor;
    }
}
