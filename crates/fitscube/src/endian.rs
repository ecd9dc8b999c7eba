//! Big-endian sample conversion for FITS data.
//!
//! FITS stores all binary data in big-endian (most-significant byte first)
//! format. These helpers decode one sample from a byte slice per encoding and
//! rewrite float32 runs in place for clipping.

use crate::cube::SampleFormat;

/// Read a `u8` from the first byte of the slice.
#[inline]
pub fn read_u8(buf: &[u8]) -> u8 {
    buf[0]
}

/// Read a big-endian `i16` from the first 2 bytes of the slice.
#[inline]
pub fn read_i16_be(buf: &[u8]) -> i16 {
    i16::from_be_bytes([buf[0], buf[1]])
}

/// Read a big-endian `i32` from the first 4 bytes of the slice.
#[inline]
pub fn read_i32_be(buf: &[u8]) -> i32 {
    i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a big-endian `f32` (IEEE 754) from the first 4 bytes of the slice.
#[inline]
pub fn read_f32_be(buf: &[u8]) -> f32 {
    f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a big-endian `f64` (IEEE 754) from the first 8 bytes of the slice.
#[inline]
pub fn read_f64_be(buf: &[u8]) -> f64 {
    f64::from_be_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Write an `f32` in big-endian format into the first 4 bytes of the slice.
#[inline]
pub fn write_f32_be(buf: &mut [u8], val: f32) {
    buf[..4].copy_from_slice(&val.to_be_bytes());
}

/// Decode the raw (unscaled) value of one sample.
///
/// # Panics
/// Panics if `buf` is shorter than the format's byte width.
pub fn decode_sample(format: SampleFormat, buf: &[u8]) -> f64 {
    match format {
        SampleFormat::U8 => f64::from(read_u8(buf)),
        SampleFormat::I16 => f64::from(read_i16_be(buf)),
        SampleFormat::I32 => f64::from(read_i32_be(buf)),
        SampleFormat::F32 => f64::from(read_f32_be(buf)),
        SampleFormat::F64 => read_f64_be(buf),
    }
}

/// Replace every big-endian float32 in `buf` that lies outside the inclusive
/// range `[min, max]` with NaN. Returns how many samples were replaced.
///
/// NaN inputs compare false against both bounds and are left alone.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 4.
pub fn clip_f32_be(buf: &mut [u8], min: f32, max: f32) -> u64 {
    assert!(
        buf.len() % 4 == 0,
        "buffer length must be a multiple of 4"
    );
    let mut clipped = 0;
    for chunk in buf.chunks_exact_mut(4) {
        let val = read_f32_be(chunk);
        if val < min || val > max {
            write_f32_be(chunk, f32::NAN);
            clipped += 1;
        }
    }
    clipped
}
