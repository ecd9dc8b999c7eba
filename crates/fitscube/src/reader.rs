//! Buffered random access to cube samples stored on disk.

use std::io::{Read, Seek, SeekFrom};

use crate::cube::{CubeMetadata, SampleFormat};
use crate::endian::decode_sample;
use crate::error::{Error, Result};

/// Size of the read-ahead window.
pub const WINDOW_SIZE: usize = 4096;

/// Reads individual samples of a cube as physical values.
///
/// Samples are fetched through a fixed 4096-byte window; a request outside
/// the window seeks to the sample and refills it.
#[derive(Debug)]
pub struct CubeSampleReader<R> {
    inner: R,
    format: SampleFormat,
    bscale: f64,
    bzero: f64,
    /// Raw value that marks an undefined sample, precomputed as
    /// `bzero + blank * bscale`.
    blank_raw: Option<f64>,
    base_offset: u64,
    shape: [usize; 3],
    window: Box<[u8]>,
    window_start: u64,
    window_len: usize,
}

impl<R: Read + Seek> CubeSampleReader<R> {
    /// Reader over the data block described by `meta`.
    pub fn new(inner: R, meta: &CubeMetadata) -> Self {
        Self::with_layout(inner, meta, meta.data_offset, meta.shape)
    }

    /// Reader with an explicit byte offset and extents; encoding and scaling
    /// still come from `meta`.
    pub fn with_layout(inner: R, meta: &CubeMetadata, offset: u64, shape: [usize; 3]) -> Self {
        CubeSampleReader {
            inner,
            format: meta.format,
            bscale: meta.bscale,
            bzero: meta.bzero,
            blank_raw: meta
                .blank
                .map(|blank| meta.bzero + blank as f64 * meta.bscale),
            base_offset: offset,
            shape,
            window: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
            window_start: 0,
            window_len: 0,
        }
    }

    /// Extents of the cube as `[NAXIS1, NAXIS2, NAXIS3]`.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Physical value of sample `(x, y, z)`, or NaN for a BLANK sample.
    pub fn sample(&mut self, x: usize, y: usize, z: usize) -> Result<f64> {
        let [dx, dy, dz] = self.shape;
        if x >= dx || y >= dy || z >= dz {
            return Err(Error::SampleOutOfBounds { x, y, z });
        }

        let width = self.format.byte_width();
        let index = ((z as u64 * dy as u64 + y as u64) * dx as u64) + x as u64;
        let offset = index * width as u64 + self.base_offset;

        let window_end = self.window_start + self.window_len as u64;
        if self.window_len == 0 || offset < self.window_start || offset + width as u64 > window_end
        {
            self.fill_window(offset, width)?;
        }

        let at = (offset - self.window_start) as usize;
        let raw = decode_sample(self.format, &self.window[at..at + width]);

        match self.blank_raw {
            Some(blank) if raw == blank => Ok(f64::NAN),
            _ => Ok(self.bzero + self.bscale * raw),
        }
    }

    fn fill_window(&mut self, offset: u64, width: usize) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut got = 0;
        while got < self.window.len() {
            match self.inner.read(&mut self.window[got..])? {
                0 => break,
                n => got += n,
            }
        }
        if got < width {
            self.window_len = 0;
            return Err(Error::ShortRead {
                offset,
                wanted: width,
                got,
            });
        }
        self.window_start = offset;
        self.window_len = got;
        Ok(())
    }

    /// Load the whole cube as an array indexed `[z, y, x]`.
    /// Read every sample into an array indexed `[z, y, x]`.
    #[cfg(feature = "array")]
    pub fn read_cube(&mut self) -> Result<ndarray::Array3<f64>> {
        let [dx, dy, dz] = self.shape;
        let mut out = ndarray::Array3::<f64>::zeros((dz, dy, dx));
        for ((z, y, x), v) in out.indexed_iter_mut() {
            *v = self.sample(x, y, z)?;
        }
        Ok(out)
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
