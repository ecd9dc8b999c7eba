//! Concatenation of several cubes along the frame axis.
//!
//! [`combine`] parses every input, orders the inputs along axis 3, checks
//! that adjacent cubes share geometry and scaling, then writes one output
//! file: the first cube's header with `NAXIS3` updated, followed by the raw
//! data blocks of all inputs in order, zero-padded to a block boundary.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::block::{padding_for, DATA_PAD_BYTE};
use crate::cube::{CubeMetadata, SampleFormat};
use crate::endian::clip_f32_be;
use crate::error::{Error, Incompatibility, Result};
use crate::header::Header;
use crate::progress::{format_bytes, Progress};

/// Default streaming buffer size: 512 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024 * 1024;

/// Largest sample width; the streaming buffer is kept a multiple of it.
const SAMPLE_ALIGN: usize = 8;

/// Inclusive range of float32 values kept when streaming. Values outside it
/// are replaced with NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRange {
    pub min: f32,
    pub max: f32,
}

impl ClipRange {
    /// Keep values in `min..=max`.
    pub fn new(min: f32, max: f32) -> Self {
        ClipRange { min, max }
    }
}

impl Default for ClipRange {
    fn default() -> Self {
        ClipRange {
            min: -1000.0,
            max: 1000.0,
        }
    }
}

/// Tunables for [`combine`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombineOptions {
    clip: Option<ClipRange>,
    buffer_size: usize,
    keep_partial_output: bool,
}

impl Default for CombineOptions {
    fn default() -> Self {
        CombineOptions {
            clip: Some(ClipRange::default()),
            buffer_size: DEFAULT_BUFFER_SIZE,
            keep_partial_output: false,
        }
    }
}

impl CombineOptions {
    /// Same as [`CombineOptions::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clipping range; `None` copies samples unchanged.
    pub fn with_clip(mut self, clip: Option<ClipRange>) -> Self {
        self.clip = clip;
        self
    }

    /// Set the streaming buffer size. Rounded down to a multiple of 8 bytes,
    /// never below 8.
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = (bytes / SAMPLE_ALIGN * SAMPLE_ALIGN).max(SAMPLE_ALIGN);
        self
    }

    /// Leave a partially written output on disk when combining fails.
    pub fn keep_partial_output(mut self, keep: bool) -> Self {
        self.keep_partial_output = keep;
        self
    }

    /// Clipping range applied to float32 data, if any.
    pub fn clip(&self) -> Option<ClipRange> {
        self.clip
    }

    /// Streaming buffer size in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Whether a failed run leaves its output on disk.
    pub fn keeps_partial_output(&self) -> bool {
        self.keep_partial_output
    }
}

/// A discontinuity between two adjacent cubes. Never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ContinuityWarning {
    /// The second cube starts later than one step past the first.
    Gap {
        before: PathBuf,
        after: PathBuf,
        amount: f64,
    },
    /// The second cube starts before the first one ends.
    Overlap {
        before: PathBuf,
        after: PathBuf,
        amount: f64,
    },
}

impl fmt::Display for ContinuityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, before, after, amount) = match self {
            ContinuityWarning::Gap {
                before,
                after,
                amount,
            } => ("gap", before, after, amount),
            ContinuityWarning::Overlap {
                before,
                after,
                amount,
            } => ("overlap", before, after, amount),
        };
        write!(
            f,
            "big {} ({}) between {} and {}",
            kind,
            amount,
            before.display(),
            after.display()
        )
    }
}

/// Summary of a successful [`combine`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct CombineReport {
    /// Total bytes written, header and padding included.
    pub output_len: u64,
    /// `NAXIS3` of the output.
    pub frames: usize,
    /// Inputs in the order their data was written.
    pub inputs: Vec<PathBuf>,
    pub warnings: Vec<ContinuityWarning>,
    /// Float32 samples replaced with NaN.
    pub clipped_samples: u64,
    /// Clipping was requested but the sample format is not float32.
    pub clipping_skipped: bool,
}

/// Sort cubes along the frame axis: descending frame start if the first
/// cube's increment is negative, ascending otherwise. The sort is stable.
///
/// Returns true when the cubes were sorted in descending order.
pub fn order_cubes(cubes: &mut [CubeMetadata]) -> bool {
    let descending = match cubes.first() {
        Some(first) => first.frame_step() < 0.0,
        None => return false,
    };
    if descending {
        cubes.sort_by(|a, b| b.frame_start.total_cmp(&a.frame_start));
    } else {
        cubes.sort_by(|a, b| a.frame_start.total_cmp(&b.frame_start));
    }
    descending
}

/// Compare every adjacent pair and collect each mismatching keyword.
pub fn check_compatibility(cubes: &[CubeMetadata]) -> Vec<Incompatibility> {
    let mut found = Vec::new();
    for pair in cubes.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let checks: [(&'static str, bool); 13] = [
            ("BITPIX", a.format == b.format),
            ("NAXIS", a.naxis == b.naxis),
            ("NAXIS1", a.shape[0] == b.shape[0]),
            ("NAXIS2", a.shape[1] == b.shape[1]),
            ("BSCALE", a.bscale == b.bscale),
            ("BZERO", a.bzero == b.bzero),
            ("CRPIX1", a.wcs[0].crpix == b.wcs[0].crpix),
            ("CRPIX2", a.wcs[1].crpix == b.wcs[1].crpix),
            ("CRVAL1", a.wcs[0].crval == b.wcs[0].crval),
            ("CRVAL2", a.wcs[1].crval == b.wcs[1].crval),
            ("CDELT1", a.wcs[0].cdelt == b.wcs[0].cdelt),
            ("CDELT2", a.wcs[1].cdelt == b.wcs[1].cdelt),
            ("CDELT3", a.wcs[2].cdelt == b.wcs[2].cdelt),
        ];
        for (keyword, same) in checks {
            if !same {
                found.push(Incompatibility {
                    keyword,
                    first: a.path.clone(),
                    second: b.path.clone(),
                });
            }
        }
    }
    found
}

/// Find gaps and overlaps between adjacent cubes along the frame axis.
///
/// The tolerance is a millionth of the previous cube's increment.
pub fn check_continuity(cubes: &[CubeMetadata]) -> Vec<ContinuityWarning> {
    let mut warnings = Vec::new();
    for pair in cubes.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let step = prev.frame_step();
        let prev_end = prev.frame_start + step * prev.frames() as f64;
        let mut diff = next.frame_start - prev_end;
        if step < 0.0 {
            diff = -diff;
        }
        let tolerance = step.abs() / 1e6;
        let before = prev.path.clone();
        let after = next.path.clone();
        if diff > tolerance {
            warnings.push(ContinuityWarning::Gap {
                before,
                after,
                amount: diff,
            });
        } else if diff < -tolerance {
            warnings.push(ContinuityWarning::Overlap {
                before,
                after,
                amount: diff,
            });
        }
    }
    warnings
}

/// Delete an output left behind by a failed run.
fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => warn!(path = %path.display(), "removed partial output"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial output"),
    }
}

/// Concatenate `inputs` along axis 3 into a new file at `output`.
///
/// Nothing is written until every input has been parsed and checked for
/// compatibility.
pub fn combine<P: AsRef<Path>>(
    inputs: &[P],
    output: &Path,
    options: &CombineOptions,
) -> Result<CombineReport> {
    if inputs.is_empty() {
        return Err(Error::NoInputs);
    }

    info!("parsing {} headers", inputs.len());
    let mut cubes = inputs
        .iter()
        .map(|p| CubeMetadata::from_path(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let frames: usize = cubes.iter().map(CubeMetadata::frames).sum();
    info!("found {frames} frames");

    if order_cubes(&mut cubes) {
        info!("sorted by frame in descending order");
    } else {
        info!("sorted by frame in ascending order");
    }
    for cube in &cubes {
        debug!(path = %cube.path.display(), frame_start = cube.frame_start, "ordered input");
    }

    info!("checking for compatibility");
    let incompatible = check_compatibility(&cubes);
    if !incompatible.is_empty() {
        return Err(Error::Incompatible(incompatible));
    }
    let warnings = check_continuity(&cubes);
    for w in &warnings {
        warn!("{w}");
    }

    let (output_len, stats) = write_new_output(&cubes, frames, output, options)?;
    info!("done, wrote {}", format_bytes(output_len));

    Ok(CombineReport {
        output_len,
        frames,
        inputs: cubes.into_iter().map(|c| c.path).collect(),
        warnings,
        clipped_samples: stats.clipped_samples,
        clipping_skipped: stats.clipping_skipped,
    })
}

/// Create `output`, which must not exist yet, and fill it. A failure after
/// the file was created removes it unless the options say otherwise.
fn write_new_output(
    cubes: &[CubeMetadata],
    frames: usize,
    output: &Path,
    options: &CombineOptions,
) -> Result<(u64, StreamStats)> {
    let out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .map_err(|e| Error::file(output, e))?;
    match write_output(out, cubes, frames, output, options) {
        Ok(done) => Ok(done),
        Err(e) => {
            if !options.keep_partial_output {
                discard_partial(output);
            }
            Err(e)
        }
    }
}

/// Write header, data and padding. `out` is closed on return, whatever the
/// outcome.
fn write_output(
    mut out: File,
    cubes: &[CubeMetadata],
    frames: usize,
    output: &Path,
    options: &CombineOptions,
) -> Result<(u64, StreamStats)> {
    let mut header = Header::from_path(&cubes[0].path)?;
    header.set_int_value("NAXIS3", frames as i64, "");
    let mut written = header
        .write(&mut out)
        .map_err(|e| Error::in_file(output, e))?;

    let stats = stream_data(cubes, &mut out, output, options, &mut written)?;

    let pad = padding_for(written);
    if pad > 0 {
        info!("padding with {pad} bytes");
        let zeros = vec![DATA_PAD_BYTE; pad as usize];
        out.write_all(&zeros).map_err(|e| Error::file(output, e))?;
        written += pad;
    } else {
        info!("no padding needed");
    }
    out.flush().map_err(|e| Error::file(output, e))?;
    Ok((written, stats))
}

#[derive(Debug, Default)]
struct StreamStats {
    clipped_samples: u64,
    clipping_skipped: bool,
}

/// Copy each cube's data block into `out`, clipping float32 samples.
fn stream_data<W: Write>(
    cubes: &[CubeMetadata],
    out: &mut W,
    output: &Path,
    options: &CombineOptions,
    written: &mut u64,
) -> Result<StreamStats> {
    let total: u64 = cubes.iter().map(|c| c.data_len).sum();
    info!("starting concatenation of {}", format_bytes(total));

    let largest = cubes.iter().map(|c| c.data_len).max().unwrap_or(0);
    let needed = usize::try_from(largest)
        .unwrap_or(usize::MAX)
        .div_ceil(SAMPLE_ALIGN)
        .saturating_mul(SAMPLE_ALIGN);
    let mut buf = vec![0u8; options.buffer_size.min(needed).max(SAMPLE_ALIGN)];

    let mut stats = StreamStats::default();
    let mut progress = Progress::new(total);
    for cube in cubes {
        info!(path = %cube.path.display(), "appending");
        let mut input = File::open(&cube.path).map_err(|e| Error::file(&cube.path, e))?;
        input
            .seek(SeekFrom::Start(cube.data_offset))
            .map_err(|e| Error::file(&cube.path, e))?;

        let clip = match options.clip {
            Some(range) if cube.format == SampleFormat::F32 => Some(range),
            Some(_) => {
                if !stats.clipping_skipped {
                    warn!(bitpix = cube.format.bitpix(), "cannot apply data clipping");
                    stats.clipping_skipped = true;
                }
                None
            }
            None => None,
        };

        let mut remaining = cube.data_len;
        while remaining > 0 {
            let n = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let chunk = &mut buf[..n];
            input
                .read_exact(chunk)
                .map_err(|e| Error::file(&cube.path, e))?;
            if let Some(range) = clip {
                stats.clipped_samples += clip_f32_be(chunk, range.min, range.max);
            }
            out.write_all(chunk).map_err(|e| Error::file(output, e))?;

            remaining -= n as u64;
            *written += n as u64;
            progress.advance(n as u64, *written);
        }
    }
    Ok(stats)
}
