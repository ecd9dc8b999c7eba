//! Validated geometry, scaling, and world coordinates of a 3-D cube.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::header::Header;

/// On-disk sample encoding, identified by BITPIX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl SampleFormat {
    /// Map a BITPIX code to a format. 64-bit integers are a legal FITS code
    /// but are not handled here.
    pub fn from_bitpix(bitpix: i64) -> Result<SampleFormat> {
        match bitpix {
            8 => Ok(SampleFormat::U8),
            16 => Ok(SampleFormat::I16),
            32 => Ok(SampleFormat::I32),
            -32 => Ok(SampleFormat::F32),
            -64 => Ok(SampleFormat::F64),
            64 => Err(Error::UnsupportedBitpix(bitpix)),
            other => Err(Error::InvalidBitpix(other)),
        }
    }

    /// The BITPIX code this format was read from.
    pub fn bitpix(self) -> i64 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::I16 => 16,
            SampleFormat::I32 => 32,
            SampleFormat::F32 => -32,
            SampleFormat::F64 => -64,
        }
    }

    /// Bytes per sample.
    pub fn byte_width(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::I16 => 2,
            SampleFormat::I32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    /// True for the integer formats, the only ones that may carry BLANK.
    pub fn is_integer(self) -> bool {
        self.bitpix() > 0
    }
}

/// Reference pixel, reference value and increment of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisWcs {
    pub crpix: f64,
    pub crval: f64,
    pub cdelt: f64,
}

/// Everything the combiner and sample reader need to know about one input.
///
/// Built once per file by [`CubeMetadata::from_path`] and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeMetadata {
    pub path: PathBuf,
    pub format: SampleFormat,
    pub naxis: i64,
    /// NAXIS1, NAXIS2, NAXIS3.
    pub shape: [usize; 3],
    pub bscale: f64,
    pub bzero: f64,
    pub blank: Option<i64>,
    /// Axes 1 to 3.
    pub wcs: [AxisWcs; 3],
    pub ctype: [String; 3],
    pub cunit3: String,
    pub bunit: String,
    pub equinox: f64,
    pub data_offset: u64,
    pub data_len: u64,
    /// World coordinate of the first plane.
    pub frame_start: f64,
    /// World coordinate of the last plane.
    pub frame_end: f64,
    /// World coordinate one plane past the last.
    pub frame_next: f64,
}

fn axis_len(axis: u8, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidAxisLength { axis, value })
}

impl CubeMetadata {
    /// Open `path`, parse its header, and validate it against the file size.
    /// Failures are wrapped in [`Error::InFile`].
    pub fn from_path(path: &Path) -> Result<CubeMetadata> {
        let mut file = File::open(path).map_err(|e| Error::file(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| Error::file(path, e))?
            .len();
        let header = Header::read(&mut file).map_err(|e| Error::in_file(path, e))?;
        let meta = CubeMetadata::from_header(&header, file_len, path)
            .map_err(|e| Error::in_file(path, e))?;
        debug!(
            path = %path.display(),
            frame_start = meta.frame_start,
            frame_end = meta.frame_end,
            frame_next = meta.frame_next,
            "parsed cube header"
        );
        Ok(meta)
    }

    /// Derive and validate the metadata of a parsed header. Rules are checked
    /// in a fixed order and the first failure is returned.
    pub fn from_header(header: &Header, file_len: u64, path: &Path) -> Result<CubeMetadata> {
        if header.string_value("SIMPLE")? != "T" {
            return Err(Error::NotSimple);
        }

        let format = SampleFormat::from_bitpix(header.int_value("BITPIX")?)?;

        let naxis = header.int_value("NAXIS")?;
        if naxis != 3 {
            return Err(Error::UnsupportedNaxis(naxis));
        }

        let shape = [
            axis_len(1, header.int_value("NAXIS1")?)?,
            axis_len(2, header.int_value("NAXIS2")?)?,
            axis_len(3, header.int_value_or("NAXIS3", 1)?)?,
        ];

        let blank = match header.get_value("BLANK", None)? {
            Some(_) => {
                let blank = header.int_value("BLANK")?;
                if !format.is_integer() {
                    return Err(Error::BlankWithFloat {
                        blank,
                        bitpix: format.bitpix(),
                    });
                }
                Some(blank)
            }
            None => None,
        };

        let bzero = header.double_value_or("BZERO", 0.0)?;
        let bscale = header.double_value_or("BSCALE", 1.0)?;
        let mut wcs = [AxisWcs {
            crpix: 0.0,
            crval: 0.0,
            cdelt: 1.0,
        }; 3];
        for (i, axis) in wcs.iter_mut().enumerate() {
            let n = i + 1;
            axis.crval = header.double_value_or(&format!("CRVAL{n}"), 0.0)?;
            axis.cdelt = header.double_value_or(&format!("CDELT{n}"), 1.0)?;
            axis.crpix = header.double_value_or(&format!("CRPIX{n}"), 0.0)?;
        }
        let ctype = [
            header.string_value_or("CTYPE1", "")?,
            header.string_value_or("CTYPE2", "")?,
            header.string_value_or("CTYPE3", "")?,
        ];
        let cunit3 = header.string_value_or("CUNIT3", "")?;
        let bunit = header.string_value_or("BUNIT", "")?.trim().to_string();
        let equinox = header.double_value_or("EQUINOX", 2000.0)?;

        let data_offset = header.data_offset();
        let data_len = shape.iter().try_fold(format.byte_width() as u64, |acc, &n| {
            acc.checked_mul(n as u64)
        });
        // A size that does not fit in u64 can never be satisfied by the file.
        let Some((data_len, required)) =
            data_len.and_then(|len| Some((len, data_offset.checked_add(len)?)))
        else {
            return Err(Error::Truncated {
                required: u64::MAX,
                actual: file_len,
            });
        };
        if required > file_len {
            return Err(Error::Truncated {
                required,
                actual: file_len,
            });
        }

        let frame = wcs[2];
        let frame_start = (1.0 - frame.crpix) * frame.cdelt + frame.crval;
        let frame_end = frame_start + (shape[2] as f64 - 1.0) * frame.cdelt;
        let frame_next = frame_start + shape[2] as f64 * frame.cdelt;

        Ok(CubeMetadata {
            path: path.to_path_buf(),
            format,
            naxis,
            shape,
            bscale,
            bzero,
            blank,
            wcs,
            ctype,
            cunit3,
            bunit,
            equinox,
            data_offset,
            data_len,
            frame_start,
            frame_end,
            frame_next,
        })
    }

    /// Number of planes along the frame axis.
    pub fn frames(&self) -> usize {
        self.shape[2]
    }

    /// Increment along the frame axis.
    pub fn frame_step(&self) -> f64 {
        self.wcs[2].cdelt
    }
}
