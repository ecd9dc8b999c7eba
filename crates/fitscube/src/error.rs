use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur while reading, validating, or combining cubes.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error on a specific file.
    #[error("I/O error on {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sample window could not be filled with at least one sample.
    #[error("short read at byte {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead { offset: u64, wanted: usize, got: usize },

    /// A quoted card value has no closing quote.
    #[error("unterminated string in header for {keyword}")]
    UnterminatedString { keyword: String },

    /// Text after a card value does not start with `/`.
    #[error("syntax error in header: {card}")]
    CardSyntax { card: String },

    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),

    /// A keyword is present but its value has the wrong type.
    #[error("found {keyword}={value} but expected {expected}")]
    InvalidValue {
        keyword: String,
        value: String,
        expected: &'static str,
    },

    /// The primary header does not declare `SIMPLE = T`.
    #[error("FITS file does not have 'SIMPLE = T'")]
    NotSimple,

    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),

    /// Recognized but unsupported BITPIX value (64-bit integer samples).
    #[error("unsupported BITPIX value: {0}")]
    UnsupportedBitpix(i64),

    /// Only three-dimensional cubes are handled.
    #[error("cannot deal with files that have NAXIS={0}")]
    UnsupportedNaxis(i64),

    /// Negative axis extent.
    #[error("invalid NAXIS{axis} value: {value}")]
    InvalidAxisLength { axis: u8, value: i64 },

    /// BLANK is only meaningful for integer samples.
    #[error("invalid use of BLANK = {blank} keyword with BITPIX = {bitpix}")]
    BlankWithFloat { blank: i64, bitpix: i64 },

    /// The file is shorter than its header says.
    #[error("invalid FITS file size, maybe accidentally truncated? need {required} bytes, have {actual}")]
    Truncated { required: u64, actual: u64 },

    /// Requested sample lies outside the cube.
    #[error("sample ({x}, {y}, {z}) is outside the cube")]
    SampleOutOfBounds { x: usize, y: usize, z: usize },

    /// The input cubes cannot be concatenated.
    #[error("incompatible FITS files:{}", DisplayList(.0))]
    Incompatible(Vec<Incompatibility>),

    /// Nothing to combine.
    #[error("no input files given")]
    NoInputs,

    /// An error raised while handling a particular input file.
    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Strip any [`Error::InFile`] wrappers and return the underlying cause.
    pub fn root(&self) -> &Error {
        match self {
            Error::InFile { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_file(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::InFile {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

/// One keyword that differs between two adjacent cubes.
#[derive(Debug, Clone, PartialEq)]
pub struct Incompatibility {
    pub keyword: &'static str,
    pub first: PathBuf,
    pub second: PathBuf,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} incompatible between {} and {}",
            self.keyword,
            self.first.display(),
            self.second.display()
        )
    }
}

struct DisplayList<'a>(&'a [Incompatibility]);

impl fmt::Display for DisplayList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in self.0 {
            write!(f, "\n  {item}")?;
        }
        Ok(())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
