//! Reading, validating and concatenating three-dimensional FITS cubes.
//!
//! [`cube::CubeMetadata`] parses and validates a primary header,
//! [`reader::CubeSampleReader`] decodes individual samples, and
//! [`combine::combine`] joins cubes along the frame axis into one file.

pub mod block;
pub mod card;
pub mod combine;
pub mod cube;
pub mod endian;
pub mod error;
pub mod header;
pub mod progress;
pub mod reader;
pub mod value;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use combine::{combine, ClipRange, CombineOptions, CombineReport, ContinuityWarning};
pub use cube::{CubeMetadata, SampleFormat};
pub use error::{Error, Result};
pub use header::Header;
pub use reader::CubeSampleReader;
