use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("cannot list {0}")]
    Glob(#[from] glob::GlobError),

    /// The output raster could not be created or written.
    #[error("could not create image file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("layer {index} is {got_width}x{got_height}, expected {width}x{height}")]
    ShapeMismatch {
        index: usize,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },

    #[error("layer {index} georeferencing differs from layer 0")]
    GeoReferenceMismatch { index: usize },

    #[error("need at least 2 layers, got {0}")]
    TooFewLayers(usize),

    #[error("{0} layers exceed the 8-bit change count range (max 256)")]
    TooManyLayers(usize),

    #[error("unsupported sample type in {path}: {kind}")]
    UnsupportedSampleType { path: PathBuf, kind: String },

    #[error("bad color table: {0}")]
    BadColorTable(String),

    #[error("no 4-digit year in file name {0}")]
    MissingYear(PathBuf),

    #[error("data length {got} does not match {width}x{height}")]
    Length { width: usize, height: usize, got: usize },

    #[error("value {0} is not a change count (0..=255)")]
    NotChangeCount(i32),
}

pub type Result<T> = std::result::Result<T, Error>;
