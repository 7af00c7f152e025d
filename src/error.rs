use std::{io, string::FromUtf8Error};

use thiserror::Error;

use crate::{
  codec::ifd::Value,
  tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration, SampleFormat, Tag},
};

/// Tiff error kinds.
#[derive(Debug, Error)]
pub enum TiffError {
  /// The Image is not formatted properly.
  #[error("format error: {0}")]
  FormatError(#[from] TiffFormatError),

  /// The reader or writer does not support features required by the image.
  #[error("unsupported: {0}")]
  UnsupportedError(#[from] TiffUnsupportedError),

  /// An I/O Error occurred while decoding the image.
  #[error("{0}")]
  IoError(#[from] io::Error),

  /// A path could not be opened or created.
  #[error("unable to open {target}: {source}")]
  Open { target: String, source: io::Error },

  /// The pixel array handed to the encoder has an unusable shape.
  #[error("invalid image shape: {0}")]
  Shape(String),

  /// The requested options contradict each other or name impossible pages.
  #[error("invalid options: {0}")]
  Options(&'static str),

  /// A seek on a memory-backed stream left its extent.
  #[error("attempted to seek to {offset}, beyond the {len} bytes of the stream")]
  Boundary { offset: i64, len: u64 },

  /// The reader limits are exceeded.
  #[error("the reader limits are exceeded")]
  LimitsExceeded,

  /// An integer conversion to or from a platform size failed, either due to
  /// limits of the platform size or limits of the format.
  #[error("platform or format size limits exceeded")]
  IntSizeError,
}

/// The coarse category of a failure, for callers that only branch on the class of
/// problem rather than its details.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  OpenFailure,
  UnsupportedFormat,
  ShapeError,
  BoundaryError,
  CodecFault,
}

impl TiffError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      TiffError::Open { .. }
      | TiffError::FormatError(TiffFormatError::TiffSignatureNotFound)
      | TiffError::FormatError(TiffFormatError::TiffSignatureInvalid) => ErrorKind::OpenFailure,
      TiffError::UnsupportedError(_) | TiffError::Options(_) => ErrorKind::UnsupportedFormat,
      TiffError::Shape(_) => ErrorKind::ShapeError,
      TiffError::Boundary { .. } => ErrorKind::BoundaryError,
      TiffError::IoError(e) if boundary_of(e).is_some() => ErrorKind::BoundaryError,
      _ => ErrorKind::CodecFault,
    }
  }
}

/// Extracts a boundary violation that travelled through an `io::Error`.
fn boundary_of(e: &io::Error) -> Option<&TiffError> {
  e.get_ref()
    .and_then(|inner| inner.downcast_ref::<TiffError>())
    .filter(|inner| matches!(inner, TiffError::Boundary { .. }))
}

/// The image is not formatted properly.
///
/// This indicates that the encoder producing the image might behave incorrectly or that the
/// input file has been corrupted.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum TiffFormatError {
  #[error("TIFF signature not found.")]
  TiffSignatureNotFound,
  #[error("TIFF signature invalid.")]
  TiffSignatureInvalid,
  #[error("Image file directory not found.")]
  ImageFileDirectoryNotFound,
  #[error("Inconsistent sizes encountered.")]
  InconsistentSizesEncountered,
  #[error("Invalid dimensions: {0}x{1}.")]
  InvalidDimensions(u32, u32),
  #[error("Value of {0:?} has an invalid type.")]
  InvalidTagValueType(Tag),
  #[error("Required tag {0:?} not found.")]
  RequiredTagNotFound(Tag),
  #[error("Unknown predictor \u{201c}{0}\u{201d} encountered")]
  UnknownPredictor(u16),
  #[error("Unknown planar configuration \u{201c}{0}\u{201d} encountered")]
  UnknownPlanarConfiguration(u16),
  #[error("Expected unsigned integer, {0:?} found.")]
  UnsignedIntegerExpected(Value),
  #[error("Expected signed integer, {0:?} found.")]
  SignedIntegerExpected(Value),
  #[error("Expected a number, {0:?} found.")]
  NumberExpected(Value),
  #[error("Expected a string, {0:?} found.")]
  AsciiExpected(Value),
  #[error("File contains a cycle in the list of IFDs")]
  CycleInOffsets,
  #[error("Samples per pixel is zero")]
  SamplesPerPixelIsZero,
  #[error("Color map has {0} entries, expected three tables of {1}")]
  InvalidColorMap(usize, usize),
  #[error("Color map requires one sample per pixel, found {0}")]
  ColorMapWithSamples(u16),
  #[error("Palette index {0} outside a color map of {1} entries")]
  ColorMapIndexOutOfRange(u32, usize),
  #[error("Chunk {chunk} holds {actual} bytes, expected {expected}")]
  ChunkTooShort { chunk: usize, expected: usize, actual: usize },
  #[error("Invalid UTF-8 in a string tag: {0}")]
  InvalidString(#[from] FromUtf8Error),
}

/// The reader or writer does not support features required by the image.
///
/// This only captures known failures for which the standard either does not require support or
/// an implementation has been planned but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TiffUnsupportedError {
  #[error("image has {0} bits/sample which is unsupported in direct mode - use a generic RGBA conversion")]
  UnsupportedBitsPerSample(u16),
  #[error("only 8, 16 or 32 bits per sample can be written, {0} requested")]
  UnsupportedEncodeDepth(u16),
  #[error("Sample bit depths {0:?} are inconsistent.")]
  InconsistentBitsPerSample(Vec<u8>),
  #[error("Sample format {0:?} is unsupported.")]
  UnsupportedSampleFormat(Vec<SampleFormat>),
  #[error("Compression method {0:?} is unsupported")]
  UnsupportedCompressionMethod(CompressionMethod),
  #[error("{0} bits per sample cannot be converted to RGBA")]
  RgbaBitsPerSample(u16),
  #[error("Photometric interpretation {0:?} is unsupported by the RGBA conversion")]
  UnsupportedPhotometric(PhotometricInterpretation),
  #[error("Planar configuration {0:?} is unsupported here")]
  UnsupportedPlanarConfig(PlanarConfiguration),
  #[error("Floating point predictor is unsupported")]
  FloatingPointPredictor,
  #[error("Horizontal predictor for {0} bits per sample is unsupported")]
  HorizontalPredictor(u16),
  #[error("tiled images with {0} are not supported in direct mode - use a generic RGBA conversion")]
  TiledLayout(&'static str),
  #[error("{0}-bit color maps are not supported in direct mode")]
  ColorMapDepth(u16),
  #[error("as-is integer output was requested, but the image holds floating point samples")]
  AsIsFloat,
  #[error("{0} buffers cannot be encoded")]
  EncodeRepresentation(&'static str),
}

/// Result of an image decoding/encoding process
pub type TiffResult<T> = Result<T, TiffError>;

impl From<std::num::TryFromIntError> for TiffError {
  fn from(_err: std::num::TryFromIntError) -> Self {
    TiffError::IntSizeError
  }
}

impl From<FromUtf8Error> for TiffError {
  fn from(err: FromUtf8Error) -> Self {
    TiffError::FormatError(TiffFormatError::InvalidString(err))
  }
}

/// Single path through which every non-fatal condition is reported.
pub(crate) fn report_warning(module: &str, message: std::fmt::Arguments<'_>) {
  log::warn!(target: "tiffraster", "{module}: {message}");
}
