//! Reading and writing TIFF rasters as pixel arrays.
//!
//! [`read_tiff`] walks the directory chain of a file or an in-memory buffer and decodes the
//! selected pages into channel-major [`PixelBuffer`]s, either by unpacking the stored samples
//! directly or through a generic RGBA conversion. [`write_tiff`] does the reverse, one directory
//! per image, into a file or a growable buffer.
//!
//! The lower-level [`codec`] module exposes the directory reader and writer both sides are
//! built on.
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> -
//!   The TIFF specification

extern crate weezl;

pub use self::{
  decode::{decode_directory, flip_rows, Conversion, DecodeOptions, Decoded},
  descriptor::{max_sample_value, Colormap, SampleDescriptor, Tiling, DIRECT_DEPTHS},
  encode::{classify, encode_directory, EncodeOptions, Reduction, ENCODE_DEPTHS},
  error::{ErrorKind, TiffError, TiffFormatError, TiffResult, TiffUnsupportedError},
  job::StreamJob,
  metadata::TiffInfo,
  pages::{
    read_tiff, write_tiff, Destination, Page, PageSelection, ReadOptions, Source, TiffPages,
    WriteOptions, Written,
  },
  pixels::{ColorTable, PixelBuffer, PixelData},
};

pub mod codec;
mod decode;
mod descriptor;
mod encode;
mod error;
mod job;
mod metadata;
mod pages;
mod pixels;
pub mod tags;
