//! A compact TIFF codec: directory chain parsing, encoded chunk access and a directory writer.

use std::{
  collections::{HashMap, HashSet},
  convert::TryFrom,
  io::{Read, Seek},
};

use self::{
  ifd::{Directory, Value},
  image::Image,
  stream::{EndianReader, SmartReader},
};
use crate::{
  error::report_warning,
  tags::{
    CompressionMethod, PhotometricInterpretation, PlanarConfiguration, SampleFormat, Tag, Type,
  },
  TiffError, TiffFormatError, TiffResult,
};

pub(crate) mod compression;
pub mod ifd;
mod image;
pub(crate) mod rgba;
pub(crate) mod stream;
mod tag_reader;
mod writer;

pub use self::{image::ChunkLocation, stream::ByteOrder, writer::TiffWriter};

/// Decoding limits
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Limits {
  /// The maximum size of any decoded buffer in bytes, the default is
  /// 256MiB. This bounds both a single decoded chunk and a whole RGBA raster.
  pub decoding_buffer_size: usize,
  /// The maximum size of any ifd value in bytes, the default is
  /// 1MiB.
  pub ifd_value_size: usize,
  /// Maximum size of the compressed bytes of any one strip or tile.
  pub intermediate_buffer_size: usize,
}

impl Limits {
  /// A configuration that does not impose any limits.
  ///
  /// This is a good start if the caller only wants to impose selective limits, contrary to the
  /// default limits which allows selectively disabling limits.
  ///
  /// Note that this configuration is likely to crash on excessively large images since,
  /// naturally, the machine running the program does not have infinite memory.
  pub fn unlimited() -> Limits {
    Limits {
      decoding_buffer_size: usize::MAX,
      ifd_value_size: usize::MAX,
      intermediate_buffer_size: usize::MAX,
    }
  }
}

impl Default for Limits {
  fn default() -> Limits {
    Limits {
      decoding_buffer_size: 256 * 1024 * 1024,
      intermediate_buffer_size: 128 * 1024 * 1024,
      ifd_value_size: 1024 * 1024,
    }
  }
}

/// Reads a TIFF stream one directory at a time, strictly front to back.
#[derive(Debug)]
pub struct TiffReader<R> {
  reader: SmartReader<R>,
  bigtiff: bool,
  limits: Limits,
  next_ifd: Option<u64>,
  seen_ifds: HashSet<u64>,
  /// Zero-based position of the current directory in the chain
  current: usize,
  image: Image,
}

impl<R> TiffReader<R> {
  pub(crate) fn image(&self) -> &Image {
    &self.image
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.image.width, self.image.height)
  }

  /// Zero-based index of the directory currently loaded.
  pub fn directory_index(&self) -> usize {
    self.current
  }

  pub fn byte_order(&self) -> ByteOrder {
    self.reader.byte_order
  }

  pub fn is_bigtiff(&self) -> bool {
    self.bigtiff
  }

  pub fn limits(&self) -> &Limits {
    &self.limits
  }

  pub fn bits_per_sample(&self) -> u8 {
    self.image.bits_per_sample
  }

  pub fn samples_per_pixel(&self) -> u16 {
    self.image.samples
  }

  pub fn sample_format(&self) -> SampleFormat {
    self.image.sample_format
  }

  pub fn planar_config(&self) -> PlanarConfiguration {
    self.image.planar_config
  }

  pub fn photometric(&self) -> Option<PhotometricInterpretation> {
    self.image.photometric_interpretation
  }

  pub fn compression(&self) -> CompressionMethod {
    self.image.compression_method
  }

  pub fn rows_per_strip(&self) -> u32 {
    self.image.rows_per_strip
  }

  /// Number of strips or tiles across all planes of the current directory.
  pub fn chunk_count(&self) -> usize {
    self.image.chunk_offsets.len()
  }

  pub fn chunk_location(&self, chunk_index: usize) -> ChunkLocation {
    self.image.chunk_location(chunk_index)
  }

  /// Bytes of one stored row of a chunk as returned by [`TiffReader::read_encoded_chunk`].
  pub fn chunk_row_bytes(&self) -> TiffResult<usize> {
    self.image.chunk_row_bytes()
  }

  pub fn into_inner(self) -> R {
    self.reader.into_inner()
  }
}

impl<R: Read + Seek> TiffReader<R> {
  /// Opens a stream and loads its first directory.
  pub fn new(r: R) -> TiffResult<TiffReader<R>> {
    Self::with_limits(r, Limits::default())
  }

  pub fn with_limits(mut r: R, limits: Limits) -> TiffResult<TiffReader<R>> {
    let mut signature = Vec::with_capacity(2);
    (&mut r).take(2).read_to_end(&mut signature)?;
    let byte_order = match &*signature {
      b"II" => ByteOrder::LittleEndian,
      b"MM" => ByteOrder::BigEndian,
      _ => return Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound)),
    };
    let mut reader = SmartReader::wrap(r, byte_order);

    let bigtiff = match reader.read_u16()? {
      42 => false,
      43 => {
        // Bytesize of offsets, always 8 in BigTIFF
        if reader.read_u16()? != 8 {
          return Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound));
        }
        // This constant should always be 0
        if reader.read_u16()? != 0 {
          return Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound));
        }
        true
      }
      _ => return Err(TiffError::FormatError(TiffFormatError::TiffSignatureInvalid)),
    };
    let first_ifd = if bigtiff { reader.read_u64()? } else { u64::from(reader.read_u32()?) };
    if first_ifd == 0 {
      return Err(TiffError::FormatError(TiffFormatError::ImageFileDirectoryNotFound));
    }

    let (ifd, next_ifd) = Self::read_ifd(&mut reader, bigtiff, first_ifd)?;
    let mut seen_ifds = HashSet::new();
    seen_ifds.insert(first_ifd);
    if let Some(next) = next_ifd {
      if !seen_ifds.insert(next) {
        return Err(TiffError::FormatError(TiffFormatError::CycleInOffsets));
      }
    }

    let image = Image::from_reader(&mut reader, ifd, &limits, bigtiff)?;
    log::debug!(
      "opened {} TIFF, first directory {}x{}",
      if bigtiff { "big" } else { "classic" },
      image.width,
      image.height
    );

    Ok(TiffReader { reader, bigtiff, limits, next_ifd, seen_ifds, current: 0, image })
  }

  /// Returns `true` if there is at least one more image available.
  pub fn more_images(&self) -> bool {
    self.next_ifd.is_some()
  }

  /// Reads in the next image.
  /// If there is no further image in the TIFF file a format error is returned.
  /// To determine whether there are more images call [`TiffReader::more_images`] instead.
  pub fn next_image(&mut self) -> TiffResult<()> {
    let offset = self
      .next_ifd
      .take()
      .ok_or(TiffError::FormatError(TiffFormatError::ImageFileDirectoryNotFound))?;

    let (ifd, next_ifd) = Self::read_ifd(&mut self.reader, self.bigtiff, offset)?;
    if let Some(next) = next_ifd {
      if !self.seen_ifds.insert(next) {
        return Err(TiffError::FormatError(TiffFormatError::CycleInOffsets));
      }
    }
    self.next_ifd = next_ifd;

    self.image = Image::from_reader(&mut self.reader, ifd, &self.limits, self.bigtiff)?;
    self.current += 1;
    log::trace!("advanced to directory {}", self.current);
    Ok(())
  }

  /// Reads a IFD entry.
  // An IFD entry has four fields:
  //
  // Tag   2 bytes
  // Type  2 bytes
  // Count 4 bytes (8 in BigTIFF)
  // Value 4 bytes (8 in BigTIFF) either a pointer the value itself
  fn read_entry(
    reader: &mut SmartReader<R>, bigtiff: bool,
  ) -> TiffResult<Option<(Tag, ifd::Entry)>> {
    let tag = Tag::from_u16_exhaustive(reader.read_u16()?);
    let raw_type = reader.read_u16()?;
    let type_ = match Type::from_u16(raw_type) {
      Some(t) => t,
      None => {
        // Unknown type, skip the rest of the entry.
        if bigtiff {
          reader.read_u64()?;
          reader.read_u64()?;
        } else {
          reader.read_u32()?;
          reader.read_u32()?;
        }
        report_warning("codec", format_args!("skipping {tag:?} with unknown field type {raw_type}"));
        return Ok(None);
      }
    };

    let entry = if bigtiff {
      let mut offset = [0; 8];

      let count = reader.read_u64()?;
      reader.read_exact(&mut offset)?;
      ifd::Entry::new_u64(type_, count, offset)
    } else {
      let mut offset = [0; 4];

      let count = reader.read_u32()?;
      reader.read_exact(&mut offset)?;
      ifd::Entry::new(type_, count, offset)
    };
    Ok(Some((tag, entry)))
  }

  /// Reads the IFD starting at the indicated location.
  fn read_ifd(
    reader: &mut SmartReader<R>, bigtiff: bool, ifd_location: u64,
  ) -> TiffResult<(Directory, Option<u64>)> {
    reader.goto_offset(ifd_location)?;

    let mut dir: Directory = HashMap::new();

    let num_tags = if bigtiff { reader.read_u64()? } else { reader.read_u16()?.into() };
    for _ in 0..num_tags {
      if let Some((tag, entry)) = Self::read_entry(reader, bigtiff)? {
        dir.insert(tag, entry);
      }
    }

    let next_ifd = if bigtiff { reader.read_u64()? } else { reader.read_u32()?.into() };

    let next_ifd = match next_ifd {
      0 => None,
      _ => Some(next_ifd),
    };

    Ok((dir, next_ifd))
  }

  /// Tries to retrieve a tag.
  /// Return `Ok(None)` if the tag is not present.
  pub fn find_tag(&mut self, tag: Tag) -> TiffResult<Option<Value>> {
    let entry = match self.image.ifd.as_ref().and_then(|ifd| ifd.get(&tag)) {
      None => return Ok(None),
      Some(entry) => entry.clone(),
    };

    Ok(Some(entry.val(&self.limits, self.bigtiff, &mut self.reader)?))
  }

  /// Tries to retrieve a tag and convert it to the desired unsigned type.
  pub fn find_tag_unsigned<T: TryFrom<u64>>(&mut self, tag: Tag) -> TiffResult<Option<T>> {
    self
      .find_tag(tag)?
      .map(Value::into_u64)
      .transpose()?
      .map(|value| T::try_from(value).map_err(|_| TiffFormatError::InvalidTagValueType(tag).into()))
      .transpose()
  }

  /// Tries to retrieve a vector of all a tag's values and convert them to
  /// the desired unsigned type.
  pub fn find_tag_unsigned_vec<T: TryFrom<u64>>(&mut self, tag: Tag) -> TiffResult<Option<Vec<T>>> {
    self
      .find_tag(tag)?
      .map(Value::into_u64_vec)
      .transpose()?
      .map(|v| {
        v.into_iter()
          .map(|u| T::try_from(u).map_err(|_| TiffFormatError::InvalidTagValueType(tag).into()))
          .collect()
      })
      .transpose()
  }

  /// Tries to retrieve a tag.
  /// Returns an error if the tag is not present
  pub fn get_tag(&mut self, tag: Tag) -> TiffResult<Value> {
    match self.find_tag(tag)? {
      Some(val) => Ok(val),
      None => Err(TiffError::FormatError(TiffFormatError::RequiredTagNotFound(tag))),
    }
  }

  /// Reads one strip or tile and returns its decompressed bytes.
  ///
  /// Rows are laid out as stored: `chunk_row_bytes()` each, tiles keep their padding. 16, 32 and
  /// 64 bit samples are in host byte order and the horizontal predictor has been undone.
  pub fn read_encoded_chunk(&mut self, chunk_index: usize) -> TiffResult<Vec<u8>> {
    let (offset, _) = self.image.chunk_file_range(chunk_index)?;
    self.reader.goto_offset(offset)?;
    let byte_order = self.reader.byte_order;
    self.image.expand_chunk(&mut self.reader, byte_order, chunk_index, &self.limits)
  }
}
