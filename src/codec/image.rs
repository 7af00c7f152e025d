use std::{
  convert::TryFrom,
  io::{self, Read, Seek},
};

use super::{
  ifd::Directory,
  stream::{ByteOrder, LZWReader, PackBitsReader, SmartReader},
  tag_reader::TagReader,
  Limits,
};
use crate::{
  tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration, Predictor, SampleFormat, Tag},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Chunk type of the internal representation
pub(crate) enum ChunkType {
  Strip,
  Tile,
}

#[derive(Debug, Clone, Default)]
/// Computed values useful for tile decoding
pub(crate) struct TileAttributes {
  pub image_width: usize,
  pub image_height: usize,

  pub tile_width: usize,
  pub tile_length: usize,
}

impl TileAttributes {
  pub fn tiles_across(&self) -> usize {
    (self.image_width + self.tile_width - 1) / self.tile_width
  }

  pub fn tiles_down(&self) -> usize {
    (self.image_height + self.tile_length - 1) / self.tile_length
  }
}

/// Where a chunk's pixels land in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
  /// Sample plane, always 0 for contiguous data
  pub plane: usize,
  pub x: usize,
  pub y: usize,
  /// Width and height of the chunk's pixels that fall inside the image
  pub width: usize,
  pub height: usize,
}

#[derive(Debug)]
pub(crate) struct Image {
  pub ifd: Option<Directory>,
  pub width: u32,
  pub height: u32,
  pub bits_per_sample: u8,
  pub samples: u16,
  pub sample_format: SampleFormat,
  pub photometric_interpretation: Option<PhotometricInterpretation>,
  pub compression_method: CompressionMethod,
  pub predictor: Predictor,
  pub planar_config: PlanarConfiguration,
  pub chunk_type: ChunkType,
  pub rows_per_strip: u32,
  pub tile_attributes: Option<TileAttributes>,
  pub chunk_offsets: Vec<u64>,
  pub chunk_bytes: Vec<u64>,
}

impl Image {
  pub fn from_reader<R: Read + Seek>(
    reader: &mut SmartReader<R>, ifd: Directory, limits: &Limits, bigtiff: bool,
  ) -> TiffResult<Image> {
    let mut tags = TagReader::new(reader, &ifd, limits, bigtiff);

    let width = tags.require_u32(Tag::ImageWidth)?;
    let height = tags.require_u32(Tag::ImageLength)?;
    if width == 0 || height == 0 {
      return Err(TiffError::FormatError(TiffFormatError::InvalidDimensions(width, height)));
    }

    // Absent tags take their baseline defaults, never the previous directory's values.
    let compression_method = tags
      .find_u16(Tag::Compression)?
      .map_or(CompressionMethod::None, CompressionMethod::from_u16_exhaustive);

    let samples = tags.find_u16(Tag::SamplesPerPixel)?.unwrap_or(1);
    if samples == 0 {
      return Err(TiffFormatError::SamplesPerPixelIsZero.into());
    }

    let sample_formats: Vec<SampleFormat> = tags
      .find_uint_vec::<u16>(Tag::SampleFormat)?
      .map(|codes| codes.into_iter().map(SampleFormat::from_u16_exhaustive).collect())
      .unwrap_or_default();
    if sample_formats.windows(2).any(|s| s[0] != s[1]) {
      return Err(TiffUnsupportedError::UnsupportedSampleFormat(sample_formats).into());
    }
    let sample_format = sample_formats.first().copied().unwrap_or(SampleFormat::Uint);

    // Missing depth reads as 8 bits rather than the bilevel baseline default.
    let bits_per_sample: Vec<u8> = tags.find_uint_vec(Tag::BitsPerSample)?.unwrap_or_else(|| vec![8]);
    // A single value is commonly written for all samples.
    if bits_per_sample.len() != usize::from(samples) && bits_per_sample.len() != 1 {
      return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered));
    }
    if bits_per_sample.iter().any(|&b| b != bits_per_sample[0]) {
      return Err(TiffUnsupportedError::InconsistentBitsPerSample(bits_per_sample).into());
    }

    let predictor = tags
      .find_code(Tag::Predictor, Predictor::from_u16, TiffFormatError::UnknownPredictor)?
      .unwrap_or(Predictor::None);
    let planar_config = tags
      .find_code(
        Tag::PlanarConfiguration,
        PlanarConfiguration::from_u16,
        TiffFormatError::UnknownPlanarConfiguration,
      )?
      .unwrap_or(PlanarConfiguration::Chunky);
    let photometric_interpretation =
      tags.find_u16(Tag::PhotometricInterpretation)?.and_then(PhotometricInterpretation::from_u16);

    let planes = match planar_config {
      PlanarConfiguration::Chunky => 1,
      PlanarConfiguration::Planar => usize::from(samples),
    };

    let stripped = tags.has(Tag::StripOffsets) && tags.has(Tag::StripByteCounts);
    let tiled = tags.has(Tag::TileOffsets) && tags.has(Tag::TileByteCounts);
    let (chunk_type, rows_per_strip, tile_attributes, (chunk_offsets, chunk_bytes)) =
      match (stripped, tiled) {
        (true, false) => {
          let rows_per_strip = tags.find_u32(Tag::RowsPerStrip)?.unwrap_or(height).clamp(1, height);
          let strips = height.div_ceil(rows_per_strip) as usize * planes;
          let table = tags.chunk_table(Tag::StripOffsets, Tag::StripByteCounts, strips)?;
          (ChunkType::Strip, rows_per_strip, None, table)
        }
        (false, true) => {
          let tile_width = usize::try_from(tags.require_u32(Tag::TileWidth)?)?;
          let tile_length = usize::try_from(tags.require_u32(Tag::TileLength)?)?;
          if tile_width == 0 {
            return Err(TiffFormatError::InvalidTagValueType(Tag::TileWidth).into());
          } else if tile_length == 0 {
            return Err(TiffFormatError::InvalidTagValueType(Tag::TileLength).into());
          }

          let attributes = TileAttributes {
            image_width: usize::try_from(width)?,
            image_height: usize::try_from(height)?,
            tile_width,
            tile_length,
          };
          let tiles = attributes.tiles_down() * attributes.tiles_across() * planes;
          let table = tags.chunk_table(Tag::TileOffsets, Tag::TileByteCounts, tiles)?;
          (ChunkType::Tile, height, Some(attributes), table)
        }
        _ => return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered)),
      };

    Ok(Image {
      ifd: Some(ifd),
      width,
      height,
      bits_per_sample: bits_per_sample[0],
      samples,
      sample_format,
      photometric_interpretation,
      compression_method,
      predictor,
      planar_config,
      chunk_type,
      rows_per_strip,
      tile_attributes,
      chunk_offsets,
      chunk_bytes,
    })
  }

  fn create_reader<'r, R: 'r + Read>(
    reader: R, compression_method: CompressionMethod, compressed_length: u64,
  ) -> TiffResult<Box<dyn Read + 'r>> {
    Ok(match compression_method {
      CompressionMethod::None => Box::new(reader.take(compressed_length)),
      CompressionMethod::LZW => {
        Box::new(LZWReader::new(reader, usize::try_from(compressed_length)?)?)
      }
      CompressionMethod::Deflate | CompressionMethod::OldDeflate => {
        Box::new(flate2::read::ZlibDecoder::new(reader.take(compressed_length)))
      }
      CompressionMethod::PackBits => Box::new(PackBitsReader::new(reader, compressed_length)),
      method => {
        return Err(TiffError::UnsupportedError(
          TiffUnsupportedError::UnsupportedCompressionMethod(method),
        ))
      }
    })
  }

  /// Samples per pixel within chunk.
  ///
  /// In planar config, samples are stored in separate strips/chunks, also called bands.
  ///
  /// Example with `bits_per_sample = [8, 8, 8]` and `PhotometricInterpretation::RGB`:
  /// * `PlanarConfiguration::Chunky` -> 3 (RGBRGBRGB...)
  /// * `PlanarConfiguration::Planar` -> 1 (RRR...) (GGG...) (BBB...)
  pub(crate) fn samples_per_chunk(&self) -> usize {
    match self.planar_config {
      PlanarConfiguration::Chunky => self.samples.into(),
      PlanarConfiguration::Planar => 1,
    }
  }

  pub(crate) fn planes(&self) -> usize {
    match self.planar_config {
      PlanarConfiguration::Chunky => 1,
      PlanarConfiguration::Planar => self.samples.into(),
    }
  }

  pub(crate) fn chunks_per_plane(&self) -> usize {
    match &self.tile_attributes {
      Some(t) => t.tiles_across() * t.tiles_down(),
      None => self.height.div_ceil(self.rows_per_strip) as usize,
    }
  }

  pub(crate) fn chunk_file_range(&self, chunk: usize) -> TiffResult<(u64, u64)> {
    let file_offset = self
      .chunk_offsets
      .get(chunk)
      .ok_or(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered))?;

    let compressed_bytes = self
      .chunk_bytes
      .get(chunk)
      .ok_or(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered))?;

    Ok((*file_offset, *compressed_bytes))
  }

  /// The stored size of every chunk; strips span the full width, tiles keep their padding.
  pub(crate) fn chunk_dimensions(&self) -> (usize, usize) {
    match &self.tile_attributes {
      Some(t) => (t.tile_width, t.tile_length),
      None => (self.width as usize, self.rows_per_strip as usize),
    }
  }

  pub(crate) fn chunk_location(&self, chunk_index: usize) -> ChunkLocation {
    let per_plane = self.chunks_per_plane().max(1);
    let plane = chunk_index / per_plane;
    let index = chunk_index % per_plane;
    let (image_width, image_height) = (self.width as usize, self.height as usize);

    match &self.tile_attributes {
      Some(t) => {
        let x = (index % t.tiles_across()) * t.tile_width;
        let y = (index / t.tiles_across()) * t.tile_length;
        ChunkLocation {
          plane,
          x,
          y,
          width: t.tile_width.min(image_width - x),
          height: t.tile_length.min(image_height - y),
        }
      }
      None => {
        let rows = self.rows_per_strip as usize;
        let y = index * rows;
        ChunkLocation { plane, x: 0, y, width: image_width, height: rows.min(image_height - y) }
      }
    }
  }

  /// Bytes per stored row of a chunk. Rows always start on a byte boundary.
  pub(crate) fn chunk_row_bytes(&self) -> TiffResult<usize> {
    let bits = self
      .chunk_dimensions()
      .0
      .checked_mul(self.samples_per_chunk())
      .and_then(|n| n.checked_mul(usize::from(self.bits_per_sample)))
      .ok_or(TiffError::LimitsExceeded)?;
    Ok(bits.div_ceil(8))
  }

  /// Decoded size of a chunk: strips hold only their own rows, tiles are always full size.
  pub(crate) fn expected_chunk_len(&self, chunk_index: usize) -> TiffResult<usize> {
    let rows = match self.chunk_type {
      ChunkType::Tile => self.chunk_dimensions().1,
      ChunkType::Strip => self.chunk_location(chunk_index).height,
    };
    rows.checked_mul(self.chunk_row_bytes()?).ok_or(TiffError::LimitsExceeded)
  }

  /// Reads and decompresses one chunk, leaving 16/32/64 bit samples in host byte order.
  pub(crate) fn expand_chunk(
    &self, reader: impl Read, byte_order: ByteOrder, chunk_index: usize, limits: &Limits,
  ) -> TiffResult<Vec<u8>> {
    match self.predictor {
      Predictor::FloatingPoint => {
        return Err(TiffError::UnsupportedError(TiffUnsupportedError::FloatingPointPredictor));
      }
      Predictor::Horizontal if !matches!(self.bits_per_sample, 8 | 16 | 32) => {
        return Err(
          TiffUnsupportedError::HorizontalPredictor(self.bits_per_sample.into()).into(),
        );
      }
      _ => {}
    }

    let (_, compressed_bytes) = self.chunk_file_range(chunk_index)?;
    if compressed_bytes > limits.intermediate_buffer_size as u64 {
      return Err(TiffError::LimitsExceeded);
    }
    let expected = self.expected_chunk_len(chunk_index)?;
    if expected > limits.decoding_buffer_size {
      return Err(TiffError::LimitsExceeded);
    }

    let mut reader = Self::create_reader(reader, self.compression_method, compressed_bytes)?;
    let mut chunk = vec![0u8; expected];
    let mut filled = 0;
    while filled < expected {
      match reader.read(&mut chunk[filled..]) {
        Ok(0) => break,
        Ok(n) => filled += n,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
        Err(e) => return Err(e.into()),
      }
    }
    if filled < expected {
      return Err(
        TiffFormatError::ChunkTooShort { chunk: chunk_index, expected, actual: filled }.into(),
      );
    }

    let row_bytes = self.chunk_row_bytes()?;
    let samples = self.samples_per_chunk();
    for row in chunk.chunks_exact_mut(row_bytes.max(1)) {
      fix_endianness(row, self.bits_per_sample, byte_order);
      if self.predictor == Predictor::Horizontal {
        rev_hpredict_row(row, samples, self.bits_per_sample);
      }
    }

    Ok(chunk)
  }
}

/// Swaps sample bytes when the file order differs from the host. Sub-byte and packed
/// depths are byte streams and stay untouched.
fn fix_endianness(row: &mut [u8], bits_per_sample: u8, byte_order: ByteOrder) {
  if byte_order == ByteOrder::native() {
    return;
  }
  match bits_per_sample {
    16 => row.chunks_exact_mut(2).for_each(|s| s.reverse()),
    32 => row.chunks_exact_mut(4).for_each(|s| s.reverse()),
    64 => row.chunks_exact_mut(8).for_each(|s| s.reverse()),
    _ => {}
  }
}

macro_rules! rev_hpredict {
  ($row:expr, $samples:expr, $ty:ty) => {{
    const N: usize = std::mem::size_of::<$ty>();
    let stride = $samples * N;
    let mut i = stride;
    while i + N <= $row.len() {
      let mut prev = [0u8; N];
      let mut cur = [0u8; N];
      prev.copy_from_slice(&$row[i - stride..i - stride + N]);
      cur.copy_from_slice(&$row[i..i + N]);
      let sum = <$ty>::from_ne_bytes(cur).wrapping_add(<$ty>::from_ne_bytes(prev));
      $row[i..i + N].copy_from_slice(&sum.to_ne_bytes());
      i += N;
    }
  }};
}

/// Undoes horizontal differencing on one row whose samples are already in host order.
fn rev_hpredict_row(row: &mut [u8], samples: usize, bits_per_sample: u8) {
  match bits_per_sample {
    8 => rev_hpredict!(row, samples, u8),
    16 => rev_hpredict!(row, samples, u16),
    32 => rev_hpredict!(row, samples, u32),
    _ => {}
  }
}
