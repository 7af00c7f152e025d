//! Resolution of a directory's geometry and sample description.

use std::io::{Read, Seek};

use crate::{
  codec::TiffReader,
  tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration, SampleFormat, Tag},
  TiffFormatError, TiffResult, TiffUnsupportedError,
};

/// Depths the sample decoder unpacks itself.
pub const DIRECT_DEPTHS: [u16; 4] = [8, 12, 16, 32];

/// Palette lookup tables of 16-bit entries.
///
/// Tables are populated front to back: a map with only a red table has one channel, red and
/// green two, all three tables three.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Colormap {
  pub red: Vec<u16>,
  pub green: Vec<u16>,
  pub blue: Vec<u16>,
}

impl Colormap {
  /// Splits the flat `ColorMap` tag value into its tables of `entries` each.
  pub fn from_flat(mut map: Vec<u16>, entries: usize) -> TiffResult<Colormap> {
    if entries == 0 || map.len() % entries != 0 || map.len() / entries > 3 || map.is_empty() {
      return Err(TiffFormatError::InvalidColorMap(map.len(), entries).into());
    }
    let mut tables = Vec::with_capacity(3);
    while !map.is_empty() {
      let rest = map.split_off(entries);
      tables.push(map);
      map = rest;
    }
    let mut tables = tables.into_iter();
    Ok(Colormap {
      red: tables.next().unwrap_or_default(),
      green: tables.next().unwrap_or_default(),
      blue: tables.next().unwrap_or_default(),
    })
  }

  pub fn entries(&self) -> usize {
    self.red.len()
  }

  /// Number of leading non-empty tables.
  pub fn populated_tables(&self) -> usize {
    self.tables().iter().take_while(|t| !t.is_empty()).count()
  }

  pub fn tables(&self) -> [&[u16]; 3] {
    [&self.red, &self.green, &self.blue]
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tiling {
  pub tile_width: u32,
  pub tile_length: u32,
}

/// Read-only snapshot of one directory's sample layout.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleDescriptor {
  pub width: u32,
  pub height: u32,
  /// Volumetric depth, 0 for plain images
  pub depth: u32,
  pub bits_per_sample: u16,
  pub samples_per_pixel: u16,
  pub sample_format: SampleFormat,
  pub planar_config: PlanarConfiguration,
  pub photometric: Option<PhotometricInterpretation>,
  pub compression: CompressionMethod,
  pub rows_per_strip: u32,
  pub colormap: Option<Colormap>,
  pub tiling: Option<Tiling>,
}

impl SampleDescriptor {
  /// Reads the descriptor of the reader's current directory.
  ///
  /// With `strict_depth` only the depths in [`DIRECT_DEPTHS`] are accepted; the generic RGBA
  /// conversion passes `false` and handles whatever it can itself.
  pub fn resolve<R: Read + Seek>(
    reader: &mut TiffReader<R>, strict_depth: bool,
  ) -> TiffResult<SampleDescriptor> {
    let (width, height) = reader.dimensions();
    let depth = reader.find_tag_unsigned::<u32>(Tag::ImageDepth)?.unwrap_or(0);
    let bits_per_sample = u16::from(reader.bits_per_sample());
    let samples_per_pixel = reader.samples_per_pixel();

    if strict_depth && !DIRECT_DEPTHS.contains(&bits_per_sample) {
      return Err(TiffUnsupportedError::UnsupportedBitsPerSample(bits_per_sample).into());
    }

    let tiling = match reader.find_tag_unsigned::<u32>(Tag::TileWidth)? {
      Some(tile_width) => Some(Tiling {
        tile_width,
        tile_length: reader.find_tag_unsigned::<u32>(Tag::TileLength)?.unwrap_or(0),
      }),
      None => None,
    };

    let colormap = match reader.find_tag_unsigned_vec::<u16>(Tag::ColorMap)? {
      Some(_) if bits_per_sample > 16 => {
        return Err(TiffUnsupportedError::ColorMapDepth(bits_per_sample).into())
      }
      Some(_) if samples_per_pixel != 1 => {
        return Err(TiffFormatError::ColorMapWithSamples(samples_per_pixel).into())
      }
      Some(map) => Some(Colormap::from_flat(map, 1 << bits_per_sample)?),
      None => None,
    };

    let descriptor = SampleDescriptor {
      width,
      height,
      depth,
      bits_per_sample,
      samples_per_pixel,
      sample_format: reader.sample_format(),
      planar_config: reader.planar_config(),
      photometric: reader.photometric(),
      compression: reader.compression(),
      rows_per_strip: reader.rows_per_strip(),
      colormap,
      tiling,
    };
    log::debug!(
      "directory {}: {}x{}x{}, {} bits x {} samples, {}",
      reader.directory_index() + 1,
      width,
      height,
      depth,
      bits_per_sample,
      samples_per_pixel,
      if descriptor.tiling.is_some() { "tiled" } else { "stripped" }
    );
    Ok(descriptor)
  }

  pub fn is_float(&self) -> bool {
    self.sample_format == SampleFormat::IEEEFP
  }

  pub fn is_tiled(&self) -> bool {
    self.tiling.is_some()
  }

  /// Largest code an unsigned sample of this depth can hold.
  pub fn max_value(&self) -> f64 {
    max_sample_value(self.bits_per_sample)
  }
}

/// Scale of normalized samples: `2^bits - 1`.
pub fn max_sample_value(bits_per_sample: u16) -> f64 {
  match bits_per_sample {
    8 => 255.0,
    12 => 4095.0,
    16 => 65535.0,
    32 => 4_294_967_295.0,
    b => ((1u64 << b.min(63)) - 1) as f64,
  }
}
