//! The sample decoder: turns a directory's strips or tiles into a [`PixelBuffer`].

use std::io::{Read, Seek};

use crate::{
  codec::{rgba::sample_at, TiffReader},
  descriptor::{Colormap, SampleDescriptor},
  error::report_warning,
  pixels::{ColorTable, PixelBuffer, PixelData},
  tags::{PlanarConfiguration, SampleFormat},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

/// How samples are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Conversion {
  /// Unpack samples directly, normalized by the bit depth
  #[default]
  Direct,
  /// Generic RGBA conversion kept as one packed value per pixel
  Packed,
  /// Generic RGBA conversion split into channels scaled to `[0, 1]`
  Normalized,
}

impl Conversion {
  pub fn is_generic(&self) -> bool {
    !matches!(self, Conversion::Direct)
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
  pub conversion: Conversion,
  /// Return palette indices instead of looked up colors
  pub indexed: bool,
  /// Keep raw integer codes instead of normalizing
  pub as_is: bool,
}

/// Result of decoding one directory.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
  pub pixels: PixelBuffer,
  /// The palette, present when indices were requested
  pub color_table: Option<ColorTable>,
}

/// Decodes the reader's current directory.
pub fn decode_directory<R: Read + Seek>(
  reader: &mut TiffReader<R>, descriptor: &SampleDescriptor, options: &DecodeOptions,
) -> TiffResult<Decoded> {
  match options.conversion {
    Conversion::Direct => decode_direct(reader, descriptor, options),
    generic => {
      let pixels = decode_generic(reader, descriptor, generic)?;
      Ok(Decoded { pixels, color_table: None })
    }
  }
}

/// Swaps rows pairwise so that row `i` trades places with row `height - 1 - i`.
pub fn flip_rows(raster: &mut [u32], width: usize, height: usize) {
  if width == 0 {
    return;
  }
  let (top, bottom) = raster[..width * height].split_at_mut(width * (height / 2));
  let mut bottom_rows = bottom.chunks_exact_mut(width).rev();
  for row in top.chunks_exact_mut(width) {
    if let Some(mirror) = bottom_rows.next() {
      row.swap_with_slice(mirror);
    }
  }
}

fn decode_generic<R: Read + Seek>(
  reader: &mut TiffReader<R>, descriptor: &SampleDescriptor, conversion: Conversion,
) -> TiffResult<PixelBuffer> {
  let (width, height) = (descriptor.width, descriptor.height);
  let mut raster = reader.read_rgba_image()?;
  flip_rows(&mut raster, width as usize, height as usize);

  let samples = descriptor.samples_per_pixel.clamp(1, 4);
  if conversion == Conversion::Packed {
    return PixelBuffer::new(width, height, samples, PixelData::Packed(raster));
  }

  let plane = raster.len();
  let mut out = vec![0.0; plane * usize::from(samples)];
  let byte = |px: u32, shift: u32| f64::from((px >> shift) & 0xFF) / 255.0;
  for (i, &px) in raster.iter().enumerate() {
    match samples {
      1 => out[i] = byte(px, 0),
      2 => {
        out[i] = byte(px, 0);
        out[plane + i] = byte(px, 16);
      }
      n => {
        for s in 0..usize::from(n) {
          out[s * plane + i] = byte(px, 8 * s as u32);
        }
      }
    }
  }
  PixelBuffer::normalized(width, height, samples, out)
}

/// What a raw sample turns into.
enum Mapping<'a> {
  Scaled(f64),
  Float,
  Raw { signed: bool, bits: u16 },
  Palette { colormap: &'a Colormap, tables: usize, as_is: bool },
  Index { offset: i64, entries: usize },
}

/// Rejects combinations the direct path cannot handle before any chunk is read.
fn check_direct(descriptor: &SampleDescriptor, options: &DecodeOptions) -> TiffResult<()> {
  let bits = descriptor.bits_per_sample;
  if !crate::descriptor::DIRECT_DEPTHS.contains(&bits) {
    return Err(TiffUnsupportedError::UnsupportedBitsPerSample(bits).into());
  }
  if descriptor.is_tiled() {
    if descriptor.colormap.is_some() {
      return Err(TiffUnsupportedError::TiledLayout("a color map").into());
    }
    if bits == 12 {
      return Err(TiffUnsupportedError::TiledLayout("12 bits per sample").into());
    }
    if descriptor.planar_config == PlanarConfiguration::Planar && descriptor.samples_per_pixel > 1 {
      return Err(TiffUnsupportedError::TiledLayout("separate planes").into());
    }
  }
  if descriptor.colormap.is_some() && !matches!(bits, 8 | 16) {
    return Err(TiffUnsupportedError::ColorMapDepth(bits).into());
  }
  if descriptor.is_float() {
    if options.as_is {
      return Err(TiffUnsupportedError::AsIsFloat.into());
    }
    if bits != 32 {
      return Err(TiffUnsupportedError::UnsupportedBitsPerSample(bits).into());
    }
  }
  Ok(())
}

fn decode_direct<R: Read + Seek>(
  reader: &mut TiffReader<R>, descriptor: &SampleDescriptor, options: &DecodeOptions,
) -> TiffResult<Decoded> {
  check_direct(descriptor, options)?;

  let signed = descriptor.sample_format == SampleFormat::Int;
  if signed && !options.as_is {
    report_warning(
      "decode",
      format_args!("signed samples are read as unsigned; request as-is output to keep the sign"),
    );
  }

  let bits = descriptor.bits_per_sample;
  let (mapping, channels, color_table) = match &descriptor.colormap {
    Some(colormap) if options.indexed => (
      Mapping::Index { offset: if options.as_is { 0 } else { 1 }, entries: colormap.entries() },
      1,
      Some(ColorTable::from_colormap(colormap)),
    ),
    Some(colormap) => {
      let tables = colormap.populated_tables();
      (Mapping::Palette { colormap, tables, as_is: options.as_is }, tables as u16, None)
    }
    None if descriptor.is_float() => (Mapping::Float, descriptor.samples_per_pixel, None),
    None if options.as_is => (Mapping::Raw { signed, bits }, descriptor.samples_per_pixel, None),
    None => (Mapping::Scaled(descriptor.max_value()), descriptor.samples_per_pixel, None),
  };

  let (width, height) = (descriptor.width, descriptor.height);
  let plane = width as usize * height as usize;
  let len = plane
    .checked_mul(usize::from(channels))
    .filter(|&n| n.saturating_mul(8) <= reader.limits().decoding_buffer_size)
    .ok_or(TiffError::LimitsExceeded)?;

  let data = match mapping {
    Mapping::Scaled(max) => {
      let mut out = vec![0.0; len];
      unpack(reader, bits, |channel, i, raw| {
        out[channel * plane + i] = f64::from(raw) / max;
        Ok(())
      })?;
      PixelData::Normalized(out)
    }
    Mapping::Float => {
      let mut out = vec![0.0; len];
      unpack(reader, bits, |channel, i, raw| {
        out[channel * plane + i] = f64::from(f32::from_bits(raw));
        Ok(())
      })?;
      PixelData::Normalized(out)
    }
    Mapping::Raw { signed, bits } => {
      let mut out = vec![0; len];
      unpack(reader, bits, |channel, i, raw| {
        out[channel * plane + i] = if signed { sign_extend(raw, bits) } else { i64::from(raw) };
        Ok(())
      })?;
      PixelData::Integer(out)
    }
    Mapping::Index { offset, entries } => {
      let mut out = vec![0; len];
      unpack(reader, bits, |_, i, raw| {
        if raw as usize >= entries {
          return Err(TiffFormatError::ColorMapIndexOutOfRange(raw, entries).into());
        }
        out[i] = i64::from(raw) + offset;
        Ok(())
      })?;
      PixelData::Integer(out)
    }
    Mapping::Palette { colormap, tables, as_is } => {
      let entries = colormap.entries();
      let lookup = colormap.tables();
      if as_is {
        let mut out = vec![0; len];
        unpack(reader, bits, |_, i, raw| {
          let index = palette_index(raw, entries)?;
          for (t, table) in lookup[..tables].iter().enumerate() {
            out[t * plane + i] = i64::from(table[index]);
          }
          Ok(())
        })?;
        PixelData::Integer(out)
      } else {
        let mut out = vec![0.0; len];
        unpack(reader, bits, |_, i, raw| {
          let index = palette_index(raw, entries)?;
          for (t, table) in lookup[..tables].iter().enumerate() {
            out[t * plane + i] = f64::from(table[index]) / 65535.0;
          }
          Ok(())
        })?;
        PixelData::Normalized(out)
      }
    }
  };

  Ok(Decoded { pixels: PixelBuffer::new(width, height, channels, data)?, color_table })
}

fn palette_index(raw: u32, entries: usize) -> TiffResult<usize> {
  let index = raw as usize;
  if index >= entries {
    return Err(TiffFormatError::ColorMapIndexOutOfRange(raw, entries).into());
  }
  Ok(index)
}

fn sign_extend(raw: u32, bits: u16) -> i64 {
  let shift = 64 - u32::from(bits);
  (i64::from(raw) << shift) >> shift
}

/// Walks every strip or tile in storage order and hands each in-bounds sample to `put` as
/// `(channel, y * width + x, raw)`. Tile overhang past the image edge is skipped.
fn unpack<R, F>(reader: &mut TiffReader<R>, bits: u16, mut put: F) -> TiffResult<()>
where
  R: Read + Seek,
  F: FnMut(usize, usize, u32) -> TiffResult<()>,
{
  let width = reader.dimensions().0 as usize;
  let samples_per_chunk = match reader.planar_config() {
    PlanarConfiguration::Chunky => usize::from(reader.samples_per_pixel()),
    PlanarConfiguration::Planar => 1,
  };
  let row_bytes = reader.chunk_row_bytes()?;
  let bits = bits as u8;

  for chunk in 0..reader.chunk_count() {
    let location = reader.chunk_location(chunk);
    let data = reader.read_encoded_chunk(chunk)?;
    for (r, row) in data.chunks_exact(row_bytes).take(location.height).enumerate() {
      let offset = (location.y + r) * width + location.x;
      for c in 0..location.width {
        for s in 0..samples_per_chunk {
          put(location.plane + s, offset + c, sample_at(row, c * samples_per_chunk + s, bits))?;
        }
      }
    }
  }
  Ok(())
}
