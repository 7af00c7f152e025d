//! Generic RGBA conversion.
//!
//! Produces one packed `u32` per pixel with red in bits 0..8, green 8..16, blue 16..24 and alpha
//! 24..32. As with the conventional codec raster, row 0 of the result is the BOTTOM row of the
//! image; callers wanting top-down order swap rows afterwards.

use std::io::{Read, Seek};

use super::TiffReader;
use crate::{
  tags::{PhotometricInterpretation, SampleFormat, Tag},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

/// Reads sample `k` of a stored row. Sub-byte samples are packed most significant bit first.
pub(crate) fn sample_at(row: &[u8], k: usize, bits: u8) -> u32 {
  match bits {
    8 => u32::from(row[k]),
    16 => u32::from(u16::from_ne_bytes([row[2 * k], row[2 * k + 1]])),
    32 => u32::from_ne_bytes([row[4 * k], row[4 * k + 1], row[4 * k + 2], row[4 * k + 3]]),
    12 => {
      let i = k * 12 / 8;
      if k % 2 == 0 {
        (u32::from(row[i]) << 4) | (u32::from(row[i + 1]) >> 4)
      } else {
        ((u32::from(row[i]) & 0x0F) << 8) | u32::from(row[i + 1])
      }
    }
    b => {
      let bit = k * usize::from(b);
      let shift = 8 - usize::from(b) - bit % 8;
      (u32::from(row[bit / 8]) >> shift) & ((1 << b) - 1)
    }
  }
}

fn to_8bit(value: u32, bits: u8) -> u32 {
  match bits {
    8 => value,
    16 => value >> 8,
    b => value * 255 / ((1 << b) - 1),
  }
}

impl<R: Read + Seek> TiffReader<R> {
  /// Decodes the current directory into a bottom-up packed RGBA raster.
  pub fn read_rgba_image(&mut self) -> TiffResult<Vec<u32>> {
    let (width, height) = (self.image().width as usize, self.image().height as usize);
    let bits = self.image().bits_per_sample;
    let samples = usize::from(self.image().samples);

    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
      return Err(TiffUnsupportedError::RgbaBitsPerSample(bits.into()).into());
    }
    if !matches!(self.image().sample_format, SampleFormat::Uint | SampleFormat::Int) {
      return Err(
        TiffUnsupportedError::UnsupportedSampleFormat(vec![self.image().sample_format]).into(),
      );
    }

    let colormap = self.find_tag_unsigned_vec::<u16>(Tag::ColorMap)?;
    let photometric = match self.image().photometric_interpretation {
      Some(p) => p,
      None if colormap.is_some() => PhotometricInterpretation::RGBPalette,
      None if samples >= 3 => PhotometricInterpretation::RGB,
      None => PhotometricInterpretation::BlackIsZero,
    };

    let pixels = width.checked_mul(height).ok_or(TiffError::LimitsExceeded)?;
    let raw_len = pixels.checked_mul(samples).ok_or(TiffError::LimitsExceeded)?;
    if pixels.saturating_mul(4) > self.limits().decoding_buffer_size
      || raw_len.saturating_mul(4) > self.limits().decoding_buffer_size
    {
      return Err(TiffError::LimitsExceeded);
    }

    // Gather every sample, interleaved per pixel, regardless of planar layout.
    let mut raw = vec![0u32; raw_len];
    let samples_per_chunk = self.image().samples_per_chunk();
    let row_bytes = self.chunk_row_bytes()?;
    for chunk in 0..self.chunk_count() {
      let location = self.chunk_location(chunk);
      let data = self.read_encoded_chunk(chunk)?;
      for r in 0..location.height {
        let row = &data[r * row_bytes..(r + 1) * row_bytes];
        let y = location.y + r;
        for c in 0..location.width {
          let x = location.x + c;
          for s in 0..samples_per_chunk {
            let sample = location.plane + s;
            raw[(y * width + x) * samples + sample] = sample_at(row, c * samples_per_chunk + s, bits);
          }
        }
      }
    }

    let palette = match photometric {
      PhotometricInterpretation::RGBPalette => {
        let map = colormap.ok_or(TiffFormatError::RequiredTagNotFound(Tag::ColorMap))?;
        let entries = 1usize << bits;
        if map.len() != 3 * entries {
          return Err(TiffFormatError::InvalidColorMap(map.len(), entries).into());
        }
        Some((map, entries))
      }
      PhotometricInterpretation::BlackIsZero | PhotometricInterpretation::WhiteIsZero => None,
      PhotometricInterpretation::RGB if samples >= 3 => None,
      other => return Err(TiffUnsupportedError::UnsupportedPhotometric(other).into()),
    };

    let mut out = vec![0u32; pixels];
    for y in 0..height {
      let dst = (height - 1 - y) * width;
      for x in 0..width {
        let px = &raw[(y * width + x) * samples..(y * width + x + 1) * samples];
        let (r, g, b, a) = match (&palette, photometric) {
          (Some((map, entries)), _) => {
            let index = px[0] as usize;
            if index >= *entries {
              return Err(TiffFormatError::ColorMapIndexOutOfRange(px[0], *entries).into());
            }
            let c = |t: usize| u32::from(map[t * entries + index] >> 8);
            (c(0), c(1), c(2), 255)
          }
          (None, PhotometricInterpretation::RGB) => {
            let alpha = px.get(3).map_or(255, |&a| to_8bit(a, bits));
            (to_8bit(px[0], bits), to_8bit(px[1], bits), to_8bit(px[2], bits), alpha)
          }
          (None, p) => {
            let mut v = to_8bit(px[0], bits);
            if p == PhotometricInterpretation::WhiteIsZero {
              v = 255 - v;
            }
            let alpha = px.get(1).map_or(255, |&a| to_8bit(a, bits));
            (v, v, v, alpha)
          }
        };
        out[dst + x] = r | (g << 8) | (b << 16) | (a << 24);
      }
    }

    Ok(out)
  }
}
