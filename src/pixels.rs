//! In-memory pixel arrays exchanged with the decoder and encoder.

use crate::{descriptor::Colormap, TiffError, TiffResult};

/// Sample storage of a [`PixelBuffer`].
#[derive(Clone, Debug, PartialEq)]
pub enum PixelData {
  /// Samples scaled to `[0, 1]`, or raw IEEE values for floating point images
  Normalized(Vec<f64>),
  /// Raw integer codes: palette indices or as-is samples
  Integer(Vec<i64>),
  /// One packed RGBA value per pixel, red in the lowest byte
  Packed(Vec<u32>),
}

impl PixelData {
  pub fn len(&self) -> usize {
    match self {
      PixelData::Normalized(v) => v.len(),
      PixelData::Integer(v) => v.len(),
      PixelData::Packed(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub(crate) fn kind(&self) -> &'static str {
    match self {
      PixelData::Normalized(_) => "normalized",
      PixelData::Integer(_) => "integer",
      PixelData::Packed(_) => "packed",
    }
  }
}

/// A channel-major image: every sample of channel 0, then channel 1, and so on; rows run top to
/// bottom within a channel.
///
/// Packed buffers hold one value per pixel whatever their channel count, which then only says
/// how many of the four bytes carry meaning.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
  width: u32,
  height: u32,
  channels: u16,
  data: PixelData,
}

impl PixelBuffer {
  pub fn new(width: u32, height: u32, channels: u16, data: PixelData) -> TiffResult<PixelBuffer> {
    let pixels = (width as usize)
      .checked_mul(height as usize)
      .ok_or_else(|| TiffError::Shape(format!("{width}x{height} overflows")))?;
    let expected = match data {
      PixelData::Packed(_) => pixels,
      _ => pixels
        .checked_mul(usize::from(channels))
        .ok_or_else(|| TiffError::Shape(format!("{width}x{height}x{channels} overflows")))?,
    };
    if data.len() != expected {
      return Err(TiffError::Shape(format!(
        "{} samples do not fill {width}x{height} with {channels} channels",
        data.len()
      )));
    }
    Ok(PixelBuffer { width, height, channels, data })
  }

  pub fn normalized(width: u32, height: u32, channels: u16, data: Vec<f64>) -> TiffResult<Self> {
    Self::new(width, height, channels, PixelData::Normalized(data))
  }

  pub fn packed(width: u32, height: u32, data: Vec<u32>) -> TiffResult<Self> {
    Self::new(width, height, 4, PixelData::Packed(data))
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> u16 {
    self.channels
  }

  pub fn data(&self) -> &PixelData {
    &self.data
  }

  pub fn into_data(self) -> PixelData {
    self.data
  }

  /// `(height, width, channels)`, the channel count omitted for single-channel images.
  pub fn shape(&self) -> (u32, u32, Option<u16>) {
    (self.height, self.width, (self.channels > 1).then_some(self.channels))
  }

  /// Position of a sample in the channel-major layout.
  pub fn index(&self, channel: u16, x: u32, y: u32) -> usize {
    let plane = self.width as usize * self.height as usize;
    usize::from(channel) * plane + y as usize * self.width as usize + x as usize
  }

  /// The sample at `(channel, x, y)` as a number; packed pixels yield the channel's byte.
  pub fn get(&self, channel: u16, x: u32, y: u32) -> Option<f64> {
    if channel >= self.channels || x >= self.width || y >= self.height {
      return None;
    }
    match &self.data {
      PixelData::Normalized(v) => v.get(self.index(channel, x, y)).copied(),
      PixelData::Integer(v) => v.get(self.index(channel, x, y)).map(|&i| i as f64),
      PixelData::Packed(v) => {
        let px = v.get(y as usize * self.width as usize + x as usize)?;
        Some(f64::from((px >> (8 * u32::from(channel))) & 0xFF))
      }
    }
  }
}

/// Palette values scaled to `[0, 1]`, one row per populated colormap table.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
  channels: usize,
  entries: usize,
  values: Vec<f64>,
}

impl ColorTable {
  pub fn from_colormap(colormap: &Colormap) -> ColorTable {
    let channels = colormap.populated_tables();
    let values = colormap.tables()[..channels]
      .iter()
      .flat_map(|table| table.iter().map(|&v| f64::from(v) / 65535.0))
      .collect();
    ColorTable { channels, entries: colormap.entries(), values }
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn entries(&self) -> usize {
    self.entries
  }

  pub fn get(&self, channel: usize, index: usize) -> Option<f64> {
    if channel >= self.channels || index >= self.entries {
      return None;
    }
    self.values.get(channel * self.entries + index).copied()
  }

  /// Values of one channel, indexed by palette entry.
  pub fn channel(&self, channel: usize) -> Option<&[f64]> {
    (channel < self.channels)
      .then(|| &self.values[channel * self.entries..(channel + 1) * self.entries])
  }
}
