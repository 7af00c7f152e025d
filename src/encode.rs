//! The sample encoder: packs a [`PixelBuffer`] into one TIFF directory.

use std::io::{Seek, Write};

use crate::{
  codec::{compression::can_encode, ifd::Value, TiffWriter},
  error::report_warning,
  pixels::{PixelBuffer, PixelData},
  tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration, SampleFormat, Tag},
  TiffError, TiffResult, TiffUnsupportedError,
};

/// Depths the encoder writes.
pub const ENCODE_DEPTHS: [u16; 3] = [8, 16, 32];

/// Extra sample value for unassociated alpha.
const UNASSOCIATED_ALPHA: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
  /// Depth of numeric samples; packed input is always written with 8 bits
  pub bits_per_sample: u16,
  pub compression: CompressionMethod,
  /// Drop alpha and color channels that carry no information (packed input only)
  pub reduce: bool,
  pub planar: PlanarConfiguration,
}

impl Default for EncodeOptions {
  fn default() -> Self {
    EncodeOptions {
      bits_per_sample: 8,
      compression: CompressionMethod::None,
      reduce: false,
      planar: PlanarConfiguration::Chunky,
    }
  }
}

/// The narrowest channel layout a packed RGBA image fits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
  Gray,
  GrayAlpha,
  Color,
  ColorAlpha,
}

impl Reduction {
  pub fn channels(&self) -> u16 {
    match self {
      Reduction::Gray => 1,
      Reduction::GrayAlpha => 2,
      Reduction::Color => 3,
      Reduction::ColorAlpha => 4,
    }
  }
}

/// Inspects every pixel for opaque alpha and equal color components.
pub fn classify(pixels: &[u32]) -> Reduction {
  let (mut opaque, mut gray) = (true, true);
  for &px in pixels {
    let [r, g, b, a] = px.to_le_bytes();
    opaque &= a == 0xFF;
    gray &= r == g && g == b;
  }
  match (gray, opaque) {
    (true, true) => Reduction::Gray,
    (true, false) => Reduction::GrayAlpha,
    (false, true) => Reduction::Color,
    (false, false) => Reduction::ColorAlpha,
  }
}

/// Checks everything that can be known before a single byte is written.
pub fn validate(pixels: &PixelBuffer, options: &EncodeOptions) -> TiffResult<()> {
  if !ENCODE_DEPTHS.contains(&options.bits_per_sample) {
    return Err(TiffUnsupportedError::UnsupportedEncodeDepth(options.bits_per_sample).into());
  }
  if !can_encode(options.compression) {
    return Err(TiffUnsupportedError::UnsupportedCompressionMethod(options.compression).into());
  }
  if pixels.width() == 0 || pixels.height() == 0 {
    return Err(TiffError::Shape(format!(
      "image must not be empty, got {}x{}",
      pixels.width(),
      pixels.height()
    )));
  }
  match pixels.data() {
    PixelData::Packed(_) => Ok(()),
    PixelData::Integer(_) => {
      Err(TiffUnsupportedError::EncodeRepresentation(pixels.data().kind()).into())
    }
    PixelData::Normalized(_) if !(1..=4).contains(&pixels.channels()) => Err(TiffError::Shape(
      format!(
        "image must have either 1 (grayscale), 2 (GA), 3 (RGB) or 4 (RGBA) channels, got {}",
        pixels.channels()
      ),
    )),
    PixelData::Normalized(_) => Ok(()),
  }
}

/// Writes the descriptive fields and pixel data of one directory. The directory itself is left
/// open; the caller decides when to finish it.
pub fn encode_directory<W: Write + Seek>(
  writer: &mut TiffWriter<W>, pixels: &PixelBuffer, options: &EncodeOptions,
) -> TiffResult<()> {
  validate(pixels, options)?;
  match pixels.data() {
    PixelData::Packed(raster) => encode_packed(writer, pixels, raster, options),
    PixelData::Normalized(samples) => encode_numeric(writer, pixels, samples, options),
    PixelData::Integer(_) => {
      Err(TiffUnsupportedError::EncodeRepresentation(pixels.data().kind()).into())
    }
  }
}

fn set_layout<W: Write + Seek>(
  writer: &mut TiffWriter<W>, width: u32, height: u32, channels: u16, bits: u16,
  options: &EncodeOptions, planar: PlanarConfiguration,
) {
  let per_sample = |v: u16| Value::List(vec![Value::Short(v); usize::from(channels)]);
  writer.set_field(Tag::ImageWidth, Value::Unsigned(width));
  writer.set_field(Tag::ImageLength, Value::Unsigned(height));
  writer.set_field(Tag::BitsPerSample, per_sample(bits));
  writer.set_field(Tag::SamplesPerPixel, Value::Short(channels));
  writer.set_field(Tag::RowsPerStrip, Value::Unsigned(height));
  writer.set_field(Tag::Compression, Value::Short(options.compression.to_u16()));
  let photometric = if channels > 2 {
    PhotometricInterpretation::RGB
  } else {
    PhotometricInterpretation::BlackIsZero
  };
  writer.set_field(Tag::PhotometricInterpretation, Value::Short(photometric.to_u16()));
  writer.set_field(Tag::PlanarConfiguration, Value::Short(planar.to_u16()));
  writer.set_field(Tag::SampleFormat, per_sample(SampleFormat::Uint.to_u16()));
  if channels == 2 || channels == 4 {
    writer.set_field(Tag::ExtraSamples, Value::Short(UNASSOCIATED_ALPHA));
  }
}

fn encode_packed<W: Write + Seek>(
  writer: &mut TiffWriter<W>, pixels: &PixelBuffer, raster: &[u32], options: &EncodeOptions,
) -> TiffResult<()> {
  let reduction = if options.reduce { classify(raster) } else { Reduction::ColorAlpha };
  let channels = reduction.channels();
  set_layout(
    writer,
    pixels.width(),
    pixels.height(),
    channels,
    8,
    options,
    PlanarConfiguration::Chunky,
  );

  let mut strip = Vec::with_capacity(raster.len() * usize::from(channels));
  for &px in raster {
    let rgba = px.to_le_bytes();
    match reduction {
      Reduction::Gray => strip.push(rgba[0]),
      Reduction::GrayAlpha => strip.extend_from_slice(&[rgba[0], rgba[3]]),
      Reduction::Color => strip.extend_from_slice(&rgba[..3]),
      Reduction::ColorAlpha => strip.extend_from_slice(&rgba),
    }
  }
  log::debug!("writing packed {}x{} as {:?}", pixels.width(), pixels.height(), reduction);
  writer.write_encoded_strip(&strip)
}

/// Whether any sample lies outside `[0, 1]`.
pub fn out_of_range(samples: &[f64]) -> bool {
  samples.iter().any(|v| !(0.0..=1.0).contains(v))
}

fn encode_numeric<W: Write + Seek>(
  writer: &mut TiffWriter<W>, pixels: &PixelBuffer, samples: &[f64], options: &EncodeOptions,
) -> TiffResult<()> {
  let (width, height, channels) = (pixels.width(), pixels.height(), pixels.channels());
  let bits = options.bits_per_sample;
  let planar = options.planar;
  set_layout(writer, width, height, channels, bits, options, planar);

  if out_of_range(samples) {
    report_warning(
      "encode",
      format_args!("the image contains values outside the [0, 1] range, they will be clipped"),
    );
  }

  let plane = width as usize * height as usize;
  let bytes = usize::from(bits / 8);
  let max = crate::descriptor::max_sample_value(bits);
  let pack = |v: f64, out: &mut Vec<u8>| match bits {
    8 => out.push((v * max) as u8),
    16 => out.extend_from_slice(&((v * max) as u16).to_ne_bytes()),
    _ => out.extend_from_slice(&((v * max) as u32).to_ne_bytes()),
  };

  match planar {
    PlanarConfiguration::Chunky => {
      let mut strip = Vec::with_capacity(samples.len() * bytes);
      for i in 0..plane {
        for c in 0..usize::from(channels) {
          pack(samples[c * plane + i], &mut strip);
        }
      }
      writer.write_encoded_strip(&strip)
    }
    PlanarConfiguration::Planar => {
      for channel in samples.chunks_exact(plane) {
        let mut strip = Vec::with_capacity(plane * bytes);
        channel.iter().for_each(|&v| pack(v, &mut strip));
        writer.write_encoded_strip(&strip)?;
      }
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::codec::TiffReader;

  fn encode(pixels: &PixelBuffer, options: &EncodeOptions) -> TiffReader<Cursor<Vec<u8>>> {
    let mut writer = TiffWriter::new(Cursor::new(Vec::new())).unwrap();
    encode_directory(&mut writer, pixels, options).unwrap();
    TiffReader::new(Cursor::new(writer.finish().unwrap().into_inner())).unwrap()
  }

  #[test]
  fn classification_needs_every_pixel() {
    assert_eq!(classify(&[0xFF10_1010, 0xFF20_2020]), Reduction::Gray);
    assert_eq!(classify(&[0xFF10_1010, 0x8020_2020]), Reduction::GrayAlpha);
    assert_eq!(classify(&[0xFF10_1010, 0xFF20_2021]), Reduction::Color);
    assert_eq!(classify(&[0xFF10_1010, 0xFF20_2020, 0x0000_0001]), Reduction::ColorAlpha);
  }

  #[test]
  fn reduced_gray_writes_one_sample() {
    let pixels = PixelBuffer::packed(2, 1, vec![0xFF40_4040, 0xFFC0_C0C0]).unwrap();
    let mut reader = encode(&pixels, &EncodeOptions { reduce: true, ..Default::default() });
    assert_eq!(reader.samples_per_pixel(), 1);
    assert_eq!(reader.read_encoded_chunk(0).unwrap(), vec![0x40, 0xC0]);
  }

  #[test]
  fn packed_without_reduction_keeps_rgba() {
    let pixels = PixelBuffer::packed(1, 1, vec![0x4433_2211]).unwrap();
    let mut reader = encode(&pixels, &EncodeOptions { bits_per_sample: 16, ..Default::default() });
    assert_eq!((reader.samples_per_pixel(), reader.bits_per_sample()), (4, 8));
    assert_eq!(reader.photometric(), Some(PhotometricInterpretation::RGB));
    assert_eq!(reader.read_encoded_chunk(0).unwrap(), vec![0x11, 0x22, 0x33, 0x44]);
  }

  #[test]
  fn numeric_samples_interleave_per_pixel() {
    let pixels = PixelBuffer::normalized(2, 1, 2, vec![0.0, 1.0, 0.5, 1.0]).unwrap();
    let mut reader = encode(&pixels, &EncodeOptions::default());
    assert_eq!(reader.photometric(), Some(PhotometricInterpretation::BlackIsZero));
    assert_eq!(reader.read_encoded_chunk(0).unwrap(), vec![0, 127, 255, 255]);
  }

  #[test]
  fn separate_planes_get_one_strip_each() {
    let pixels = PixelBuffer::normalized(1, 2, 3, vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
    let options = EncodeOptions { planar: PlanarConfiguration::Planar, ..Default::default() };
    let mut reader = encode(&pixels, &options);
    assert_eq!(reader.chunk_count(), 3);
    assert_eq!(reader.read_encoded_chunk(1).unwrap(), vec![255, 0]);
  }

  #[test]
  fn single_channel_keeps_the_requested_layout() {
    let pixels = PixelBuffer::normalized(2, 1, 1, vec![1.0, 0.0]).unwrap();
    let options = EncodeOptions { planar: PlanarConfiguration::Planar, ..Default::default() };
    let mut reader = encode(&pixels, &options);
    assert_eq!(reader.planar_config(), PlanarConfiguration::Planar);
    assert_eq!(reader.chunk_count(), 1);
    assert_eq!(reader.read_encoded_chunk(0).unwrap(), vec![255, 0]);
  }

  #[test]
  fn out_of_range_values_saturate() {
    assert!(out_of_range(&[0.5, 1.5]));
    assert!(out_of_range(&[f64::NAN]));
    assert!(!out_of_range(&[0.0, 1.0]));
    let pixels = PixelBuffer::normalized(2, 1, 1, vec![-0.5, 2.0]).unwrap();
    let mut reader = encode(&pixels, &EncodeOptions::default());
    assert_eq!(reader.read_encoded_chunk(0).unwrap(), vec![0, 255]);
  }

  #[test]
  fn preflight_rejects_bad_requests() {
    let pixels = PixelBuffer::normalized(1, 1, 1, vec![0.0]).unwrap();
    let twelve = EncodeOptions { bits_per_sample: 12, ..Default::default() };
    assert!(matches!(
      validate(&pixels, &twelve),
      Err(TiffError::UnsupportedError(TiffUnsupportedError::UnsupportedEncodeDepth(12)))
    ));

    let five = PixelBuffer::normalized(1, 1, 5, vec![0.0; 5]).unwrap();
    assert_eq!(validate(&five, &EncodeOptions::default()).unwrap_err().kind(), crate::ErrorKind::ShapeError);

    let ints = PixelBuffer::new(1, 1, 1, PixelData::Integer(vec![3])).unwrap();
    assert!(validate(&ints, &EncodeOptions::default()).is_err());

    let jpeg = EncodeOptions { compression: CompressionMethod::JPEG, ..Default::default() };
    assert!(validate(&pixels, &jpeg).is_err());
  }
}
