use std::io::{Read, Seek};

use crate::{
  codec::TiffReader,
  descriptor::SampleDescriptor,
  error::report_warning,
  pixels::ColorTable,
  tags::{orientation_name, ResolutionUnit, Tag},
  TiffError, TiffFormatError, TiffResult,
};

/// Descriptive fields of one directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TiffInfo {
  pub width: u32,
  pub height: u32,
  pub depth: u32,
  pub bits_per_sample: u16,
  pub samples_per_pixel: u16,
  pub sample_format: &'static str,
  pub planar_config: &'static str,
  pub photometric: Option<&'static str>,
  pub rows_per_strip: Option<u32>,
  pub tile_width: Option<u32>,
  pub tile_length: Option<u32>,
  pub compression: &'static str,
  pub x_resolution: Option<f64>,
  pub y_resolution: Option<f64>,
  pub resolution_unit: Option<&'static str>,
  pub x_position: Option<f64>,
  pub y_position: Option<f64>,
  pub orientation: Option<&'static str>,
  pub artist: Option<String>,
  pub description: Option<String>,
  pub software: Option<String>,
  pub date_time: Option<String>,
  pub copyright: Option<String>,
  pub document_name: Option<String>,
  pub make: Option<String>,
  pub model: Option<String>,
  pub host_computer: Option<String>,
  pub color_table: Option<ColorTable>,
}

impl TiffInfo {
  /// Collects the record for the reader's current directory.
  ///
  /// Free-text and resolution fields of an unexpected type are left out instead of failing, as
  /// is text that is not valid UTF-8.
  pub fn read<R: Read + Seek>(
    reader: &mut TiffReader<R>, descriptor: &SampleDescriptor,
  ) -> TiffResult<TiffInfo> {
    let mut text = |tag: Tag| -> TiffResult<Option<String>> {
      match reader.find_tag(tag) {
        Ok(value) => Ok(value.and_then(|v| v.into_string().ok())),
        Err(TiffError::FormatError(TiffFormatError::InvalidString(e))) => {
          report_warning("metadata", format_args!("dropping {tag:?}: {e}"));
          Ok(None)
        }
        Err(e) => Err(e),
      }
    };
    let artist = text(Tag::Artist)?;
    let description = text(Tag::ImageDescription)?;
    let software = text(Tag::Software)?;
    let date_time = text(Tag::DateTime)?;
    let copyright = text(Tag::Copyright)?;
    let document_name = text(Tag::DocumentName)?;
    let make = text(Tag::Make)?;
    let model = text(Tag::Model)?;
    let host_computer = text(Tag::HostComputer)?;

    let mut number = |tag: Tag| -> TiffResult<Option<f64>> {
      Ok(reader.find_tag(tag)?.and_then(|v| v.into_f64().ok()))
    };
    let x_resolution = number(Tag::XResolution)?;
    let y_resolution = number(Tag::YResolution)?;
    let x_position = number(Tag::XPosition)?;
    let y_position = number(Tag::YPosition)?;

    let resolution_unit = reader
      .find_tag_unsigned::<u16>(Tag::ResolutionUnit)?
      .and_then(ResolutionUnit::from_u16)
      .map(|u| u.name());
    let orientation =
      reader.find_tag_unsigned::<u16>(Tag::Orientation)?.and_then(orientation_name);

    let stripped = descriptor.tiling.is_none();
    Ok(TiffInfo {
      width: descriptor.width,
      height: descriptor.height,
      depth: descriptor.depth,
      bits_per_sample: descriptor.bits_per_sample,
      samples_per_pixel: descriptor.samples_per_pixel,
      sample_format: descriptor.sample_format.name(),
      planar_config: descriptor.planar_config.name(),
      photometric: descriptor.photometric.map(|p| p.name()),
      rows_per_strip: stripped.then_some(descriptor.rows_per_strip),
      tile_width: descriptor.tiling.map(|t| t.tile_width),
      tile_length: descriptor.tiling.map(|t| t.tile_length),
      compression: descriptor.compression.name(),
      x_resolution,
      y_resolution,
      resolution_unit,
      x_position,
      y_position,
      orientation,
      artist,
      description,
      software,
      date_time,
      copyright,
      document_name,
      make,
      model,
      host_computer,
      color_table: descriptor.colormap.as_ref().map(ColorTable::from_colormap),
    })
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::codec::{ifd::Value, TiffWriter};

  #[test]
  fn text_and_resolution_fields_are_collected() {
    let mut writer = TiffWriter::new(Cursor::new(Vec::new())).unwrap();
    writer.set_field(Tag::ImageWidth, Value::Unsigned(1));
    writer.set_field(Tag::ImageLength, Value::Unsigned(1));
    writer.set_field(Tag::BitsPerSample, Value::Short(8));
    writer.set_field(Tag::Artist, Value::Ascii("A. Painter".into()));
    writer.set_field(Tag::XResolution, Value::Rational(300, 1));
    writer.set_field(Tag::ResolutionUnit, Value::Short(2));
    writer.set_field(Tag::Orientation, Value::Short(1));
    writer.set_field(Tag::Compression, Value::Short(5));
    writer.write_encoded_strip(&[9]).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let mut reader = TiffReader::new(Cursor::new(bytes)).unwrap();
    let descriptor = SampleDescriptor::resolve(&mut reader, true).unwrap();
    let info = TiffInfo::read(&mut reader, &descriptor).unwrap();
    assert_eq!(info.artist.as_deref(), Some("A. Painter"));
    assert_eq!(info.x_resolution, Some(300.0));
    assert_eq!(info.y_resolution, None);
    assert_eq!(info.resolution_unit, Some("inch"));
    assert_eq!(info.orientation, Some("top.left"));
    assert_eq!(info.compression, "LZW");
    assert_eq!(info.sample_format, "uint");
    assert_eq!(info.planar_config, "contiguous");
    assert_eq!(info.rows_per_strip, Some(1));
    assert!(info.color_table.is_none());
  }

  #[test]
  fn malformed_text_is_dropped() {
    let mut writer = TiffWriter::new(Cursor::new(Vec::new())).unwrap();
    writer.set_field(Tag::ImageWidth, Value::Unsigned(1));
    writer.set_field(Tag::ImageLength, Value::Unsigned(1));
    writer.set_field(Tag::Artist, Value::Ascii("xA. Painter".into()));
    writer.set_field(Tag::Software, Value::Ascii("tiffraster".into()));
    writer.write_encoded_strip(&[9]).unwrap();
    let mut bytes = writer.finish().unwrap().into_inner();
    let at = bytes.windows(11).position(|w| w == b"xA. Painter").unwrap();
    bytes[at] = 0xFF;

    let mut reader = TiffReader::new(Cursor::new(bytes)).unwrap();
    let descriptor = SampleDescriptor::resolve(&mut reader, true).unwrap();
    let info = TiffInfo::read(&mut reader, &descriptor).unwrap();
    assert_eq!(info.artist, None);
    assert_eq!(info.software.as_deref(), Some("tiffraster"));
  }
}
