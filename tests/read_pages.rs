extern crate tiffraster;

use std::io::Cursor;

use tiffraster::{
  codec::{ifd::Value, TiffReader, TiffWriter},
  read_tiff,
  tags::Tag,
  Conversion, ErrorKind, PageSelection, PixelData, ReadOptions, Source,
};

fn build(fields: &[(Tag, Value)], tiles: bool, chunks: &[Vec<u8>]) -> Vec<u8> {
  let mut writer = TiffWriter::new(Cursor::new(Vec::new())).unwrap();
  for (tag, value) in fields {
    writer.set_field(*tag, value.clone());
  }
  for chunk in chunks {
    if tiles {
      writer.write_encoded_tile(chunk).unwrap();
    } else {
      writer.write_encoded_strip(chunk).unwrap();
    }
  }
  writer.finish().unwrap().into_inner()
}

fn normalized(data: &PixelData) -> &[f64] {
  match data {
    PixelData::Normalized(v) => v,
    other => panic!("expected normalized samples, got {other:?}"),
  }
}

fn integers(data: &PixelData) -> &[i64] {
  match data {
    PixelData::Integer(v) => v,
    other => panic!("expected integer samples, got {other:?}"),
  }
}

fn two_color_palette() -> Vec<u8> {
  let map = (0..3 * 256).map(|i| Value::Short(if i % 256 == 1 { 65535 } else { 0 })).collect();
  build(
    &[
      (Tag::ImageWidth, Value::Unsigned(2)),
      (Tag::ImageLength, Value::Unsigned(2)),
      (Tag::BitsPerSample, Value::Short(8)),
      (Tag::PhotometricInterpretation, Value::Short(3)),
      (Tag::ColorMap, Value::List(map)),
    ],
    false,
    &[vec![0, 1, 1, 0]],
  )
}

#[test]
fn palette_indices_come_with_their_table() {
  let bytes = two_color_palette();

  let options = ReadOptions::default().indexed(true);
  let read = read_tiff(Source::Bytes(&bytes), &options).unwrap();
  let page = &read.pages[0];
  assert_eq!(integers(page.pixels.data()), &[1, 2, 2, 1]);
  let table = page.color_table.as_ref().unwrap();
  assert_eq!(table.channels(), 3);
  for channel in 0..3 {
    assert_eq!(&table.channel(channel).unwrap()[..2], &[0.0, 1.0]);
  }

  let raw = ReadOptions::default().indexed(true).as_is(true);
  let read = read_tiff(Source::Bytes(&bytes), &raw).unwrap();
  assert_eq!(integers(read.pages[0].pixels.data()), &[0, 1, 1, 0]);
}

#[test]
fn palette_colors_are_looked_up() {
  let bytes = two_color_palette();
  let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
  let pixels = &read.pages[0].pixels;
  assert_eq!(pixels.shape(), (2, 2, Some(3)));
  assert_eq!(pixels.get(2, 1, 0), Some(1.0));
  assert_eq!(pixels.get(2, 1, 1), Some(0.0));
}

#[test]
fn tiles_are_clipped_at_the_image_edge() {
  const TILE: usize = 16;
  let (width, height) = (20usize, 18usize);
  let value = |x: usize, y: usize| (x * 7 + y * 3) as u8;

  let mut tiles = Vec::new();
  for ty in 0..2 {
    for tx in 0..2 {
      let mut tile = vec![0xEE; TILE * TILE];
      for r in 0..TILE {
        for c in 0..TILE {
          let (x, y) = (tx * TILE + c, ty * TILE + r);
          if x < width && y < height {
            tile[r * TILE + c] = value(x, y);
          }
        }
      }
      tiles.push(tile);
    }
  }
  let bytes = build(
    &[
      (Tag::ImageWidth, Value::Unsigned(width as u32)),
      (Tag::ImageLength, Value::Unsigned(height as u32)),
      (Tag::BitsPerSample, Value::Short(8)),
      (Tag::TileWidth, Value::Unsigned(TILE as u32)),
      (Tag::TileLength, Value::Unsigned(TILE as u32)),
    ],
    true,
    &tiles,
  );

  let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default().info(true)).unwrap();
  let page = &read.pages[0];
  let samples = normalized(page.pixels.data());
  assert_eq!(samples.len(), width * height);
  for y in 0..height {
    for x in 0..width {
      assert_eq!(samples[y * width + x], f64::from(value(x, y)) / 255.0, "({x}, {y})");
    }
  }
  let info = page.info.as_ref().unwrap();
  assert_eq!((info.tile_width, info.tile_length, info.rows_per_strip), (Some(16), Some(16), None));
}

#[test]
fn contiguous_tiles_keep_their_channels_apart() {
  let mut tile = vec![0u8; 16 * 16 * 3];
  tile[..9].copy_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0, 255]);
  let bytes = build(
    &[
      (Tag::ImageWidth, Value::Unsigned(3)),
      (Tag::ImageLength, Value::Unsigned(1)),
      (Tag::BitsPerSample, Value::List(vec![Value::Short(8); 3])),
      (Tag::SamplesPerPixel, Value::Short(3)),
      (Tag::PhotometricInterpretation, Value::Short(2)),
      (Tag::TileWidth, Value::Unsigned(16)),
      (Tag::TileLength, Value::Unsigned(16)),
    ],
    true,
    &[tile],
  );

  let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
  let pixels = &read.pages[0].pixels;
  assert_eq!(pixels.shape(), (1, 3, Some(3)));
  // Channel-major: red plane, then green, then blue.
  assert_eq!(normalized(pixels.data()), &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn generic_gray_alpha_reads_alpha_from_the_blue_byte() {
  let bytes = build(
    &[
      (Tag::ImageWidth, Value::Unsigned(1)),
      (Tag::ImageLength, Value::Unsigned(2)),
      (Tag::BitsPerSample, Value::List(vec![Value::Short(8), Value::Short(8)])),
      (Tag::SamplesPerPixel, Value::Short(2)),
      (Tag::PhotometricInterpretation, Value::Short(1)),
      (Tag::ExtraSamples, Value::Short(2)),
    ],
    false,
    &[vec![255, 0, 51, 255]],
  );
  let options = ReadOptions::default().conversion(Conversion::Normalized);
  let read = read_tiff(Source::Bytes(&bytes), &options).unwrap();
  assert_eq!(normalized(read.pages[0].pixels.data()), &[1.0, 0.2, 1.0, 0.2]);
}

#[test]
fn every_page_is_read_in_order() {
  let fields = |w: u32| {
    [
      (Tag::ImageWidth, Value::Unsigned(w)),
      (Tag::ImageLength, Value::Unsigned(1)),
      (Tag::BitsPerSample, Value::Short(16)),
    ]
  };
  let mut writer = TiffWriter::new(Cursor::new(Vec::new())).unwrap();
  for w in 1..=3u32 {
    if w > 1 {
      writer.write_directory().unwrap();
    }
    for (tag, value) in fields(w) {
      writer.set_field(tag, value);
    }
    let strip: Vec<u8> = (0..w).flat_map(|_| 65535u16.to_ne_bytes()).collect();
    writer.write_encoded_strip(&strip).unwrap();
  }
  let bytes = writer.finish().unwrap().into_inner();

  let options = ReadOptions::default().pages(PageSelection::All);
  let read = read_tiff(Source::Bytes(&bytes), &options).unwrap();
  assert_eq!(read.directories, 3);
  let widths: Vec<u32> = read.pages.iter().map(|p| p.pixels.width()).collect();
  assert_eq!(widths, vec![1, 2, 3]);
  assert!(read.pages.iter().all(|p| normalized(p.pixels.data()).iter().all(|&v| v == 1.0)));
}

#[test]
fn big_tiff_directories_are_read() {
  let mut bytes = b"II".to_vec();
  bytes.extend_from_slice(&43u16.to_le_bytes());
  bytes.extend_from_slice(&8u16.to_le_bytes());
  bytes.extend_from_slice(&0u16.to_le_bytes());
  bytes.extend_from_slice(&16u64.to_le_bytes());

  let entries: [(u16, u16, u64); 5] = [(256, 3, 2), (257, 3, 1), (258, 3, 8), (273, 16, 132), (279, 16, 2)];
  bytes.extend_from_slice(&(entries.len() as u64).to_le_bytes());
  for (tag, type_, value) in entries {
    bytes.extend_from_slice(&tag.to_le_bytes());
    bytes.extend_from_slice(&type_.to_le_bytes());
    bytes.extend_from_slice(&1u64.to_le_bytes());
    let mut inline = [0u8; 8];
    match type_ {
      3 => inline[..2].copy_from_slice(&(value as u16).to_le_bytes()),
      _ => inline.copy_from_slice(&value.to_le_bytes()),
    }
    bytes.extend_from_slice(&inline);
  }
  bytes.extend_from_slice(&0u64.to_le_bytes());
  assert_eq!(bytes.len(), 132);
  bytes.extend_from_slice(&[0, 255]);
  assert!(TiffReader::new(Cursor::new(bytes.clone())).unwrap().is_bigtiff());

  let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
  assert_eq!(normalized(read.pages[0].pixels.data()), &[0.0, 1.0]);
}

#[test]
fn failures_are_classified() {
  let mut dangling = b"II".to_vec();
  dangling.extend_from_slice(&42u16.to_le_bytes());
  dangling.extend_from_slice(&1000u32.to_le_bytes());
  let err = read_tiff(Source::Bytes(&dangling), &ReadOptions::default()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BoundaryError);

  let err = read_tiff(Source::Bytes(b"not a tiff"), &ReadOptions::default()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::OpenFailure);

  let missing = std::env::temp_dir().join("tiffraster-does-not-exist.tif");
  let err = read_tiff(Source::Path(missing), &ReadOptions::default()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::OpenFailure);

  let twelve_bit_tiles = build(
    &[
      (Tag::ImageWidth, Value::Unsigned(4)),
      (Tag::ImageLength, Value::Unsigned(4)),
      (Tag::BitsPerSample, Value::Short(12)),
      (Tag::TileWidth, Value::Unsigned(16)),
      (Tag::TileLength, Value::Unsigned(16)),
    ],
    true,
    &[vec![0; 16 * 24]],
  );
  let err = read_tiff(Source::Bytes(&twelve_bit_tiles), &ReadOptions::default()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

  let separate_tiles = build(
    &[
      (Tag::ImageWidth, Value::Unsigned(4)),
      (Tag::ImageLength, Value::Unsigned(4)),
      (Tag::BitsPerSample, Value::List(vec![Value::Short(8); 3])),
      (Tag::SamplesPerPixel, Value::Short(3)),
      (Tag::PhotometricInterpretation, Value::Short(2)),
      (Tag::PlanarConfiguration, Value::Short(2)),
      (Tag::TileWidth, Value::Unsigned(16)),
      (Tag::TileLength, Value::Unsigned(16)),
    ],
    true,
    &[vec![0; 16 * 16], vec![0; 16 * 16], vec![0; 16 * 16]],
  );
  let err = read_tiff(Source::Bytes(&separate_tiles), &ReadOptions::default()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}

#[test]
fn oversized_tiles_fail_without_overflowing() {
  let bytes = build(
    &[
      (Tag::ImageWidth, Value::Unsigned(1)),
      (Tag::ImageLength, Value::Unsigned(1)),
      (Tag::BitsPerSample, Value::Short(32)),
      (Tag::SamplesPerPixel, Value::Short(2000)),
      (Tag::TileWidth, Value::Unsigned(0xFFFF_FFF0)),
      (Tag::TileLength, Value::Unsigned(0xFFFF_FFF0)),
    ],
    true,
    &[vec![0; 16]],
  );
  let err = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::CodecFault);
}
