extern crate tiffraster;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tiffraster::{
  read_tiff, tags::PlanarConfiguration, write_tiff, Destination, PixelBuffer, PixelData,
  ReadOptions, Source, WriteOptions, Written,
};

const WIDTH: u32 = 7;
const HEIGHT: u32 = 5;

fn random_image(channels: u16, seed: u64) -> PixelBuffer {
  let mut rng = StdRng::seed_from_u64(seed);
  let len = (WIDTH * HEIGHT) as usize * usize::from(channels);
  let data = (0..len).map(|_| rng.gen::<f64>()).collect();
  PixelBuffer::normalized(WIDTH, HEIGHT, channels, data).unwrap()
}

fn to_memory(images: &[PixelBuffer], options: &WriteOptions) -> Vec<u8> {
  match write_tiff(images, Destination::Memory, options).unwrap() {
    Written::Bytes(bytes) => bytes,
    other => panic!("expected bytes, got {other:?}"),
  }
}

fn samples(pixels: &PixelBuffer) -> &[f64] {
  match pixels.data() {
    PixelData::Normalized(v) => v,
    other => panic!("expected normalized samples, got {other:?}"),
  }
}

macro_rules! test_round_trip {
  ($name:ident, $channels:expr, $bits:expr, $planar:expr) => {
    #[test]
    fn $name() {
      let original = random_image($channels, $channels as u64 * 100 + $bits as u64);
      let options = WriteOptions { bits_per_sample: $bits, planar: $planar, ..Default::default() };
      let bytes = to_memory(&[original.clone()], &options);

      let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
      let decoded = &read.pages[0].pixels;
      assert_eq!(decoded.shape(), original.shape());

      let tolerance = 1.0 / tiffraster::max_sample_value($bits);
      for (a, b) in samples(&original).iter().zip(samples(decoded)) {
        assert!((a - b).abs() <= tolerance, "{a} decoded as {b}");
      }
    }
  };
}

test_round_trip!(gray_8, 1, 8, PlanarConfiguration::Chunky);
test_round_trip!(gray_8_separate, 1, 8, PlanarConfiguration::Planar);
test_round_trip!(gray_16, 1, 16, PlanarConfiguration::Chunky);
test_round_trip!(gray_32, 1, 32, PlanarConfiguration::Chunky);
test_round_trip!(gray_alpha_8, 2, 8, PlanarConfiguration::Chunky);
test_round_trip!(gray_alpha_16_separate, 2, 16, PlanarConfiguration::Planar);
test_round_trip!(rgb_8, 3, 8, PlanarConfiguration::Chunky);
test_round_trip!(rgb_8_separate, 3, 8, PlanarConfiguration::Planar);
test_round_trip!(rgb_32_separate, 3, 32, PlanarConfiguration::Planar);
test_round_trip!(rgba_16, 4, 16, PlanarConfiguration::Chunky);
test_round_trip!(rgba_32_separate, 4, 32, PlanarConfiguration::Planar);

#[test]
fn decoding_is_repeatable() {
  let bytes = to_memory(&[random_image(3, 7)], &WriteOptions::default());
  let first = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
  let second = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
  assert_eq!(first, second);
}

#[test]
fn compressed_directories_decode_the_same() {
  use tiffraster::tags::CompressionMethod;

  let image = random_image(3, 11);
  let plain = to_memory(&[image.clone()], &WriteOptions::default());
  let plain = read_tiff(Source::Bytes(&plain), &ReadOptions::default()).unwrap();

  for compression in [CompressionMethod::LZW, CompressionMethod::Deflate, CompressionMethod::PackBits]
  {
    let options = WriteOptions { compression, ..Default::default() };
    let bytes = to_memory(&[image.clone()], &options);
    let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
    assert_eq!(read.pages[0].pixels, plain.pages[0].pixels, "{compression:?}");
  }
}

#[test]
fn packed_images_reduce_to_gray() {
  let raster = vec![0xFF00_0000, 0xFF80_8080, 0xFFFF_FFFF, 0xFF40_4040];
  let image = PixelBuffer::packed(2, 2, raster).unwrap();
  let options = WriteOptions { reduce: true, ..Default::default() };
  let bytes = to_memory(&[image], &options);

  let read = read_tiff(Source::Bytes(&bytes), &ReadOptions::default().info(true)).unwrap();
  let page = &read.pages[0];
  assert_eq!(page.info.as_ref().map(|i| i.samples_per_pixel), Some(1));
  assert_eq!(samples(&page.pixels), &[0.0, 128.0 / 255.0, 1.0, 64.0 / 255.0]);
}

#[test]
fn packed_images_survive_the_generic_path() {
  let raster = vec![0x8011_2233, 0xFF44_5566, 0x0077_8899, 0xFFAA_BBCC];
  let image = PixelBuffer::packed(2, 2, raster.clone()).unwrap();
  let bytes = to_memory(&[image], &WriteOptions::default());

  let options = ReadOptions::default().conversion(tiffraster::Conversion::Packed);
  let read = read_tiff(Source::Bytes(&bytes), &options).unwrap();
  assert_eq!(read.pages[0].pixels.data(), &PixelData::Packed(raster));
}

#[test]
fn files_round_trip() {
  let path = std::env::temp_dir().join(format!("tiffraster-round-trip-{}.tif", std::process::id()));
  let images = [random_image(1, 1), random_image(4, 2)];
  let written = write_tiff(&images, Destination::Path(path.clone()), &WriteOptions::default());
  assert_eq!(written.unwrap(), Written::Pages(2));

  let options = ReadOptions::default().pages(tiffraster::PageSelection::All);
  let read = read_tiff(Source::Path(path.clone()), &options).unwrap();
  std::fs::remove_file(&path).unwrap();

  assert_eq!(read.directories, 2);
  assert_eq!(read.pages[1].pixels.shape(), (HEIGHT, WIDTH, Some(4)));
}
