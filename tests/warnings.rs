extern crate tiffraster;

use std::{
  io::Cursor,
  sync::{Mutex, MutexGuard, Once},
};

use log::{Level, LevelFilter, Log, Metadata, Record};
use tiffraster::{
  codec::{ifd::Value, TiffWriter},
  read_tiff,
  tags::Tag,
  write_tiff, Destination, PixelBuffer, ReadOptions, Source, WriteOptions,
};

/// Keeps every warning the crate logs so tests can count them.
struct Capture;

static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static SERIAL: Mutex<()> = Mutex::new(());
static INSTALL: Once = Once::new();

impl Log for Capture {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.target() == "tiffraster" && metadata.level() <= Level::Warn
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      WARNINGS.lock().unwrap().push(record.args().to_string());
    }
  }

  fn flush(&self) {}
}

/// Installs the logger once and gives the caller exclusive, empty access to it.
fn capture() -> MutexGuard<'static, ()> {
  INSTALL.call_once(|| {
    log::set_logger(&Capture).unwrap();
    log::set_max_level(LevelFilter::Warn);
  });
  let guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
  WARNINGS.lock().unwrap().clear();
  guard
}

fn warnings_containing(needle: &str) -> usize {
  WARNINGS.lock().unwrap().iter().filter(|w| w.contains(needle)).count()
}

#[test]
fn out_of_range_samples_warn_once_per_image() {
  let _guard = capture();
  let image = PixelBuffer::normalized(2, 2, 1, vec![-0.5, 2.0, 3.0, 0.5]).unwrap();

  write_tiff(&[image.clone()], Destination::Memory, &WriteOptions::default()).unwrap();
  assert_eq!(warnings_containing("outside the [0, 1] range"), 1);

  WARNINGS.lock().unwrap().clear();
  write_tiff(&[image.clone(), image], Destination::Memory, &WriteOptions::default()).unwrap();
  assert_eq!(warnings_containing("outside the [0, 1] range"), 2);
}

#[test]
fn in_range_samples_are_written_quietly() {
  let _guard = capture();
  let image = PixelBuffer::normalized(2, 1, 1, vec![0.0, 1.0]).unwrap();
  write_tiff(&[image], Destination::Memory, &WriteOptions::default()).unwrap();
  assert_eq!(warnings_containing("outside the [0, 1] range"), 0);
}

#[test]
fn signed_samples_warn_unless_kept_as_is() {
  let _guard = capture();
  let mut writer = TiffWriter::new(Cursor::new(Vec::new())).unwrap();
  writer.set_field(Tag::ImageWidth, Value::Unsigned(2));
  writer.set_field(Tag::ImageLength, Value::Unsigned(1));
  writer.set_field(Tag::BitsPerSample, Value::Short(16));
  writer.set_field(Tag::SampleFormat, Value::Short(2));
  let strip: Vec<u8> = [-2i16, 300].iter().flat_map(|v| v.to_le_bytes()).collect();
  writer.write_encoded_strip(&strip).unwrap();
  let bytes = writer.finish().unwrap().into_inner();

  read_tiff(Source::Bytes(&bytes), &ReadOptions::default()).unwrap();
  assert_eq!(warnings_containing("signed samples"), 1);

  WARNINGS.lock().unwrap().clear();
  read_tiff(Source::Bytes(&bytes), &ReadOptions::default().as_is(true)).unwrap();
  assert_eq!(warnings_containing("signed samples"), 0);
}
