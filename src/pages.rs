//! Page-level reading and writing over files or memory.

use std::path::PathBuf;

use crate::{
  codec::{Limits, TiffReader, TiffWriter},
  decode::{decode_directory, Conversion, DecodeOptions},
  descriptor::SampleDescriptor,
  encode::{encode_directory, validate, EncodeOptions},
  error::report_warning,
  job::StreamJob,
  metadata::TiffInfo,
  pixels::{ColorTable, PixelBuffer},
  TiffError, TiffResult,
};

/// Options of [`write_tiff`].
pub type WriteOptions = EncodeOptions;

/// Where a TIFF stream is read from.
#[derive(Clone, Debug)]
pub enum Source<'a> {
  Path(PathBuf),
  Bytes(&'a [u8]),
}

/// Where a TIFF stream is written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
  Path(PathBuf),
  Memory,
}

/// Outcome of [`write_tiff`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Written {
  /// Number of pages written to a file
  Pages(usize),
  /// The complete stream of an in-memory destination
  Bytes(Vec<u8>),
}

/// Which directories [`read_tiff`] decodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PageSelection {
  #[default]
  First,
  All,
  /// 1-based page numbers
  Indices(Vec<usize>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
  pub pages: PageSelection,
  pub conversion: Conversion,
  pub indexed: bool,
  pub as_is: bool,
  /// Attach a [`TiffInfo`] to every page
  pub info: bool,
  pub limits: Limits,
}

impl ReadOptions {
  pub fn pages(mut self, pages: PageSelection) -> Self {
    self.pages = pages;
    self
  }

  pub fn conversion(mut self, conversion: Conversion) -> Self {
    self.conversion = conversion;
    self
  }

  pub fn indexed(mut self, indexed: bool) -> Self {
    self.indexed = indexed;
    self
  }

  pub fn as_is(mut self, as_is: bool) -> Self {
    self.as_is = as_is;
    self
  }

  pub fn info(mut self, info: bool) -> Self {
    self.info = info;
    self
  }

  pub fn limits(mut self, limits: Limits) -> Self {
    self.limits = limits;
    self
  }

  fn check(&self) -> TiffResult<()> {
    if self.indexed && self.conversion.is_generic() {
      return Err(TiffError::Options("indexed output needs direct sample decoding"));
    }
    if let PageSelection::Indices(pages) = &self.pages {
      if pages.contains(&0) {
        return Err(TiffError::Options("page numbers start at 1"));
      }
    }
    Ok(())
  }
}

/// One decoded directory.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
  /// 1-based position of the directory in the stream
  pub index: usize,
  pub pixels: PixelBuffer,
  pub info: Option<TiffInfo>,
  pub color_table: Option<ColorTable>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TiffPages {
  pub pages: Vec<Page>,
  /// Directories visited, decoded or not
  pub directories: usize,
}

/// Reads the selected pages of a TIFF stream in one forward pass.
pub fn read_tiff(source: Source<'_>, options: &ReadOptions) -> TiffResult<TiffPages> {
  options.check()?;

  let job = match source {
    Source::Path(path) => StreamJob::open(path)?,
    Source::Bytes(bytes) => StreamJob::from_bytes(bytes),
  };
  let mut reader = TiffReader::with_limits(job, options.limits.clone())?;
  let decode_options =
    DecodeOptions { conversion: options.conversion, indexed: options.indexed, as_is: options.as_is };

  let mut pages = Vec::new();
  let mut directories = 0;
  loop {
    directories += 1;
    let selected = match &options.pages {
      PageSelection::First => directories == 1,
      PageSelection::All => true,
      PageSelection::Indices(wanted) => wanted.contains(&directories),
    };

    if selected {
      let descriptor = SampleDescriptor::resolve(&mut reader, !options.conversion.is_generic())?;
      let decoded = decode_directory(&mut reader, &descriptor, &decode_options)?;
      let info =
        if options.info { Some(TiffInfo::read(&mut reader, &descriptor)?) } else { None };
      pages.push(Page {
        index: directories,
        pixels: decoded.pixels,
        info,
        color_table: decoded.color_table,
      });
    } else {
      log::trace!("passing over directory {directories}");
    }

    if options.pages == PageSelection::First || !reader.more_images() {
      break;
    }
    reader.next_image()?;
  }

  if let PageSelection::Indices(wanted) = &options.pages {
    for page in wanted.iter().filter(|&&p| p > directories) {
      report_warning(
        "read",
        format_args!("page {page} requested, but the stream has {directories} directories"),
      );
    }
  }

  reader.into_inner().close()?;
  Ok(TiffPages { pages, directories })
}

/// Writes every image as its own directory.
///
/// An empty list writes nothing and reports `Written::Pages(0)`.
pub fn write_tiff(
  images: &[PixelBuffer], destination: Destination, options: &WriteOptions,
) -> TiffResult<Written> {
  if images.is_empty() {
    report_warning("write", format_args!("empty image list, nothing to do"));
    return Ok(Written::Pages(0));
  }
  for image in images {
    validate(image, options)?;
  }

  let to_memory = destination == Destination::Memory;
  let job = match destination {
    Destination::Path(path) => StreamJob::create(path)?,
    Destination::Memory => StreamJob::growable(),
  };

  let mut writer = TiffWriter::new(job)?;
  for (i, image) in images.iter().enumerate() {
    if i > 0 {
      writer.write_directory()?;
    }
    encode_directory(&mut writer, image, options)?;
  }
  let job = writer.finish()?;

  if to_memory {
    Ok(Written::Bytes(job.into_bytes()?))
  } else {
    job.close()?;
    Ok(Written::Pages(images.len()))
  }
}
