use std::{
  convert::TryFrom,
  io::{Read, Seek},
};

use super::{
  ifd::{Directory, Value},
  stream::SmartReader,
  Limits,
};
use crate::{tags::Tag, TiffError, TiffFormatError, TiffResult};

/// Resolves tags of one directory against the stream holding their values.
pub(crate) struct TagReader<'a, R: Read + Seek> {
  reader: &'a mut SmartReader<R>,
  ifd: &'a Directory,
  limits: &'a Limits,
  bigtiff: bool,
}

impl<'a, R: Read + Seek> TagReader<'a, R> {
  pub(crate) fn new(
    reader: &'a mut SmartReader<R>, ifd: &'a Directory, limits: &'a Limits, bigtiff: bool,
  ) -> Self {
    TagReader { reader, ifd, limits, bigtiff }
  }

  pub(crate) fn has(&self, tag: Tag) -> bool {
    self.ifd.contains_key(&tag)
  }

  pub(crate) fn find_tag(&mut self, tag: Tag) -> TiffResult<Option<Value>> {
    match self.ifd.get(&tag) {
      Some(entry) => Ok(Some(entry.val(self.limits, self.bigtiff, self.reader)?)),
      None => Ok(None),
    }
  }

  pub(crate) fn require_tag(&mut self, tag: Tag) -> TiffResult<Value> {
    self.find_tag(tag)?.ok_or(TiffError::FormatError(TiffFormatError::RequiredTagNotFound(tag)))
  }

  pub(crate) fn find_u16(&mut self, tag: Tag) -> TiffResult<Option<u16>> {
    self.find_tag(tag)?.map(Value::into_u16).transpose()
  }

  pub(crate) fn find_u32(&mut self, tag: Tag) -> TiffResult<Option<u32>> {
    self.find_tag(tag)?.map(Value::into_u32).transpose()
  }

  pub(crate) fn require_u32(&mut self, tag: Tag) -> TiffResult<u32> {
    self.require_tag(tag)?.into_u32()
  }

  /// A coded value, `Ok(None)` when absent and `unknown(code)` when the code has no meaning.
  pub(crate) fn find_code<T>(
    &mut self, tag: Tag, decode: fn(u16) -> Option<T>, unknown: fn(u16) -> TiffFormatError,
  ) -> TiffResult<Option<T>> {
    match self.find_u16(tag)? {
      Some(code) => decode(code).map(Some).ok_or_else(|| unknown(code).into()),
      None => Ok(None),
    }
  }

  pub(crate) fn find_uint_vec<T: TryFrom<u64>>(&mut self, tag: Tag) -> TiffResult<Option<Vec<T>>> {
    let values = match self.find_tag(tag)? {
      Some(value) => value.into_u64_vec()?,
      None => return Ok(None),
    };
    values
      .into_iter()
      .map(|u| T::try_from(u).map_err(|_| TiffFormatError::InvalidTagValueType(tag).into()))
      .collect::<TiffResult<Vec<T>>>()
      .map(Some)
  }

  /// Offsets and byte counts of `expected` chunks.
  pub(crate) fn chunk_table(
    &mut self, offsets: Tag, counts: Tag, expected: usize,
  ) -> TiffResult<(Vec<u64>, Vec<u64>)> {
    let offsets = self.require_tag(offsets)?.into_u64_vec()?;
    let counts = self.require_tag(counts)?.into_u64_vec()?;
    if offsets.len() != expected || counts.len() != expected {
      return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered));
    }
    Ok((offsets, counts))
  }
}
