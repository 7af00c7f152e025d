use std::{
  collections::BTreeMap,
  convert::TryFrom,
  io::{Seek, SeekFrom, Write},
};

use super::{
  compression::compress,
  ifd::Value,
  stream::{ByteOrder, EndianWriter, SmartWriter},
};
use crate::{tags::CompressionMethod, tags::Tag, TiffResult};

/// Writes classic TIFF directories one after another.
///
/// Fields are collected with [`TiffWriter::set_field`] and flushed together with the chunk
/// offsets by [`TiffWriter::write_directory`]. Chunk data is handed over in host byte order and
/// compressed according to the `Compression` field current at the time of the write.
#[derive(Debug)]
pub struct TiffWriter<W: Write + Seek> {
  writer: SmartWriter<W>,
  fields: BTreeMap<u16, (Tag, Value)>,
  strips: Vec<(u32, u32)>,
  tiles: Vec<(u32, u32)>,
  /// Where the offset of the next directory has to be patched in
  link_position: u64,
  pending: bool,
  directories: usize,
}

impl<W: Write + Seek> TiffWriter<W> {
  pub fn new(writer: W) -> TiffResult<Self> {
    Self::with_byte_order(writer, ByteOrder::LittleEndian)
  }

  pub fn with_byte_order(writer: W, byte_order: ByteOrder) -> TiffResult<Self> {
    let mut writer = SmartWriter::wrap(writer, byte_order);
    writer.write_all(byte_order.signature())?;
    writer.write_u16(42)?;
    let link_position = writer.stream_position()?;
    writer.write_u32(0)?;

    Ok(TiffWriter {
      writer,
      fields: BTreeMap::new(),
      strips: Vec::new(),
      tiles: Vec::new(),
      link_position,
      pending: false,
      directories: 0,
    })
  }

  pub fn byte_order(&self) -> ByteOrder {
    self.writer.byte_order
  }

  /// Number of directories completed so far.
  pub fn directories_written(&self) -> usize {
    self.directories
  }

  pub fn set_field(&mut self, tag: Tag, value: Value) {
    self.fields.insert(tag.to_u16(), (tag, value));
    self.pending = true;
  }

  fn compression(&self) -> CompressionMethod {
    match self.fields.get(&Tag::Compression.to_u16()) {
      Some((_, Value::Short(c))) => CompressionMethod::from_u16_exhaustive(*c),
      _ => CompressionMethod::None,
    }
  }

  fn bits_per_sample(&self) -> u16 {
    match self.fields.get(&Tag::BitsPerSample.to_u16()) {
      Some((_, Value::Short(b))) => *b,
      Some((_, Value::List(list))) => match list.first() {
        Some(Value::Short(b)) => *b,
        _ => 8,
      },
      _ => 8,
    }
  }

  fn write_chunk(&mut self, data: &[u8]) -> TiffResult<(u32, u32)> {
    let swapped;
    let data = match (self.writer.byte_order == ByteOrder::native(), self.bits_per_sample()) {
      (false, bits @ (16 | 32 | 64)) => {
        let width = usize::from(bits / 8);
        let mut copy = data.to_vec();
        copy.chunks_exact_mut(width).for_each(|s| s.reverse());
        swapped = copy;
        &swapped[..]
      }
      _ => data,
    };

    let encoded = compress(self.compression(), data)?;
    let offset = u32::try_from(self.writer.seek(SeekFrom::End(0))?)?;
    self.writer.write_all(&encoded)?;
    self.pending = true;
    Ok((offset, u32::try_from(encoded.len())?))
  }

  /// Appends the next strip of the current directory.
  pub fn write_encoded_strip(&mut self, data: &[u8]) -> TiffResult<()> {
    let strip = self.write_chunk(data)?;
    self.strips.push(strip);
    Ok(())
  }

  /// Appends the next tile of the current directory.
  pub fn write_encoded_tile(&mut self, data: &[u8]) -> TiffResult<()> {
    let tile = self.write_chunk(data)?;
    self.tiles.push(tile);
    Ok(())
  }

  /// Finishes the current directory and starts the next one.
  pub fn write_directory(&mut self) -> TiffResult<()> {
    let chunk_tags = [
      (Tag::StripOffsets, Tag::StripByteCounts, std::mem::take(&mut self.strips)),
      (Tag::TileOffsets, Tag::TileByteCounts, std::mem::take(&mut self.tiles)),
    ];
    for (offsets_tag, counts_tag, chunks) in chunk_tags {
      if chunks.is_empty() {
        continue;
      }
      let (offsets, counts): (Vec<_>, Vec<_>) =
        chunks.into_iter().map(|(o, c)| (Value::Unsigned(o), Value::Unsigned(c))).unzip();
      self.set_field(offsets_tag, Value::List(offsets));
      self.set_field(counts_tag, Value::List(counts));
    }

    let byte_order = self.writer.byte_order;
    let mut entries = Vec::with_capacity(self.fields.len());
    for (code, (_, value)) in std::mem::take(&mut self.fields) {
      let (type_, count, data) = value.encode(byte_order)?;
      entries.push((code, type_, u32::try_from(count)?, data));
    }

    // Directories start on a word boundary.
    let mut position = self.writer.seek(SeekFrom::End(0))?;
    if position % 2 == 1 {
      self.writer.write_all(&[0])?;
      position += 1;
    }

    let mut value_position = position + 2 + 12 * entries.len() as u64 + 4;
    let mut deferred = Vec::new();

    self.writer.write_u16(u16::try_from(entries.len())?)?;
    for (code, type_, count, data) in &entries {
      self.writer.write_u16(*code)?;
      self.writer.write_u16(type_.to_u16())?;
      self.writer.write_u32(*count)?;
      if data.len() <= 4 {
        let mut inline = [0u8; 4];
        inline[..data.len()].copy_from_slice(data);
        self.writer.write_all(&inline)?;
      } else {
        self.writer.write_u32(u32::try_from(value_position)?)?;
        deferred.push(data);
        value_position += data.len() as u64 + data.len() as u64 % 2;
      }
    }
    let next_link = self.writer.stream_position()?;
    self.writer.write_u32(0)?;

    for data in deferred {
      self.writer.write_all(data)?;
      if data.len() % 2 == 1 {
        self.writer.write_all(&[0])?;
      }
    }

    self.writer.seek(SeekFrom::Start(self.link_position))?;
    self.writer.write_u32(u32::try_from(position)?)?;
    self.writer.seek(SeekFrom::End(0))?;

    self.link_position = next_link;
    self.pending = false;
    self.directories += 1;
    log::trace!("wrote directory {} with {} entries", self.directories, entries.len());
    Ok(())
  }

  /// Completes any directory still being filled and hands back the stream.
  pub fn finish(mut self) -> TiffResult<W> {
    if self.pending {
      self.write_directory()?;
    }
    self.writer.flush()?;
    Ok(self.writer.into_inner())
  }
}
