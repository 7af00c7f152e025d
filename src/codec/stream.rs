//! Byte-order aware reading and writing, and the decompressing readers chunks pass through

use std::{
  convert::TryFrom,
  io::{self, BufRead, BufReader, Read, Seek, Take, Write},
};

/// Byte order of the TIFF file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
  /// little endian byte order
  LittleEndian,
  /// big endian byte order
  BigEndian,
}

impl ByteOrder {
  /// Byte order of the machine running this code.
  pub fn native() -> Self {
    if cfg!(target_endian = "little") {
      ByteOrder::LittleEndian
    } else {
      ByteOrder::BigEndian
    }
  }

  pub(crate) fn signature(&self) -> &'static [u8; 2] {
    match self {
      ByteOrder::LittleEndian => b"II",
      ByteOrder::BigEndian => b"MM",
    }
  }
}

macro_rules! endian_read {
  ($($(#[$attr:meta])* $name:ident -> $ty:ty;)*) => {
    $(
      $(#[$attr])*
      #[inline(always)]
      fn $name(&mut self) -> Result<$ty, io::Error> {
        let mut n = [0u8; std::mem::size_of::<$ty>()];
        self.read_exact(&mut n)?;
        Ok(match self.byte_order() {
          ByteOrder::LittleEndian => <$ty>::from_le_bytes(n),
          ByteOrder::BigEndian => <$ty>::from_be_bytes(n),
        })
      }
    )*
  };
}

/// Reader that is aware of the byte order.
pub trait EndianReader: Read {
  /// Byte order that should be adhered to
  fn byte_order(&self) -> ByteOrder;

  endian_read! {
    read_u16 -> u16;
    read_i8 -> i8;
    read_i16 -> i16;
    read_u32 -> u32;
    read_i32 -> i32;
    read_u64 -> u64;
    read_i64 -> i64;
    read_f32 -> f32;
    read_f64 -> f64;
  }
}

macro_rules! endian_write {
  ($($name:ident($ty:ty);)*) => {
    $(
      #[inline(always)]
      fn $name(&mut self, n: $ty) -> Result<(), io::Error> {
        match self.byte_order() {
          ByteOrder::LittleEndian => self.write_all(&n.to_le_bytes()),
          ByteOrder::BigEndian => self.write_all(&n.to_be_bytes()),
        }
      }
    )*
  };
}

/// Writer that is aware of the byte order.
pub trait EndianWriter: Write {
  fn byte_order(&self) -> ByteOrder;

  endian_write! {
    write_u16(u16);
    write_u32(u32);
    write_u64(u64);
  }
}

/// Reader that decompresses LZW streams
pub struct LZWReader<R: Read> {
  reader: BufReader<Take<R>>,
  decoder: weezl::decode::Decoder,
}

impl<R: Read> LZWReader<R> {
  /// Wraps a reader
  pub fn new(reader: R, compressed_length: usize) -> io::Result<LZWReader<R>> {
    let limit = u64::try_from(compressed_length)
      .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "compressed length overflow"))?;
    Ok(Self {
      reader: BufReader::with_capacity((32 * 1024).min(compressed_length.max(1)), reader.take(limit)),
      decoder: weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8),
    })
  }
}

impl<R: Read> Read for LZWReader<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    loop {
      let result = self.decoder.decode_bytes(self.reader.fill_buf()?, buf);
      self.reader.consume(result.consumed_in);

      match result.status {
        Ok(weezl::LzwStatus::Ok) => {
          if result.consumed_out == 0 {
            continue;
          } else {
            return Ok(result.consumed_out);
          }
        }
        Ok(weezl::LzwStatus::NoProgress) => {
          return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no lzw end code found"));
        }
        Ok(weezl::LzwStatus::Done) => {
          return Ok(result.consumed_out);
        }
        Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
      }
    }
  }
}

/// Reader that expands PackBits run-length encoded data.
pub struct PackBitsReader<R: Read> {
  reader: Take<R>,
  literal: usize,
  repeat: usize,
  value: u8,
}

impl<R: Read> PackBitsReader<R> {
  pub fn new(reader: R, compressed_length: u64) -> PackBitsReader<R> {
    Self { reader: reader.take(compressed_length), literal: 0, repeat: 0, value: 0 }
  }

  fn next_header(&mut self) -> io::Result<bool> {
    loop {
      let mut header = [0u8; 1];
      if self.reader.read(&mut header)? == 0 {
        return Ok(false);
      }
      match header[0] as i8 {
        -128 => continue,
        n if n >= 0 => self.literal = n as usize + 1,
        n => {
          let mut value = [0u8; 1];
          self.reader.read_exact(&mut value)?;
          self.value = value[0];
          self.repeat = (1 - isize::from(n)) as usize;
        }
      }
      return Ok(true);
    }
  }
}

impl<R: Read> Read for PackBitsReader<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    if buf.is_empty() {
      return Ok(0);
    }
    if self.literal == 0 && self.repeat == 0 && !self.next_header()? {
      return Ok(0);
    }

    if self.literal > 0 {
      let len = self.literal.min(buf.len());
      let read = self.reader.read(&mut buf[..len])?;
      if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated PackBits literal run"));
      }
      self.literal -= read;
      Ok(read)
    } else {
      let len = self.repeat.min(buf.len());
      buf[..len].iter_mut().for_each(|b| *b = self.value);
      self.repeat -= len;
      Ok(len)
    }
  }
}

/// Reader that is aware of the byte order.
#[derive(Debug)]
pub struct SmartReader<R> {
  reader: R,
  pub byte_order: ByteOrder,
}

impl<R> SmartReader<R> {
  /// Wraps a reader
  pub fn wrap(reader: R, byte_order: ByteOrder) -> SmartReader<R> {
    SmartReader { reader, byte_order }
  }

  pub fn into_inner(self) -> R {
    self.reader
  }
}

impl<R: Read + Seek> SmartReader<R> {
  pub fn goto_offset(&mut self, offset: u64) -> io::Result<()> {
    self.seek(io::SeekFrom::Start(offset)).map(|_| ())
  }
}

impl<R> EndianReader for SmartReader<R>
where
  R: Read,
{
  #[inline(always)]
  fn byte_order(&self) -> ByteOrder {
    self.byte_order
  }
}

impl<R: Read> Read for SmartReader<R> {
  #[inline]
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.reader.read(buf)
  }
}

impl<R: Read + Seek> Seek for SmartReader<R> {
  #[inline]
  fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
    self.reader.seek(pos)
  }
}

/// Writer counterpart of [`SmartReader`].
#[derive(Debug)]
pub struct SmartWriter<W> {
  writer: W,
  pub byte_order: ByteOrder,
}

impl<W: Write> SmartWriter<W> {
  pub fn wrap(writer: W, byte_order: ByteOrder) -> SmartWriter<W> {
    SmartWriter { writer, byte_order }
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

impl<W: Write> EndianWriter for SmartWriter<W> {
  #[inline(always)]
  fn byte_order(&self) -> ByteOrder {
    self.byte_order
  }
}

impl<W: Write> Write for SmartWriter<W> {
  #[inline]
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.writer.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.writer.flush()
  }
}

impl<W: Write + Seek> Seek for SmartWriter<W> {
  #[inline]
  fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
    self.writer.seek(pos)
  }
}
