//! Directory entries and the values they resolve to

use std::{
  collections::HashMap,
  io::{self, Read, Seek},
};

use super::{
  stream::{ByteOrder, EndianReader, SmartReader},
  Limits,
};
use crate::{
  tags::{Tag, Type},
  TiffError, TiffFormatError, TiffResult,
};

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
  Byte(u8),
  Short(u16),
  SignedByte(i8),
  SignedShort(i16),
  Signed(i32),
  SignedBig(i64),
  Unsigned(u32),
  UnsignedBig(u64),
  Float(f32),
  Double(f64),
  List(Vec<Value>),
  Rational(u32, u32),
  SRational(i32, i32),
  Ascii(String),
  Ifd(u32),
  IfdBig(u64),
}

impl Value {
  pub fn into_u16(self) -> TiffResult<u16> {
    match self {
      Value::Byte(val) => Ok(val.into()),
      Value::Short(val) => Ok(val),
      Value::Unsigned(val) => Ok(u16::try_from(val)?),
      Value::UnsignedBig(val) => Ok(u16::try_from(val)?),
      val => Err(TiffFormatError::UnsignedIntegerExpected(val).into()),
    }
  }

  pub fn into_u32(self) -> TiffResult<u32> {
    match self {
      Value::Byte(val) => Ok(val.into()),
      Value::Short(val) => Ok(val.into()),
      Value::Unsigned(val) | Value::Ifd(val) => Ok(val),
      Value::UnsignedBig(val) | Value::IfdBig(val) => Ok(u32::try_from(val)?),
      val => Err(TiffFormatError::UnsignedIntegerExpected(val).into()),
    }
  }

  pub fn into_u64(self) -> TiffResult<u64> {
    match self {
      Value::Byte(val) => Ok(val.into()),
      Value::Short(val) => Ok(val.into()),
      Value::Unsigned(val) | Value::Ifd(val) => Ok(val.into()),
      Value::UnsignedBig(val) | Value::IfdBig(val) => Ok(val),
      val => Err(TiffFormatError::UnsignedIntegerExpected(val).into()),
    }
  }

  pub fn into_i64(self) -> TiffResult<i64> {
    match self {
      Value::SignedByte(val) => Ok(val.into()),
      Value::SignedShort(val) => Ok(val.into()),
      Value::Signed(val) => Ok(val.into()),
      Value::SignedBig(val) => Ok(val),
      val => Err(TiffFormatError::SignedIntegerExpected(val).into()),
    }
  }

  /// Numeric view of any scalar, rationals included.
  pub fn into_f64(self) -> TiffResult<f64> {
    match self {
      Value::Rational(n, d) => Ok(f64::from(n) / f64::from(d)),
      Value::SRational(n, d) => Ok(f64::from(n) / f64::from(d)),
      Value::Float(val) => Ok(val.into()),
      Value::Double(val) => Ok(val),
      Value::List(mut vals) if vals.len() == 1 => vals.remove(0).into_f64(),
      val @ (Value::SignedByte(_) | Value::SignedShort(_) | Value::Signed(_) | Value::SignedBig(_)) => {
        Ok(val.into_i64()? as f64)
      }
      val => match val.clone().into_u64() {
        Ok(v) => Ok(v as f64),
        Err(_) => Err(TiffFormatError::NumberExpected(val).into()),
      },
    }
  }

  pub fn into_u16_vec(self) -> TiffResult<Vec<u16>> {
    match self {
      Value::List(vec) => vec.into_iter().map(Value::into_u16).collect(),
      val => Ok(vec![val.into_u16()?]),
    }
  }

  pub fn into_u64_vec(self) -> TiffResult<Vec<u64>> {
    match self {
      Value::List(vec) => vec.into_iter().map(Value::into_u64).collect(),
      val => Ok(vec![val.into_u64()?]),
    }
  }

  pub fn into_string(self) -> TiffResult<String> {
    match self {
      Value::Ascii(val) => Ok(val),
      val => Err(TiffFormatError::AsciiExpected(val).into()),
    }
  }

  /// Field type, value count and payload in `byte_order`, for writing.
  pub(crate) fn encode(&self, byte_order: ByteOrder) -> TiffResult<(Type, u64, Vec<u8>)> {
    macro_rules! bytes {
      ($v:expr) => {
        match byte_order {
          ByteOrder::LittleEndian => $v.to_le_bytes().to_vec(),
          ByteOrder::BigEndian => $v.to_be_bytes().to_vec(),
        }
      };
    }

    Ok(match self {
      Value::Byte(v) => (Type::BYTE, 1, vec![*v]),
      Value::Short(v) => (Type::SHORT, 1, bytes!(v)),
      Value::SignedByte(v) => (Type::SBYTE, 1, bytes!(v)),
      Value::SignedShort(v) => (Type::SSHORT, 1, bytes!(v)),
      Value::Signed(v) => (Type::SLONG, 1, bytes!(v)),
      Value::SignedBig(v) => (Type::SLONG8, 1, bytes!(v)),
      Value::Unsigned(v) => (Type::LONG, 1, bytes!(v)),
      Value::UnsignedBig(v) => (Type::LONG8, 1, bytes!(v)),
      Value::Float(v) => (Type::FLOAT, 1, bytes!(v)),
      Value::Double(v) => (Type::DOUBLE, 1, bytes!(v)),
      Value::Ifd(v) => (Type::IFD, 1, bytes!(v)),
      Value::IfdBig(v) => (Type::IFD8, 1, bytes!(v)),
      Value::Rational(n, d) => (Type::RATIONAL, 1, [bytes!(n), bytes!(d)].concat()),
      Value::SRational(n, d) => (Type::SRATIONAL, 1, [bytes!(n), bytes!(d)].concat()),
      Value::Ascii(s) => {
        let mut data = s.as_bytes().to_vec();
        data.push(0);
        (Type::ASCII, data.len() as u64, data)
      }
      Value::List(vals) => {
        let mut encoded = vals.iter().map(|v| v.encode(byte_order));
        let (type_, _, mut data) = match encoded.next() {
          Some(first) => first?,
          None => return Err(TiffFormatError::InconsistentSizesEncountered.into()),
        };
        for next in encoded {
          let (next_type, _, next_data) = next?;
          if next_type != type_ {
            return Err(TiffFormatError::InconsistentSizesEncountered.into());
          }
          data.extend(next_data);
        }
        (type_, vals.len() as u64, data)
      }
    })
  }
}

/// A directory entry whose value may live elsewhere in the file.
#[derive(Clone, PartialEq)]
pub struct Entry {
  type_: Type,
  count: u64,
  offset: [u8; 8],
}

impl std::fmt::Debug for Entry {
  fn fmt(&self, fmt: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
    fmt.write_str(&format!(
      "Entry {{ type_: {:?}, count: {:?}, offset: {:?} }}",
      self.type_, self.count, &self.offset
    ))
  }
}

impl Entry {
  pub fn new(type_: Type, count: u32, offset: [u8; 4]) -> Entry {
    let mut wide = [0u8; 8];
    wide[..4].copy_from_slice(&offset);
    Entry::new_u64(type_, count.into(), wide)
  }

  pub fn new_u64(type_: Type, count: u64, offset: [u8; 8]) -> Entry {
    Entry { type_, count, offset }
  }

  /// Returns a mem_reader for the offset/value field
  fn r(&self, byte_order: ByteOrder) -> SmartReader<io::Cursor<Vec<u8>>> {
    SmartReader::wrap(io::Cursor::new(self.offset.to_vec()), byte_order)
  }

  pub fn val<R: Read + Seek>(
    &self, limits: &Limits, bigtiff: bool, reader: &mut SmartReader<R>,
  ) -> TiffResult<Value> {
    let bo = reader.byte_order;
    let value_bytes =
      self.count.checked_mul(self.type_.value_bytes()).ok_or(TiffError::LimitsExceeded)?;
    if value_bytes > limits.ifd_value_size as u64 {
      return Err(TiffError::LimitsExceeded);
    }
    let inline_capacity = if bigtiff { 8 } else { 4 };

    let data = if value_bytes <= inline_capacity {
      self.offset[..value_bytes as usize].to_vec()
    } else {
      let offset = if bigtiff { self.r(bo).read_u64()? } else { u64::from(self.r(bo).read_u32()?) };
      reader.goto_offset(offset)?;
      let mut data = vec![0u8; usize::try_from(value_bytes)?];
      reader.read_exact(&mut data)?;
      data
    };

    if self.type_ == Type::ASCII {
      let mut data = data;
      // Strings may be null-terminated, so we trim anything downstream of the null byte
      if let Some(first) = data.iter().position(|&b| b == 0) {
        data.truncate(first);
      }
      return Ok(Value::Ascii(String::from_utf8(data)?));
    }

    let mut r = SmartReader::wrap(io::Cursor::new(data), bo);
    let mut values = Vec::with_capacity(usize::try_from(self.count)?);
    for _ in 0..self.count {
      values.push(match self.type_ {
        Type::BYTE | Type::UNDEFINED => Value::Byte(r.read_u8()?),
        Type::SBYTE => Value::SignedByte(r.read_i8()?),
        Type::SHORT => Value::Short(r.read_u16()?),
        Type::SSHORT => Value::SignedShort(r.read_i16()?),
        Type::LONG => Value::Unsigned(r.read_u32()?),
        Type::SLONG => Value::Signed(r.read_i32()?),
        Type::LONG8 => Value::UnsignedBig(r.read_u64()?),
        Type::SLONG8 => Value::SignedBig(r.read_i64()?),
        Type::FLOAT => Value::Float(r.read_f32()?),
        Type::DOUBLE => Value::Double(r.read_f64()?),
        Type::IFD => Value::Ifd(r.read_u32()?),
        Type::IFD8 => Value::IfdBig(r.read_u64()?),
        Type::RATIONAL => Value::Rational(r.read_u32()?, r.read_u32()?),
        Type::SRATIONAL => Value::SRational(r.read_i32()?, r.read_i32()?),
        Type::ASCII => unreachable!("strings are decoded above"),
      });
    }

    Ok(match values.len() {
      1 => values.remove(0),
      _ => Value::List(values),
    })
  }
}

trait ReadU8: Read {
  fn read_u8(&mut self) -> io::Result<u8> {
    let mut n = [0u8; 1];
    self.read_exact(&mut n)?;
    Ok(n[0])
  }
}

impl<R: Read> ReadU8 for R {}

/// Type representing an Image File Directory
pub type Directory = HashMap<Tag, Entry>;
