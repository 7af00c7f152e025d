//! TIFF tags and the enumerated values some of them carry

macro_rules! tags {
  {
    // Permit arbitrary meta items, which include documentation.
    $( #[$enum_attr:meta] )*
    $vis:vis enum $name:ident($ty:tt) $(unknown($unknown_doc:literal))* {
      // Each of the `Name = Val,` permitting documentation.
      $($(#[$ident_attr:meta])* $tag:ident = $val:expr,)*
    }
  } => {
    $( #[$enum_attr] )*
    #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
    #[non_exhaustive]
    pub enum $name {
      $($(#[$ident_attr])* $tag,)*
      $(
        #[doc = $unknown_doc]
        Unknown($ty),
      )*
    }

    impl $name {
      #[inline(always)]
      fn __from_inner_type(n: $ty) -> Result<Self, $ty> {
        match n {
          $( $val => Ok($name::$tag), )*
          n => Err(n),
        }
      }

      #[inline(always)]
      fn __to_inner_type(&self) -> $ty {
        match *self {
          $( $name::$tag => $val, )*
          $( $name::Unknown(n) => { $unknown_doc; n }, )*
        }
      }
    }

    tags!($name, $ty, $($unknown_doc)*);
  };
  // For u16 tags, provide direct inherent primitive conversion methods.
  ($name:tt, u16, $($unknown_doc:literal)*) => {
    impl $name {
      #[inline(always)]
      pub fn from_u16(val: u16) -> Option<Self> {
        Self::__from_inner_type(val).ok()
      }

      $(
      #[inline(always)]
      pub fn from_u16_exhaustive(val: u16) -> Self {
        $unknown_doc;
        Self::__from_inner_type(val).unwrap_or_else(|_| $name::Unknown(val))
      }
      )*

      #[inline(always)]
      pub fn to_u16(&self) -> u16 {
        Self::__to_inner_type(self)
      }
    }
  };
  // For other tag types, do nothing for now.
  ($name:tt, $ty:tt, $($unknown_doc:literal)*) => {};
}

tags! {
/// TIFF tags
pub enum Tag(u16) unknown("A private or extension tag") {
  // Baseline tags:
  Artist = 315,
  BitsPerSample = 258,
  ColorMap = 320,
  Compression = 259,
  Copyright = 33_432,
  DateTime = 306,
  DocumentName = 269,
  ExtraSamples = 338,
  FillOrder = 266,
  HostComputer = 316,
  ImageDescription = 270,
  ImageLength = 257,
  ImageWidth = 256,
  Make = 271,
  Model = 272,
  NewSubfileType = 254,
  Orientation = 274,
  PageName = 285,
  PhotometricInterpretation = 262,
  PlanarConfiguration = 284,
  ResolutionUnit = 296,
  RowsPerStrip = 278,
  SamplesPerPixel = 277,
  Software = 305,
  StripByteCounts = 279,
  StripOffsets = 273,
  XPosition = 286,
  XResolution = 282,
  YPosition = 287,
  YResolution = 283,
  // Advanced tags
  Predictor = 317,
  TileWidth = 322,
  TileLength = 323,
  TileOffsets = 324,
  TileByteCounts = 325,
  SampleFormat = 339,
  // SGI volumetric extension
  ImageDepth = 32_997,
}
}

tags! {
/// The type of an IFD entry (a 2 byte field).
pub enum Type(u16) {
  /// 8-bit unsigned integer
  BYTE = 1,
  /// 8-bit byte that contains a 7-bit ASCII code; the last byte must be zero
  ASCII = 2,
  /// 16-bit unsigned integer
  SHORT = 3,
  /// 32-bit unsigned integer
  LONG = 4,
  /// Fraction stored as two 32-bit unsigned integers
  RATIONAL = 5,
  /// 8-bit signed integer
  SBYTE = 6,
  /// 8-bit byte that may contain anything, depending on the field
  UNDEFINED = 7,
  /// 16-bit signed integer
  SSHORT = 8,
  /// 32-bit signed integer
  SLONG = 9,
  /// Fraction stored as two 32-bit signed integers
  SRATIONAL = 10,
  /// 32-bit IEEE floating point
  FLOAT = 11,
  /// 64-bit IEEE floating point
  DOUBLE = 12,
  /// 32-bit unsigned integer (offset)
  IFD = 13,
  /// BigTIFF 64-bit unsigned integer
  LONG8 = 16,
  /// BigTIFF 64-bit signed integer
  SLONG8 = 17,
  /// BigTIFF 64-bit unsigned integer (offset)
  IFD8 = 18,
}
}

impl Type {
  /// Size in bytes of a single value of this type.
  pub(crate) fn value_bytes(&self) -> u64 {
    match *self {
      Type::BYTE | Type::SBYTE | Type::ASCII | Type::UNDEFINED => 1,
      Type::SHORT | Type::SSHORT => 2,
      Type::LONG | Type::SLONG | Type::FLOAT | Type::IFD => 4,
      Type::LONG8 | Type::SLONG8 | Type::DOUBLE | Type::RATIONAL | Type::SRATIONAL | Type::IFD8 => {
        8
      }
    }
  }
}

tags! {
/// See [TIFF compression tags](https://www.awaresystems.be/imaging/tiff/tifftags/compression.html)
/// for reference.
pub enum CompressionMethod(u16) unknown("A custom compression method") {
  None = 1,
  Huffman = 2,
  Fax3 = 3,
  Fax4 = 4,
  LZW = 5,
  OldJPEG = 6,
  JPEG = 7,
  Deflate = 8,
  PackBits = 0x8005,
  OldDeflate = 0x80B2,
}
}

impl CompressionMethod {
  pub fn name(&self) -> &'static str {
    match self {
      CompressionMethod::None => "none",
      CompressionMethod::Huffman => "CCITT RLE",
      CompressionMethod::Fax3 => "CCITT Group 3",
      CompressionMethod::Fax4 => "CCITT Group 4",
      CompressionMethod::LZW => "LZW",
      CompressionMethod::OldJPEG => "old JPEG",
      CompressionMethod::JPEG => "JPEG",
      CompressionMethod::Deflate => "Adobe deflate",
      CompressionMethod::PackBits => "PackBits",
      CompressionMethod::OldDeflate => "deflate",
      CompressionMethod::Unknown(_) => "unknown",
    }
  }
}

tags! {
pub enum PhotometricInterpretation(u16) {
  WhiteIsZero = 0,
  BlackIsZero = 1,
  RGB = 2,
  RGBPalette = 3,
  TransparencyMask = 4,
  CMYK = 5,
  YCbCr = 6,
  CIELab = 8,
}
}

impl PhotometricInterpretation {
  pub fn name(&self) -> &'static str {
    match self {
      PhotometricInterpretation::WhiteIsZero => "white is zero",
      PhotometricInterpretation::BlackIsZero => "black is zero",
      PhotometricInterpretation::RGB => "RGB",
      PhotometricInterpretation::RGBPalette => "palette",
      PhotometricInterpretation::TransparencyMask => "mask",
      PhotometricInterpretation::CMYK => "separated",
      PhotometricInterpretation::YCbCr => "YCbCr",
      PhotometricInterpretation::CIELab => "CIELab",
    }
  }
}

tags! {
pub enum PlanarConfiguration(u16) {
  Chunky = 1,
  Planar = 2,
}
}

impl PlanarConfiguration {
  pub fn name(&self) -> &'static str {
    match self {
      PlanarConfiguration::Chunky => "contiguous",
      PlanarConfiguration::Planar => "separate",
    }
  }
}

tags! {
pub enum Predictor(u16) {
  None = 1,
  Horizontal = 2,
  FloatingPoint = 3,
}
}

tags! {
/// Type to represent resolution units
pub enum ResolutionUnit(u16) {
  None = 1,
  Inch = 2,
  Centimeter = 3,
}
}

impl ResolutionUnit {
  pub fn name(&self) -> &'static str {
    match self {
      ResolutionUnit::None => "none",
      ResolutionUnit::Inch => "inch",
      ResolutionUnit::Centimeter => "cm",
    }
  }
}

tags! {
pub enum SampleFormat(u16) unknown("An unknown extension sample format") {
  Uint = 1,
  Int = 2,
  IEEEFP = 3,
  Void = 4,
}
}

impl SampleFormat {
  pub fn name(&self) -> &'static str {
    match self {
      SampleFormat::Uint => "uint",
      SampleFormat::Int => "int",
      SampleFormat::IEEEFP => "float",
      SampleFormat::Void => "void",
      SampleFormat::Unknown(_) => "unknown",
    }
  }
}

/// Names the eight TIFF orientations by the corner holding row 0 / column 0.
pub fn orientation_name(value: u16) -> Option<&'static str> {
  match value {
    1 => Some("top.left"),
    2 => Some("top.right"),
    3 => Some("bottom.right"),
    4 => Some("bottom.left"),
    5 => Some("left.top"),
    6 => Some("right.top"),
    7 => Some("right.bottom"),
    8 => Some("left.bottom"),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_tags_keep_their_number() {
    assert_eq!(Tag::from_u16_exhaustive(256), Tag::ImageWidth);
    assert_eq!(Tag::from_u16_exhaustive(65000), Tag::Unknown(65000));
    assert_eq!(Tag::Unknown(65000).to_u16(), 65000);
    assert_eq!(Tag::ImageDepth.to_u16(), 32997);
  }

  #[test]
  fn enumerated_values_without_unknown_reject_out_of_range() {
    assert_eq!(PlanarConfiguration::from_u16(2), Some(PlanarConfiguration::Planar));
    assert_eq!(PlanarConfiguration::from_u16(3), None);
    assert_eq!(CompressionMethod::from_u16_exhaustive(0x8005), CompressionMethod::PackBits);
  }

  #[test]
  fn orientation_names() {
    assert_eq!(orientation_name(1), Some("top.left"));
    assert_eq!(orientation_name(9), None);
  }
}
