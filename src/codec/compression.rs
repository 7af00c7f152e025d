//! Encoding side of the supported compression schemes. Decoding happens through the readers in
//! [`super::stream`].

use std::io::{self, Write};

use crate::{tags::CompressionMethod, TiffError, TiffResult, TiffUnsupportedError};

/// Compresses one strip or tile with `method`.
pub(crate) fn compress(method: CompressionMethod, data: &[u8]) -> TiffResult<Vec<u8>> {
  match method {
    CompressionMethod::None => Ok(data.to_vec()),
    CompressionMethod::LZW => weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
      .encode(data)
      .map_err(|e| TiffError::IoError(io::Error::new(io::ErrorKind::InvalidData, e))),
    CompressionMethod::Deflate | CompressionMethod::OldDeflate => {
      let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
      encoder.write_all(data)?;
      Ok(encoder.finish()?)
    }
    CompressionMethod::PackBits => Ok(compress_packbits(data)),
    method => Err(TiffUnsupportedError::UnsupportedCompressionMethod(method).into()),
  }
}

/// Whether [`compress`] can produce `method`.
pub(crate) fn can_encode(method: CompressionMethod) -> bool {
  matches!(
    method,
    CompressionMethod::None
      | CompressionMethod::LZW
      | CompressionMethod::Deflate
      | CompressionMethod::OldDeflate
      | CompressionMethod::PackBits
  )
}

fn compress_packbits(data: &[u8]) -> Vec<u8> {
  let mut output = Vec::with_capacity(data.len() + data.len() / 128 + 1);
  let mut i = 0;

  while i < data.len() {
    let mut run = 1;
    while i + run < data.len() && run < 128 && data[i + run] == data[i] {
      run += 1;
    }

    if run > 1 {
      output.push((1 - run as isize) as u8);
      output.push(data[i]);
      i += run;
    } else {
      let start = i;
      i += 1;
      // A literal ends where a run of two or more begins.
      while i < data.len() && i - start < 128 && !(i + 1 < data.len() && data[i] == data[i + 1]) {
        i += 1;
      }
      output.push((i - start - 1) as u8);
      output.extend_from_slice(&data[start..i]);
    }
  }

  output
}
