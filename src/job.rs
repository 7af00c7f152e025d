//! Storage-agnostic byte stream the codec reads from and writes to.

use std::{
  fs::File,
  io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
  path::Path,
};

use crate::{error::report_warning, TiffError, TiffResult};

/// Initial reservation for growable output.
pub const INITIAL_CAPACITY: usize = 256 * 1024;

#[derive(Debug)]
enum Backing<'a> {
  FileIn(BufReader<File>),
  FileOut(BufWriter<File>),
  Memory { data: &'a [u8], pos: u64 },
  Growable { data: Vec<u8>, pos: u64 },
}

/// One file or one memory region, owned for the duration of a read or write.
///
/// Files are closed when the job is dropped; [`StreamJob::close`] does the same but reports a
/// failed final flush.
#[derive(Debug)]
pub struct StreamJob<'a> {
  backing: Backing<'a>,
}

impl StreamJob<'static> {
  /// Opens `path` for reading.
  pub fn open(path: impl AsRef<Path>) -> TiffResult<Self> {
    let path = path.as_ref();
    let file = File::open(path)
      .map_err(|source| TiffError::Open { target: path.display().to_string(), source })?;
    Ok(StreamJob { backing: Backing::FileIn(BufReader::new(file)) })
  }

  /// Creates or truncates `path` for writing.
  pub fn create(path: impl AsRef<Path>) -> TiffResult<Self> {
    let path = path.as_ref();
    let file = File::create(path)
      .map_err(|source| TiffError::Open { target: path.display().to_string(), source })?;
    Ok(StreamJob { backing: Backing::FileOut(BufWriter::new(file)) })
  }

  /// An empty in-memory destination that grows as bytes are written.
  pub fn growable() -> Self {
    StreamJob {
      backing: Backing::Growable { data: Vec::with_capacity(INITIAL_CAPACITY), pos: 0 },
    }
  }
}

impl<'a> StreamJob<'a> {
  /// Reads from a fixed byte region.
  pub fn from_bytes(data: &'a [u8]) -> Self {
    StreamJob { backing: Backing::Memory { data, pos: 0 } }
  }

  pub fn is_file(&self) -> bool {
    matches!(self.backing, Backing::FileIn(_) | Backing::FileOut(_))
  }

  /// Total length of the stream. Files are measured by seeking to the end and back.
  pub fn size(&mut self) -> io::Result<u64> {
    match &mut self.backing {
      Backing::FileIn(f) => measure(f),
      Backing::FileOut(f) => measure(f),
      Backing::Memory { data, .. } => Ok(data.len() as u64),
      Backing::Growable { data, .. } => Ok(data.len() as u64),
    }
  }

  /// Flushes and releases the backing store.
  pub fn close(self) -> io::Result<()> {
    match self.backing {
      Backing::FileOut(mut f) => f.flush(),
      _ => Ok(()),
    }
  }

  /// Finishes a growable job and returns its bytes, trimmed to the written length.
  pub fn into_bytes(mut self) -> TiffResult<Vec<u8>> {
    self.flush()?;
    match self.backing {
      Backing::Growable { mut data, .. } => {
        data.shrink_to_fit();
        Ok(data)
      }
      Backing::Memory { data, .. } => Ok(data.to_vec()),
      _ => Err(TiffError::IoError(io::Error::new(
        io::ErrorKind::Unsupported,
        "file-backed streams do not hand out their bytes",
      ))),
    }
  }
}

fn measure<S: Seek>(s: &mut S) -> io::Result<u64> {
  let current = s.stream_position()?;
  let end = s.seek(SeekFrom::End(0))?;
  s.seek(SeekFrom::Start(current))?;
  Ok(end)
}

/// Resolves a seek on a memory region. Targets outside `[0, len]` leave `pos` untouched.
fn seek_within(pos: &mut u64, len: u64, to: SeekFrom) -> io::Result<u64> {
  let target = match to {
    SeekFrom::Start(offset) => i128::from(offset),
    SeekFrom::Current(offset) => i128::from(*pos) + i128::from(offset),
    SeekFrom::End(offset) => i128::from(len) + i128::from(offset),
  };
  if target < 0 || target > i128::from(len) {
    let offset = i64::try_from(target).unwrap_or(i64::MAX);
    report_warning("job", format_args!("attempted to seek to {offset}, beyond the data end"));
    return Err(io::Error::new(io::ErrorKind::InvalidInput, TiffError::Boundary { offset, len }));
  }
  *pos = target as u64;
  Ok(*pos)
}

impl Read for StreamJob<'_> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let (data, pos): (&[u8], &mut u64) = match &mut self.backing {
      Backing::FileIn(f) => return f.read(buf),
      Backing::FileOut(_) => {
        return Err(io::Error::new(io::ErrorKind::PermissionDenied, "stream is open for writing"))
      }
      Backing::Memory { data, pos } => (*data, pos),
      Backing::Growable { data, pos } => (data.as_slice(), pos),
    };
    let start = (*pos as usize).min(data.len());
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    *pos += n as u64;
    Ok(n)
  }
}

impl Write for StreamJob<'_> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    match &mut self.backing {
      Backing::FileOut(f) => f.write(buf),
      Backing::Growable { data, pos } => {
        let start = *pos as usize;
        let end = start + buf.len();
        if end > data.len() {
          data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        *pos = end as u64;
        Ok(buf.len())
      }
      Backing::FileIn(_) | Backing::Memory { .. } => {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "stream is open for reading"))
      }
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    match &mut self.backing {
      Backing::FileOut(f) => f.flush(),
      _ => Ok(()),
    }
  }
}

impl Seek for StreamJob<'_> {
  fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
    match &mut self.backing {
      Backing::FileIn(f) => f.seek(to),
      Backing::FileOut(f) => f.seek(to),
      Backing::Memory { data, pos } => seek_within(pos, data.len() as u64, to),
      Backing::Growable { data, pos } => seek_within(pos, data.len() as u64, to),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ErrorKind;

  #[test]
  fn memory_reads_clamp_to_the_end() {
    let bytes = [1u8, 2, 3, 4, 5];
    let mut job = StreamJob::from_bytes(&bytes);
    job.seek(SeekFrom::Start(3)).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(job.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], &[4, 5]);
    assert_eq!(job.read(&mut buf).unwrap(), 0);
  }

  #[test]
  fn seeking_past_the_end_keeps_position() {
    let bytes = [0u8; 4];
    let mut job = StreamJob::from_bytes(&bytes);
    job.seek(SeekFrom::Start(2)).unwrap();

    let err = job.seek(SeekFrom::Start(10)).unwrap_err();
    assert_eq!(TiffError::IoError(err).kind(), ErrorKind::BoundaryError);
    assert!(job.seek(SeekFrom::Current(-3)).is_err());
    assert_eq!(job.stream_position().unwrap(), 2);

    assert_eq!(job.seek(SeekFrom::End(0)).unwrap(), 4);
    assert_eq!(job.size().unwrap(), 4);
  }

  #[test]
  fn growable_overwrites_and_extends() {
    let mut job = StreamJob::growable();
    job.write_all(&[1, 2, 3, 4]).unwrap();
    job.seek(SeekFrom::Start(1)).unwrap();
    job.write_all(&[9, 9, 9, 9]).unwrap();
    assert_eq!(job.size().unwrap(), 5);
    assert_eq!(job.into_bytes().unwrap(), vec![1, 9, 9, 9, 9]);
  }

  #[test]
  fn growable_accepts_more_than_its_reservation() {
    let mut job = StreamJob::growable();
    let block = vec![7u8; INITIAL_CAPACITY / 2 + 1];
    for _ in 0..3 {
      job.write_all(&block).unwrap();
    }
    assert_eq!(job.size().unwrap() as usize, 3 * block.len());
  }

  #[test]
  fn memory_sources_are_read_only() {
    let bytes = [0u8; 2];
    let mut job = StreamJob::from_bytes(&bytes);
    assert!(job.write(&[1]).is_err());
  }

  #[test]
  fn files_round_trip_and_measure() {
    let path = std::env::temp_dir().join(format!("tiffraster-job-{}.bin", std::process::id()));
    let mut out = StreamJob::create(&path).unwrap();
    out.write_all(b"abcdef").unwrap();
    out.close().unwrap();

    let mut input = StreamJob::open(&path).unwrap();
    assert!(input.is_file());
    input.seek(SeekFrom::Start(2)).unwrap();
    assert_eq!(input.size().unwrap(), 6);
    let mut rest = String::new();
    input.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "cdef");
    std::fs::remove_file(&path).unwrap();
  }

  #[test]
  fn missing_files_fail_to_open() {
    let err = StreamJob::open("/nonexistent/dir/image.tif").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OpenFailure);
    assert!(err.to_string().contains("/nonexistent/dir/image.tif"));
  }
}
