//! Index File Scanner
//!
//! Walks an append-only volume index file front to back, handing each
//! `(key, offset, size)` record to a callback. Later records for a key
//! supersede earlier ones; interpreting that is left to the caller.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::{debug, trace};

use super::types::{IndexRecord, NeedleId, Offset, NEEDLE_MAP_ENTRY_SIZE};
use crate::error::Result;

/// Number of records requested per read
pub const ROWS_TO_READ: usize = 1024;

/// Positional reads over a byte source
///
/// `Ok(0)` signals end of source.
pub trait ReadAt {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(start) if start < self.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

/// Walk every complete record of an index source in file order
///
/// Stops with the first error returned by `f`. A trailing fragment shorter
/// than one record is a torn append and is dropped without error. Read
/// errors are returned as-is; nothing is retried.
pub fn walk_index_file<R, F>(reader: &R, mut f: F) -> Result<()>
where
    R: ReadAt + ?Sized,
    F: FnMut(NeedleId, Offset, u32) -> Result<()>,
{
    let mut buf = vec![0u8; NEEDLE_MAP_ENTRY_SIZE * ROWS_TO_READ];
    let mut reader_offset = 0u64;
    // bytes of an incomplete record left over from the previous read
    let mut carried = 0usize;

    loop {
        let count = reader.read_at(&mut buf[carried..], reader_offset)?;
        trace!("index read at {} returned {} bytes", reader_offset, count);

        if count == 0 {
            if carried > 0 {
                debug!(
                    "Discarding {} trailing bytes at index offset {}",
                    carried, reader_offset
                );
            }
            return Ok(());
        }
        reader_offset += count as u64;

        let filled = carried + count;
        let mut pos = 0;
        while pos + NEEDLE_MAP_ENTRY_SIZE <= filled {
            let record = IndexRecord::from_bytes(&buf[pos..pos + NEEDLE_MAP_ENTRY_SIZE]);
            f(record.key, record.offset, record.size)?;
            pos += NEEDLE_MAP_ENTRY_SIZE;
        }

        buf.copy_within(pos..filled, 0);
        carried = filled - pos;
    }
}

/// Open an index file by path and walk it
pub fn walk_index_path<F>(path: &Path, f: F) -> Result<()>
where
    F: FnMut(NeedleId, Offset, u32) -> Result<()>,
{
    let file = File::open(path)?;
    walk_index_file(&file, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn records(n: u64) -> Vec<IndexRecord> {
        (1..=n)
            .map(|i| IndexRecord::new(i * 10, Offset(i as u32), (i * 100) as u32))
            .collect()
    }

    fn encode(records: &[IndexRecord]) -> Vec<u8> {
        records.iter().flat_map(|r| r.to_bytes()).collect()
    }

    fn collect<R: ReadAt + ?Sized>(reader: &R) -> Result<Vec<IndexRecord>> {
        let mut seen = Vec::new();
        walk_index_file(reader, |key, offset, size| {
            seen.push(IndexRecord::new(key, offset, size));
            Ok(())
        })?;
        Ok(seen)
    }

    /// Hands out at most `chunk` bytes per read
    struct Trickle {
        data: Vec<u8>,
        chunk: usize,
    }

    impl ReadAt for Trickle {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
            let limit = buf.len().min(self.chunk);
            self.data.read_at(&mut buf[..limit], offset)
        }
    }

    /// Serves its data once, then fails
    struct Failing {
        data: Vec<u8>,
        reads: Cell<usize>,
    }

    impl ReadAt for Failing {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            if offset as usize >= self.data.len() {
                return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
            }
            self.data.read_at(buf, offset)
        }
    }

    #[test]
    fn test_walk_file_in_order() {
        let expected = records(50);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encode(&expected)).unwrap();
        file.flush().unwrap();

        let seen = collect(file.as_file()).unwrap();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_walk_spans_batches() {
        let expected = records(ROWS_TO_READ as u64 * 2 + 7);
        let seen = collect(&encode(&expected)).unwrap();
        assert_eq!(seen.len(), expected.len());
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_trailing_fragment_is_ignored() {
        let expected = records(12);
        let mut bytes = encode(&expected);
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe]);

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let seen = collect(file.as_file()).unwrap();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_empty_source() {
        assert!(collect(&Vec::<u8>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_short_reads_decode_every_record() {
        let expected = records(40);
        for chunk in [1, 5, 16, 23, 100] {
            let reader = Trickle {
                data: encode(&expected),
                chunk,
            };
            assert_eq!(collect(&reader).unwrap(), expected, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_callback_error_stops_walk() {
        let bytes = encode(&records(10));
        let mut visited = Vec::new();

        let result = walk_index_file(&bytes, |key, _, _| {
            visited.push(key);
            if key == 30 {
                return Err(Error::NotFound(format!("needle {}", key)));
            }
            Ok(())
        });

        assert!(matches!(result, Err(Error::NotFound(ref k)) if k == "needle 30"));
        assert_eq!(visited, vec![10, 20, 30]);
    }

    #[test]
    fn test_read_error_is_propagated() {
        let reader = Failing {
            data: encode(&records(3)),
            reads: Cell::new(0),
        };

        let mut count = 0;
        let result = walk_index_file(&reader, |_, _, _| {
            count += 1;
            Ok(())
        });

        assert_eq!(count, 3);
        match result {
            Err(Error::Io(e)) => assert_eq!(e.to_string(), "disk on fire"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(reader.reads.get(), 2);
    }
}
