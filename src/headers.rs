//! Binary snapshot header (§6.2): magic bytes, format version, order, and
//! the per-order ngram counts needed to size everything that follows.
//!
//! Read/written field-by-field with `byteorder`, the same way the teacher's
//! `CountHeader::from_file` reads its `u64`s one at a time rather than
//! transmuting a struct straight off the wire bytes. The original format
//! this crate is modeled on had no magic number, version, or byte-order
//! marker at all (an in-memory struct dump); this header adds all three.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::Error;

pub(crate) const MAGIC: [u8; 8] = *b"NGTRIE01";
pub(crate) const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Header {
    pub(crate) order: u16,
    pub(crate) n_ngrams: Vec<u64>,
}

impl Header {
    pub(crate) fn write(&self, out: &mut impl Write) -> Result<(), Error> {
        out.write_all(&MAGIC)?;
        out.write_u16::<LittleEndian>(VERSION)?;
        out.write_u16::<LittleEndian>(self.order)?;
        for &n in &self.n_ngrams {
            out.write_u64::<LittleEndian>(n)?;
        }
        Ok(())
    }

    pub(crate) fn read(input: &mut impl Read) -> Result<Self, Error> {
        let mut magic = [0u8; 8];
        input
            .read_exact(&mut magic)
            .map_err(|e| map_eof(e, "magic"))?;
        if magic != MAGIC {
            return Err(Error::BadMagic);
        }
        let version = input.read_u16::<LittleEndian>().map_err(Error::Io)?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let order = input
            .read_u16::<LittleEndian>()
            .map_err(|e| map_eof(e, "order"))?;
        let mut n_ngrams = Vec::with_capacity(order as usize);
        for _ in 0..order {
            n_ngrams.push(
                input
                    .read_u64::<LittleEndian>()
                    .map_err(|e| map_eof(e, "n_ngrams"))?,
            );
        }
        Ok(Self { order, n_ngrams })
    }
}

/// Translates an unexpected-EOF I/O error into [`Error::TruncatedSnapshot`],
/// preserving a note of which section of the snapshot was being read.
pub(crate) fn map_eof(e: std::io::Error, what: &str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::TruncatedSnapshot(what.to_string())
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let h = Header {
            order: 3,
            n_ngrams: vec![10, 20, 15],
        };
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        let back = Header::read(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 8];
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&3u16.to_le_bytes());
        let err = Header::read(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::BadMagic));
    }

    #[test]
    fn rejects_truncated_stream() {
        let buf = MAGIC.to_vec();
        let err = Header::read(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::TruncatedSnapshot(_)));
    }
}
