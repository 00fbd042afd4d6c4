//! Header of a classic (single signature size) index file.

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

use super::{
    put_name, put_u32, put_u64, put_u8, read_framed, read_framed_file, row_stride, write_framed,
    ByteReader, CLASSIC_MAGIC,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicIndexHeader {
    pub term_size: u32,
    pub canonicalize: bool,
    pub num_hashes: u32,
    /// signature size `m` in bits (= rows)
    pub signature_size: u64,
    /// document count `n` (= columns)
    pub num_documents: u64,
    pub file_names: Vec<String>,
}

impl ClassicIndexHeader {
    /// Bytes per payload row.
    pub fn row_stride(&self) -> usize {
        row_stride(self.num_documents as usize)
    }

    /// Exact payload length implied by this header.
    pub fn payload_size(&self) -> Result<u64> {
        self.signature_size
            .checked_mul(self.row_stride() as u64)
            .ok_or_else(|| {
                Error::OutOfResources(format!(
                    "payload of {} rows x {} bytes exceeds addressable limits",
                    self.signature_size,
                    self.row_stride()
                ))
            })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        debug_assert_eq!(self.file_names.len() as u64, self.num_documents);
        let mut body = Vec::new();
        put_u32(&mut body, self.term_size);
        put_u8(&mut body, self.canonicalize as u8);
        put_u32(&mut body, self.num_hashes);
        put_u64(&mut body, self.signature_size);
        put_u64(&mut body, self.num_documents);
        put_u32(&mut body, self.file_names.len() as u32);
        for name in &self.file_names {
            put_name(&mut body, name);
        }
        write_framed(w, &CLASSIC_MAGIC, &body)?;
        Ok(())
    }

    fn parse_body(body: &[u8], origin: &str) -> Result<Self> {
        let mut r = ByteReader::new(body, origin);
        let term_size = r.u32("term size")?;
        let canonicalize = r.u8("canonicalize flag")? != 0;
        let num_hashes = r.u32("hash count")?;
        let signature_size = r.u64("signature size")?;
        let num_documents = r.u64("document count")?;
        let name_count = r.u32("name count")?;
        if name_count as u64 != num_documents {
            return Err(Error::Format(format!(
                "{}: name count {} disagrees with document count {}",
                origin, name_count, num_documents
            )));
        }
        let mut file_names = Vec::with_capacity(name_count as usize);
        for _ in 0..name_count {
            file_names.push(r.name()?);
        }
        r.finish()?;
        if signature_size == 0 {
            return Err(Error::Format(format!("{}: zero signature size", origin)));
        }
        if term_size == 0 || num_hashes == 0 {
            return Err(Error::Format(format!(
                "{}: term size and hash count must be nonzero",
                origin
            )));
        }
        Ok(Self {
            term_size,
            canonicalize,
            num_hashes,
            signature_size,
            num_documents,
            file_names,
        })
    }

    /// Parse from the start of a mapped file; returns the header and the
    /// payload offset.
    pub fn parse(data: &[u8], origin: &str) -> Result<(Self, usize)> {
        let (body, payload_off) = read_framed(data, &CLASSIC_MAGIC, origin)?;
        Ok((Self::parse_body(body, origin)?, payload_off))
    }

    /// Read only the header of `path`; returns the header and the payload
    /// offset.
    pub fn read_file(path: &Path) -> Result<(Self, u64)> {
        let (body, payload_off) = read_framed_file(path, &CLASSIC_MAGIC)?;
        let origin = path.display().to_string();
        Ok((Self::parse_body(&body, &origin)?, payload_off))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassicIndexHeader {
        ClassicIndexHeader {
            term_size: 31,
            canonicalize: true,
            num_hashes: 3,
            signature_size: 1024,
            num_documents: 3,
            file_names: vec!["a".into(), "b".into(), "longer_name".into()],
        }
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let header = sample();
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        let (parsed, payload_off) = ClassicIndexHeader::parse(&bytes, "test").unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload_off, bytes.len());
        let mut again = Vec::new();
        parsed.write(&mut again).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn truncated_header_is_a_format_error() {
        let header = sample();
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            ClassicIndexHeader::parse(&bytes, "test"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn name_count_must_match_documents() {
        let mut header = sample();
        header.num_documents = 4;
        let mut bytes = Vec::new();
        // write skips the debug assertion in release; build the body manually
        put_u32(&mut bytes, header.term_size);
        put_u8(&mut bytes, 1);
        put_u32(&mut bytes, header.num_hashes);
        put_u64(&mut bytes, header.signature_size);
        put_u64(&mut bytes, header.num_documents);
        put_u32(&mut bytes, header.file_names.len() as u32);
        for name in &header.file_names {
            put_name(&mut bytes, name);
        }
        let mut framed = Vec::new();
        write_framed(&mut framed, &CLASSIC_MAGIC, &bytes).unwrap();
        assert!(matches!(
            ClassicIndexHeader::parse(&framed, "test"),
            Err(Error::Format(_))
        ));
    }
}
