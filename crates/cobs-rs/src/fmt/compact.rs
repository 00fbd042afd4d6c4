//! Header of a compact (paged) index file.

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

use super::{
    put_name, put_u32, put_u64, put_u8, read_framed, read_framed_file, row_stride, write_framed,
    ByteReader, COMPACT_MAGIC,
};

/// Directory entry of one page: its own signature size and document names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactPageHeader {
    /// signature size `m_p` in bits
    pub signature_size: u64,
    /// documents in this page, `page_size` for all but possibly the last
    pub num_documents: u64,
    pub file_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactIndexHeader {
    pub term_size: u32,
    pub canonicalize: bool,
    pub num_hashes: u32,
    pub page_size: u32,
    pub pages: Vec<CompactPageHeader>,
}

impl CompactIndexHeader {
    /// Bytes per payload row; uniform across pages, the last page pads its
    /// columns up to `page_size` bits.
    pub fn page_stride(&self) -> usize {
        row_stride(self.page_size as usize)
    }

    pub fn num_documents(&self) -> u64 {
        self.pages.iter().map(|p| p.num_documents).sum()
    }

    /// Exact payload length implied by this header.
    pub fn payload_size(&self) -> Result<u64> {
        let stride = self.page_stride() as u64;
        let mut total: u64 = 0;
        for page in &self.pages {
            let page_bytes = page.signature_size.checked_mul(stride);
            total = page_bytes
                .and_then(|b| total.checked_add(b))
                .ok_or_else(|| {
                    Error::OutOfResources(
                        "compact payload exceeds addressable limits".to_string(),
                    )
                })?;
        }
        Ok(total)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut body = Vec::new();
        put_u32(&mut body, self.term_size);
        put_u8(&mut body, self.canonicalize as u8);
        put_u32(&mut body, self.num_hashes);
        put_u32(&mut body, self.page_size);
        put_u32(&mut body, self.pages.len() as u32);
        for page in &self.pages {
            debug_assert_eq!(page.file_names.len() as u64, page.num_documents);
            put_u64(&mut body, page.signature_size);
            put_u64(&mut body, page.num_documents);
            put_u32(&mut body, page.file_names.len() as u32);
            for name in &page.file_names {
                put_name(&mut body, name);
            }
        }
        write_framed(w, &COMPACT_MAGIC, &body)?;
        Ok(())
    }

    fn parse_body(body: &[u8], origin: &str) -> Result<Self> {
        let mut r = ByteReader::new(body, origin);
        let term_size = r.u32("term size")?;
        let canonicalize = r.u8("canonicalize flag")? != 0;
        let num_hashes = r.u32("hash count")?;
        let page_size = r.u32("page size")?;
        let page_count = r.u32("page count")?;
        if page_size == 0 {
            return Err(Error::Format(format!("{}: zero page size", origin)));
        }
        if term_size == 0 || num_hashes == 0 {
            return Err(Error::Format(format!(
                "{}: term size and hash count must be nonzero",
                origin
            )));
        }
        let mut pages = Vec::with_capacity(page_count as usize);
        for p in 0..page_count {
            let signature_size = r.u64("page signature size")?;
            let num_documents = r.u64("page document count")?;
            let name_count = r.u32("page name count")?;
            if signature_size == 0 {
                return Err(Error::Format(format!(
                    "{}: page {} has zero signature size",
                    origin, p
                )));
            }
            if name_count as u64 != num_documents {
                return Err(Error::Format(format!(
                    "{}: page {} name count {} disagrees with document count {}",
                    origin, p, name_count, num_documents
                )));
            }
            if num_documents == 0 || num_documents > page_size as u64 {
                return Err(Error::Format(format!(
                    "{}: page {} holds {} documents, page size is {}",
                    origin, p, num_documents, page_size
                )));
            }
            if p + 1 < page_count && num_documents != page_size as u64 {
                return Err(Error::Format(format!(
                    "{}: page {} is short but not the last page",
                    origin, p
                )));
            }
            let mut file_names = Vec::with_capacity(name_count as usize);
            for _ in 0..name_count {
                file_names.push(r.name()?);
            }
            pages.push(CompactPageHeader {
                signature_size,
                num_documents,
                file_names,
            });
        }
        r.finish()?;
        Ok(Self {
            term_size,
            canonicalize,
            num_hashes,
            page_size,
            pages,
        })
    }

    /// Parse from the start of a mapped file; returns the header and the
    /// payload offset.
    pub fn parse(data: &[u8], origin: &str) -> Result<(Self, usize)> {
        let (body, payload_off) = read_framed(data, &COMPACT_MAGIC, origin)?;
        Ok((Self::parse_body(body, origin)?, payload_off))
    }

    /// Read only the header of `path`; returns the header and the payload
    /// offset.
    pub fn read_file(path: &Path) -> Result<(Self, u64)> {
        let (body, payload_off) = read_framed_file(path, &COMPACT_MAGIC)?;
        let origin = path.display().to_string();
        Ok((Self::parse_body(&body, &origin)?, payload_off))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompactIndexHeader {
        CompactIndexHeader {
            term_size: 31,
            canonicalize: false,
            num_hashes: 1,
            page_size: 2,
            pages: vec![
                CompactPageHeader {
                    signature_size: 512,
                    num_documents: 2,
                    file_names: vec!["a".into(), "b".into()],
                },
                CompactPageHeader {
                    signature_size: 1024,
                    num_documents: 1,
                    file_names: vec!["c".into()],
                },
            ],
        }
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let header = sample();
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        let (parsed, payload_off) = CompactIndexHeader::parse(&bytes, "test").unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload_off, bytes.len());
        let mut again = Vec::new();
        parsed.write(&mut again).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn short_page_must_be_last() {
        let mut header = sample();
        header.pages.swap(0, 1);
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert!(matches!(
            CompactIndexHeader::parse(&bytes, "test"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn zero_page_signature_size_is_rejected() {
        let mut header = sample();
        header.pages[1].signature_size = 0;
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert!(matches!(
            CompactIndexHeader::parse(&bytes, "test"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn payload_size_sums_pages() {
        let header = sample();
        // stride for page_size 2 is 1 byte
        assert_eq!(header.payload_size().unwrap(), 512 + 1024);
        assert_eq!(header.num_documents(), 3);
    }
}
