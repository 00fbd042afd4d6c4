//! Read-only view of a constructed index: one memory mapping plus the page
//! geometry derived from the header.

use std::fs::File;
use std::path::Path;

use memmap2::{Advice, Mmap};

use crate::error::{Error, Result};
use crate::fmt::{
    identify_bytes, row_stride, ClassicIndexHeader, CompactIndexHeader, IndexVariant,
};

/// Geometry of one signature sub-matrix within the payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageGeometry {
    /// payload-relative byte offset of the page's row 0
    pub offset: usize,
    /// signature size in bits (= rows)
    pub signature_size: u64,
    /// bytes per row
    pub row_stride: usize,
    /// global index of the page's first document
    pub doc_begin: usize,
}

/// Names are kept as spans into one blob until a result actually needs
/// them; large corpora carry many names.
#[derive(Debug)]
struct NameTable {
    blob: String,
    spans: Vec<(u32, u32)>,
}

impl NameTable {
    fn from_names<I: IntoIterator<Item = String>>(names: I) -> Self {
        let mut blob = String::new();
        let mut spans = Vec::new();
        for name in names {
            spans.push((blob.len() as u32, name.len() as u32));
            blob.push_str(&name);
        }
        Self { blob, spans }
    }

    fn get(&self, i: usize) -> &str {
        let (off, len) = self.spans[i];
        &self.blob[off as usize..(off + len) as usize]
    }
}

/// An index file opened for querying. The mapping is owned exclusively by
/// this value and released on drop; concurrent queries may share one
/// `IndexFile` because the mapping is read-only.
#[derive(Debug)]
pub struct IndexFile {
    mmap: Mmap,
    payload_off: usize,
    term_size: u32,
    canonicalize: bool,
    num_hashes: u32,
    pages: Vec<PageGeometry>,
    num_documents: usize,
    names: NameTable,
}

impl IndexFile {
    /// Memory-map `path` read-only, advise random access, and parse the
    /// header of whichever variant its magic announces.
    pub fn open(path: &Path) -> Result<IndexFile> {
        let file = File::open(path)
            .map_err(|e| Error::Io(format!("could not open index file {}: {}", path.display(), e)))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::Io(format!("could not mmap {}: {}", path.display(), e)))?;
        if let Err(e) = mmap.advise(Advice::Random) {
            log::warn!("madvise(random) failed for {}: {}", path.display(), e);
        }
        let origin = path.display().to_string();
        match identify_bytes(&mmap) {
            Some(IndexVariant::Classic) => Self::open_classic(mmap, &origin),
            Some(IndexVariant::Compact) => Self::open_compact(mmap, &origin),
            None => Err(Error::Format(format!(
                "{}: not an index file (bad magic)",
                origin
            ))),
        }
    }

    fn open_classic(mmap: Mmap, origin: &str) -> Result<IndexFile> {
        let (header, payload_off) = ClassicIndexHeader::parse(&mmap, origin)?;
        let payload = header.payload_size()?;
        check_payload(mmap.len(), payload_off, payload, origin)?;
        let pages = vec![PageGeometry {
            offset: 0,
            signature_size: header.signature_size,
            row_stride: header.row_stride(),
            doc_begin: 0,
        }];
        Ok(IndexFile {
            mmap,
            payload_off,
            term_size: header.term_size,
            canonicalize: header.canonicalize,
            num_hashes: header.num_hashes,
            pages,
            num_documents: header.num_documents as usize,
            names: NameTable::from_names(header.file_names),
        })
    }

    fn open_compact(mmap: Mmap, origin: &str) -> Result<IndexFile> {
        let (header, payload_off) = CompactIndexHeader::parse(&mmap, origin)?;
        let payload = header.payload_size()?;
        check_payload(mmap.len(), payload_off, payload, origin)?;
        let stride = row_stride(header.page_size as usize);
        let mut pages = Vec::with_capacity(header.pages.len());
        let mut offset = 0usize;
        let mut doc_begin = 0usize;
        let mut names = Vec::new();
        for page in &header.pages {
            pages.push(PageGeometry {
                offset,
                signature_size: page.signature_size,
                row_stride: stride,
                doc_begin,
            });
            offset += page.signature_size as usize * stride;
            // columns of every page span the full page size; only the last
            // page's tail columns are unused
            doc_begin += header.page_size as usize;
        }
        let num_documents = header.num_documents() as usize;
        for page in header.pages {
            names.extend(page.file_names);
        }
        Ok(IndexFile {
            mmap,
            payload_off,
            term_size: header.term_size,
            canonicalize: header.canonicalize,
            num_hashes: header.num_hashes,
            pages,
            num_documents,
            names: NameTable::from_names(names),
        })
    }

    pub fn term_size(&self) -> u32 {
        self.term_size
    }

    pub fn canonicalize(&self) -> bool {
        self.canonicalize
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn num_documents(&self) -> usize {
        self.num_documents
    }

    pub fn document_name(&self, i: usize) -> &str {
        self.names.get(i)
    }

    pub(crate) fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    /// Bytes of one signature row.
    #[inline]
    pub(crate) fn row(&self, page: &PageGeometry, row: u64) -> &[u8] {
        let start = self.payload_off + page.offset + row as usize * page.row_stride;
        &self.mmap[start..start + page.row_stride]
    }
}

fn check_payload(file_len: usize, payload_off: usize, payload: u64, origin: &str) -> Result<()> {
    let expected = payload_off as u64 + payload;
    if file_len as u64 != expected {
        return Err(Error::Format(format!(
            "{}: file length {} disagrees with header ({} expected)",
            origin, file_len, expected
        )));
    }
    Ok(())
}
