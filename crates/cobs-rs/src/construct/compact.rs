//! Compact index construction: size-sorted pages of documents, one classic
//! sub-index per page, concatenated into a single mmap-friendly file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::docs::{DocumentList, FileType};
use crate::error::{Error, Result};
use crate::fmt::{
    row_stride, ClassicIndexHeader, CompactIndexHeader, CompactPageHeader,
    CLASSIC_FILE_EXTENSION,
};
use crate::types::CompactIndexParameters;

use super::{classic_construct, CLASSIC_INDEX_NAME, COMPACT_INDEX_NAME};

/// Build a compact index over the documents under `in_dir`, returning the
/// path of the index file.
///
/// Documents are sorted by term count ascending and split into pages of
/// `page_size` documents, so each page's signature size tracks that page's
/// worst case instead of the global one.
pub fn compact_construct(
    in_dir: &Path,
    out_dir: &Path,
    params: &CompactIndexParameters,
) -> Result<PathBuf> {
    construct(in_dir, out_dir, params).map_err(|e| {
        fs::remove_file(out_dir.join(COMPACT_INDEX_NAME)).ok();
        if !(params.continue_ || params.keep_temporary) {
            fs::remove_dir_all(out_dir.join("pages")).ok();
        }
        e
    })
}

fn construct(
    in_dir: &Path,
    out_dir: &Path,
    params: &CompactIndexParameters,
) -> Result<PathBuf> {
    let list = DocumentList::scan(in_dir, FileType::Any)?;
    if list.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "no documents found under {}",
            in_dir.display()
        )));
    }
    let mut docs = list.into_docs();
    let k = params.term_size as usize;
    docs.sort_by(|a, b| {
        a.num_terms(k)
            .cmp(&b.num_terms(k))
            .then_with(|| a.path.cmp(&b.path))
    });

    let page_size = if params.page_size > 0 {
        params.page_size
    } else {
        (docs.len() as f64).sqrt().ceil() as usize
    };
    log::info!(
        "compact construct: {} documents in pages of {}",
        docs.len(),
        page_size
    );

    let pages_dir = out_dir.join("pages");
    let classic_params = params.classic();
    let mut page_index_paths = Vec::new();
    for (number, page_docs) in docs.chunks(page_size).enumerate() {
        let page_dir = pages_dir.join(format!("page_{:04}", number));
        let index_path = page_dir.join(CLASSIC_INDEX_NAME);
        if params.continue_ && page_is_complete(&index_path) {
            log::info!("reusing page index {}", index_path.display());
        } else {
            classic_construct(page_docs, &page_dir, &classic_params)?;
        }
        page_index_paths.push(index_path);
    }

    let out_path = out_dir.join(COMPACT_INDEX_NAME);
    combine_pages(&page_index_paths, &out_path, page_size as u32)?;

    if !params.keep_temporary {
        fs::remove_dir_all(&pages_dir)
            .map_err(|e| Error::Io(format!("{}: {}", pages_dir.display(), e)))?;
    }
    Ok(out_path)
}

/// A page index from an earlier run counts as complete when its header
/// parses and its payload length matches the header.
fn page_is_complete(path: &Path) -> bool {
    let Ok((header, payload_off)) = ClassicIndexHeader::read_file(path) else {
        return false;
    };
    let Ok(payload) = header.payload_size() else {
        return false;
    };
    fs::metadata(path).map(|m| m.len()).ok() == Some(payload_off + payload)
}

/// Combine the classic index files under `in_dir` (one per page, in path
/// order) into a compact index at `out_file`.
pub fn compact_combine(in_dir: &Path, out_file: &Path, page_size: u32) -> Result<PathBuf> {
    let mut paths = Vec::new();
    let mut stack = vec![in_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries =
            fs::read_dir(&dir).map_err(|e| Error::Io(format!("{}: {}", dir.display(), e)))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::Io(format!("{}: {}", dir.display(), e)))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .is_some_and(|e| e == CLASSIC_FILE_EXTENSION)
            {
                paths.push(path);
            }
        }
    }
    paths.sort();
    if paths.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "no classic index files under {}",
            in_dir.display()
        )));
    }
    combine_pages(&paths, out_file, page_size)?;
    Ok(out_file.to_path_buf())
}

/// Write the compact file: a directory of per-page headers followed by the
/// page payloads, every row padded to `ceil(page_size / 8)` bytes so the
/// column arithmetic stays uniform across pages.
fn combine_pages(page_paths: &[PathBuf], out_file: &Path, page_size: u32) -> Result<()> {
    if page_paths.is_empty() {
        return Err(Error::InvalidArgument(
            "no pages to combine".to_string(),
        ));
    }
    let mut pages = Vec::with_capacity(page_paths.len());
    let mut readers = Vec::with_capacity(page_paths.len());
    let mut common: Option<(u32, bool, u32)> = None;
    for (number, path) in page_paths.iter().enumerate() {
        let (header, payload_off) = ClassicIndexHeader::read_file(path)?;
        let this = (header.term_size, header.canonicalize, header.num_hashes);
        if *common.get_or_insert(this) != this {
            return Err(Error::Format(format!(
                "{}: page parameters disagree with the first page",
                path.display()
            )));
        }
        if header.num_documents > page_size as u64 {
            return Err(Error::InvalidArgument(format!(
                "{}: page holds {} documents, page size is {}",
                path.display(),
                header.num_documents,
                page_size
            )));
        }
        if number + 1 < page_paths.len() && header.num_documents != page_size as u64 {
            return Err(Error::InvalidArgument(format!(
                "{}: only the last page may hold fewer than {} documents",
                path.display(),
                page_size
            )));
        }
        let expected = payload_off + header.payload_size()?;
        let actual = fs::metadata(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?
            .len();
        if actual != expected {
            return Err(Error::Format(format!(
                "{}: payload length {} disagrees with header ({} expected)",
                path.display(),
                actual,
                expected
            )));
        }
        let mut file =
            File::open(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        file.seek(SeekFrom::Start(payload_off))
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        readers.push((BufReader::new(file), header.row_stride(), path));
        pages.push(CompactPageHeader {
            signature_size: header.signature_size,
            num_documents: header.num_documents,
            file_names: header.file_names,
        });
    }
    let (term_size, canonicalize, num_hashes) = common.unwrap();

    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Io(format!("{}: {}", parent.display(), e)))?;
    }
    let file =
        File::create(out_file).map_err(|e| Error::Io(format!("{}: {}", out_file.display(), e)))?;
    let mut w = BufWriter::new(file);
    let header = CompactIndexHeader {
        term_size,
        canonicalize,
        num_hashes,
        page_size,
        pages,
    };
    header.write(&mut w)?;

    let page_stride = row_stride(page_size as usize);
    let mut row = vec![0u8; page_stride];
    for (page, (reader, stride, path)) in header.pages.iter().zip(readers.iter_mut()) {
        row.fill(0);
        for _ in 0..page.signature_size {
            reader
                .read_exact(&mut row[..*stride])
                .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
            w.write_all(&row[..page_stride])
                .map_err(|e| Error::Io(format!("{}: {}", out_file.display(), e)))?;
        }
    }
    w.flush()
        .map_err(|e| Error::Io(format!("{}: {}", out_file.display(), e)))?;
    log::info!(
        "combined {} pages into {}",
        header.pages.len(),
        out_file.display()
    );
    Ok(())
}
