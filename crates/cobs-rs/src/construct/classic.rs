//! Classic index construction: batched external-memory Bloom matrix build
//! followed by a streaming row-wise merge.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::docs::DocumentEntry;
use crate::error::{Error, Result};
use crate::fmt::{row_stride, ClassicIndexHeader};
use crate::hashing::{calc_signature_size, process_hashes};
use crate::kmer::random_sequence_rng;
use crate::types::ClassicIndexParameters;

use super::{fill_document_column, CLASSIC_INDEX_NAME};

/// Build a classic index over `docs` under `out_dir`, returning the path of
/// the index file. Document order is the column order.
///
/// Any I/O failure aborts the run; the partial index file is removed, and
/// batch temporaries are removed too unless `continue_` or `keep_temporary`
/// asks for them (an operator reruns with `continue_` to reuse them).
pub fn classic_construct(
    docs: &[DocumentEntry],
    out_dir: &Path,
    params: &ClassicIndexParameters,
) -> Result<PathBuf> {
    construct(docs, out_dir, params).map_err(|e| {
        fs::remove_file(out_dir.join(CLASSIC_INDEX_NAME)).ok();
        if !(params.continue_ || params.keep_temporary) {
            fs::remove_dir_all(out_dir.join("batches")).ok();
        }
        e
    })
}

fn construct(
    docs: &[DocumentEntry],
    out_dir: &Path,
    params: &ClassicIndexParameters,
) -> Result<PathBuf> {
    if docs.is_empty() {
        return Err(Error::InvalidArgument(
            "document list is empty, nothing to construct".to_string(),
        ));
    }
    let start = Instant::now();
    let k = params.term_size as usize;
    let max_terms = docs.iter().map(|d| d.num_terms(k)).max().unwrap_or(0);
    if max_terms == 0 {
        return Err(Error::InvalidArgument(format!(
            "no document yields a single {}-mer",
            k
        )));
    }
    let signature_size = calc_signature_size(
        max_terms as u64,
        params.num_hashes,
        params.false_positive_rate,
    )?;
    let batch_capacity = batch_capacity(params.mem_bytes, signature_size)?;
    log::info!(
        "classic construct: {} documents, m = {} bits, {} documents per batch",
        docs.len(),
        signature_size,
        batch_capacity
    );

    fs::create_dir_all(out_dir).map_err(|e| Error::Io(format!("{}: {}", out_dir.display(), e)))?;
    let batch_dir = out_dir.join("batches");
    fs::create_dir_all(&batch_dir)
        .map_err(|e| Error::Io(format!("{}: {}", batch_dir.display(), e)))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.num_threads)
        .build()
        .map_err(|e| Error::Io(format!("could not build worker pool: {}", e)))?;

    let mut batch_paths = Vec::new();
    for (number, batch) in docs.chunks(batch_capacity).enumerate() {
        let path = batch_dir.join(format!("batch_{:04}.cobs_classic", number));
        if params.continue_ && batch_is_reusable(&path, signature_size, batch, params) {
            log::info!("reusing batch file {}", path.display());
        } else {
            let rows = pool.install(|| build_batch_rows(batch, signature_size, params))?;
            write_batch(&path, signature_size, batch, params, &rows)?;
            log::debug!(
                "wrote batch {} ({} documents) to {}",
                number,
                batch.len(),
                path.display()
            );
        }
        batch_paths.push(path);
    }

    let index_path = out_dir.join(CLASSIC_INDEX_NAME);
    merge_batches(&batch_paths, &index_path, signature_size, docs, params)?;

    if !params.keep_temporary {
        fs::remove_dir_all(&batch_dir)
            .map_err(|e| Error::Io(format!("{}: {}", batch_dir.display(), e)))?;
    }
    log::info!(
        "classic construct finished in {:.3}s: {}",
        start.elapsed().as_secs_f64(),
        index_path.display()
    );
    Ok(index_path)
}

/// Documents per batch under the RAM bound, rounded down to a multiple of 8
/// so the merge stays a byte-level concatenation.
fn batch_capacity(mem_bytes: u64, signature_size: u64) -> Result<usize> {
    let raw = (mem_bytes.saturating_mul(8) / signature_size) / 8 * 8;
    if raw == 0 {
        return Err(Error::OutOfResources(format!(
            "memory bound of {} bytes fits no batch of {}-bit signatures",
            mem_bytes, signature_size
        )));
    }
    Ok(raw.min(u32::MAX as u64) as usize)
}

/// Fill the batch row buffer, one private buffer per worker OR-merged at
/// the end, so the hot loop takes no locks.
fn build_batch_rows(
    batch: &[DocumentEntry],
    signature_size: u64,
    params: &ClassicIndexParameters,
) -> Result<Vec<u8>> {
    let stride = row_stride(batch.len());
    let len = signature_size as usize * stride;
    batch
        .par_iter()
        .enumerate()
        .try_fold(
            || vec![0u8; len],
            |mut rows, (column, doc)| -> Result<Vec<u8>> {
                fill_document_column(
                    doc,
                    column,
                    params.term_size,
                    params.canonicalize,
                    params.num_hashes,
                    signature_size,
                    stride,
                    &mut rows,
                )?;
                Ok(rows)
            },
        )
        .try_reduce(
            || vec![0u8; len],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x |= y;
                }
                Ok(a)
            },
        )
}

fn batch_header(
    signature_size: u64,
    batch: &[DocumentEntry],
    params: &ClassicIndexParameters,
) -> ClassicIndexHeader {
    ClassicIndexHeader {
        term_size: params.term_size,
        canonicalize: params.canonicalize,
        num_hashes: params.num_hashes,
        signature_size,
        num_documents: batch.len() as u64,
        file_names: batch.iter().map(|d| d.name.clone()).collect(),
    }
}

fn write_batch(
    path: &Path,
    signature_size: u64,
    batch: &[DocumentEntry],
    params: &ClassicIndexParameters,
    rows: &[u8],
) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    let mut w = BufWriter::new(file);
    batch_header(signature_size, batch, params).write(&mut w)?;
    w.write_all(rows)
        .and_then(|_| w.flush())
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// A batch temporary from an earlier run is reused only when its header and
/// length agree exactly with what this run would produce.
fn batch_is_reusable(
    path: &Path,
    signature_size: u64,
    batch: &[DocumentEntry],
    params: &ClassicIndexParameters,
) -> bool {
    let Ok((header, payload_off)) = ClassicIndexHeader::read_file(path) else {
        return false;
    };
    if header != batch_header(signature_size, batch, params) {
        return false;
    }
    let expected = match header.payload_size() {
        Ok(size) => payload_off + size,
        Err(_) => return false,
    };
    fs::metadata(path).map(|m| m.len()).ok() == Some(expected)
}

/// Concatenate batch matrices column-wise into the final index: for each
/// row index, the row bytes of every batch are appended in batch order.
/// Streams with `O(batches * row_stride)` memory.
fn merge_batches(
    batch_paths: &[PathBuf],
    out_path: &Path,
    signature_size: u64,
    docs: &[DocumentEntry],
    params: &ClassicIndexParameters,
) -> Result<()> {
    let mut readers = Vec::with_capacity(batch_paths.len());
    for path in batch_paths {
        let (header, payload_off) = ClassicIndexHeader::read_file(path)?;
        if header.signature_size != signature_size {
            return Err(Error::Format(format!(
                "{}: batch signature size {} does not match {}",
                path.display(),
                header.signature_size,
                signature_size
            )));
        }
        let mut file =
            File::open(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        file.seek(SeekFrom::Start(payload_off))
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        let stride = header.row_stride();
        readers.push((BufReader::new(file), stride, path));
    }

    let file =
        File::create(out_path).map_err(|e| Error::Io(format!("{}: {}", out_path.display(), e)))?;
    let mut w = BufWriter::new(file);
    let header = ClassicIndexHeader {
        term_size: params.term_size,
        canonicalize: params.canonicalize,
        num_hashes: params.num_hashes,
        signature_size,
        num_documents: docs.len() as u64,
        file_names: docs.iter().map(|d| d.name.clone()).collect(),
    };
    header.write(&mut w)?;

    let mut row = vec![0u8; readers.iter().map(|(_, stride, _)| stride).max().copied().unwrap_or(0)];
    for _ in 0..signature_size {
        for (reader, stride, path) in readers.iter_mut() {
            reader
                .read_exact(&mut row[..*stride])
                .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
            w.write_all(&row[..*stride])
                .map_err(|e| Error::Io(format!("{}: {}", out_path.display(), e)))?;
        }
    }
    w.flush()
        .map_err(|e| Error::Io(format!("{}: {}", out_path.display(), e)))?;
    Ok(())
}

/// Build a classic index of synthetic documents, each `document_size`
/// random 31-mers, directly in memory. Benchmark corpus generator.
pub fn classic_construct_random(
    out_file: &Path,
    signature_size: u64,
    num_documents: u32,
    document_size: u32,
    num_hashes: u32,
    seed: u64,
) -> Result<()> {
    use rand::{rngs::StdRng, SeedableRng};

    if signature_size == 0 || num_documents == 0 {
        return Err(Error::InvalidArgument(
            "random index needs a signature size and at least one document".to_string(),
        ));
    }
    let stride = row_stride(num_documents as usize);
    let len = signature_size
        .checked_mul(stride as u64)
        .filter(|&l| l < (1 << 40))
        .ok_or_else(|| {
            Error::OutOfResources(format!(
                "random index of {} rows x {} bytes exceeds addressable limits",
                signature_size, stride
            ))
        })? as usize;
    let mut rows = vec![0u8; len];
    let mut rng = StdRng::seed_from_u64(seed);
    for column in 0..num_documents as usize {
        let byte = column / 8;
        let bit = 1u8 << (column % 8);
        for _ in 0..document_size {
            let kmer = random_sequence_rng(31, &mut rng);
            process_hashes(kmer.as_bytes(), signature_size, num_hashes, |row| {
                rows[row as usize * stride + byte] |= bit;
            });
        }
    }

    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Io(format!("{}: {}", parent.display(), e)))?;
    }
    let file =
        File::create(out_file).map_err(|e| Error::Io(format!("{}: {}", out_file.display(), e)))?;
    let mut w = BufWriter::new(file);
    ClassicIndexHeader {
        term_size: 31,
        canonicalize: false,
        num_hashes,
        signature_size,
        num_documents: num_documents as u64,
        file_names: (0..num_documents)
            .map(|i| format!("random_{:06}", i))
            .collect(),
    }
    .write(&mut w)?;
    w.write_all(&rows)
        .and_then(|_| w.flush())
        .map_err(|e| Error::Io(format!("{}: {}", out_file.display(), e)))?;
    log::info!(
        "random classic index: {} documents x {} terms, m = {} bits",
        num_documents,
        document_size,
        signature_size
    );
    Ok(())
}
