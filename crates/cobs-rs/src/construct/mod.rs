//! Index construction pipelines.

mod classic;
mod compact;

pub use classic::{classic_construct, classic_construct_random};
pub use compact::{compact_combine, compact_construct};

use crate::docs::DocumentEntry;
use crate::error::Result;
use crate::hashing::process_hashes;
use crate::kmer::canonicalize_kmer;

/// Name of the final index file inside a construction output directory.
pub const CLASSIC_INDEX_NAME: &str = "index.cobs_classic";
pub const COMPACT_INDEX_NAME: &str = "index.cobs_compact";

/// Hash every k-mer of `doc` into the row buffer column `column`.
///
/// `rows` is `signature_size * row_stride` bytes, row-major. Columns are
/// LSB-first within a byte, so document `c` of a batch lives at byte
/// `c / 8`, bit `c % 8` of each row.
pub(crate) fn fill_document_column(
    doc: &DocumentEntry,
    column: usize,
    term_size: u32,
    canonicalize: bool,
    num_hashes: u32,
    signature_size: u64,
    row_stride: usize,
    rows: &mut [u8],
) -> Result<()> {
    let k = term_size as usize;
    let byte = column / 8;
    let bit = 1u8 << (column % 8);
    let mut scratch = vec![0u8; k];
    doc.process_terms(k, |kmer| {
        let kmer = if canonicalize {
            canonicalize_kmer(kmer, &mut scratch)
        } else {
            kmer
        };
        process_hashes(kmer, signature_size, num_hashes, |row| {
            rows[row as usize * row_stride + byte] |= bit;
        });
    })
}
