//! Query evaluation against a mapped index.
//!
//! For every query k-mer and every page, the `h` hashed rows are AND-ed
//! into a hit mask (a no-op when `h = 1`); set bits are then emitted from
//! 64-bit words into the per-document score vector.

use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};
use crate::kmer::for_each_kmer;
use crate::timer::Timer;
use crate::types::{Score, ScoredDocument};

use super::reader::{IndexFile, PageGeometry};

pub struct IndexSearcher<'a> {
    file: &'a IndexFile,
}

impl<'a> IndexSearcher<'a> {
    pub fn new(file: &'a IndexFile) -> Self {
        Self { file }
    }

    /// Search `query` and return up to `num_results` hits ranked by
    /// (score desc, document index asc). `num_results = 0` returns every
    /// document.
    pub fn search(&self, query: &str, num_results: usize) -> Result<Vec<ScoredDocument>> {
        let mut timer = Timer::new();
        self.search_timed(query, num_results, &mut timer)
    }

    /// Like [`search`](Self::search), accumulating phase timings into
    /// `timer`. Timings are advisory; results are identical.
    pub fn search_timed(
        &self,
        query: &str,
        num_results: usize,
        timer: &mut Timer,
    ) -> Result<Vec<ScoredDocument>> {
        let file = self.file;
        let k = file.term_size() as usize;
        if query.len() < k {
            return Err(Error::InvalidArgument(format!(
                "query of length {} is shorter than the term size {}",
                query.len(),
                k
            )));
        }
        let query = query.to_ascii_uppercase();
        let num_hashes = file.num_hashes() as usize;

        // raw 64-bit hashes per usable k-mer; rows are per-page residues
        timer.start("hashes");
        let mut hashes: Vec<u64> = Vec::with_capacity(
            (query.len() + 1 - k) * num_hashes,
        );
        for_each_kmer(query.as_bytes(), k, file.canonicalize(), |kmer| {
            for seed in 0..num_hashes as u64 {
                hashes.push(xxh64(kmer, seed));
            }
        });

        let mut scores: Vec<Score> = vec![0; file.num_documents()];
        let max_stride = file
            .pages()
            .iter()
            .map(|p| p.row_stride)
            .max()
            .unwrap_or(0);
        let mut mask = vec![0u8; max_stride];
        for kmer_hashes in hashes.chunks_exact(num_hashes) {
            for page in file.pages() {
                timer.start("io");
                let first = file.row(page, kmer_hashes[0] % page.signature_size);
                if num_hashes == 1 {
                    timer.start("add rows");
                    add_rows(first, page, &mut scores);
                    continue;
                }
                mask[..page.row_stride].copy_from_slice(first);
                timer.start("and rows");
                for &hash in &kmer_hashes[1..] {
                    let row = file.row(page, hash % page.signature_size);
                    for (m, r) in mask[..page.row_stride].iter_mut().zip(row) {
                        *m &= r;
                    }
                }
                timer.start("add rows");
                add_rows(&mask[..page.row_stride], page, &mut scores);
            }
        }

        timer.start("sort results");
        let mut ranked: Vec<(Score, u32)> = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, i as u32))
            .collect();
        ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let limit = if num_results == 0 {
            ranked.len()
        } else {
            num_results.min(ranked.len())
        };
        ranked.truncate(limit);
        let results = ranked
            .into_iter()
            .map(|(score, doc)| ScoredDocument {
                score,
                name: file.document_name(doc as usize).to_string(),
            })
            .collect();
        timer.stop();
        Ok(results)
    }
}

/// Emit the set bits of one hit mask into the score vector, 64 documents
/// per word. Padding columns of a short last page are never set, so the
/// bounds check only guards against corrupt payloads.
#[inline]
fn add_rows(mask: &[u8], page: &PageGeometry, scores: &mut [Score]) {
    let mut base = page.doc_begin;
    let mut chunks = mask.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = u64::from_le_bytes(chunk.try_into().unwrap());
        while word != 0 {
            let doc = base + word.trailing_zeros() as usize;
            if let Some(s) = scores.get_mut(doc) {
                *s = s.saturating_add(1);
            }
            word &= word - 1;
        }
        base += 64;
    }
    for &byte in chunks.remainder() {
        let mut byte = byte;
        while byte != 0 {
            let doc = base + byte.trailing_zeros() as usize;
            if let Some(s) = scores.get_mut(doc) {
                *s = s.saturating_add(1);
            }
            byte &= byte - 1;
        }
        base += 8;
    }
}
