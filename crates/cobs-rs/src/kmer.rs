//! DNA k-mer handling: canonicalization, window iteration, random sequences.
//!
//! A k-mer window is only usable when every byte is one of `ACGT`; windows
//! touching any other byte are skipped, both during construction and at
//! query time, so an index and its queries always agree.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Watson-Crick complement per byte: `A<->T`, `C<->G`, everything else 0.
pub const BASEPAIR_MAP: [u8; 256] = basepair_map();

const fn basepair_map() -> [u8; 256] {
    let mut map = [0u8; 256];
    map[b'A' as usize] = b'T';
    map[b'C' as usize] = b'G';
    map[b'G' as usize] = b'C';
    map[b'T' as usize] = b'A';
    map
}

/// True when every byte of `kmer` is one of `ACGT`.
#[inline]
pub fn is_valid_kmer(kmer: &[u8]) -> bool {
    kmer.iter().all(|&b| BASEPAIR_MAP[b as usize] != 0)
}

/// Write the reverse complement of `kmer` into `out`.
///
/// `out` must be at least `kmer.len()` bytes; `kmer` must be valid.
#[inline]
pub fn reverse_complement(kmer: &[u8], out: &mut [u8]) {
    for (o, &b) in out[..kmer.len()].iter_mut().zip(kmer.iter().rev()) {
        *o = BASEPAIR_MAP[b as usize];
    }
}

/// Return the lexicographically smaller of `kmer` and its reverse
/// complement. The reverse complement is materialized in `scratch`; the
/// returned slice borrows either the input or the scratch buffer. A k-mer
/// equal to its reverse complement yields the forward form.
#[inline]
pub fn canonicalize_kmer<'a>(kmer: &'a [u8], scratch: &'a mut [u8]) -> &'a [u8] {
    let scratch = &mut scratch[..kmer.len()];
    reverse_complement(kmer, scratch);
    if kmer <= &scratch[..] {
        kmer
    } else {
        scratch
    }
}

/// Invoke `sink` once per usable k-mer window of `seq`, in sequence order.
/// With `canonicalize` the canonical form is passed instead of the window.
pub fn for_each_kmer<F: FnMut(&[u8])>(seq: &[u8], k: usize, canonicalize: bool, mut sink: F) {
    if k == 0 || seq.len() < k {
        return;
    }
    let mut scratch = vec![0u8; k];
    // position of the most recent non-ACGT byte; a window starting after it
    // is clean
    let mut last_bad: Option<usize> = None;
    for j in 0..seq.len() {
        if BASEPAIR_MAP[seq[j] as usize] == 0 {
            last_bad = Some(j);
        }
        if j + 1 < k {
            continue;
        }
        let i = j + 1 - k;
        if last_bad.map_or(false, |bad| bad >= i) {
            continue;
        }
        let kmer = &seq[i..=j];
        if canonicalize {
            sink(canonicalize_kmer(kmer, &mut scratch));
        } else {
            sink(kmer);
        }
    }
}

const ALPHABET: &[u8; 4] = b"ACGT";

/// Random DNA sequence of `len` bases drawn from a caller-provided rng.
pub fn random_sequence_rng<R: Rng>(len: usize, rng: &mut R) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Random DNA sequence of `len` bases from a fixed seed.
pub fn random_sequence(len: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    random_sequence_rng(len, &mut rng)
}

/// Reverse complement of a whole sequence, for canonical-equivalence checks.
pub fn reverse_complement_sequence(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|b| BASEPAIR_MAP[b as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_complement_pairs() {
        let mut out = [0u8; 4];
        reverse_complement(b"ACGT", &mut out);
        assert_eq!(&out, b"ACGT");
        reverse_complement(b"AAAA", &mut out);
        assert_eq!(&out, b"TTTT");
        reverse_complement(b"ACCA", &mut out);
        assert_eq!(&out, b"TGGT");
    }

    #[test]
    fn canonical_prefers_smaller_form() {
        let mut scratch = [0u8; 8];
        // revcomp of TTTT is AAAA, which sorts first
        assert_eq!(canonicalize_kmer(b"TTTT", &mut scratch), b"AAAA");
        assert_eq!(canonicalize_kmer(b"AAAA", &mut scratch), b"AAAA");
        // a palindromic k-mer keeps the forward form
        assert_eq!(canonicalize_kmer(b"ACGT", &mut scratch), b"ACGT");
    }

    #[test]
    fn windows_skip_non_acgt() {
        let mut seen = Vec::new();
        for_each_kmer(b"ACGTNACGTA", 3, false, |kmer| {
            seen.push(String::from_utf8(kmer.to_vec()).unwrap())
        });
        // windows overlapping the N at position 4 are dropped
        assert_eq!(seen, vec!["ACG", "CGT", "ACG", "CGT", "GTA"]);
    }

    #[test]
    fn windows_empty_for_short_input() {
        let mut count = 0;
        for_each_kmer(b"AC", 3, false, |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn canonical_windows_match_reverse_complement() {
        let seq = random_sequence(200, 42);
        let rc = reverse_complement_sequence(&seq);
        let mut fwd = Vec::new();
        let mut rev = Vec::new();
        for_each_kmer(seq.as_bytes(), 31, true, |k| fwd.push(k.to_vec()));
        for_each_kmer(rc.as_bytes(), 31, true, |k| rev.push(k.to_vec()));
        rev.reverse();
        assert_eq!(fwd, rev);
    }

    #[test]
    fn random_sequence_is_deterministic() {
        let a = random_sequence(64, 7);
        let b = random_sequence(64, 7);
        assert_eq!(a, b);
        assert!(a.bytes().all(|c| matches!(c, b'A' | b'C' | b'G' | b'T')));
    }
}
