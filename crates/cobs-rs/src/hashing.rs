//! Bloom row hashing and signature sizing.

use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};

/// Invoke `callback` with the `num_hashes` row indices of `kmer` inside a
/// signature of `signature_size` bits. The `i`-th hash function is xxh64
/// seeded with `i`, so equal k-mers map to equal rows on every platform.
#[inline]
pub fn process_hashes<F: FnMut(u64)>(
    kmer: &[u8],
    signature_size: u64,
    num_hashes: u32,
    mut callback: F,
) {
    for seed in 0..num_hashes as u64 {
        callback(xxh64(kmer, seed) % signature_size);
    }
}

/// Signature bits required per element for the given hash count and false
/// positive rate.
pub fn calc_signature_size_ratio(num_hashes: u32, false_positive_rate: f64) -> f64 {
    let h = num_hashes as f64;
    -h / (1.0 - false_positive_rate.powf(1.0 / h)).ln()
}

/// Signature size in bits for `num_elements` insertions, rounded up to a
/// multiple of 8 so rows stay byte-aligned.
pub fn calc_signature_size(
    num_elements: u64,
    num_hashes: u32,
    false_positive_rate: f64,
) -> Result<u64> {
    if num_hashes == 0 {
        return Err(Error::InvalidArgument(
            "number of hash functions must be at least 1".to_string(),
        ));
    }
    if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
        return Err(Error::InvalidArgument(format!(
            "false positive rate {} is not in (0, 1)",
            false_positive_rate
        )));
    }
    if num_elements == 0 {
        return Err(Error::InvalidArgument(
            "cannot size a signature for zero elements".to_string(),
        ));
    }
    let ratio = calc_signature_size_ratio(num_hashes, false_positive_rate);
    let bits = (ratio * num_elements as f64).ceil();
    if !bits.is_finite() || bits >= (1u64 << 48) as f64 {
        return Err(Error::OutOfResources(format!(
            "signature of {} bits for {} elements exceeds addressable limits",
            bits, num_elements
        )));
    }
    let bits = bits as u64;
    Ok((bits + 7) / 8 * 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_matches_bloom_relation() {
        // h = 1: m/T = -1 / ln(1 - f)
        let r = calc_signature_size_ratio(1, 0.3);
        assert!((r - 2.8039).abs() < 1e-3, "ratio {}", r);
        // more hashes need more bits at the same rate
        assert!(calc_signature_size_ratio(3, 0.1) > calc_signature_size_ratio(1, 0.3));
    }

    #[test]
    fn signature_size_is_byte_aligned_and_monotonic() {
        let a = calc_signature_size(1000, 1, 0.3).unwrap();
        let b = calc_signature_size(2000, 1, 0.3).unwrap();
        assert_eq!(a % 8, 0);
        assert_eq!(b % 8, 0);
        assert!(b > a);
    }

    #[test]
    fn signature_size_rejects_bad_parameters() {
        assert!(calc_signature_size(0, 1, 0.3).is_err());
        assert!(calc_signature_size(10, 0, 0.3).is_err());
        assert!(calc_signature_size(10, 1, 0.0).is_err());
        assert!(calc_signature_size(10, 1, 1.0).is_err());
    }

    #[test]
    fn hashes_are_deterministic_and_bounded() {
        let mut first = Vec::new();
        let mut second = Vec::new();
        process_hashes(b"ACGTACGTACGTACGTACGTACGTACGTACG", 1024, 4, |r| first.push(r));
        process_hashes(b"ACGTACGTACGTACGTACGTACGTACGTACG", 1024, 4, |r| second.push(r));
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|&r| r < 1024));
    }
}
