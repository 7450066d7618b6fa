use geocoin_common::Cell;
use sha2::{Digest, Sha256};

/// Map a string key to a reproducible number in `[0, 1)`.
///
/// The first 8 bytes of the SHA-256 digest are read big-endian and the top
/// 53 bits become the mantissa, so every output is exactly representable and
/// identical on every platform and across process restarts.
pub fn luck(key: &str) -> f64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) >> 11) as f64 / (1u64 << 53) as f64
}

/// Luck of a cell, keyed by its canonical `"i,j"` string.
pub fn cell_luck(cell: Cell) -> f64 {
    luck(&cell.key())
}
