// Copyright (c) 2026 NoiseFS contributors
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! The OFFSystem 3-tuple XOR operator.

use super::{Block, BlockError};

/// Bytewise XOR of exactly three equally-sized blocks: `a XOR b XOR c`.
///
/// Associative and commutative in all three operands, which is what makes
/// the anonymization round-trip law hold regardless of argument order:
/// `xor3(xor3(o, r1, r2), r1, r2) == o`.
pub fn xor3(a: &Block, b: &Block, c: &Block) -> Result<Block, BlockError> {
    let (a, b, c) = (a.as_bytes(), b.as_bytes(), c.as_bytes());
    if a.len() != b.len() || b.len() != c.len() {
        return Err(BlockError::MismatchedBlockSize);
    }
    let mut out = vec![0u8; a.len()];
    for i in 0..a.len() {
        out[i] = a[i] ^ b[i] ^ c[i];
    }
    Ok(Block::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_law() {
        let o = Block::new(b"TOP SECRET file contents......!".to_vec());
        let r1 = Block::new(vec![0xAA; o.len()]);
        let r2 = Block::new(vec![0x55; o.len()]);

        let anonymized = xor3(&o, &r1, &r2).unwrap();
        let recovered = xor3(&anonymized, &r1, &r2).unwrap();
        assert_eq!(recovered, o);
    }

    #[test]
    fn commutative_and_associative() {
        let a = Block::new(vec![1, 2, 3, 4]);
        let b = Block::new(vec![5, 6, 7, 8]);
        let c = Block::new(vec![9, 10, 11, 12]);

        let abc = xor3(&a, &b, &c).unwrap();
        let cab = xor3(&c, &a, &b).unwrap();
        let bca = xor3(&b, &c, &a).unwrap();
        assert_eq!(abc, cab);
        assert_eq!(abc, bca);
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let a = Block::new(vec![0; 4]);
        let b = Block::new(vec![0; 5]);
        let c = Block::new(vec![0; 4]);
        assert_eq!(xor3(&a, &b, &c).unwrap_err(), BlockError::MismatchedBlockSize);
    }

    #[test]
    fn anonymized_block_hides_plaintext_substring() {
        let o = Block::new(b"...TOP SECRET...................".to_vec());
        let r1 = Block::new(vec![0x13; o.len()]);
        let r2 = Block::new(vec![0x37; o.len()]);
        let anonymized = xor3(&o, &r1, &r2).unwrap();
        let hay = anonymized.as_bytes();
        assert!(!hay.windows(10).any(|w| w == b"TOP SECRET"));
    }
}
