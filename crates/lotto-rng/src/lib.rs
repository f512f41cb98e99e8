//! Provably-fair RNG (spec §4.2). Three pure primitives plus one
//! I/O-bound step that talks to the `Chain` port for the client seed.
//!
//! The hash-chain algorithm is the off-chain analogue of the teacher's
//! on-chain `generate_quick_pick_winning_numbers`: both reject biased
//! draws and duplicate picks from a running SHA-256 stream rather than
//! falling back to a predictable default, because a predictable
//! fallback would be exploitable by anyone who could force the
//! low-probability branch.

use lotto_chain::Chain;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RngError {
    #[error("transient chain failure obtaining client seed: {0}")]
    TransientClientSeed(String),
    #[error("permanent chain failure obtaining client seed: {0}")]
    PermanentClientSeed(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// 32 bytes of cryptographic randomness, hex-encoded.
pub fn generate_server_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256(seed) as lowercase hex.
pub fn hash_server_seed(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(digest)
}

/// Obtains `(clientSeed, blockNumber)` from the Chain port: the client
/// seed is the hex hash of a recent block, establishing a value neither
/// party controlled at commit time.
pub async fn get_client_seed(chain: &dyn Chain) -> Result<(String, u64), RngError> {
    let block = chain.latest_block().await.map_err(|e| {
        if e.is_retryable() {
            RngError::TransientClientSeed(e.to_string())
        } else {
            RngError::PermanentClientSeed(e.to_string())
        }
    })?;
    Ok((hex::encode(block.hash), block.number))
}

/// Streams 32-bit words out of a SHA-256 hash chain seeded by
/// `h0 = SHA256(server_seed || client_seed || nonce)`, rehashing
/// (`h_{i+1} = SHA256(h_i)`) whenever the current digest is exhausted.
struct HashChain {
    current: [u8; 32],
    cursor: usize,
}

impl HashChain {
    fn new(server_seed: &str, client_seed: &str, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(server_seed.as_bytes());
        hasher.update(client_seed.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        let current: [u8; 32] = hasher.finalize().into();
        HashChain { current, cursor: 0 }
    }

    /// Next raw 32-bit word, rehashing the chain as needed.
    fn next_u32(&mut self) -> u32 {
        if self.cursor + 4 > self.current.len() {
            self.current = Sha256::digest(self.current).into();
            self.cursor = 0;
        }
        let word = u32::from_be_bytes(self.current[self.cursor..self.cursor + 4].try_into().unwrap());
        self.cursor += 4;
        word
    }

    /// Next draw in `[0, max)`, rejecting biased values per spec §4.2
    /// ("reject any 32-bit draw >= floor(2^32/max)*max"). `limit` is
    /// computed against the literal `2^32`, not `u32::MAX` (`2^32 -
    /// 1`), and kept as a `u64` because `max` values that divide `2^32`
    /// evenly (e.g. 32, 64) push `limit` to exactly `2^32`, which
    /// doesn't fit back into a `u32` — comparing in `u64` means that
    /// case correctly never rejects a draw.
    fn next_unbiased(&mut self, max: u32) -> u32 {
        let limit: u64 = (1u64 << 32) / max as u64 * max as u64;
        loop {
            let draw = self.next_u32();
            if (draw as u64) < limit {
                return draw % max;
            }
        }
    }
}

/// Sorted ascending sequence of `count` distinct integers in `[1, max]`,
/// derived deterministically from the three seeds. Calling this twice
/// with identical arguments yields an identical sequence (spec §8
/// property 6).
pub fn generate_numbers(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    count: u32,
    max: u32,
) -> Result<Vec<u32>, RngError> {
    if count == 0 || count > max {
        return Err(RngError::InvalidParameters(format!(
            "count {count} must be within [1, max={max}]"
        )));
    }
    let mut chain = HashChain::new(server_seed, client_seed, nonce);
    let mut seen = std::collections::HashSet::with_capacity(count as usize);
    let mut numbers = Vec::with_capacity(count as usize);
    while numbers.len() < count as usize {
        let value = chain.next_unbiased(max) + 1;
        if seen.insert(value) {
            numbers.push(value);
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism() {
        let a = generate_numbers("seed-a", "seed-b", 7, 5, 49).unwrap();
        let b = generate_numbers("seed-a", "seed-b", 7, 5, 49).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sorted_distinct_in_range() {
        let numbers = generate_numbers("seed-a", "seed-b", 42, 6, 46).unwrap();
        assert_eq!(numbers.len(), 6);
        for w in numbers.windows(2) {
            assert!(w[0] < w[1]);
        }
        assert!(numbers.iter().all(|&n| (1..=46).contains(&n)));
    }

    // Frozen test vector (spec §8 S5): serverSeed = 64 zero bytes,
    // clientSeed = 64 one bytes, nonce = 0, count = 5, max = 36.
    #[test]
    fn frozen_vector_s5() {
        let server_seed = "0".repeat(64);
        let client_seed = "1".repeat(64);
        let numbers = generate_numbers(&server_seed, &client_seed, 0, 5, 36).unwrap();
        assert_eq!(numbers.len(), 5);
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        assert!(numbers.iter().all(|&n| (1..=36).contains(&n)));
        // Re-deriving must be bit-identical; this is the property a
        // third-party auditor checks against the stored hash.
        let again = generate_numbers(&server_seed, &client_seed, 0, 5, 36).unwrap();
        assert_eq!(numbers, again);
    }

    // `max = 65536` divides 2^32 evenly, so the rejection threshold is
    // exactly 2^32 and no raw word should ever be rejected; exercised
    // through a `max` large enough that a biased implementation would
    // otherwise discard the top `max` values of nearly every word.
    #[test]
    fn power_of_two_divisor_never_rejects() {
        let mut chain = HashChain::new("seed-a", "seed-b", 0);
        for _ in 0..64 {
            let draw = chain.next_unbiased(65536);
            assert!(draw < 65536);
        }
    }

    #[test]
    fn hash_commit_round_trip() {
        let seed = generate_server_seed();
        let hash = hash_server_seed(&seed);
        assert_eq!(hash, hash_server_seed(&seed));
        assert_ne!(seed, hash);
    }

    #[test]
    fn rejects_degenerate_parameters() {
        assert!(generate_numbers("a", "b", 0, 0, 10).is_err());
        assert!(generate_numbers("a", "b", 0, 11, 10).is_err());
    }

    proptest::proptest! {
        #[test]
        fn always_sorted_distinct_and_in_range(nonce in 0u64..10_000, count in 1u32..10, max in 10u32..50) {
            let count = count.min(max);
            let numbers = generate_numbers("ps", "pc", nonce, count, max).unwrap();
            prop_assert_eq!(numbers.len(), count as usize);
            for w in numbers.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
            prop_assert!(numbers.iter().all(|&n| n >= 1 && n <= max));
        }
    }
}
