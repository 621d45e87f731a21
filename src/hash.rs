//! SipHash-2-4 term fingerprints.
//!
//! Weblate identifies a translation unit by the SipHash-2-4 digest of its source
//! term, keyed with a fixed 16-byte key. The digest is rendered as 16 lowercase hex
//! digits, which is the `checksum` query parameter understood by the translation
//! platform.

use std::collections::HashMap;

use thiserror::Error;

/// Key used by Weblate to fingerprint source terms.
pub const WEBLATE_SIPHASH_KEY: &str = "Weblate Sip Hash";

/// Required key size in bytes.
pub const KEY_LENGTH: usize = 16;

/// Initialisation constants ("somepseudorandomlygeneratedbytes").
const INIT: [u64; 4] = [0x736f_6d65_7073_6575, 0x646f_7261_6e64_6f6d, 0x6c79_6765_6e65_7261, 0x7465_6462_7974_6573];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashError {
    /// The key is not exactly [`KEY_LENGTH`] bytes long.
    #[error("Key length must be exactly {KEY_LENGTH} bytes, got {len}")]
    InvalidKeyLength {
        /// Length of the rejected key.
        len: usize,
    },
}

/// A validated SipHash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SipKey {
    /// Little-endian first half of the key.
    k0: u64,
    /// Little-endian second half of the key.
    k1: u64,
}

impl SipKey {
    /// Builds a key from raw bytes.
    ///
    /// # Errors
    /// Returns [`HashError::InvalidKeyLength`] unless `bytes` is exactly 16 bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, HashError> {
        let key: [u8; KEY_LENGTH] =
            bytes.try_into().map_err(|_| HashError::InvalidKeyLength { len: bytes.len() })?;
        let (lo, hi) = key.split_at(KEY_LENGTH / 2);
        Ok(Self { k0: read_u64_le(lo), k1: read_u64_le(hi) })
    }

    /// Key used by Weblate.
    #[must_use]
    pub const fn weblate() -> Self {
        let [a0, a1, a2, a3, a4, a5, a6, a7, b0, b1, b2, b3, b4, b5, b6, b7] = *b"Weblate Sip Hash";
        Self {
            k0: u64::from_le_bytes([a0, a1, a2, a3, a4, a5, a6, a7]),
            k1: u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, b7]),
        }
    }

    /// Raw 64-bit digest of `message`.
    #[must_use]
    pub fn digest(&self, message: &[u8]) -> u64 {
        let mut state = State::new(self);

        let mut blocks = message.chunks_exact(8);
        for block in blocks.by_ref() {
            state.compress(read_u64_le(block));
        }

        // Remaining 0..=7 bytes, zero padded, length in the top byte.
        #[allow(clippy::cast_possible_truncation)]
        let mut last = u64::from(message.len() as u8) << 56;
        for (i, byte) in blocks.remainder().iter().enumerate() {
            last |= u64::from(*byte) << (8 * i);
        }
        state.compress(last);

        state.finalize()
    }

    /// Fingerprint of `message` as 16 lowercase hex digits.
    #[must_use]
    pub fn hash_hex(&self, message: &[u8]) -> String {
        format!("{:016x}", self.digest(message))
    }
}

/// Computes the SipHash-2-4 fingerprint of `message` under `key`.
///
/// # Errors
/// Returns [`HashError::InvalidKeyLength`] unless `key` is exactly 16 bytes.
pub fn siphash24(key: &[u8], message: &[u8]) -> Result<String, HashError> {
    Ok(SipKey::new(key)?.hash_hex(message))
}

/// The four state words.
#[derive(Debug, Clone, Copy)]
struct State {
    /// v0
    v0: u64,
    /// v1
    v1: u64,
    /// v2
    v2: u64,
    /// v3
    v3: u64,
}

impl State {
    /// Initial state for `key`.
    const fn new(key: &SipKey) -> Self {
        Self {
            v0: key.k0 ^ INIT[0],
            v1: key.k1 ^ INIT[1],
            v2: key.k0 ^ INIT[2],
            v3: key.k1 ^ INIT[3],
        }
    }

    /// One SipRound.
    const fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13) ^ self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16) ^ self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21) ^ self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17) ^ self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Absorbs one message word with two compression rounds.
    const fn compress(&mut self, word: u64) {
        self.v3 ^= word;
        self.round();
        self.round();
        self.v0 ^= word;
    }

    /// Four finalisation rounds, folded into one word.
    const fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        self.round();
        self.round();
        self.round();
        self.round();
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

/// Reads up to 8 bytes as a little-endian word.
fn read_u64_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// Per-session memo of term fingerprints.
///
/// Entries are never evicted; the number of distinct terms is bounded by what the
/// user interface can display.
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    /// Hash key.
    key: SipKey,
    /// Source term -> fingerprint.
    hashes: HashMap<String, String>,
}

impl FingerprintCache {
    #[must_use]
    pub fn new(key: SipKey) -> Self {
        Self { key, hashes: HashMap::new() }
    }

    /// Returns the fingerprint of `source`, computing it on first use.
    pub fn fingerprint(&mut self, source: &str) -> &str {
        let key = self.key;
        self.hashes.entry(source.to_string()).or_insert_with(|| key.hash_hex(source.as_bytes()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(SipKey::weblate())
    }
}
