//! Salsa20 core permutation and keyed block generator.
//!
//! Implements the 16-word add-rotate-XOR mixing permutation of the reference
//! design at 8, 12, 16 or 20 rounds, plus a keyed generator that produces
//! 64-byte keystream blocks at arbitrary positions of a 64-bit block counter.
//! The reduced-round core is also the mixing primitive of the scrypt KDF.

use crate::error::{EngineError, Result};
use zeroize::Zeroize;

/// Length of one keystream block in bytes.
pub const BLOCK_LEN: usize = 64;

/// Number of 32-bit words in the cipher state.
pub const STATE_WORDS: usize = 16;

// "expand 32-byte k", little-endian.
const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

/// Returns an error unless `rounds` is one of the supported reduced-round
/// variants.
pub fn check_rounds(rounds: u32) -> Result<()> {
    if matches!(rounds, 8 | 12 | 16 | 20) {
        Ok(())
    } else {
        Err(EngineError::Parameter {
            field: "rounds",
            reason: format!("{rounds} is not one of 8, 12, 16 or 20"),
        })
    }
}

/// Keyed Salsa20 block generator.
///
/// The state is laid out as `[C0, k0..k3, C1, n0, n1, ctr0, ctr1, C2,
/// k4..k7, C3]` with the four fixed sigma constants. The 64-bit block
/// counter is exposed and mutable; it determines the keystream position and
/// is excluded from equality.
#[derive(Debug, Clone)]
pub struct Salsa20 {
    key: [u32; 8],
    nonce: [u32; 2],
    rounds: u32,
    counter: u64,
}

impl Salsa20 {
    /// Creates a generator from a 32-byte key and 8-byte nonce.
    ///
    /// # Errors
    ///
    /// Returns a parameter error if `rounds` is not 8, 12, 16 or 20.
    pub fn new(key: &[u8; 32], nonce: &[u8; 8], rounds: u32) -> Result<Self> {
        check_rounds(rounds)?;
        let mut key_words = [0u32; 8];
        for (w, chunk) in key_words.iter_mut().zip(key.chunks_exact(4)) {
            *w = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        let nonce_words = [
            u32::from_le_bytes(nonce[0..4].try_into().unwrap()),
            u32::from_le_bytes(nonce[4..8].try_into().unwrap()),
        ];
        Ok(Self {
            key: key_words,
            nonce: nonce_words,
            rounds,
            counter: 0,
        })
    }

    /// Applies `rounds / 2` double-rounds to a copy of `input`, then adds the
    /// original input word-wise (feed-forward).
    ///
    /// `rounds` must already be validated; it is debug-asserted here because
    /// this sits on the scrypt hot path.
    pub fn hash(input: &[u32; STATE_WORDS], rounds: u32) -> [u32; STATE_WORDS] {
        debug_assert!(matches!(rounds, 8 | 12 | 16 | 20));
        let mut x = *input;

        macro_rules! quarter {
            ($a:expr, $b:expr, $c:expr, $d:expr) => {
                x[$b] ^= x[$a].wrapping_add(x[$d]).rotate_left(7);
                x[$c] ^= x[$b].wrapping_add(x[$a]).rotate_left(9);
                x[$d] ^= x[$c].wrapping_add(x[$b]).rotate_left(13);
                x[$a] ^= x[$d].wrapping_add(x[$c]).rotate_left(18);
            };
        }

        for _ in 0..rounds / 2 {
            // Column round.
            quarter!(0, 4, 8, 12);
            quarter!(5, 9, 13, 1);
            quarter!(10, 14, 2, 6);
            quarter!(15, 3, 7, 11);
            // Diagonal round.
            quarter!(0, 1, 2, 3);
            quarter!(5, 6, 7, 4);
            quarter!(10, 11, 8, 9);
            quarter!(15, 12, 13, 14);
        }

        for (word, original) in x.iter_mut().zip(input.iter()) {
            *word = word.wrapping_add(*original);
        }
        x
    }

    fn state(&self, counter: u64) -> [u32; STATE_WORDS] {
        let k = &self.key;
        let n = &self.nonce;
        [
            SIGMA[0],
            k[0],
            k[1],
            k[2],
            k[3],
            SIGMA[1],
            n[0],
            n[1],
            counter as u32,
            (counter >> 32) as u32,
            SIGMA[2],
            k[4],
            k[5],
            k[6],
            k[7],
            SIGMA[3],
        ]
    }

    /// Generates the keystream block at the given counter position,
    /// serialised little-endian into `out`.
    pub fn block_at(&self, counter: u64, out: &mut [u8; BLOCK_LEN]) {
        let output = Self::hash(&self.state(counter), self.rounds);
        for (chunk, word) in out.chunks_exact_mut(4).zip(output.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    /// Generates the block at the internal counter, then increments it.
    pub fn next_block(&mut self, out: &mut [u8; BLOCK_LEN]) {
        self.block_at(self.counter, out);
        self.counter = self.counter.wrapping_add(1);
    }

    /// Current block counter.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Repositions the keystream at the given block counter.
    pub fn set_counter(&mut self, counter: u64) {
        self.counter = counter;
    }

    /// Round count of this instance.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

/// Two instances are equal iff their (key, nonce) pair is equal; the block
/// counter is excluded from identity.
impl PartialEq for Salsa20 {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.nonce == other.nonce
    }
}

impl Eq for Salsa20 {}

impl Drop for Salsa20 {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
