//! Cryptographic primitives and collaborator contracts.
//!
//! Trait seams for the two collaborators the framing protocol depends on —
//! a byte-level random source and a keyed keystream combiner — together with
//! the built-in Salsa20 realization of both, the cipher registry used by the
//! disguised wire selector, and the double-SHA-256 key-conditioning helper.

pub mod hmac;
pub mod kdf;
pub mod salsa20;

use crate::error::{EngineError, Result};
use rand::rngs::OsRng;
use rand_core::TryRngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use salsa20::{Salsa20, BLOCK_LEN};

/// CRC32 mask that maps a disguised 2-byte selector to a cipher id.
pub const CIPHER_ID_MASK: u32 = 0x0f;

// Fixed nonces separating the combine keystream from the exposed PRNG
// stream; both instances are keyed from the content-encryption key.
const COMBINE_NONCE: [u8; 8] = *b"seal-cmb";
const PRNG_NONCE: [u8; 8] = *b"seal-rng";

/// Source of random bytes.
///
/// Fallible so the operating-system generator can surface failures the way
/// the rest of the engine does.
pub trait RandomSource: Send {
    /// Fills `buf` with random bytes.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Draws a single random byte.
    fn next_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte)?;
        Ok(byte[0])
    }
}

/// Keyed keystream generator with XOR-combine-in-place semantics.
///
/// The exposed PRNG stream is independent of the combine stream: drawing
/// from one never advances the other, so both sides of the protocol can
/// consume them in different orders and still stay synchronized.
pub trait KeystreamCombiner {
    /// XORs keystream bytes into `buf` in place. Encryption and decryption
    /// are the same operation.
    fn combine(&mut self, buf: &mut [u8]);

    /// The combiner's underlying deterministic PRNG stream.
    fn prng(&mut self) -> &mut dyn RandomSource;
}

/// Hashes `data` twice with SHA-256.
///
/// Conditions directly supplied caller keys into uniformly distributed
/// 32-byte cipher keys when no KDF is configured.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Operating-system CSPRNG.
#[derive(Debug, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EngineError::Internal(format!("system RNG failure: {e}")))
    }
}

/// Buffered keystream over a Salsa20 block generator.
pub(crate) struct Keystream {
    cipher: Salsa20,
    block: [u8; BLOCK_LEN],
    pos: usize,
}

impl Keystream {
    pub(crate) fn new(cipher: Salsa20) -> Self {
        Self {
            cipher,
            block: [0u8; BLOCK_LEN],
            pos: BLOCK_LEN,
        }
    }

    fn next_byte(&mut self) -> u8 {
        if self.pos == BLOCK_LEN {
            self.cipher.next_block(&mut self.block);
            self.pos = 0;
        }
        let byte = self.block[self.pos];
        self.pos += 1;
        byte
    }

    pub(crate) fn fill(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.next_byte();
        }
    }

    pub(crate) fn xor_into(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

/// Deterministic random source backed by a Salsa20/20 keystream.
///
/// Two instances built from the same seed produce the same byte sequence;
/// useful wherever reproducible randomness is required.
pub struct SeededRandom {
    stream: Keystream,
}

impl SeededRandom {
    /// Creates a deterministic source from an arbitrary-length seed.
    pub fn from_seed(seed: &[u8]) -> Self {
        let key = double_sha256(seed);
        // Rounds and nonce are fixed, so construction cannot fail.
        let cipher = Salsa20::new(&key, &PRNG_NONCE, 20).expect("fixed rounds are valid");
        Self {
            stream: Keystream::new(cipher),
        }
    }

    fn from_cipher(cipher: Salsa20) -> Self {
        Self {
            stream: Keystream::new(cipher),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.fill(buf);
        Ok(())
    }
}

/// Stream ciphers selectable by the container's disguised selector.
///
/// Wire ids are stable; all ids must stay below [`CIPHER_ID_MASK`] + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// Salsa20 with 8 rounds.
    Salsa20of8,
    /// Salsa20 with 12 rounds.
    Salsa20of12,
    /// Salsa20 with 16 rounds.
    Salsa20of16,
    /// Salsa20 with 20 rounds.
    Salsa20of20,
}

impl CipherAlgorithm {
    /// Stable wire identifier.
    pub fn id(self) -> u16 {
        match self {
            Self::Salsa20of8 => 1,
            Self::Salsa20of12 => 2,
            Self::Salsa20of20 => 3,
            Self::Salsa20of16 => 4,
        }
    }

    /// Looks a cipher up by wire identifier.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            1 => Some(Self::Salsa20of8),
            2 => Some(Self::Salsa20of12),
            3 => Some(Self::Salsa20of20),
            4 => Some(Self::Salsa20of16),
            _ => None,
        }
    }

    /// Core round count of this variant.
    pub fn rounds(self) -> u32 {
        match self {
            Self::Salsa20of8 => 8,
            Self::Salsa20of12 => 12,
            Self::Salsa20of16 => 16,
            Self::Salsa20of20 => 20,
        }
    }
}

/// Built-in combiner: two independently-nonced Salsa20 keystreams keyed
/// from the content-encryption key, one for XOR-combining and one exposed
/// as the PRNG.
pub struct Salsa20Combiner {
    stream: Keystream,
    prng: SeededRandom,
}

impl KeystreamCombiner for Salsa20Combiner {
    fn combine(&mut self, buf: &mut [u8]) {
        self.stream.xor_into(buf);
    }

    fn prng(&mut self) -> &mut dyn RandomSource {
        &mut self.prng
    }
}

/// Builds the keyed combiner for a cipher selection.
///
/// The combine stream is keyed with the first 32 bytes of the
/// content-encryption key (or its double hash when shorter); the PRNG
/// stream is keyed with the double hash of the whole key, so the two
/// streams never coincide.
pub fn combiner_for(cipher: CipherAlgorithm, key: &[u8]) -> Result<Salsa20Combiner> {
    let mut combine_key = Zeroizing::new([0u8; 32]);
    if key.len() >= 32 {
        combine_key.copy_from_slice(&key[..32]);
    } else {
        *combine_key = double_sha256(key);
    }
    let combine = Salsa20::new(&combine_key, &COMBINE_NONCE, cipher.rounds())?;

    let prng_key = Zeroizing::new(double_sha256(key));
    let prng_cipher = Salsa20::new(&prng_key, &PRNG_NONCE, cipher.rounds())?;

    Ok(Salsa20Combiner {
        stream: Keystream::new(combine),
        prng: SeededRandom::from_cipher(prng_cipher),
    })
}
