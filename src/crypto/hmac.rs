//! HMAC-SHA256 keyed message authentication.
//!
//! Standard two-pass inner/outer construction over the external SHA-256
//! primitive. Keys longer than the 64-byte block are hashed down first;
//! shorter keys are zero-padded. Producing the tag consumes the instance
//! ([`HmacSha256::finalize`]) or re-primes it for further use
//! ([`HmacSha256::finalize_reset`]), mirroring the digest crate's own API.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// SHA-256 input block length in bytes.
const BLOCK_LEN: usize = 64;

/// Length of an HMAC-SHA256 tag in bytes.
pub const TAG_LEN: usize = 32;

/// Incremental HMAC-SHA256 computation.
pub struct HmacSha256 {
    ipad: [u8; BLOCK_LEN],
    opad: [u8; BLOCK_LEN],
    inner: Sha256,
}

impl HmacSha256 {
    /// Creates a keyed instance, primed for `update` calls.
    pub fn new(key: &[u8]) -> Self {
        let mut block = [0u8; BLOCK_LEN];
        if key.len() > BLOCK_LEN {
            block[..TAG_LEN].copy_from_slice(&Sha256::digest(key));
        } else {
            block[..key.len()].copy_from_slice(key);
        }

        let mut ipad = [0u8; BLOCK_LEN];
        let mut opad = [0u8; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            ipad[i] = block[i] ^ 0x36;
            opad[i] = block[i] ^ 0x5c;
        }
        block.zeroize();

        let mut inner = Sha256::new();
        inner.update(ipad);
        Self { ipad, opad, inner }
    }

    /// Feeds message bytes into the authenticator.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Produces the 32-byte tag, consuming the instance.
    pub fn finalize(mut self) -> [u8; TAG_LEN] {
        let inner = std::mem::replace(&mut self.inner, Sha256::new());
        self.outer(inner)
    }

    /// Produces the 32-byte tag and re-primes the inner hash with the keyed
    /// inner pad, so the instance can authenticate another message.
    pub fn finalize_reset(&mut self) -> [u8; TAG_LEN] {
        let inner = std::mem::replace(&mut self.inner, Sha256::new());
        self.inner.update(self.ipad);
        self.outer(inner)
    }

    /// One-shot convenience: equivalent to `update(data)` then `finalize()`.
    pub fn compute(key: &[u8], data: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = Self::new(key);
        mac.update(data);
        mac.finalize()
    }

    fn outer(&self, inner: Sha256) -> [u8; TAG_LEN] {
        let inner_digest = inner.finalize();
        let mut outer = Sha256::new();
        outer.update(self.opad);
        outer.update(inner_digest);
        outer.finalize().into()
    }
}

impl Drop for HmacSha256 {
    fn drop(&mut self) {
        self.ipad.zeroize();
        self.opad.zeroize();
    }
}
