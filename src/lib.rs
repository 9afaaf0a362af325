//! Sealstream - a password-based authenticated stream-encryption library
//!
//! This library frames a compressed, encrypted payload into a
//! self-describing container with tamper detection.
//!
//! # Features
//!
//! - **Memory-hard KDF**: scrypt key derivation with bounded parallelism
//! - **Stream cipher**: reduced-round Salsa20 (8, 12 or 20 rounds)
//! - **Authentication**: HMAC-SHA256 over the plaintext, verified in
//!   constant time
//! - **Compression**: raw Deflate, applied before encryption
//! - **Traffic shaping**: randomized padding and a disguised cipher
//!   selector, so container fields are indistinguishable from ciphertext
//! - **Atomic operations**: prevents partial file writes
//! - **Memory safety**: zeroizes key material
//!
//! # Example
//!
//! ```no_run
//! use sealstream::{encrypt_file, decrypt_file};
//! use std::path::Path;
//!
//! // Encrypt a file
//! encrypt_file(Path::new("secret.txt"), Path::new("secret.seal"), "MyStr0ng!Pass").unwrap();
//!
//! // Decrypt a file
//! decrypt_file(Path::new("secret.seal"), Path::new("secret.txt"), "MyStr0ng!Pass").unwrap();
//! ```

pub mod bits;
pub mod config;
pub mod crypto;
pub mod error;
pub mod progress;
pub mod storage;
pub mod stream;

// Re-export commonly used types
pub use config::{Header, KdfParams, SALT_LEN};
pub use crypto::hmac::{HmacSha256, TAG_LEN};
pub use crypto::kdf::derive_key;
pub use crypto::salsa20::Salsa20;
pub use crypto::{CipherAlgorithm, KeystreamCombiner, RandomSource, SeededRandom, SystemRandom};
pub use error::{EngineError, Result};
pub use progress::{Progress, ProgressObserver, ProgressTracker};
pub use stream::StreamCodec;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Encrypts a byte slice with a password using the default configuration:
/// Salsa20/20, scrypt key derivation and the current time as the container
/// timestamp.
///
/// # Errors
///
/// Returns an error if key derivation or encryption fails.
///
/// # Examples
///
/// ```
/// # use sealstream::{encrypt_bytes, decrypt_bytes};
/// let container = encrypt_bytes(b"hello", "password").unwrap();
/// let (payload, _timestamp) = decrypt_bytes(&container, "password").unwrap();
/// assert_eq!(payload, b"hello");
/// ```
pub fn encrypt_bytes(payload: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut codec = default_codec();
    let mut container = Vec::new();
    codec.encrypt(
        password.as_bytes(),
        unix_timestamp(),
        payload.len() as u64,
        &mut &payload[..],
        &mut container,
    )?;
    Ok(container)
}

/// Decrypts a container produced by [`encrypt_bytes`], returning the
/// payload and the timestamp recorded at encryption time.
///
/// # Errors
///
/// A wrong password or a tampered container surfaces as
/// [`EngineError::IncorrectKey`].
pub fn decrypt_bytes(container: &[u8], password: &str) -> Result<(Vec<u8>, u64)> {
    let mut codec = default_codec();
    let mut payload = Vec::new();
    let timestamp = codec.decrypt(
        password.as_bytes(),
        container.len() as u64,
        &mut &container[..],
        &mut payload,
    )?;
    Ok((payload, timestamp))
}

/// Encrypts a file with a password.
///
/// This is the high-level API for file encryption. It:
/// 1. Reads the input file
/// 2. Derives a content-encryption key from the password using scrypt
/// 3. Compresses and encrypts the data into a container
/// 4. Writes the container atomically
///
/// # Arguments
///
/// * `input_path` - Path to the file to encrypt
/// * `output_path` - Path where the container will be written
/// * `password` - Password for encryption
///
/// # Errors
///
/// Returns an error if:
/// - Input file cannot be read
/// - Key derivation or encryption fails
/// - Output file cannot be written
///
/// # Examples
///
/// ```no_run
/// # use sealstream::encrypt_file;
/// # use std::path::Path;
/// encrypt_file(
///     Path::new("document.pdf"),
///     Path::new("document.pdf.seal"),
///     "MyStrongPassword123!"
/// ).unwrap();
/// ```
pub fn encrypt_file(input_path: &Path, output_path: &Path, password: &str) -> Result<()> {
    let payload = storage::read_file(input_path)?;
    let container = encrypt_bytes(&payload, password)?;
    storage::write_file_atomic(output_path, &container)
}

/// Decrypts a file produced by [`encrypt_file`].
///
/// # Arguments
///
/// * `input_path` - Path to the container
/// * `output_path` - Path where the recovered payload will be written
/// * `password` - Password used for encryption
///
/// # Errors
///
/// Returns an error if the container cannot be read, the password is
/// wrong, the container was tampered with, or the output cannot be
/// written.
pub fn decrypt_file(input_path: &Path, output_path: &Path, password: &str) -> Result<()> {
    let container = storage::read_file(input_path)?;
    let (payload, _) = decrypt_bytes(&container, password)?;
    storage::write_file_atomic(output_path, &payload)
}

fn default_codec() -> StreamCodec {
    StreamCodec::new(CipherAlgorithm::Salsa20of20).with_kdf_params(KdfParams::default())
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
