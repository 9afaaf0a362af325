//! Configuration value objects for the engine.
//!
//! [`KdfParams`] carries the scrypt parameters and their 32-bit bit-packed
//! wire form; [`Header`] is the caller-supplied container header template.
//! Both are plain value objects, cloned into each codec so concurrent
//! operations never alias mutable configuration.

use crate::bits;
use crate::error::{EngineError, Result};
use std::io::{Read, Write};

/// Salt length in bytes for password-based key derivation.
pub const SALT_LEN: usize = 32;

/// Supported Salsa20 core round counts, in rounds-index order.
pub const SUPPORTED_ROUNDS: [u32; 4] = [8, 12, 16, 20];

/// Smallest and largest log2 scrypt cost.
pub const MIN_COST: u32 = 1;
pub const MAX_COST: u32 = 24;

/// Block-count (`r`) bounds for derivation.
pub const MIN_BLOCKS: u32 = 1;
pub const MAX_BLOCKS: u32 = 1024;

/// Largest block count representable in the packed wire form.
pub const MAX_ENCODABLE_BLOCKS: u32 = 256;

/// Parallel-block (`p`) bounds.
pub const MIN_PARALLEL: u32 = 1;
pub const MAX_PARALLEL: u32 = 64;

/// Largest configurable thread bound; 0 means "all available processors".
pub const MAX_THREADS: u32 = 64;

// Packed-word layout, low bits first.
const FUNCTION_SHIFT: u32 = 0;
const FUNCTION_BITS: u32 = 4;
const ROUNDS_SHIFT: u32 = 4;
const ROUNDS_BITS: u32 = 2;
const COST_SHIFT: u32 = 6;
const COST_BITS: u32 = 5;
const BLOCKS_SHIFT: u32 = 11;
const BLOCKS_BITS: u32 = 8;
const PARALLEL_SHIFT: u32 = 19;
const PARALLEL_BITS: u32 = 6;
const THREADS_SHIFT: u32 = 25;
const THREADS_BITS: u32 = 7;

/// Function identifier of the scrypt KDF in the packed parameter word.
const SCRYPT_FUNCTION_ID: u32 = 1;

/// Scrypt key-derivation parameters.
///
/// `cost` is the log2 of the scrypt memory cost `N`; `num_blocks` is `r`;
/// `num_parallel_blocks` is `p`; `num_rounds` selects the Salsa20 core
/// variant; `max_threads` bounds the mixing worker pool (0 = all available
/// processors, bounded by `num_parallel_blocks`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub cost: u32,
    pub num_blocks: u32,
    pub num_parallel_blocks: u32,
    pub num_rounds: u32,
    pub max_threads: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            cost: 14,
            num_blocks: 8,
            num_parallel_blocks: 1,
            num_rounds: 8,
            max_threads: 0,
        }
    }
}

impl KdfParams {
    /// Creates and validates a parameter set.
    pub fn new(
        cost: u32,
        num_blocks: u32,
        num_parallel_blocks: u32,
        num_rounds: u32,
        max_threads: u32,
    ) -> Result<Self> {
        let params = Self {
            cost,
            num_blocks,
            num_parallel_blocks,
            num_rounds,
            max_threads,
        };
        params.validate()?;
        Ok(params)
    }

    /// A lighter parameter set for interactive use and tests.
    pub fn fast() -> Self {
        Self {
            cost: 8,
            num_blocks: 4,
            num_parallel_blocks: 1,
            num_rounds: 8,
            max_threads: 1,
        }
    }

    /// Checks every field against its documented range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_COST..=MAX_COST).contains(&self.cost) {
            return Err(param_err("cost", self.cost, MIN_COST, MAX_COST));
        }
        if !(MIN_BLOCKS..=MAX_BLOCKS).contains(&self.num_blocks) {
            return Err(param_err("numBlocks", self.num_blocks, MIN_BLOCKS, MAX_BLOCKS));
        }
        if !(MIN_PARALLEL..=MAX_PARALLEL).contains(&self.num_parallel_blocks) {
            return Err(param_err(
                "numParallelBlocks",
                self.num_parallel_blocks,
                MIN_PARALLEL,
                MAX_PARALLEL,
            ));
        }
        if self.max_threads > MAX_THREADS {
            return Err(param_err("maxThreads", self.max_threads, 0, MAX_THREADS));
        }
        if rounds_index(self.num_rounds).is_none() {
            return Err(EngineError::Parameter {
                field: "numRounds",
                reason: format!("{} is not one of 8, 12, 16 or 20", self.num_rounds),
            });
        }
        Ok(())
    }

    /// Packs the parameters into a 32-bit word.
    ///
    /// When `include_threads` is false (the wire form inside encrypted
    /// containers), the thread count is omitted and its bits left zero.
    ///
    /// # Errors
    ///
    /// Rejects invalid parameters, and `num_blocks` values above
    /// [`MAX_ENCODABLE_BLOCKS`] which do not fit the 8-bit field.
    pub fn encode(&self, include_threads: bool) -> Result<u32> {
        self.validate()?;
        if self.num_blocks > MAX_ENCODABLE_BLOCKS {
            return Err(EngineError::Parameter {
                field: "numBlocks",
                reason: format!(
                    "{} exceeds the encodable maximum of {MAX_ENCODABLE_BLOCKS}",
                    self.num_blocks
                ),
            });
        }
        let rounds_idx = rounds_index(self.num_rounds).unwrap();
        let mut word = bits::field(SCRYPT_FUNCTION_ID, FUNCTION_SHIFT, FUNCTION_BITS)
            | bits::field(rounds_idx, ROUNDS_SHIFT, ROUNDS_BITS)
            | bits::field(self.cost - 1, COST_SHIFT, COST_BITS)
            | bits::field(self.num_blocks - 1, BLOCKS_SHIFT, BLOCKS_BITS)
            | bits::field(self.num_parallel_blocks - 1, PARALLEL_SHIFT, PARALLEL_BITS);
        if include_threads {
            word = bits::replace(word, self.max_threads, THREADS_SHIFT, THREADS_BITS);
        }
        Ok(word)
    }

    /// Unpacks a parameter word, re-validating every field.
    ///
    /// When `with_threads` is false the thread-count bits are ignored and
    /// `max_threads` is left at 0; the caller supplies its own thread policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidFormat`] for an unknown function id or
    /// any decoded value outside its bound; out-of-range values are a format
    /// error, never silently clamped.
    pub fn decode(word: u32, with_threads: bool) -> Result<Self> {
        if bits::extract(word, FUNCTION_SHIFT, FUNCTION_BITS) != SCRYPT_FUNCTION_ID {
            return Err(EngineError::InvalidFormat);
        }
        let rounds_idx = bits::extract(word, ROUNDS_SHIFT, ROUNDS_BITS) as usize;
        let params = Self {
            cost: bits::extract(word, COST_SHIFT, COST_BITS) + 1,
            num_blocks: bits::extract(word, BLOCKS_SHIFT, BLOCKS_BITS) + 1,
            num_parallel_blocks: bits::extract(word, PARALLEL_SHIFT, PARALLEL_BITS) + 1,
            num_rounds: SUPPORTED_ROUNDS[rounds_idx],
            max_threads: if with_threads {
                bits::extract(word, THREADS_SHIFT, THREADS_BITS)
            } else {
                0
            },
        };
        params.validate().map_err(|_| EngineError::InvalidFormat)?;
        Ok(params)
    }

    /// Memory-lane byte size of one superblock (`2 * r * 64`).
    pub fn superblock_len(&self) -> usize {
        2 * self.num_blocks as usize * 64
    }
}

fn param_err(field: &'static str, value: u32, min: u32, max: u32) -> EngineError {
    EngineError::Parameter {
        field,
        reason: format!("{value} is outside {min}..={max}"),
    }
}

fn rounds_index(rounds: u32) -> Option<u32> {
    SUPPORTED_ROUNDS
        .iter()
        .position(|&r| r == rounds)
        .map(|i| i as u32)
}

/// Caller-supplied container header template.
///
/// Written verbatim on encrypt: a 4-byte format id, a 2-byte little-endian
/// version, and an optional fixed-length supplementary payload. The
/// `[min_version, max_version]` acceptance interval is used only at decode
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: [u8; 4],
    pub version: u16,
    pub supplementary: Vec<u8>,
    pub min_version: u16,
    pub max_version: u16,
}

impl Header {
    /// Creates a header accepting exactly `version`.
    pub fn new(id: [u8; 4], version: u16) -> Self {
        Self {
            id,
            version,
            supplementary: Vec::new(),
            min_version: version,
            max_version: version,
        }
    }

    /// Attaches a fixed-length supplementary payload.
    pub fn with_supplementary(mut self, data: Vec<u8>) -> Self {
        self.supplementary = data;
        self
    }

    /// Widens the version acceptance interval used at decode time.
    pub fn with_accepted_versions(mut self, min: u16, max: u16) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    /// Rejects malformed templates before any I/O.
    pub fn validate(&self) -> Result<()> {
        if self.min_version > self.max_version {
            return Err(EngineError::Parameter {
                field: "header",
                reason: format!(
                    "version interval {}..={} is empty",
                    self.min_version, self.max_version
                ),
            });
        }
        Ok(())
    }

    /// Encoded length in bytes: id + version + supplementary.
    pub fn encoded_len(&self) -> usize {
        4 + 2 + self.supplementary.len()
    }

    /// Writes the header verbatim.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.supplementary)?;
        Ok(())
    }

    /// Reads a header against this template.
    ///
    /// The format id must match and the version must fall inside the
    /// acceptance interval; the supplementary payload is read at the
    /// template's fixed length and returned.
    pub fn read_from(&self, reader: &mut dyn Read) -> Result<(u16, Vec<u8>)> {
        let mut id = [0u8; 4];
        read_wire(reader, &mut id)?;
        if id != self.id {
            return Err(EngineError::InvalidFormat);
        }

        let mut version_bytes = [0u8; 2];
        read_wire(reader, &mut version_bytes)?;
        let version = u16::from_le_bytes(version_bytes);
        if !(self.min_version..=self.max_version).contains(&version) {
            return Err(EngineError::UnsupportedVersion {
                found: version,
                min: self.min_version,
                max: self.max_version,
            });
        }

        let mut supplementary = vec![0u8; self.supplementary.len()];
        read_wire(reader, &mut supplementary)?;
        Ok((version, supplementary))
    }
}

/// `read_exact` that maps a short read to the premature-end condition.
pub(crate) fn read_wire(reader: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EngineError::PrematureEnd
        } else {
            EngineError::Io(e)
        }
    })
}
