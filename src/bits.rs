//! Bit-field helpers on 32-bit machine words.
//!
//! Pure functions for packing and unpacking fixed-width bit fields, used to
//! encode KDF parameters compactly. No bounds are enforced at this layer:
//! shift/length combinations that would overflow the word are the caller's
//! responsibility.

/// Returns a mask with the low `length` bits set.
///
/// A `length` of 32 or more yields an all-ones mask.
#[inline]
pub const fn mask(length: u32) -> u32 {
    if length >= 32 {
        u32::MAX
    } else {
        (1u32 << length) - 1
    }
}

/// Places the low `length` bits of `value` at bit position `shift`.
#[inline]
pub const fn field(value: u32, shift: u32, length: u32) -> u32 {
    (value & mask(length)) << shift
}

/// Extracts the `length`-bit field at bit position `shift` from `data`.
#[inline]
pub const fn extract(data: u32, shift: u32, length: u32) -> u32 {
    (data >> shift) & mask(length)
}

/// Extracts a `length`-bit field and sign-extends it to an `i32`.
///
/// The field's top bit is treated as the sign bit.
#[inline]
pub const fn extract_signed(data: u32, shift: u32, length: u32) -> i32 {
    let raw = extract(data, shift, length);
    if length == 0 || length >= 32 {
        return raw as i32;
    }
    let sign = 1u32 << (length - 1);
    if raw & sign != 0 {
        (raw | !mask(length)) as i32
    } else {
        raw as i32
    }
}

/// Replaces the `length`-bit field at bit position `shift` in `data` with
/// the low `length` bits of `value`.
#[inline]
pub const fn replace(data: u32, value: u32, shift: u32, length: u32) -> u32 {
    (data & !(mask(length) << shift)) | field(value, shift, length)
}

/// Scatters the low `count` bits of `value` into `data` at positions
/// `start, start + stride, start + 2 * stride, ...`.
///
/// Positions past bit 31 are discarded.
pub fn interleave(data: u32, value: u32, start: u32, stride: u32, count: u32) -> u32 {
    let mut out = data;
    let mut pos = start;
    for i in 0..count {
        if pos >= 32 {
            break;
        }
        let bit = (value >> i) & 1;
        out = (out & !(1 << pos)) | (bit << pos);
        pos += stride;
    }
    out
}

/// Gathers `count` bits from `data` at positions
/// `start, start + stride, ...` into the low bits of the result.
pub fn deinterleave(data: u32, start: u32, stride: u32, count: u32) -> u32 {
    let mut out = 0u32;
    let mut pos = start;
    for i in 0..count {
        if pos >= 32 {
            break;
        }
        out |= ((data >> pos) & 1) << i;
        pos += stride;
    }
    out
}
