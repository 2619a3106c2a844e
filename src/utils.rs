use crate::error::{MuxError, Result};

const GROWTH_BLOCK: usize = 128;

/// Reserves room for `additional` more bytes, growing capacity in whole
/// 128-byte blocks. Allocation failure is reported instead of aborting.
pub fn reserve_blocks(buf: &mut Vec<u8>, additional: usize) -> Result<()> {
    let needed = buf.len() + additional;
    if needed > buf.capacity() {
        let inc = additional.div_ceil(GROWTH_BLOCK) * GROWTH_BLOCK;
        let target = buf.capacity() + inc;
        buf.try_reserve_exact(target - buf.len())?;
    }
    Ok(())
}

/// Big-endian `len` in a field of `width` bytes (1..=4).
pub fn write_length(len: usize, width: usize) -> Result<([u8; 4], usize)> {
    if !(1..=4).contains(&width) {
        return Err(MuxError::invalid_format(format!(
            "length field width {} out of range",
            width
        )));
    }
    let max = if width == 4 {
        u32::MAX as u64
    } else {
        (1u64 << (8 * width)) - 1
    };
    if len as u64 > max {
        return Err(MuxError::invalid_format(format!(
            "length {} does not fit a {}-byte field",
            len, width
        )));
    }
    let be = (len as u32).to_be_bytes();
    let mut out = [0u8; 4];
    out[..width].copy_from_slice(&be[4 - width..]);
    Ok((out, width))
}

/// Reads a big-endian length of `field.len()` bytes.
pub fn read_length(field: &[u8]) -> usize {
    field.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
}
