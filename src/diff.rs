//! Baseline delta reconstruction.
//!
//! Patch artifacts may be shipped as a delta against the baseline
//! executable bundled with the app, shrinking the transfer to the bytes
//! that actually changed. This module is the pure core of that path: bytes
//! in, bytes out, no I/O and no network, so it is testable in isolation
//! and swappable for a different codec without touching the downloader.
//!
//! ## Delta Format
//!
//! A delta is a sequence of operations, applied in order:
//!
//! ```text
//! 0x00  copy    u32 offset, u32 len      copy len bytes from baseline
//! 0x01  insert  u32 len, <len bytes>     emit literal bytes
//! ```
//!
//! All integers are little-endian. Out-of-range copies and truncated
//! operations are rejected; a malformed delta can never produce a
//! partially reconstructed artifact.

use crate::error::{Error, Result};

const OP_COPY: u8 = 0x00;
const OP_INSERT: u8 = 0x01;

/// Applies `delta` to `baseline` and returns the reconstructed artifact.
pub fn apply(baseline: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;
        match op {
            OP_COPY => {
                let offset = read_u32(delta, &mut pos)? as usize;
                let len = read_u32(delta, &mut pos)? as usize;
                let end = offset
                    .checked_add(len)
                    .ok_or_else(|| Error::Delta("copy range overflows".to_string()))?;
                if end > baseline.len() {
                    return Err(Error::Delta(format!(
                        "copy {offset}..{end} exceeds baseline of {} bytes",
                        baseline.len()
                    )));
                }
                out.extend_from_slice(&baseline[offset..end]);
            }
            OP_INSERT => {
                let len = read_u32(delta, &mut pos)? as usize;
                let end = pos
                    .checked_add(len)
                    .filter(|&e| e <= delta.len())
                    .ok_or_else(|| Error::Delta("insert runs past end of delta".to_string()))?;
                out.extend_from_slice(&delta[pos..end]);
                pos = end;
            }
            other => {
                return Err(Error::Delta(format!("unknown opcode {other:#04x}")));
            }
        }
    }

    Ok(out)
}

fn read_u32(delta: &[u8], pos: &mut usize) -> Result<u32> {
    let end = *pos + 4;
    if end > delta.len() {
        return Err(Error::Delta("truncated operand".to_string()));
    }
    let value = u32::from_le_bytes([delta[*pos], delta[*pos + 1], delta[*pos + 2], delta[*pos + 3]]);
    *pos = end;
    Ok(value)
}
