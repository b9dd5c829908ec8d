//! Multipart part planning.
//!
//! This module contains pure logic for splitting the not-yet-uploaded tail
//! of a file into parts that fit the service's part-count limit.
//! No I/O operations - just decision making.

use crate::error::TransportError;
use crate::types::{PartDescriptor, UploadedPart};

/// Longest run of accepted parts numbered 1, 2, 3, ... without a gap.
///
/// Parts after a gap do not count as uploaded; their numbers get
/// re-uploaded and the service overwrites them.
pub fn contiguous_prefix(parts: &[UploadedPart]) -> &[UploadedPart] {
    let len: usize = parts
        .iter()
        .enumerate()
        .take_while(|(i, p)| p.part_number as usize == i + 1)
        .count();
    &parts[..len]
}

/// Part size needed so the whole file fits in the remaining part budget.
///
/// This is `max(base_part_size, ceil(total_size / (max_parts - accepted)))`.
/// Returns `None` when the budget is already used up.
pub fn effective_part_size(
    total_size: u64,
    max_parts: u32,
    accepted: u32,
    base_part_size: u64,
) -> Option<u64> {
    let remaining_budget: u64 = max_parts.checked_sub(accepted)? as u64;
    if remaining_budget == 0 {
        return None;
    }
    let min_size: u64 = total_size.div_ceil(remaining_budget);
    Some(std::cmp::max(min_size, base_part_size.max(1)))
}

/// Plan the parts that still have to be uploaded.
///
/// Parts are carved from the first byte not covered by `accepted`, each
/// `min(bytes_remaining, part_size)` long, numbered from
/// `accepted.len() + 1`. Only the last part may be shorter.
///
/// # Arguments
/// * `accepted` - Parts the remote already holds, ordered by part number
/// * `max_parts` - Service limit on parts per upload
/// * `uploaded_bytes` - Bytes covered by `accepted`
/// * `total_size` - Size of the local file
/// * `base_part_size` - Baseline part size
///
/// # Returns
/// The remaining parts in upload order. A zero-byte file with nothing
/// accepted yields one empty part so the session can be completed.
pub fn plan_parts(
    accepted: &[UploadedPart],
    max_parts: u32,
    uploaded_bytes: u64,
    total_size: u64,
    base_part_size: u64,
) -> Result<Vec<PartDescriptor>, TransportError> {
    let accepted_count: u32 = accepted.len() as u32;
    let remaining: u64 = total_size.saturating_sub(uploaded_bytes);

    if remaining == 0 {
        if total_size == 0 && accepted.is_empty() {
            return Ok(vec![PartDescriptor {
                part_number: 1,
                offset: 0,
                length: 0,
            }]);
        }
        return Ok(Vec::new());
    }

    let part_size: u64 = effective_part_size(total_size, max_parts, accepted_count, base_part_size)
        .ok_or(TransportError::PartLimitExceeded {
            max_parts,
            accepted: accepted_count,
        })?;

    let mut parts: Vec<PartDescriptor> = Vec::new();
    let mut offset: u64 = uploaded_bytes;
    let mut part_number: u32 = accepted_count + 1;

    while offset < total_size {
        let length: u64 = std::cmp::min(part_size, total_size - offset);
        parts.push(PartDescriptor {
            part_number,
            offset,
            length,
        });
        offset += length;
        part_number += 1;
    }

    Ok(parts)
}
