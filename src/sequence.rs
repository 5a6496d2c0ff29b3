//! Route-map sequence number allocation, partitioned between community-qualified and unqualified
//! entries so that more-specific (community-qualified) policy is always evaluated first without an
//! explicit sort step.

use std::collections::HashSet;

use crate::error::SequenceError;
#[cfg(test)]
use crate::model::RESERVED_SEQ;

/// Lower/upper bound (inclusive) and step for community-qualified entries.
const COMMUNITY_BAND: (u16, u16, u16) = (10, 29990, 10);
/// Lower/upper bound (inclusive) and step for unqualified entries.
const UNQUALIFIED_BAND: (u16, u16, u16) = (30000, 65520, 10);

/// Allocate the next free route-map sequence number under the banding policy. `used` must not
/// contain [`RESERVED_SEQ`]; this function never returns it.
pub fn next_seq(used: &HashSet<u16>, has_community: bool) -> Result<u16, SequenceError> {
    let (lo, hi, step, band_name) = if has_community {
        let (lo, hi, step) = COMMUNITY_BAND;
        (lo, hi, step, "community")
    } else {
        let (lo, hi, step) = UNQUALIFIED_BAND;
        (lo, hi, step, "unqualified")
    };

    let mut seq = lo;
    while seq <= hi {
        if !used.contains(&seq) {
            return Ok(seq);
        }
        seq += step;
    }
    Err(SequenceError::SequenceSpaceExhausted(band_name))
}
