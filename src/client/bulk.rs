//! GETBULK response handling.
//!
//! A BulkGetRequest asks for two groups in one round trip: the
//! non-repeaters (scalar successors, one value each) and the repeaters
//! (up to `max-repetitions` successors per OID, interleaved column by
//! column in the response). [`split_bulk_response`] cuts the response at
//! the non-repeater boundary and cleans up the listing.

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::VarBind;

/// Result of a bulk GET: the scalar group and the repeating listing,
/// both in response order.
#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    /// One `(oid, value)` per scalar (non-repeating) request OID.
    pub scalars: Vec<(Oid, Value)>,
    /// The repeating listing, in the order the agent returned it.
    pub listing: Vec<(Oid, Value)>,
}

/// Compute `max-repetitions` so the listing stays under `max_list_size`
/// entries across all repeating OIDs.
pub fn max_repetitions(repeating_count: usize, max_list_size: usize) -> i32 {
    if repeating_count == 0 {
        0
    } else {
        max_list_size.div_ceil(repeating_count) as i32
    }
}

/// Split a GETBULK response at the non-repeater boundary.
///
/// Per RFC 3416 the response may hold at most `n + m * r` varbinds;
/// anything more is a protocol violation. The listing stops at the first
/// endOfMibView and, when `subtree_filter` is given, keeps only entries
/// under one of those roots, capped at `max_list_size`.
pub fn split_bulk_response(
    varbinds: Vec<VarBind>,
    non_repeaters: usize,
    max_repetitions: i32,
    repeating_count: usize,
    subtree_filter: Option<&[Oid]>,
    max_list_size: usize,
) -> Result<BulkResult> {
    let expected_max = non_repeaters + (max_repetitions as usize) * repeating_count;
    if varbinds.len() > expected_max {
        return Err(Error::TooManyVarbinds {
            expected: expected_max,
            actual: varbinds.len(),
        });
    }

    let mut iter = varbinds.into_iter();

    let scalars: Vec<(Oid, Value)> = iter
        .by_ref()
        .take(non_repeaters)
        .map(|vb| (vb.oid, vb.value))
        .collect();

    let mut listing = Vec::new();
    for vb in iter {
        if vb.value == Value::EndOfMibView {
            break;
        }
        if let Some(roots) = subtree_filter {
            if !roots.iter().any(|root| root.parent_of(&vb.oid)) {
                tracing::debug!(
                    target: "snmpkit::client",
                    oid = %vb.oid,
                    "bulk listing entry outside requested subtrees, dropped"
                );
                continue;
            }
        }
        listing.push((vb.oid, vb.value));
        if listing.len() >= max_list_size {
            break;
        }
    }

    Ok(BulkResult { scalars, listing })
}
