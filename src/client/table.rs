//! Table pivoting.
//!
//! SNMP tables arrive column-major from a walk: every varbind OID is
//! `<table>.<entry>.<column>.<row index...>`. [`tablify`] pivots that
//! stream into rows keyed by the row index.

use std::collections::BTreeMap;

use crate::value::Value;
use crate::varbind::VarBind;

/// One pivoted table row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// The row index: the OID tail after the column node, dot-joined
    /// (an interface index like `"3"`, or a composite like
    /// `"10.1.172.17.0.1"`).
    pub index: String,
    /// Values keyed by column number.
    pub columns: BTreeMap<u32, Value>,
}

impl TableRow {
    /// The value of one column, if present in this row.
    pub fn column(&self, column: u32) -> Option<&Value> {
        self.columns.get(&column)
    }
}

/// Pivot walked varbinds into table rows.
///
/// `num_base_nodes` is the number of leading OID nodes to strip before
/// the column node; for a table fetched from its base OID that is
/// `base.len() + 1` (the extra node being the table's entry node). The
/// node right after the stripped prefix is the column, the remaining
/// tail is the row index.
///
/// Varbinds whose OID is too short to carry a column and an index are
/// skipped. Row order follows first appearance in the input.
pub fn tablify<I>(varbinds: I, num_base_nodes: usize) -> Vec<TableRow>
where
    I: IntoIterator<Item = VarBind>,
{
    let mut order: Vec<String> = Vec::new();
    let mut rows: BTreeMap<String, BTreeMap<u32, Value>> = BTreeMap::new();

    for vb in varbinds {
        let tail = vb.oid.suffix(num_base_nodes);
        let (&column, index_nodes) = match tail.split_first() {
            Some(split) if !split.1.is_empty() => split,
            _ => {
                tracing::debug!(
                    target: "snmpkit::client",
                    oid = %vb.oid,
                    "varbind too short for a table cell, skipped"
                );
                continue;
            }
        };

        let index = index_nodes
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");

        if !rows.contains_key(&index) {
            order.push(index.clone());
        }
        rows.entry(index).or_default().insert(column, vb.value);
    }

    order
        .into_iter()
        .map(|index| {
            let columns = rows.remove(&index).expect("row recorded on first sight");
            TableRow { index, columns }
        })
        .collect()
}
