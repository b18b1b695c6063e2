//! CSV export of parsed transactions.
//!
//! One row per output; a transaction without outputs still gets one row with
//! the output columns left empty.

use crate::model::{Output, Transaction};

const HEADERS: [&str; 12] = [
    "txid",
    "mined_height",
    "mined_time",
    "amount",
    "fee",
    "note_summary",
    "output_index",
    "output_pool",
    "output_value",
    "output_account",
    "output_to",
    "output_memo",
];

/// Render transactions as CSV with `\r\n` row separators.
#[must_use]
pub fn to_csv(txs: &[Transaction]) -> String {
    let mut rows = vec![HEADERS.join(",")];

    for tx in txs {
        let base = [
            tx.txid.clone(),
            tx.mined_height.map(|h| h.to_string()).unwrap_or_default(),
            tx.mined_time.clone().unwrap_or_default(),
            tx.amount.clone().unwrap_or_default(),
            tx.fee.clone().unwrap_or_default(),
            tx.note_summary.clone().unwrap_or_default(),
        ];

        if tx.outputs.is_empty() {
            rows.push(render_row(&base, &Output::default()));
        } else {
            for output in &tx.outputs {
                rows.push(render_row(&base, output));
            }
        }
    }

    rows.join("\r\n")
}

fn render_row(base: &[String], output: &Output) -> String {
    let output_cells = [
        output.index.map(|i| i.to_string()).unwrap_or_default(),
        output.pool.clone().unwrap_or_default(),
        output.value.clone().unwrap_or_default(),
        output.account.clone().unwrap_or_default(),
        output.to.clone().unwrap_or_default(),
        output.memo.clone().unwrap_or_default(),
    ];

    base.iter()
        .chain(output_cells.iter())
        .map(|cell| escape(cell))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape(value: &str) -> String {
    let flat = value.replace("\r\n", " ").replace(['\r', '\n'], " ");
    if flat.contains(',') || flat.contains('"') {
        format!("\"{}\"", flat.replace('"', "\"\""))
    } else {
        flat
    }
}
