//! Transaction records produced by the report parser.
//!
//! Every attribute other than the txid is optional: the report format is not
//! a stable contract and missing lines simply leave fields unset.

use serde::{Deserialize, Serialize};

/// One transaction from the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id, at least 32 hex characters
    pub txid: String,
    /// Mined height when it parsed as an integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mined_height: Option<u64>,
    /// Raw height token when it did not parse as an integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mined_height_raw: Option<String>,
    /// Mined time text that followed the height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mined_time: Option<String>,
    /// Net amount as printed by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Fee paid as printed by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    /// The "Sent N notes, M memos" summary line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_summary: Option<String>,
    /// Outputs in the order they appear
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// A transaction with only its id set.
    #[must_use]
    pub fn new(txid: impl Into<String>) -> Self {
        Self {
            txid: txid.into(),
            ..Self::default()
        }
    }
}

/// One output of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// The trimmed `Output ...` header line, verbatim
    pub raw_header: String,
    /// Output index from the header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Shielded pool named in parentheses, e.g. `Orchard`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    /// Value as printed by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Receiving account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Recipient address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Decoded memo text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}
