//! Viewkey Report - tolerant parsing of `zcash-devtool list-tx` output.
//!
//! The scanning tool prints its transaction listing as loosely structured
//! text. This crate turns that text into [`Transaction`] records without ever
//! failing: lines it does not understand are skipped and the affected
//! attributes stay unset.
//!
//! # Example
//!
//! ```rust
//! use viewkey_report::{filter_by_birthday, parse_report};
//!
//! let text = "\
//! Transactions:
//! 6f1d3c2a9b8e7f6d5c4b3a29180706f5e4d3c2b1a09f8e7d6c5b4a3928170605
//!     Mined: 2600123 (2024-09-01 10:00:00)
//!     Amount: 0.5 ZEC
//! ";
//!
//! let txs = filter_by_birthday(parse_report(text), Some(2_600_000));
//! assert_eq!(txs.len(), 1);
//! assert_eq!(txs[0].mined_height, Some(2_600_123));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod export;
#[allow(missing_docs)]
pub mod filter;
pub mod model;
#[allow(missing_docs)]
pub mod parser;

// Re-export commonly used types
pub use export::to_csv;
pub use filter::{filter_by_birthday, BirthdayFilter, FilterOutcome};
pub use model::{Output, Transaction};
pub use parser::{looks_like_txid, parse_report, ReportParser};
