#![allow(clippy::must_use_candidate)]

use crate::model::Transaction;
use viewkey_core::BirthdayHeight;

/// Drops transactions mined below the wallet birthday.
///
/// Transactions with an unknown height are always kept; an unset birthday
/// keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct BirthdayFilter {
    pub birthday: Option<BirthdayHeight>,
}

/// Filtered transactions plus the number that were dropped.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub transactions: Vec<Transaction>,
    pub dropped: usize,
}

impl BirthdayFilter {
    pub fn new(birthday: Option<BirthdayHeight>) -> Self {
        Self { birthday }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        match (self.birthday, tx.mined_height) {
            (Some(birthday), Some(height)) => height >= birthday,
            _ => true,
        }
    }

    /// Apply the filter, preserving order.
    pub fn apply(&self, txs: Vec<Transaction>) -> FilterOutcome {
        let Some(birthday) = self.birthday else {
            return FilterOutcome {
                transactions: txs,
                dropped: 0,
            };
        };

        let before = txs.len();
        let transactions: Vec<_> = txs.into_iter().filter(|tx| self.matches(tx)).collect();
        let dropped = before - transactions.len();

        if dropped > 0 {
            tracing::info!(
                "Filtered out {} transactions below birthday height {}",
                dropped,
                birthday
            );
        }

        FilterOutcome {
            transactions,
            dropped,
        }
    }
}

/// Convenience wrapper returning only the kept transactions.
pub fn filter_by_birthday(
    txs: Vec<Transaction>,
    birthday: Option<BirthdayHeight>,
) -> Vec<Transaction> {
    BirthdayFilter::new(birthday).apply(txs).transactions
}
