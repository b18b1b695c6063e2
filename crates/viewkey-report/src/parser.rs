//! Line-oriented parser for transaction listings.
//!
//! The parser walks the report once, holding the transaction being built and
//! the output being built. Field lines are dispatched through a prefix table;
//! the only field that spans lines is the memo, which swallows every following
//! indented line up to the next non-indented line. An indented line that is
//! itself a field (`Output 1 (Orchard)`, `Value: ...`) also ends the memo.

use crate::model::{Output, Transaction};

/// Line that introduces the listing and carries no data.
const HEADER_PREFIX: &str = "Transactions:";

/// Marker wrapping text memos, e.g. `Memo::Text("gm")`.
const TEXT_MEMO_OPEN: &str = "Memo::Text(";
const TEXT_MEMO_CLOSE: &str = "\")";

/// Minimum length of a transaction id line.
const MIN_TXID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Mined,
    Amount,
    Fee,
    NoteSummary,
    OutputHeader,
    Value,
    Account,
    Recipient,
    Memo,
}

/// Prefix dispatch table, matched in order against the trimmed line.
const FIELD_PREFIXES: &[(&str, Field)] = &[
    ("Mined:", Field::Mined),
    ("Amount:", Field::Amount),
    ("Fee paid:", Field::Fee),
    ("Sent ", Field::NoteSummary),
    ("Output ", Field::OutputHeader),
    ("Value:", Field::Value),
    ("Received by account:", Field::Account),
    ("To:", Field::Recipient),
    ("Memo:", Field::Memo),
];

/// Returns true if the line, once trimmed, is at least 32 hex digits.
#[must_use]
pub fn looks_like_txid(line: &str) -> bool {
    let s = line.trim();
    s.len() >= MIN_TXID_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn classify_line(stripped: &str) -> Option<(Field, &str)> {
    FIELD_PREFIXES.iter().find_map(|(prefix, field)| {
        stripped
            .strip_prefix(prefix)
            .map(|rest| (*field, rest.trim()))
    })
}

/// Parse report text into transactions. Never fails.
#[must_use]
pub fn parse_report(text: &str) -> Vec<Transaction> {
    ReportParser::new(text).parse()
}

/// Single-use parser over one report.
pub struct ReportParser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    transactions: Vec<Transaction>,
    current: Option<Transaction>,
}

impl<'a> ReportParser<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
            transactions: Vec::new(),
            current: None,
        }
    }

    /// Consume the parser and return the transactions in report order.
    #[must_use]
    pub fn parse(mut self) -> Vec<Transaction> {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            self.pos += 1;

            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with(HEADER_PREFIX) {
                continue;
            }

            let indent = indent_width(line);
            if indent == 0 && looks_like_txid(line) {
                self.flush();
                self.current = Some(Transaction::new(stripped));
                continue;
            }

            // Lines before the first txid have nothing to attach to.
            if self.current.is_none() {
                continue;
            }

            if let Some((field, value)) = classify_line(stripped) {
                self.apply(field, stripped, value);
            }
        }

        self.flush();
        self.transactions
    }

    fn flush(&mut self) {
        if let Some(tx) = self.current.take() {
            self.transactions.push(tx);
        }
    }

    fn apply(&mut self, field: Field, stripped: &str, value: &str) {
        // Memo continuation lines are consumed even without an open output.
        let memo = (field == Field::Memo).then(|| self.collect_memo(value));

        let Some(tx) = self.current.as_mut() else {
            return;
        };

        match field {
            Field::Mined => apply_mined(tx, value),
            Field::Amount => tx.amount = Some(value.to_string()),
            Field::Fee => tx.fee = Some(value.to_string()),
            Field::NoteSummary => {
                if stripped.contains("notes") && stripped.contains("memos") {
                    tx.note_summary = Some(stripped.to_string());
                }
            }
            Field::OutputHeader => tx.outputs.push(parse_output_header(stripped)),
            Field::Value | Field::Account | Field::Recipient | Field::Memo => {
                // Outputs are only ever appended, so the open output is the last one.
                let Some(output) = tx.outputs.last_mut() else {
                    return;
                };
                match field {
                    Field::Value => output.value = Some(value.to_string()),
                    Field::Account => output.account = Some(value.to_string()),
                    Field::Recipient => output.to = Some(value.to_string()),
                    _ => output.memo = memo,
                }
            }
        }
    }

    fn collect_memo(&mut self, first: &str) -> String {
        let mut fragments = vec![first.to_string()];
        while let Some(next) = self.lines.get(self.pos) {
            let continuation = next.trim();
            if indent_width(next) == 0 || classify_line(continuation).is_some() {
                break;
            }
            if !continuation.is_empty() {
                fragments.push(continuation.to_string());
            }
            self.pos += 1;
        }
        unwrap_text_memo(&fragments.join(" "))
    }
}

fn apply_mined(tx: &mut Transaction, value: &str) {
    let (height, time) = match value.split_once(' ') {
        Some((height, time)) => (height, Some(time)),
        None => (value, None),
    };

    match height.parse::<u64>() {
        Ok(h) => tx.mined_height = Some(h),
        Err(_) if !height.is_empty() => tx.mined_height_raw = Some(height.to_string()),
        Err(_) => {}
    }

    if let Some(time) = time {
        let time = time.trim_matches(|c: char| c == '(' || c == ')' || c == ' ');
        tx.mined_time = Some(time.to_string());
    }
}

fn parse_output_header(stripped: &str) -> Output {
    let index = stripped
        .split_whitespace()
        .nth(1)
        .filter(|token| token.chars().all(|c| c.is_ascii_digit()))
        .and_then(|token| token.parse().ok());

    let pool = stripped.find('(').and_then(|open| {
        let inner = &stripped[open + 1..];
        inner.find(')').map(|close| inner[..close].to_string())
    });

    Output {
        raw_header: stripped.to_string(),
        index,
        pool,
        ..Output::default()
    }
}

fn unwrap_text_memo(memo: &str) -> String {
    let Some(start) = memo.find(TEXT_MEMO_OPEN) else {
        return memo.to_string();
    };
    let inner = &memo[start + TEXT_MEMO_OPEN.len()..];
    let inner = inner.strip_prefix('"').unwrap_or(inner);
    let end = inner.rfind(TEXT_MEMO_CLOSE).unwrap_or(inner.len());
    inner[..end].to_string()
}
