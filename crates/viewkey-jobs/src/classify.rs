//! Classification of scanning-tool failures.
//!
//! The tool only reports failures as free-form text, so classification is
//! substring matching against known markers. The first matching rule wins and
//! the rule order is significant. The [`FailureClassifier`] trait lets a
//! different strategy replace the substring rules if the tool's output changes.

use crate::invoker::ToolOutput;
use serde::{Deserialize, Serialize};
use std::path::Path;
use viewkey_core::BirthdayHeight;

/// Actionable category of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The lightwalletd server cannot serve tree state at the birthday
    BirthdayUnsupported,
    /// The wallet database is held by another process
    StoreLocked,
    /// The wallet directory is half-initialized or corrupted
    CorruptedWalletDir,
    /// Nothing recognizable
    UnknownToolFailure,
}

/// Classified failure with a message that tells the user what to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// Category
    pub category: FailureCategory,
    /// User-facing message including retry guidance
    pub message: String,
}

/// Context the messages refer to.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Wallet directory for the key's slug
    pub wallet_dir: &'a Path,
    /// Birthday the scan was started from
    pub birthday: BirthdayHeight,
    /// Lightwalletd server label
    pub server: &'a str,
}

/// Maps a failed invocation to an actionable category. Must never fail.
pub trait FailureClassifier: Send + Sync {
    /// Classify a failed invocation.
    fn classify(&self, output: &ToolOutput, ctx: &ClassifyContext<'_>) -> ToolFailure;
}

/// Marker rules, checked in order.
const RULES: &[(FailureCategory, &[&str])] = &[
    (
        FailureCategory::BirthdayUnsupported,
        &["GetTreeState", "InvalidArgument"],
    ),
    (FailureCategory::StoreLocked, &["database is locked"]),
    (
        FailureCategory::CorruptedWalletDir,
        &["os error 2", "The system cannot find the file specified"],
    ),
];

/// Default classifier: first-match substring rules over stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl SubstringClassifier {
    /// Category for a block of tool output.
    #[must_use]
    pub fn categorize(text: &str) -> FailureCategory {
        RULES
            .iter()
            .find(|(_, markers)| markers.iter().any(|marker| text.contains(marker)))
            .map_or(FailureCategory::UnknownToolFailure, |(category, _)| *category)
    }
}

impl FailureClassifier for SubstringClassifier {
    fn classify(&self, output: &ToolOutput, ctx: &ClassifyContext<'_>) -> ToolFailure {
        let category = Self::categorize(&output.combined());
        ToolFailure {
            category,
            message: failure_message(category, output, ctx),
        }
    }
}

fn failure_message(
    category: FailureCategory,
    output: &ToolOutput,
    ctx: &ClassifyContext<'_>,
) -> String {
    let wallet_dir = ctx.wallet_dir.display();
    match category {
        FailureCategory::BirthdayUnsupported => format!(
            "zcash-devtool could not initialize this wallet.\n\n\
             Start (birthday) height {} is not supported by the lightwalletd server ({}). \
             Try a more recent height (for example around the time this wallet was first used).",
            ctx.birthday, ctx.server
        ),
        FailureCategory::StoreLocked => format!(
            "Wallet database is locked.\n\n\
             Another process (or a previous interrupted run) is holding the wallet database open.\n\n\
             Fix options:\n  \
             • Make sure no other scan for this key is running.\n  \
             • Restart this service.\n  \
             • If it still persists, delete the wallet folder:\n      {wallet_dir}\n    \
             and run this again (that will resync from scratch for this key)."
        ),
        FailureCategory::CorruptedWalletDir => format!(
            "zcash-devtool reported a missing file in this wallet directory.\n\n\
             Most likely the wallet folder is in a corrupted or half-initialized state.\n\n\
             You can fix it by removing this folder:\n    {wallet_dir}\n\
             and then running this again (it will re-create the wallet and rescan from the \
             specified birthday)."
        ),
        FailureCategory::UnknownToolFailure => format!(
            "The scanning tool failed (exit code {}).\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
            output
                .exit_code
                .map_or_else(|| "none".to_string(), |code| code.to_string()),
            output.stdout,
            output.stderr
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn failed(stdout: &str, stderr: &str) -> ToolOutput {
        ToolOutput {
            exit_code: Some(1),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn classify(stdout: &str, stderr: &str) -> ToolFailure {
        let wallet_dir = PathBuf::from("/data/wallets/vk_0123456789abcdef");
        let ctx = ClassifyContext {
            wallet_dir: &wallet_dir,
            birthday: 419_200,
            server: "zecrocks",
        };
        SubstringClassifier.classify(&failed(stdout, stderr), &ctx)
    }

    #[test]
    fn test_tree_state_marker() {
        let failure = classify("", "Error: status: InvalidArgument, message: \"no tree state\"");
        assert_eq!(failure.category, FailureCategory::BirthdayUnsupported);
        assert!(failure.message.contains("419200"));
        assert!(failure.message.contains("more recent height"));
    }

    #[test]
    fn test_store_locked_regardless_of_surrounding_text() {
        for (stdout, stderr) in [
            ("", "database is locked"),
            ("syncing...\nError: database is locked (code 5)", "warning: slow"),
            ("", "prefix database is locked suffix os error 2"),
        ] {
            let failure = classify(stdout, stderr);
            assert_eq!(failure.category, FailureCategory::StoreLocked);
            assert!(failure.message.contains("vk_0123456789abcdef"));
        }
    }

    #[test]
    fn test_rule_order_prefers_tree_state() {
        let failure = classify("GetTreeState failed", "database is locked");
        assert_eq!(failure.category, FailureCategory::BirthdayUnsupported);
    }

    #[test]
    fn test_missing_file_markers() {
        assert_eq!(
            classify("", "No such file or directory (os error 2)").category,
            FailureCategory::CorruptedWalletDir
        );
        assert_eq!(
            classify("The system cannot find the file specified.", "").category,
            FailureCategory::CorruptedWalletDir
        );
    }

    #[test]
    fn test_unknown_includes_raw_output() {
        let failure = classify("partial sync output", "panicked at 'boom'");
        assert_eq!(failure.category, FailureCategory::UnknownToolFailure);
        assert!(failure.message.contains("STDOUT:\npartial sync output"));
        assert!(failure.message.contains("STDERR:\npanicked at 'boom'"));
        assert!(failure.message.contains("exit code 1"));
    }

    #[test]
    fn test_markers_split_across_streams_do_not_match() {
        // combined() joins with a newline, so a marker cannot straddle the streams
        assert_eq!(
            SubstringClassifier::categorize("database is\nlocked"),
            FailureCategory::UnknownToolFailure
        );
    }
}
