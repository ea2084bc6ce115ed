//! Chunked execution with per-item fallback
//!
//! Items are processed in consecutive chunks, one chunk at a time. When a
//! chunk-level call fails, each item of that chunk is retried on its own so a
//! single bad item only fails itself.

use std::fmt::Write as _;
use std::future::Future;

use crate::error::{GmailMcpError, Result};

/// An item whose individual retry failed
#[derive(Debug)]
pub struct BatchFailure<T> {
    pub item: T,
    pub error: GmailMcpError,
}

/// Partition of a batch run into results and failed items
#[derive(Debug)]
pub struct BatchOutcome<T, R> {
    pub successes: Vec<R>,
    pub failures: Vec<BatchFailure<T>>,
}

impl<T, R> Default for BatchOutcome<T, R> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Wording of a batch summary
#[derive(Debug, Clone, Copy)]
pub struct SummaryLabels {
    pub title: &'static str,
    pub succeeded: &'static str,
    pub failed: &'static str,
}

impl SummaryLabels {
    pub const MODIFY: SummaryLabels = SummaryLabels {
        title: "Batch label modification complete.",
        succeeded: "Successfully processed",
        failed: "Failed to process",
    };

    pub const DELETE: SummaryLabels = SummaryLabels {
        title: "Batch delete operation complete.",
        succeeded: "Successfully deleted",
        failed: "Failed to delete",
    };
}

/// Failing IDs are shortened to this many characters in summaries
const SUMMARY_ID_CHARS: usize = 16;

impl<T: AsRef<str>, R> BatchOutcome<T, R> {
    /// Human-readable counts plus the truncated IDs of failed items
    pub fn summary(&self, labels: SummaryLabels) -> String {
        let mut text = format!(
            "{}\n{}: {} messages\n",
            labels.title,
            labels.succeeded,
            self.successes.len()
        );

        if !self.failures.is_empty() {
            let _ = write!(
                text,
                "{}: {} messages\n\nFailed message IDs:\n",
                labels.failed,
                self.failures.len()
            );
            let lines: Vec<String> = self
                .failures
                .iter()
                .map(|f| {
                    let short: String = f.item.as_ref().chars().take(SUMMARY_ID_CHARS).collect();
                    format!("- {}... ({})", short, f.error)
                })
                .collect();
            text.push_str(&lines.join("\n"));
        }

        text
    }
}

/// Run `op` over `items` in chunks of `batch_size` (minimum 1).
///
/// A failed chunk is retried item by item. Every input item ends up either
/// contributing to `successes` or listed in `failures`, never both.
pub async fn process_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    mut op: F,
) -> BatchOutcome<T, R>
where
    T: Clone,
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<Vec<R>>>,
{
    let batch_size = batch_size.max(1);
    let total = items.len();
    let mut outcome = BatchOutcome::default();
    let mut remaining = items.into_iter();

    loop {
        let chunk: Vec<T> = remaining.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }

        match op(chunk.clone()).await {
            Ok(results) => outcome.successes.extend(results),
            Err(e) => {
                tracing::warn!(
                    chunk_len = chunk.len(),
                    error = %e,
                    "Batch chunk failed, retrying items individually"
                );
                for item in chunk {
                    match op(vec![item.clone()]).await {
                        Ok(results) => outcome.successes.extend(results),
                        Err(error) => outcome.failures.push(BatchFailure { item, error }),
                    }
                }
            }
        }
    }

    tracing::debug!(
        total,
        succeeded = outcome.successes.len(),
        failed = outcome.failures.len(),
        "Batch run finished"
    );
    outcome
}
