//! Error types for rs2-signal
//!
//! Stream operations themselves never fail: unknown targets, empty streams and
//! repeated disposal are silent no-ops. The only failure a caller can observe
//! is a leak, which a harness turns into a `LeakError` when it wants a
//! `Result` instead of a report.

use crate::leak_registry::LeakEntry;

/// Leak diagnostics raised from a `LeakReport`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LeakError {
    /// Streams or strong subscriptions that were created but never disposed
    #[error("{} outstanding allocation(s) not released: {}", total(.entries), render(.entries))]
    Outstanding { entries: Vec<LeakEntry> },
    /// Sites that released more often than they allocated
    #[error("{} site(s) released more than allocated: {}", .entries.len(), render(.entries))]
    OverReleased { entries: Vec<LeakEntry> },
}

impl LeakError {
    /// Entries attached to this error
    pub fn entries(&self) -> &[LeakEntry] {
        match self {
            LeakError::Outstanding { entries } | LeakError::OverReleased { entries } => entries,
        }
    }
}

fn total(entries: &[LeakEntry]) -> i64 {
    entries.iter().map(|e| e.count).sum()
}

fn render(entries: &[LeakEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{} ({})", e.key, e.count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for leak validation
pub type LeakResult<T> = Result<T, LeakError>;
